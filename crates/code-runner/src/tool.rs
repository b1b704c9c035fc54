//! Python Execution Tool

use async_trait::async_trait;
use serde_json::{Value, json};

use agent_core::{ParameterSchema, Tool, ToolCall, ToolResult, ToolSchema, timestamp};

use crate::sandbox::{Execution, PythonSandbox};

pub const TOOL_NAME: &str = "code_execution_python";

/// Runs model-written Python in the subprocess sandbox
pub struct CodeExecutionTool {
    sandbox: PythonSandbox,
}

impl CodeExecutionTool {
    pub fn new(sandbox: PythonSandbox) -> Self {
        Self { sandbox }
    }

    fn error(message: impl Into<String>, error_type: &str, code_length: usize) -> ToolResult {
        ToolResult::failure(TOOL_NAME, message).with_metadata(json!({
            "timestamp": timestamp(),
            "code_length": code_length,
            "error_type": error_type,
        }))
    }

    fn report(execution: Execution, code_length: usize) -> ToolResult {
        let duration = format!("{:.3}s", execution.duration.as_secs_f64());

        if let Some(failure) = execution.failure {
            tracing::warn!(kind = failure.kind.as_str(), "Snippet raised {}", failure.python_type);
            let mut result = Self::error(failure.describe(), failure.kind.as_str(), code_length);
            result.data = Some(json!({
                "stdout": execution.stdout,
                "stderr": execution.stderr,
            }));
            if let Some(Value::Object(meta)) = result.metadata.as_mut() {
                meta.insert("python_error".into(), json!(failure.python_type));
                meta.insert("execution_duration".into(), json!(duration));
                if let Some(line) = failure.line {
                    meta.insert("line".into(), json!(line));
                }
            }
            return result;
        }

        ToolResult::success(
            TOOL_NAME,
            json!({
                "stdout": execution.stdout,
                "stderr": execution.stderr,
                "result": execution.result,
            }),
        )
        .with_metadata(json!({
            "timestamp": timestamp(),
            "code_length": code_length,
            "execution_duration": duration,
        }))
    }
}

#[async_trait]
impl Tool for CodeExecutionTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: TOOL_NAME.into(),
            description: "Execute Python 3 code and return stdout, stderr and a result value. \
                A main() function is called automatically; assign to `result` to return a value. \
                pandas, numpy, requests, ccxt and bs4 are imported when installed."
                .into(),
            parameters: vec![ParameterSchema::required("code", "string", "Python source to execute")],
            category: Some("code".into()),
            has_side_effects: true,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let code = call.text("code");
        if code.is_empty() {
            return Self::error("Code must not be empty", "SandboxError", 0);
        }

        let code_length = code.chars().count();
        tracing::info!(code_length, "Executing Python snippet");

        match self.sandbox.run(&code).await {
            Ok(execution) => Self::report(execution, code_length),
            Err(e) => {
                tracing::warn!(error = %e, "Sandbox failure");
                Self::error(e.to_string(), e.kind(), code_length)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::sandbox::{CodeFailure, FailureKind, SandboxConfig};

    fn tool() -> CodeExecutionTool {
        CodeExecutionTool::new(PythonSandbox::default())
    }

    #[tokio::test]
    async fn test_blank_code_is_rejected() {
        for code in [json!("   \n\t"), json!(17)] {
            let result = tool().execute(&ToolCall::new(TOOL_NAME).arg("code", code)).await;
            assert!(!result.is_success());
            assert_eq!(result.metadata.unwrap()["code_length"], 0);
        }
    }

    #[test]
    fn test_report_success_envelope() {
        let execution = Execution {
            stdout: "hi\n".into(),
            stderr: String::new(),
            result: json!(42),
            failure: None,
            duration: Duration::from_millis(1500),
        };
        let env = CodeExecutionTool::report(execution, 10).envelope();
        assert_eq!(env["status"], "success");
        assert_eq!(env["data"]["result"], 42);
        assert_eq!(env["metadata"]["code_length"], 10);
        assert_eq!(env["metadata"]["execution_duration"], "1.500s");
    }

    #[test]
    fn test_report_failure_envelope() {
        let execution = Execution {
            stdout: String::new(),
            stderr: String::new(),
            result: Value::Null,
            failure: Some(CodeFailure {
                kind: FailureKind::NameError,
                python_type: "NameError".into(),
                message: "name 'x' is not defined".into(),
                line: None,
            }),
            duration: Duration::ZERO,
        };
        let result = CodeExecutionTool::report(execution, 8);
        assert!(!result.is_success());
        assert!(result.error_message.as_deref().unwrap().contains("'x'"));
        assert_eq!(result.metadata.unwrap()["error_type"], "NameError");
    }

    #[tokio::test]
    async fn test_timeout_maps_to_error_type() {
        let tool = CodeExecutionTool::new(PythonSandbox::new(SandboxConfig {
            timeout: Duration::from_secs(1),
            ..SandboxConfig::default()
        }));
        if !tool.sandbox.interpreter_available().await {
            return;
        }

        let call = ToolCall::new(TOOL_NAME).arg("code", "while True:\n    pass");
        let result = tool.execute(&call).await;
        assert_eq!(result.metadata.unwrap()["error_type"], "Timeout");
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_sandbox_error() {
        let tool = CodeExecutionTool::new(PythonSandbox::new(SandboxConfig {
            python_bin: "/nonexistent/python-for-tests".into(),
            ..SandboxConfig::default()
        }));
        let result = tool.execute(&ToolCall::new(TOOL_NAME).arg("code", "print(1)")).await;
        assert_eq!(result.metadata.unwrap()["error_type"], "SandboxError");
    }
}
