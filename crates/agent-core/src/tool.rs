//! Tool System
//!
//! Extensible tool framework for agent capabilities.
//! Tools are registered at runtime and invoked by the reasoning loop.
//!
//! Every tool answers with a [`ToolResult`] envelope. `Tool::execute` is
//! infallible by signature: failures are reported as `status = "error"`
//! with a readable message, never as a Rust error or a panic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AgentError, Result};

/// Tool call request from the LLM
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool identifier
    #[serde(alias = "tool")]
    pub name: String,

    /// Arguments as key-value pairs
    #[serde(default)]
    pub arguments: HashMap<String, Value>,

    /// Optional call ID for tracking
    #[serde(default)]
    pub id: Option<String>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add an argument (builder style, mostly for tests and delegation)
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    /// Trimmed string argument. Missing or non-string values read as empty.
    pub fn text(&self, key: &str) -> String {
        self.arguments
            .get(key)
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    }

    /// Integer argument, accepting JSON numbers or numeric strings.
    pub fn int(&self, key: &str) -> Option<i64> {
        match self.arguments.get(key)? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Float argument, accepting JSON numbers or numeric strings.
    pub fn float(&self, key: &str) -> Option<f64> {
        let value = match self.arguments.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        value.filter(|f| f.is_finite())
    }

    /// List argument: a JSON array of strings or a comma-separated string.
    /// Entries are trimmed; empty entries are dropped.
    pub fn list(&self, key: &str) -> Vec<String> {
        let raw: Vec<String> = match self.arguments.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
            _ => Vec::new(),
        };

        raw.into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Outcome reported in the envelope
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    Error,
    PartialSuccess,
}

impl ToolStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::PartialSuccess => "partial_success",
        }
    }
}

/// Result from tool execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool that was called
    pub name: String,

    /// Call ID (if provided in request)
    pub id: Option<String>,

    pub status: ToolStatus,

    /// Payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Human-readable failure description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ToolResult {
    pub fn success(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            id: None,
            status: ToolStatus::Success,
            data: Some(data),
            error_message: None,
            metadata: None,
        }
    }

    pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            status: ToolStatus::Error,
            data: None,
            error_message: Some(error.into()),
            metadata: None,
        }
    }

    pub fn partial(name: impl Into<String>, data: Value) -> Self {
        Self {
            status: ToolStatus::PartialSuccess,
            ..Self::success(name, data)
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }

    /// The `{status, data, error_message, metadata}` object handed to the LLM
    pub fn envelope(&self) -> Value {
        let mut out = serde_json::Map::new();
        out.insert("status".into(), json!(self.status.as_str()));
        if let Some(data) = &self.data {
            out.insert("data".into(), data.clone());
        }
        if let Some(msg) = &self.error_message {
            out.insert("error_message".into(), json!(msg));
        }
        if let Some(meta) = &self.metadata {
            out.insert("metadata".into(), meta.clone());
        }
        Value::Object(out)
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, number, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Default value if not provided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

impl ParameterSchema {
    pub fn required(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: true,
            default: None,
            enum_values: None,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
        default: Value,
    ) -> Self {
        Self {
            required: false,
            default: Some(default),
            ..Self::required(name, param_type, description)
        }
    }

    pub fn one_of(mut self, values: &[&str]) -> Self {
        self.enum_values = Some(values.iter().map(|v| json!(v)).collect());
        self
    }
}

/// Tool definition schema (for LLM function calling)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,

    /// Category for grouping
    #[serde(default)]
    pub category: Option<String>,

    /// Whether tool has side effects
    #[serde(default)]
    pub has_side_effects: bool,
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema for LLM function calling
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with given arguments. Never fails: problems are
    /// reported inside the envelope.
    async fn execute(&self, call: &ToolCall) -> ToolResult;

    /// Validate arguments before execution (optional)
    fn validate(&self, call: &ToolCall) -> Result<()> {
        let schema = self.schema();

        for param in &schema.parameters {
            if param.required && !call.arguments.contains_key(&param.name) {
                return Err(AgentError::ToolValidation(format!(
                    "Missing required parameter: {}",
                    param.name
                )));
            }
        }

        Ok(())
    }
}

/// Registry for available tools
#[derive(Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let schema = tool.schema();
        self.tools.insert(schema.name, Arc::new(tool));
    }

    /// Register a shared tool
    pub fn register_shared(&mut self, tool: Arc<dyn Tool>) {
        let schema = tool.schema();
        self.tools.insert(schema.name, tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Execute a tool call. Unknown tools and validation failures come back
    /// as error envelopes.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let Some(tool) = self.get(&call.name) else {
            tracing::warn!(tool = %call.name, "Unknown tool requested");
            return ToolResult::failure(&call.name, AgentError::ToolNotFound(call.name.clone()).to_string());
        };

        if let Err(e) = tool.validate(call) {
            tracing::warn!(tool = %call.name, error = %e, "Tool call rejected");
            return ToolResult::failure(&call.name, e.to_string());
        }

        let mut result = tool.execute(call).await;
        if result.id.is_none() {
            result.id.clone_from(&call.id);
        }
        result
    }

    /// Get all tool schemas, sorted by name
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self.tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Get tool names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Generate system prompt section describing available tools
    pub fn generate_prompt_section(&self) -> String {
        let mut prompt = String::from("## Available Tools\n\n");
        prompt.push_str("You can use the following tools by responding with a JSON block:\n\n");
        prompt.push_str("```tool\n{\"tool\": \"tool_name\", \"arguments\": {\"arg\": \"value\"}}\n```\n\n");
        prompt.push_str("Every tool answers with a JSON object whose `status` is `success`, `error` or `partial_success`.\n\n");

        for schema in self.schemas() {
            prompt.push_str(&format!("### {}\n", schema.name));
            prompt.push_str(&format!("{}\n", schema.description));

            if !schema.parameters.is_empty() {
                prompt.push_str("**Parameters:**\n");
                for param in &schema.parameters {
                    let required = if param.required { " (required)" } else { "" };
                    prompt.push_str(&format!(
                        "- `{}` ({}){}: {}\n",
                        param.name, param.param_type, required, param.description
                    ));
                }
            }
            prompt.push('\n');
        }

        prompt
    }
}

// ============================================================================
// Built-in Tools
// ============================================================================

/// DateTime tool - returns current time
pub struct DateTimeTool;

#[async_trait]
impl Tool for DateTimeTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "datetime".into(),
            description: "Get the current date and time (UTC)".into(),
            parameters: vec![
                ParameterSchema::optional(
                    "format",
                    "string",
                    "Output format: 'iso', 'human', or 'unix'",
                    json!("human"),
                )
                .one_of(&["iso", "human", "unix"]),
            ],
            category: Some("time".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let format = call.text("format").to_lowercase();
        let now = chrono::Utc::now();

        let output = match format.as_str() {
            "iso" => now.to_rfc3339(),
            "unix" => now.timestamp().to_string(),
            _ => now.format("%A, %B %d, %Y at %H:%M:%S UTC").to_string(),
        };

        ToolResult::success("datetime", json!({ "now": output }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "echo".into(),
                description: "Echo the message".into(),
                parameters: vec![ParameterSchema::required("message", "string", "Text to echo")],
                category: None,
                has_side_effects: false,
            }
        }

        async fn execute(&self, call: &ToolCall) -> ToolResult {
            ToolResult::success("echo", json!({ "message": call.text("message") }))
        }
    }

    #[test]
    fn test_argument_helpers_normalize_loose_input() {
        let call = ToolCall::new("x")
            .arg("symbol", "  btc/usdt ")
            .arg("limit", "25")
            .arg("amount", 0.5)
            .arg("keywords", " btc, ,eth ")
            .arg("wrong", 42);

        assert_eq!(call.text("symbol"), "btc/usdt");
        assert_eq!(call.text("wrong"), "");
        assert_eq!(call.text("missing"), "");
        assert_eq!(call.int("limit"), Some(25));
        assert_eq!(call.int("amount"), None);
        assert_eq!(call.float("amount"), Some(0.5));
        assert_eq!(call.list("keywords"), vec!["btc", "eth"]);

        let arr = ToolCall::new("x").arg("keywords", json!(["  a ", "", "b"]));
        assert_eq!(arr.list("keywords"), vec!["a", "b"]);
    }

    #[test]
    fn test_envelope_shape() {
        let ok = ToolResult::success("t", json!({"a": 1})).with_metadata(json!({"m": true}));
        let env = ok.envelope();
        assert_eq!(env["status"], "success");
        assert_eq!(env["data"]["a"], 1);
        assert!(env.get("error_message").is_none());

        let err = ToolResult::failure("t", "boom").envelope();
        assert_eq!(err["status"], "error");
        assert_eq!(err["error_message"], "boom");
        assert!(err.get("data").is_none());

        let partial = ToolResult::partial("t", json!([]));
        assert_eq!(partial.envelope()["status"], "partial_success");
    }

    #[tokio::test]
    async fn test_registry_reports_errors_as_envelopes() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        registry.register(DateTimeTool);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["datetime", "echo"]);

        let unknown = registry.execute(&ToolCall::new("nope")).await;
        assert_eq!(unknown.status, ToolStatus::Error);
        assert!(unknown.error_message.unwrap().contains("nope"));

        let missing = registry.execute(&ToolCall::new("echo")).await;
        assert_eq!(missing.status, ToolStatus::Error);
        assert!(missing.error_message.unwrap().contains("message"));

        let mut call = ToolCall::new("echo").arg("message", " hi ");
        call.id = Some("call-1".into());
        let ok = registry.execute(&call).await;
        assert!(ok.is_success());
        assert_eq!(ok.id.as_deref(), Some("call-1"));
        assert_eq!(ok.data.unwrap()["message"], "hi");
    }

    #[tokio::test]
    async fn test_datetime_formats() {
        let unix = DateTimeTool.execute(&ToolCall::new("datetime").arg("format", "unix")).await;
        let value = unix.data.unwrap()["now"].as_str().unwrap().to_string();
        assert!(value.parse::<i64>().is_ok());

        let human = DateTimeTool.execute(&ToolCall::new("datetime")).await;
        assert!(human.data.unwrap()["now"].as_str().unwrap().ends_with("UTC"));
    }

    #[test]
    fn test_prompt_section_lists_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        let prompt = registry.generate_prompt_section();
        assert!(prompt.contains("### echo"));
        assert!(prompt.contains("`message` (string) (required)"));
    }
}
