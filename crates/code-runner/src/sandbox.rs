//! Python Sandbox
//!
//! Each execution gets its own temporary directory holding the snippet and
//! the harness script. The interpreter runs as a child process with piped
//! output, a wall-clock timeout and `kill_on_drop`, so an expired run is
//! killed when its future is dropped.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use agent_core::config::lookup_or;
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;

use crate::error::{Result, SandboxError};

const HARNESS: &str = include_str!("harness.py");
const REPORT_SENTINEL: &str = "__SANDBOX_REPORT__";

/// Sandbox configuration
#[derive(Clone, Debug)]
pub struct SandboxConfig {
    /// Interpreter binary
    pub python_bin: PathBuf,

    /// Wall-clock limit per execution
    pub timeout: Duration,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            python_bin: PathBuf::from("python3"),
            timeout: Duration::from_secs(60),
        }
    }
}

impl SandboxConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let python_bin = lookup("PYTHON_BIN")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map_or(defaults.python_bin, PathBuf::from);
        let secs = lookup_or(&lookup, "CODE_EXEC_TIMEOUT_SECS", defaults.timeout.as_secs()).max(1);

        Self {
            python_bin,
            timeout: Duration::from_secs(secs),
        }
    }
}

/// Python-side failure category
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    SyntaxError,
    NameError,
    ImportError,
    RuntimeError,
}

impl FailureKind {
    fn from_python(type_name: &str) -> Self {
        match type_name {
            "SyntaxError" | "IndentationError" | "TabError" => Self::SyntaxError,
            "NameError" | "UnboundLocalError" => Self::NameError,
            "ImportError" | "ModuleNotFoundError" => Self::ImportError,
            _ => Self::RuntimeError,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SyntaxError => "SyntaxError",
            Self::NameError => "NameError",
            Self::ImportError => "ImportError",
            Self::RuntimeError => "RuntimeError",
        }
    }
}

/// An exception raised by the snippet itself
#[derive(Clone, Debug)]
pub struct CodeFailure {
    pub kind: FailureKind,
    /// Original Python exception class name
    pub python_type: String,
    pub message: String,
    pub line: Option<u64>,
}

impl CodeFailure {
    pub fn describe(&self) -> String {
        match (self.kind, self.line) {
            (FailureKind::SyntaxError, Some(line)) => format!("Syntax error: {} (line {})", self.message, line),
            (FailureKind::SyntaxError, None) => format!("Syntax error: {}", self.message),
            (FailureKind::NameError, _) => format!("Name error: {}", self.message),
            (FailureKind::ImportError, _) => format!("Import error: {}", self.message),
            (FailureKind::RuntimeError, _) => format!("{}: {}", self.python_type, self.message),
        }
    }
}

/// Outcome of one run
#[derive(Clone, Debug)]
pub struct Execution {
    pub stdout: String,
    pub stderr: String,
    pub result: Value,
    pub failure: Option<CodeFailure>,
    pub duration: Duration,
}

#[derive(Deserialize)]
struct Report {
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
    #[serde(default)]
    result: Value,
    error_type: Option<String>,
    error_message: Option<String>,
    lineno: Option<u64>,
}

/// Subprocess-backed Python executor
#[derive(Clone, Debug, Default)]
pub struct PythonSandbox {
    config: SandboxConfig,
}

impl PythonSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Check whether the configured interpreter can be started
    pub async fn interpreter_available(&self) -> bool {
        match Command::new(&self.config.python_bin).arg("--version").output().await {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }

    /// Run a snippet. Exceptions raised by the snippet are reported in
    /// `Execution::failure`; `Err` means the sandbox itself failed.
    pub async fn run(&self, code: &str) -> Result<Execution> {
        let workdir = tempfile::tempdir()?;
        let snippet = workdir.path().join("snippet.py");
        let harness = workdir.path().join("harness.py");
        tokio::fs::write(&snippet, code).await?;
        tokio::fs::write(&harness, HARNESS).await?;

        let started = Instant::now();
        let child = Command::new(&self.config.python_bin)
            .arg(&harness)
            .arg(&snippet)
            .current_dir(workdir.path())
            .env("PYTHONIOENCODING", "utf-8")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(self.config.timeout, child.wait_with_output())
            .await
            .map_err(|_| SandboxError::Timeout(self.config.timeout.as_secs()))??;
        let duration = started.elapsed();

        let stdout = String::from_utf8_lossy(&output.stdout);
        let report = parse_report(&stdout).ok_or_else(|| {
            let stderr = String::from_utf8_lossy(&output.stderr);
            SandboxError::Harness(format!("exit status {}: {}", output.status, stderr.trim()))
        })??;

        tracing::debug!(
            duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            failed = report.error_type.is_some(),
            "Sandbox run finished"
        );

        Ok(into_execution(report, duration))
    }
}

/// Find the report line the harness prints last
fn parse_report(stdout: &str) -> Option<std::result::Result<Report, serde_json::Error>> {
    stdout
        .lines()
        .rev()
        .find_map(|line| line.strip_prefix(REPORT_SENTINEL))
        .map(serde_json::from_str::<Report>)
}

fn into_execution(report: Report, duration: Duration) -> Execution {
    let failure = report.error_type.map(|python_type| CodeFailure {
        kind: FailureKind::from_python(&python_type),
        message: report.error_message.unwrap_or_default(),
        line: report.lineno,
        python_type,
    });

    Execution {
        stdout: report.stdout,
        stderr: report.stderr,
        result: report.result,
        failure,
        duration,
    }
}
