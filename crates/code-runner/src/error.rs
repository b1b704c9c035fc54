//! Error Types for the Python sandbox

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SandboxError>;

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Failed to prepare or start the interpreter: {0}")]
    Io(#[from] std::io::Error),

    #[error("Execution timed out after {0} seconds")]
    Timeout(u64),

    #[error("Interpreter exited without a report: {0}")]
    Harness(String),

    #[error("Malformed sandbox report: {0}")]
    Report(#[from] serde_json::Error),
}

impl SandboxError {
    /// Value for `metadata.error_type`
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "Timeout",
            _ => "SandboxError",
        }
    }
}
