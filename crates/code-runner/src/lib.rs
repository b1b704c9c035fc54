//! # code-runner
//!
//! Python execution for the `code_execution_agent`. Snippets run in a
//! separate interpreter process inside a throwaway directory; the harness
//! reports captured output, a result value and any exception as JSON.

pub mod error;
pub mod sandbox;
pub mod tool;

pub use error::{Result, SandboxError};
pub use sandbox::{CodeFailure, Execution, FailureKind, PythonSandbox, SandboxConfig};
pub use tool::CodeExecutionTool;

pub const CODE_AGENT_NAME: &str = "code_execution_agent";

pub const CODE_AGENT_DESCRIPTION: &str = "Executes Python code for data analysis, web requests, \
crypto exchange scripting (ccxt) and general computation. pandas, numpy, requests and ccxt are \
preloaded when installed.";

/// System prompt for the code execution agent
pub const CODE_AGENT_PROMPT: &str = r#"You are a Python code execution assistant.

Run the code the user provides, or write code that answers their request, with the
`code_execution_python` tool. The runtime supports data analysis (pandas/numpy), HTTP
requests (requests), crypto exchange access (ccxt) and HTML parsing (bs4) when those
libraries are installed.

- A `main()` function is called automatically and its return value becomes `result`.
- Assigning to `result`, `output`, `return_value` or `main_result` also returns a value.
- Report stdout, the result value and any error type and message back to the user.
- On a SyntaxError or NameError, fix the code and try again once before giving up."#;
