//! # agent-core
//!
//! Host runtime for the multi-tool agent: provider-agnostic LLM abstraction,
//! the status-envelope tool system, a ReAct reasoning loop and agent-as-tool
//! delegation for the coordinator.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Coordinator Agent                         │
//! │  ┌─────────────┐  ┌──────────────────┐  ┌─────────────────┐  │
//! │  │  Reasoning  │  │  Tool Registry   │  │   LlmProvider   │  │
//! │  │    Loop     │──│  AgentTool x 6   │──│   (Strategy)    │  │
//! │  └─────────────┘  └────────┬─────────┘  └─────────────────┘  │
//! └────────────────────────────┼─────────────────────────────────┘
//!                              ▼
//!              specialist Agent ──► Tool ──► ToolResult envelope
//! ```

pub mod config;
pub mod delegate;
pub mod error;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod session;
pub mod tool;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::ProxySettings;
pub use delegate::AgentTool;
pub use error::{AgentError, Result};
pub use message::{Conversation, Message, Role};
pub use provider::LlmProvider;
pub use reasoning::{Agent, AgentBuilder};
pub use session::Session;
pub use tool::{ParameterSchema, Tool, ToolCall, ToolRegistry, ToolResult, ToolSchema, ToolStatus};

/// Current UTC time as RFC 3339, the `metadata.timestamp` format of every tool
pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
