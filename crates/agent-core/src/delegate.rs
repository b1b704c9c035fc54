//! Agent Delegation
//!
//! Exposes a specialist [`Agent`] as a [`Tool`] so a coordinator agent can
//! route work to it. Routing itself is decided by the coordinator's LLM from
//! its instruction text; this module only forwards the request and wraps the
//! specialist's answer in an envelope.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::reasoning::Agent;
use crate::tool::{ParameterSchema, Tool, ToolCall, ToolResult, ToolSchema};

/// A sub-agent callable as a tool named after the agent
pub struct AgentTool {
    agent: Arc<Agent>,
}

impl AgentTool {
    pub fn new(agent: Arc<Agent>) -> Self {
        Self { agent }
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.agent.name().to_string(),
            description: self.agent.description().to_string(),
            parameters: vec![ParameterSchema::required(
                "request",
                "string",
                "The complete task for this agent, including every detail it needs (symbols, exchanges, URLs, code)",
            )],
            category: Some("agent".into()),
            has_side_effects: true,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let name = self.agent.name();
        let request = call.text("request");

        if request.is_empty() {
            return ToolResult::failure(name, "request must be a non-empty string");
        }

        tracing::info!(agent = %name, "Delegating request");
        let started = std::time::Instant::now();

        match self.agent.ask(&request).await {
            Ok(response) => ToolResult::success(name, json!({ "agent": name, "response": response }))
                .with_metadata(json!({
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                    "elapsed_ms": u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                })),
            Err(e) => {
                tracing::warn!(agent = %name, error = %e, "Delegated agent failed");
                ToolResult::failure(name, format!("{name} could not complete the request: {e}"))
            }
        }
    }
}
