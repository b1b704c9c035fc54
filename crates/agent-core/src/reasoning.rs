//! Reasoning Loop
//!
//! Implements the ReAct (Reason + Act) pattern for agent behavior.
//! The agent observes, thinks, acts (via tools), and responds.

use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::message::{Conversation, Message, Role};
use crate::provider::{GenerationOptions, LlmProvider};
use crate::tool::{Tool, ToolCall, ToolRegistry, ToolResult};

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Agent identifier, also the tool name when delegated to
    pub name: String,

    /// One-paragraph summary used by a coordinator for routing
    pub description: String,

    /// System prompt template
    pub system_prompt: String,

    /// Maximum reasoning iterations before giving up
    pub max_iterations: usize,

    /// Generation options
    pub generation: GenerationOptions,

    /// Whether to append tool descriptions to system prompt
    pub inject_tool_descriptions: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "assistant".into(),
            description: "General purpose assistant".into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_iterations: 10,
            generation: GenerationOptions::default(),
            inject_tool_descriptions: true,
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a helpful AI assistant.

When you need to use a tool, respond with a JSON block in this exact format:
```tool
{"tool": "tool_name", "arguments": {"arg1": "value1"}}
```

After receiving tool results, synthesize them into a helpful response.
If you can answer directly without tools, do so.
Be concise and accurate."#;

/// Appended to custom prompts so every agent knows the call format
const TOOL_CALL_PROTOCOL: &str = r#"## Tool Call Format

To call a tool, reply with exactly one block and nothing else:
```tool
{"tool": "tool_name", "arguments": {"arg1": "value1"}}
```
Wait for the tool result before continuing. Always check the `status` field of a result."#;

/// The main Agent struct
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    /// Create with default configuration
    pub fn with_defaults(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self::new(provider, tools, AgentConfig::default())
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn description(&self) -> &str {
        &self.config.description
    }

    /// Build the full system prompt including tool descriptions
    pub fn build_system_prompt(&self) -> String {
        let mut prompt = self.config.system_prompt.clone();

        if self.config.inject_tool_descriptions && !self.tools.is_empty() {
            if !prompt.contains("```tool") {
                prompt.push_str("\n\n");
                prompt.push_str(TOOL_CALL_PROTOCOL);
            }
            prompt.push_str("\n\n");
            prompt.push_str(&self.tools.generate_prompt_section());
        }

        prompt
    }

    /// Run the agent on a conversation whose last message is the user turn
    pub async fn run(&self, conversation: &mut Conversation) -> Result<String> {
        // Ensure system prompt is set
        if conversation.messages().first().map(|m| &m.role) != Some(&Role::System) {
            let messages = conversation.messages_mut();
            messages.insert(0, Message::system(self.build_system_prompt()));
        }

        let mut iterations = 0;

        loop {
            iterations += 1;

            if iterations > self.config.max_iterations {
                tracing::warn!(agent = %self.config.name, max = self.config.max_iterations, "Reasoning loop exhausted");
                return Err(AgentError::MaxIterations(self.config.max_iterations));
            }

            conversation.truncate_to_fit();

            let completion = self.provider
                .complete(conversation.messages(), &self.config.generation)
                .await?;

            if completion.is_truncated() {
                tracing::warn!(agent = %self.config.name, "Reply hit the token limit");
            }
            let content = completion.content;

            conversation.push(Message::assistant(&content));

            if let Some(tool_call) = parse_tool_call(&content) {
                tracing::info!(agent = %self.config.name, tool = %tool_call.name, "Executing tool");

                let result = self.tools.execute(&tool_call).await;
                if !result.is_success() {
                    tracing::debug!(
                        agent = %self.config.name,
                        tool = %tool_call.name,
                        status = result.status.as_str(),
                        "Tool did not fully succeed"
                    );
                }

                conversation.push(Message::tool(format_tool_result(&result), tool_call.id.clone()));
                continue;
            }

            // No tool call - this is the final response
            return Ok(content);
        }
    }

    /// Run with a simple string input (creates temporary conversation)
    pub async fn ask(&self, question: &str) -> Result<String> {
        let mut conversation = Conversation::with_system_prompt(self.build_system_prompt());
        conversation.push(Message::user(question));
        self.run(&mut conversation).await
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// Parse a tool call from LLM response
pub fn parse_tool_call(content: &str) -> Option<ToolCall> {
    // Look for ```tool ... ``` blocks
    let tool_start = "```tool";
    let tool_end = "```";

    if let Some(start_idx) = content.find(tool_start) {
        let after_marker = &content[start_idx + tool_start.len()..];
        if let Some(end_idx) = after_marker.find(tool_end) {
            let json_str = after_marker[..end_idx].trim();

            if let Ok(call) = serde_json::from_str::<ToolCall>(json_str) {
                return Some(with_call_id(call));
            }
        }
    }

    parse_inline_tool_call(content).map(with_call_id)
}

/// Try to parse inline JSON with a "tool" field
fn parse_inline_tool_call(content: &str) -> Option<ToolCall> {
    if !content.contains(r#""tool""#) {
        return None;
    }

    let start = content.find('{')?;
    let end = content.rfind('}')?;

    if end <= start {
        return None;
    }

    serde_json::from_str::<ToolCall>(&content[start..=end])
        .ok()
        .filter(|call| !call.name.is_empty())
}

fn with_call_id(mut call: ToolCall) -> ToolCall {
    if call.id.is_none() {
        call.id = Some(uuid::Uuid::new_v4().to_string());
    }
    call
}

/// Format tool result for conversation
fn format_tool_result(result: &ToolResult) -> String {
    let verb = if result.is_success() { "returned" } else { "failed" };
    format!("[Tool '{}' {}]\n{}", result.name, verb, result.envelope())
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: ToolRegistry,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: ToolRegistry::new(),
            config: AgentConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.config.description = description.into();
        self
    }

    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn shared_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.register_shared(tool);
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.generation.temperature = temp;
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self.provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;

        if self.config.name.trim().is_empty() {
            return Err(AgentError::Config("Agent name must not be empty".into()));
        }

        Ok(Agent::new(provider, Arc::new(self.tools), self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;
    use crate::tool::DateTimeTool;

    #[test]
    fn test_parse_tool_call_block() {
        let content = r#"Let me check that for you.
```tool
{"tool": "datetime", "arguments": {"format": "iso"}}
```"#;

        let call = parse_tool_call(content).unwrap();
        assert_eq!(call.name, "datetime");
        assert_eq!(call.text("format"), "iso");
        assert!(call.id.is_some());
    }

    #[test]
    fn test_parse_inline_tool_call() {
        let call = parse_tool_call(r#"Sure: {"tool": "get_ticker_data", "arguments": {"symbol": "BTC/USDT"}}"#).unwrap();
        assert_eq!(call.name, "get_ticker_data");
        assert!(parse_tool_call("The price is {unknown}").is_none());
        assert!(parse_tool_call("plain answer").is_none());
    }

    #[tokio::test]
    async fn test_run_executes_tool_then_answers() {
        let provider = Arc::new(ScriptedProvider::new([
            "```tool\n{\"tool\": \"datetime\", \"arguments\": {\"format\": \"unix\"}}\n```",
            "It is late.",
        ]));

        let agent = AgentBuilder::new()
            .provider(provider.clone())
            .name("clock")
            .tool(DateTimeTool)
            .build()
            .unwrap();

        let mut conversation = Conversation::new();
        conversation.push(Message::user("what time is it?"));
        let answer = agent.run(&mut conversation).await.unwrap();

        assert_eq!(answer, "It is late.");
        let tool_msg = conversation
            .messages()
            .iter()
            .find(|m| m.role == Role::Tool)
            .unwrap();
        assert!(tool_msg.content.starts_with("[Tool 'datetime' returned]"));
        assert!(tool_msg.content.contains("\"status\":\"success\""));
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_fed_back_not_fatal() {
        let provider = Arc::new(ScriptedProvider::new([
            "```tool\n{\"tool\": \"teleport\", \"arguments\": {}}\n```",
            "I cannot do that.",
        ]));
        let agent = AgentBuilder::new().provider(provider).build().unwrap();

        let mut conversation = Conversation::new();
        conversation.push(Message::user("beam me up"));
        let answer = agent.run(&mut conversation).await.unwrap();
        assert_eq!(answer, "I cannot do that.");
        assert!(conversation.messages().iter().any(|m| m.content.starts_with("[Tool 'teleport' failed]")));
    }

    #[tokio::test]
    async fn test_max_iterations() {
        let looping = "```tool\n{\"tool\": \"datetime\", \"arguments\": {}}\n```";
        let provider = Arc::new(ScriptedProvider::new([looping, looping, looping]));
        let agent = AgentBuilder::new()
            .provider(provider)
            .tool(DateTimeTool)
            .max_iterations(2)
            .build()
            .unwrap();

        let err = agent.ask("loop forever").await.unwrap_err();
        assert!(matches!(err, AgentError::MaxIterations(2)));
    }

    #[test]
    fn test_builder_requires_provider() {
        assert!(matches!(AgentBuilder::new().build(), Err(AgentError::Config(_))));
    }

    #[test]
    fn test_custom_prompt_gets_call_protocol() {
        let agent = AgentBuilder::new()
            .provider(Arc::new(ScriptedProvider::new(["ok"])))
            .system_prompt("You route requests.")
            .tool(DateTimeTool)
            .build()
            .unwrap();

        let prompt = agent.build_system_prompt();
        assert!(prompt.starts_with("You route requests."));
        assert!(prompt.contains("## Tool Call Format"));
        assert!(prompt.contains("### datetime"));
    }
}
