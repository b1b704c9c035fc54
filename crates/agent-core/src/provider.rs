//! Chat-completion backends
//!
//! Agents talk to the model in plain chat turns. A tool call is a fenced
//! `tool` block inside the reply text and a tool result comes back as a
//! [`Role::Tool`](crate::message::Role::Tool) message, so a backend only has
//! to turn a message list into the next assistant reply. Backends without a
//! tool role may send those results as user turns.
//!
//! The coordinator and all six specialists share one provider instance.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::Message;

/// Sampling settings sent with every completion request of one agent
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model tag as the backend knows it (`llama3.2`, `qwen2.5:14b`)
    pub model: String,

    /// Kept low so tool-call JSON stays well formed
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Top-p nucleus sampling
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

fn default_temperature() -> f32 { 0.2 }
fn default_max_tokens() -> u32 { 2048 }
fn default_top_p() -> f32 { 0.9 }

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "llama3.2".into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
        }
    }
}

/// One assistant reply, possibly carrying a `tool` block
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,

    pub model: String,

    pub finish_reason: Option<FinishReason>,
}

impl Completion {
    /// Reply that ended normally
    pub fn stopped(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            finish_reason: Some(FinishReason::Stop),
        }
    }

    /// Cut off by `max_tokens`; a tool block in it may be incomplete
    pub fn is_truncated(&self) -> bool {
        self.finish_reason == Some(FinishReason::Length)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    Error,
}

/// A model the backend can serve, logged at startup
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
}

/// Chat backend shared by every agent
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(false)` when the backend is unreachable; the CLI only warns
    async fn health_check(&self) -> Result<bool>;

    /// Next assistant reply for the whole conversation so far
    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion>;

    async fn list_models(&self) -> Result<Vec<ModelInfo>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_options_defaults() {
        let opts = GenerationOptions::default();
        assert!((opts.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(opts.max_tokens, 2048);
        assert_eq!(opts.model, "llama3.2");
    }

    #[test]
    fn test_completion_finish_reasons() {
        let done = Completion::stopped("```tool\n{}\n```", "llama3.2");
        assert_eq!(done.finish_reason, Some(FinishReason::Stop));
        assert!(!done.is_truncated());

        let cut = Completion {
            finish_reason: Some(FinishReason::Length),
            ..done
        };
        assert!(cut.is_truncated());
        assert_eq!(serde_json::to_value(&cut.finish_reason).unwrap(), "length");
    }

    #[test]
    fn test_generation_options_partial_json() {
        let opts: GenerationOptions = serde_json::from_str(r#"{"model": "qwen2.5"}"#).unwrap();
        assert_eq!(opts.model, "qwen2.5");
        assert_eq!(opts.max_tokens, 2048);
    }
}
