//! Test doubles shared across the workspace.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::provider::{Completion, GenerationOptions, LlmProvider, ModelInfo};

/// Provider that replays canned completions in order.
///
/// Each call records the last user/tool message it saw so tests can assert
/// on what an agent forwarded.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
    seen: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            seen: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Last non-assistant message content of every call, in order
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn complete(&self, messages: &[Message], options: &GenerationOptions) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(last) = messages.last() {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(last.content.clone());
            }
        }

        let next = self
            .replies
            .lock()
            .map_err(|_| AgentError::Provider("script poisoned".into()))?
            .pop_front()
            .ok_or_else(|| AgentError::Provider("script exhausted".into()))?;

        Ok(Completion::stopped(next, options.model.clone()))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(vec![ModelInfo { id: "scripted".into(), name: "scripted".into() }])
    }
}
