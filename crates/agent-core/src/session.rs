//! Session Management
//!
//! An interactive session keeps one conversation alive across user turns so
//! follow-up questions reach the coordinator with their context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::message::{Conversation, Message, Role};
use crate::reasoning::Agent;

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A conversation bound to one agent over several turns
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,

    pub conversation: Conversation,

    pub created_at: DateTime<Utc>,

    /// Last activity timestamp
    pub updated_at: DateTime<Utc>,

    /// Completed user turns
    pub turns: usize,
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            conversation: Conversation::new(),
            created_at: now,
            updated_at: now,
            turns: 0,
        }
    }

    /// Send one user turn through `agent` and return its final answer.
    ///
    /// A failed turn leaves the user message in the history so the next turn
    /// still sees what was asked.
    pub async fn send(&mut self, agent: &Agent, input: &str) -> Result<String> {
        self.conversation.push(Message::user(input));
        self.updated_at = Utc::now();

        let answer = agent.run(&mut self.conversation).await?;
        self.turns += 1;
        self.updated_at = Utc::now();
        Ok(answer)
    }

    /// Preview of the first user message, or the short id
    pub fn title(&self) -> String {
        self.conversation
            .messages()
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| {
                let preview: String = m.content.chars().take(50).collect();
                if m.content.chars().count() > 50 {
                    format!("{}...", preview)
                } else {
                    preview
                }
            })
            .unwrap_or_else(|| format!("Session {}", self.id.as_str().chars().take(8).collect::<String>()))
    }

    /// Duration since creation
    pub fn duration(&self) -> chrono::Duration {
        self.updated_at - self.created_at
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::reasoning::AgentBuilder;
    use crate::testing::ScriptedProvider;

    #[test]
    fn test_session_creation() {
        let session = Session::new();
        assert_eq!(session.turns, 0);
        assert!(session.conversation.is_empty());
        assert!(session.title().starts_with("Session "));
    }

    #[tokio::test]
    async fn test_turns_share_history() {
        let provider = Arc::new(ScriptedProvider::new(["first answer", "second answer"]));
        let agent = AgentBuilder::new().provider(provider).build().unwrap();

        let mut session = Session::new();
        assert_eq!(session.send(&agent, "first question").await.unwrap(), "first answer");
        assert_eq!(session.send(&agent, "and then?").await.unwrap(), "second answer");

        assert_eq!(session.turns, 2);
        // system + (user, assistant) x 2
        assert_eq!(session.conversation.len(), 5);
        assert_eq!(session.title(), "first question");
    }

    #[tokio::test]
    async fn test_failed_turn_keeps_question() {
        let provider = Arc::new(ScriptedProvider::new(Vec::<String>::new()));
        let agent = AgentBuilder::new().provider(provider).build().unwrap();

        let mut session = Session::new();
        assert!(session.send(&agent, "anyone there?").await.is_err());
        assert_eq!(session.turns, 0);
        assert_eq!(session.conversation.last().unwrap().content, "anyone there?");
    }
}
