//! Interactive read loop

use agent_core::{Agent, Session};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

pub const PROMPT: &str = "User -> ";

const EXIT_COMMANDS: [&str; 3] = ["quit", "exit", "q"];

/// What to do with one line of input
#[derive(Debug, PartialEq, Eq)]
pub enum Input<'a> {
    Skip,
    Exit,
    Message(&'a str),
}

pub fn is_exit_command(line: &str) -> bool {
    let line = line.trim();
    EXIT_COMMANDS.iter().any(|cmd| line.eq_ignore_ascii_case(cmd))
}

pub fn classify(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        Input::Skip
    } else if is_exit_command(trimmed) {
        Input::Exit
    } else {
        Input::Message(trimmed)
    }
}

/// Send one message through the session, printing the answer or the error
pub async fn respond(session: &mut Session, agent: &Agent, message: &str) -> Option<String> {
    match session.send(agent, message).await {
        Ok(answer) => Some(answer),
        Err(e) => {
            tracing::warn!(error = %e, turn = session.turns + 1, "Turn failed");
            eprintln!("\nError: {}\n", e.user_message());
            None
        }
    }
}

pub async fn run(agent: &Agent) -> anyhow::Result<()> {
    let mut rl = DefaultEditor::new()?;
    let mut session = Session::new();

    println!("Multi-tool agent ({})", agent.name());
    println!("Type your question and press Enter. `quit`, `exit`, `q` or Ctrl+C to leave.\n");

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                let message = match classify(&line) {
                    Input::Skip => continue,
                    Input::Exit => break,
                    Input::Message(message) => message,
                };
                rl.add_history_entry(message)?;

                if let Some(answer) = respond(&mut session, agent, message).await {
                    println!("\n{answer}\n");
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Error: {err}");
                break;
            }
        }
    }

    tracing::info!(session = %session.id, turns = session.turns, "Session ended");
    println!("Goodbye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use agent_core::AgentBuilder;
    use agent_core::testing::ScriptedProvider;

    #[test]
    fn test_exit_commands() {
        for line in ["quit", "EXIT", " q ", "Quit\n"] {
            assert!(is_exit_command(line), "{line:?}");
        }
        assert!(!is_exit_command("quite"));
        assert!(!is_exit_command("q?"));
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("   "), Input::Skip);
        assert_eq!(classify(""), Input::Skip);
        assert_eq!(classify(" exit "), Input::Exit);
        assert_eq!(classify("  BTC price?  "), Input::Message("BTC price?"));
    }

    #[tokio::test]
    async fn test_session_keeps_history_across_turns() {
        let provider = Arc::new(ScriptedProvider::new(["Hello!", "You said hi."]));
        let agent = AgentBuilder::new().provider(provider.clone()).build().unwrap();
        let mut session = Session::new();

        assert_eq!(respond(&mut session, &agent, "hi").await.as_deref(), Some("Hello!"));
        assert_eq!(
            respond(&mut session, &agent, "what did I say?").await.as_deref(),
            Some("You said hi.")
        );
        assert_eq!(session.turns, 2);
        assert!(session.conversation.messages().iter().any(|m| m.content == "hi"));
    }

    #[tokio::test]
    async fn test_failed_turn_continues() {
        let provider = Arc::new(ScriptedProvider::new(Vec::<String>::new()));
        let agent = AgentBuilder::new().provider(provider).build().unwrap();
        let mut session = Session::new();

        assert!(respond(&mut session, &agent, "hello").await.is_none());
        assert_eq!(session.turns, 0);
    }
}
