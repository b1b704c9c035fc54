//! Envelope construction shared by the web tools.

use serde_json::{Map, Value, json};

use agent_core::{ToolResult, timestamp};

use crate::error::{Result, WebError};

/// Tool body output: `data` plus metadata fields that depend on it
pub type Reply = (Value, Map<String, Value>);

pub fn metadata(context: &[(&str, Value)], extra: Map<String, Value>) -> Value {
    let mut meta: Map<String, Value> = context
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect();
    meta.extend(extra);
    meta.insert("timestamp".into(), json!(timestamp()));
    Value::Object(meta)
}

pub fn respond(tool: &str, outcome: Result<Reply>, context: &[(&str, Value)]) -> ToolResult {
    match outcome {
        Ok((data, extra)) => {
            tracing::info!(tool, "Tool completed");
            ToolResult::success(tool, data).with_metadata(metadata(context, extra))
        }
        Err(e) => failure(tool, &e, context),
    }
}

pub fn failure(tool: &str, error: &WebError, context: &[(&str, Value)]) -> ToolResult {
    tracing::warn!(tool, error = %error, "Tool failed");
    ToolResult::failure(tool, error.to_string()).with_metadata(metadata(context, Map::new()))
}

/// Metadata fields from `(key, value)` pairs
pub fn fields<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_and_extra_merge() {
        let result = respond(
            "t",
            Ok((json!({"a": 1}), fields([("count", json!(3))]))),
            &[("query", json!("btc")), ("skipped", Value::Null)],
        )
        .envelope();

        assert_eq!(result["status"], "success");
        assert_eq!(result["metadata"]["query"], "btc");
        assert_eq!(result["metadata"]["count"], 3);
        assert!(result["metadata"].get("skipped").is_none());
        assert!(result["metadata"]["timestamp"].is_string());
    }

    #[test]
    fn test_failure_keeps_context() {
        let result = respond("t", Err(WebError::invalid("query cannot be empty")), &[("query", json!(""))]);
        assert!(!result.is_success());
        assert_eq!(result.error_message.as_deref(), Some("query cannot be empty"));
        assert_eq!(result.metadata.unwrap()["query"], "");
    }
}
