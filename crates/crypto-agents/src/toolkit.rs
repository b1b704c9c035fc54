//! Shared plumbing for the market and trade tools: argument normalization
//! and envelope construction.

use std::ops::RangeInclusive;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value, json};

use agent_core::tool::ParameterSchema;
use agent_core::{ToolCall, ToolResult, timestamp};

use crate::error::{ExchangeError, Result};
use crate::exchange::de;
use crate::model::ExchangeId;

pub fn exchange_param() -> ParameterSchema {
    ParameterSchema::required("exchange_name", "string", "Exchange name: 'binance' or 'okx'").one_of(&["binance", "okx"])
}

pub fn spot_symbol_param() -> ParameterSchema {
    ParameterSchema::required("symbol", "string", "Trading pair in BASE/QUOTE form, e.g. 'BTC/USDT'")
}

pub fn swap_symbol_param() -> ParameterSchema {
    ParameterSchema::required(
        "symbol",
        "string",
        "Perpetual contract in BASE/QUOTE:SETTLE form, e.g. 'BTC/USDT:USDT'",
    )
}

/// Trimmed, non-empty string argument
pub fn required(call: &ToolCall, key: &str, label: &str) -> Result<String> {
    let value = call.text(key);
    if value.is_empty() {
        return Err(ExchangeError::InvalidRequest(format!("{label} cannot be empty")));
    }
    Ok(value)
}

/// `exchange_name`: trimmed, lowercased, one of the supported venues
pub fn exchange(call: &ToolCall) -> Result<ExchangeId> {
    required(call, "exchange_name", "exchange_name")?.parse()
}

/// `symbol` uppercased, e.g. `BTC/USDT`
pub fn symbol(call: &ToolCall) -> Result<String> {
    Ok(required(call, "symbol", "symbol (e.g. 'BTC/USDT')")?.to_uppercase())
}

/// Perpetual swap `symbol`, which must carry a settle currency
pub fn swap_symbol(call: &ToolCall) -> Result<String> {
    let symbol = required(call, "symbol", "contract symbol (e.g. 'BTC/USDT:USDT')")?.to_uppercase();
    if !symbol.contains(':') {
        return Err(ExchangeError::InvalidRequest(format!(
            "{symbol} is not a contract symbol; use BASE/QUOTE:SETTLE such as 'BTC/USDT:USDT'"
        )));
    }
    Ok(symbol)
}

/// Optional `symbol`; empty means "all symbols"
pub fn optional_symbol(call: &ToolCall) -> Option<String> {
    Some(call.text("symbol").to_uppercase()).filter(|s| !s.is_empty())
}

/// Integer argument within `range`
pub fn bounded(call: &ToolCall, key: &str, range: RangeInclusive<i64>) -> Result<usize> {
    call.int(key)
        .filter(|n| range.contains(n))
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| {
            ExchangeError::InvalidRequest(format!(
                "{key} must be an integer between {} and {}",
                range.start(),
                range.end()
            ))
        })
}

/// Decimal argument from a JSON number or numeric string
pub fn decimal(call: &ToolCall, key: &str) -> Option<Decimal> {
    call.arguments.get(key).and_then(de::parse_decimal)
}

/// Decimal argument that must be greater than zero
pub fn positive(call: &ToolCall, key: &str) -> Result<Decimal> {
    decimal(call, key)
        .filter(|v| *v > Decimal::ZERO)
        .ok_or_else(|| ExchangeError::InvalidRequest(format!("{key} must be a number greater than 0")))
}

/// Serialize model types into envelope data
pub fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// `metadata` object with `timestamp` plus the given context fields
pub fn metadata(context: &[(&str, Value)]) -> Value {
    let mut meta = Map::new();
    for (key, value) in context {
        if !value.is_null() {
            meta.insert((*key).to_string(), value.clone());
        }
    }
    meta.insert("timestamp".into(), json!(timestamp()));
    Value::Object(meta)
}

pub fn success(tool: &str, data: Value, context: &[(&str, Value)]) -> ToolResult {
    tracing::info!(tool, "Tool completed");
    ToolResult::success(tool, data).with_metadata(metadata(context))
}

pub fn failure(tool: &str, error: &ExchangeError, context: &[(&str, Value)]) -> ToolResult {
    tracing::warn!(tool, error = %error, "Tool failed");
    ToolResult::failure(tool, error.to_string()).with_metadata(metadata(context))
}

/// Wrap the outcome of a tool body in an envelope
pub fn respond(tool: &str, outcome: Result<Value>, context: &[(&str, Value)]) -> ToolResult {
    match outcome {
        Ok(data) => success(tool, data, context),
        Err(e) => failure(tool, &e, context),
    }
}

/// Decimal as a JSON number for summary statistics
pub fn number(value: Decimal) -> Value {
    value
        .normalize()
        .to_string()
        .parse::<serde_json::Number>()
        .map_or(Value::Null, Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_argument_normalization() {
        let call = ToolCall::new("t")
            .arg("exchange_name", "  OKX ")
            .arg("symbol", " eth/usdt ")
            .arg("limit", "20")
            .arg("amount", "0.25");

        assert_eq!(exchange(&call).unwrap(), ExchangeId::Okx);
        assert_eq!(symbol(&call).unwrap(), "ETH/USDT");
        assert_eq!(bounded(&call, "limit", 1..=100).unwrap(), 20);
        assert_eq!(positive(&call, "amount").unwrap(), dec!(0.25));
        assert!(swap_symbol(&call).is_err());
    }

    #[test]
    fn test_rejections() {
        let call = ToolCall::new("t").arg("exchange_name", " ").arg("limit", 0).arg("amount", -1);
        assert!(exchange(&call).unwrap_err().to_string().contains("cannot be empty"));
        assert!(bounded(&call, "limit", 1..=100).unwrap_err().to_string().contains("between 1 and 100"));
        assert!(positive(&call, "amount").is_err());
        assert_eq!(optional_symbol(&call), None);

        let kraken = ToolCall::new("t").arg("exchange_name", "kraken");
        assert!(exchange(&kraken).unwrap_err().to_string().contains("binance, okx"));
    }

    #[test]
    fn test_envelope_helpers() {
        let ok = respond("t", Ok(json!({"x": 1})), &[("exchange", json!("okx")), ("symbol", Value::Null)]);
        let envelope = ok.envelope();
        assert_eq!(envelope["status"], "success");
        assert_eq!(envelope["metadata"]["exchange"], "okx");
        assert!(envelope["metadata"].get("symbol").is_none());
        assert!(envelope["metadata"]["timestamp"].is_string());

        let err = respond("t", Err(ExchangeError::InvalidSymbol("X".into())), &[]);
        assert_eq!(err.envelope()["status"], "error");
        assert!(err.envelope()["error_message"].as_str().unwrap().contains("'X'"));

        assert_eq!(number(dec!(1.50)), json!(1.5));
    }
}
