//! Lenient decoding of exchange payloads
//!
//! Venues send numbers as JSON strings, sometimes empty ones. Everything
//! here treats `""` and unparsable values as absent.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{ExchangeError, Result};
use crate::model::{Candle, Level};

pub fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => decimal_from_str(s),
        Value::Number(n) => decimal_from_str(&n.to_string()),
        _ => None,
    }
}

pub fn decimal_from_str(s: &str) -> Option<Decimal> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<Decimal>().ok().or_else(|| Decimal::from_scientific(s).ok())
}

pub fn parse_millis(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

/// `[[price, amount, ...], ...]` rows, malformed rows skipped
pub fn levels(rows: &[Vec<Value>]) -> Vec<Level> {
    rows.iter()
        .filter_map(|row| Some((parse_decimal(row.first()?)?, parse_decimal(row.get(1)?)?)))
        .collect()
}

/// `[[ts, open, high, low, close, volume, ...], ...]` rows (Binance klines
/// and OKX candles share the layout)
pub fn candle_rows(rows: &[Vec<Value>]) -> Result<Vec<Candle>> {
    rows.iter()
        .map(|row| {
            let field = |i: usize| {
                row.get(i)
                    .and_then(parse_decimal)
                    .ok_or_else(|| ExchangeError::decode(format!("malformed candle row: {row:?}")))
            };
            Ok(Candle {
                timestamp: row
                    .first()
                    .and_then(parse_millis)
                    .ok_or_else(|| ExchangeError::decode("candle without timestamp"))?,
                open: field(1)?,
                high: field(2)?,
                low: field(3)?,
                close: field(4)?,
                volume: field(5)?,
            })
        })
        .collect()
}

pub fn decimal<'de, D>(deserializer: D) -> std::result::Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(parse_decimal))
}

pub fn decimal_or_zero<'de, D>(deserializer: D) -> std::result::Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    decimal(deserializer).map(Option::unwrap_or_default)
}

pub fn millis<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(parse_millis))
}

/// Identifiers sent as either numbers or strings
pub fn id_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Row {
        #[serde(default, deserialize_with = "decimal")]
        px: Option<Decimal>,
        #[serde(default, deserialize_with = "decimal_or_zero")]
        sz: Decimal,
        #[serde(default, deserialize_with = "millis")]
        ts: Option<i64>,
        #[serde(default, deserialize_with = "id_string")]
        id: String,
    }

    #[test]
    fn test_lenient_values() {
        let row: Row = serde_json::from_value(json!({"px": "", "sz": "1.5", "ts": "1700000000000", "id": 42})).unwrap();
        assert_eq!(row.px, None);
        assert_eq!(row.sz, dec!(1.5));
        assert_eq!(row.ts, Some(1_700_000_000_000));
        assert_eq!(row.id, "42");

        let row: Row = serde_json::from_value(json!({"px": 0.25, "sz": null})).unwrap();
        assert_eq!(row.px, Some(dec!(0.25)));
        assert_eq!(row.sz, Decimal::ZERO);
        assert_eq!(decimal_from_str("1e-5"), Some(dec!(0.00001)));
    }

    #[test]
    fn test_rows() {
        let book: Vec<Vec<Value>> = serde_json::from_value(json!([["100.5", "2", "0", "1"], ["bad"], ["100.4", "1.25"]])).unwrap();
        assert_eq!(levels(&book), vec![(dec!(100.5), dec!(2)), (dec!(100.4), dec!(1.25))]);

        let candles: Vec<Vec<Value>> =
            serde_json::from_value(json!([[1_700_000_000_000_i64, "1", "3", "0.5", "2", "10", 1_700_000_059_999_i64]])).unwrap();
        let parsed = candle_rows(&candles).unwrap();
        assert_eq!(parsed[0].high, dec!(3));
        assert_eq!(parsed[0].volume, dec!(10));

        let broken: Vec<Vec<Value>> = serde_json::from_value(json!([["1700000000000", "1"]])).unwrap();
        assert!(candle_rows(&broken).is_err());
    }
}
