//! Candles and perpetual swap statistics (funding, open interest).

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{Value, json};

use agent_core::tool::ParameterSchema;
use agent_core::{Tool, ToolCall, ToolResult, ToolSchema};

use crate::error::{ExchangeError, Result};
use crate::exchange::ExchangeProvider;
use crate::model::{Candle, FundingRate, OpenInterest, iso8601};
use crate::toolkit;

use super::quotes::context;

/// Points requested from candle and open interest history
const HISTORY_POINTS: usize = 100;

fn timeframe(call: &ToolCall) -> Result<String> {
    Ok(toolkit::required(call, "timeframe", "timeframe (e.g. '1h', '4h', '1d')")?.to_lowercase())
}

fn context_with_timeframe(call: &ToolCall) -> Vec<(&'static str, Value)> {
    let mut context = context(call);
    context.push(("timeframe", json!(call.text("timeframe").to_lowercase())));
    context
}

fn percent_change(from: Decimal, to: Decimal) -> Decimal {
    if from.is_zero() {
        Decimal::ZERO
    } else {
        ((to - from) / from * Decimal::ONE_HUNDRED).round_dp(4)
    }
}

fn mean(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    (values.iter().sum::<Decimal>() / Decimal::from(values.len())).round_dp(8)
}

/// OHLCV candles with a period summary
pub struct KlineTool {
    exchanges: Arc<dyn ExchangeProvider>,
}

impl KlineTool {
    pub const NAME: &'static str = "get_kline_data";

    pub fn new(exchanges: Arc<dyn ExchangeProvider>) -> Self {
        Self { exchanges }
    }

    async fn run(&self, call: &ToolCall) -> Result<Value> {
        let symbol = toolkit::symbol(call)?;
        let timeframe = timeframe(call)?;
        let exchange = toolkit::exchange(call)?;
        tracing::info!(tool = Self::NAME, %symbol, %timeframe, %exchange, "Fetching candles");

        let candles = self
            .exchanges
            .public(exchange)?
            .candles(&symbol, &timeframe, HISTORY_POINTS)
            .await?;
        kline_data(&symbol, &candles)
    }
}

fn kline_data(symbol: &str, candles: &[Candle]) -> Result<Value> {
    let (Some(first), Some(last)) = (candles.first(), candles.last()) else {
        return Err(ExchangeError::InvalidRequest(format!("No candle data returned for {symbol}")));
    };

    let rows: Vec<Value> = candles
        .iter()
        .map(|c| {
            json!({
                "timestamp": c.timestamp,
                "datetime": iso8601(c.timestamp),
                "open": c.open,
                "high": c.high,
                "low": c.low,
                "close": c.close,
                "volume": c.volume,
            })
        })
        .collect();

    let highest = candles.iter().map(|c| c.high).max().unwrap_or_default();
    let lowest = candles.iter().map(|c| c.low).min().unwrap_or_default();

    Ok(json!({
        "klines": rows,
        "count": candles.len(),
        "summary": {
            "latest_price": toolkit::number(last.close),
            "price_change": toolkit::number(last.close - first.open),
            "price_change_percentage": toolkit::number(percent_change(first.open, last.close)),
            "highest_price": toolkit::number(highest),
            "lowest_price": toolkit::number(lowest),
            "total_volume": toolkit::number(candles.iter().map(|c| c.volume).sum()),
            "period_start": iso8601(first.timestamp),
            "period_end": iso8601(last.timestamp),
        }
    }))
}

#[async_trait]
impl Tool for KlineTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.into(),
            description: "Get the last 100 OHLCV candles of a trading pair with price change, range \
                          and volume over the period."
                .into(),
            parameters: vec![
                toolkit::spot_symbol_param(),
                ParameterSchema::required("timeframe", "string", "Candle interval such as '1m', '15m', '1h', '4h', '1d'"),
                toolkit::exchange_param(),
            ],
            category: Some("market_data".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let outcome = self.run(call).await;
        toolkit::respond(Self::NAME, outcome, &context_with_timeframe(call))
    }
}

/// Funding rate history of a perpetual swap
pub struct FundingRateTool {
    exchanges: Arc<dyn ExchangeProvider>,
}

impl FundingRateTool {
    pub const NAME: &'static str = "get_funding_rate";

    pub fn new(exchanges: Arc<dyn ExchangeProvider>) -> Self {
        Self { exchanges }
    }

    async fn run(&self, call: &ToolCall) -> Result<Value> {
        let symbol = toolkit::swap_symbol(call)?;
        let exchange = toolkit::exchange(call)?;
        let limit = toolkit::bounded(call, "limit", 1..=100)?;
        tracing::info!(tool = Self::NAME, %symbol, %exchange, limit, "Fetching funding history");

        let rates = self
            .exchanges
            .public(exchange)?
            .funding_rate_history(&symbol, limit)
            .await?;
        Ok(funding_data(&rates))
    }
}

fn funding_data(rates: &[FundingRate]) -> Value {
    let rows: Vec<Value> = rates
        .iter()
        .map(|r| {
            json!({
                "timestamp": r.timestamp,
                "datetime": iso8601(r.timestamp),
                "rate": r.rate,
                "rate_percentage": toolkit::number(r.rate * Decimal::ONE_HUNDRED),
            })
        })
        .collect();

    let values: Vec<Decimal> = rates.iter().map(|r| r.rate).collect();
    let summary = values.last().map(|current| {
        json!({
            "current_rate": toolkit::number(*current),
            "current_rate_percentage": toolkit::number(current * Decimal::ONE_HUNDRED),
            "average_rate": toolkit::number(mean(&values)),
            "max_rate": values.iter().max().copied().map(toolkit::number),
            "min_rate": values.iter().min().copied().map(toolkit::number),
            "positive_count": values.iter().filter(|r| r.is_sign_positive() && !r.is_zero()).count(),
            "negative_count": values.iter().filter(|r| r.is_sign_negative() && !r.is_zero()).count(),
            "zero_count": values.iter().filter(|r| r.is_zero()).count(),
        })
    });

    json!({
        "funding_rates": rows,
        "count": rates.len(),
        "summary": summary.unwrap_or_else(|| json!({})),
    })
}

#[async_trait]
impl Tool for FundingRateTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.into(),
            description: "Get the funding rate history of a perpetual contract with current, average \
                          and extreme rates."
                .into(),
            parameters: vec![
                toolkit::swap_symbol_param(),
                toolkit::exchange_param(),
                ParameterSchema::required("limit", "integer", "Number of funding periods, 1-100"),
            ],
            category: Some("market_data".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let outcome = self.run(call).await;
        toolkit::respond(Self::NAME, outcome, &context(call))
    }
}

/// Open interest history of a perpetual swap
pub struct OpenInterestTool {
    exchanges: Arc<dyn ExchangeProvider>,
}

impl OpenInterestTool {
    pub const NAME: &'static str = "get_open_interest_data";

    pub fn new(exchanges: Arc<dyn ExchangeProvider>) -> Self {
        Self { exchanges }
    }

    async fn run(&self, call: &ToolCall) -> Result<Value> {
        let symbol = toolkit::swap_symbol(call)?;
        let exchange = toolkit::exchange(call)?;
        let timeframe = timeframe(call)?;
        tracing::info!(tool = Self::NAME, %symbol, %timeframe, %exchange, "Fetching open interest");

        let history = self
            .exchanges
            .public(exchange)?
            .open_interest_history(&symbol, &timeframe, HISTORY_POINTS)
            .await?;
        Ok(open_interest_data(&history))
    }
}

fn open_interest_data(history: &[OpenInterest]) -> Value {
    let rows: Vec<Value> = history
        .iter()
        .map(|oi| {
            json!({
                "timestamp": oi.timestamp,
                "datetime": iso8601(oi.timestamp),
                "open_interest": oi.amount,
                "open_interest_value": oi.value,
            })
        })
        .collect();

    let mut data = json!({
        "open_interest_history": rows,
        "count": history.len(),
    });

    let amounts: Vec<Decimal> = history.iter().filter_map(|oi| oi.amount).collect();
    if let (true, Some(first), Some(last)) = (amounts.len() >= 2, history.first(), history.last()) {
        let current = last.amount.unwrap_or_default();
        let previous = first.amount.unwrap_or_default();
        data["summary"] = json!({
            "current_oi": toolkit::number(current),
            "current_oi_value": last.value.map(toolkit::number),
            "oi_change": toolkit::number(current - previous),
            "oi_change_percentage": toolkit::number(percent_change(previous, current)),
            "max_oi": amounts.iter().max().copied().map(toolkit::number),
            "min_oi": amounts.iter().min().copied().map(toolkit::number),
            "avg_oi": toolkit::number(mean(&amounts)),
            "period_start": iso8601(first.timestamp),
            "period_end": iso8601(last.timestamp),
        });
    }
    data
}

#[async_trait]
impl Tool for OpenInterestTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.into(),
            description: "Get the last 100 open interest points of a perpetual contract with the \
                          change over the period."
                .into(),
            parameters: vec![
                toolkit::swap_symbol_param(),
                toolkit::exchange_param(),
                ParameterSchema::required("timeframe", "string", "Sampling period such as '5m', '1h', '4h', '1d'"),
            ],
            category: Some("market_data".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let outcome = self.run(call).await;
        toolkit::respond(Self::NAME, outcome, &context_with_timeframe(call))
    }
}
