//! Exchange and instrument metadata tools.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use agent_core::{Tool, ToolCall, ToolResult, ToolSchema};

use crate::error::Result;
use crate::exchange::ExchangeProvider;
use crate::model::{ExchangeId, Market, MarketKind};
use crate::toolkit;

use super::quotes::context;

/// Lists the venues the market tools can reach
pub struct SupportedExchangesTool {
    exchanges: Arc<dyn ExchangeProvider>,
}

impl SupportedExchangesTool {
    pub const NAME: &'static str = "get_supported_exchanges";

    pub fn new(exchanges: Arc<dyn ExchangeProvider>) -> Self {
        Self { exchanges }
    }

    fn run(&self) -> Result<Value> {
        let mut supported = Map::new();
        for id in ExchangeId::ALL {
            let caps = self.exchanges.public(id)?.capabilities();
            supported.insert(
                id.as_str().to_string(),
                json!({
                    "name": caps.name,
                    "id": caps.id,
                    "has_fetch_ticker": caps.has_fetch_ticker,
                    "has_fetch_order_book": caps.has_fetch_order_book,
                    "has_fetch_trades": caps.has_fetch_trades,
                    "has_fetch_ohlcv": caps.has_fetch_ohlcv,
                    "rate_limit": caps.rate_limit,
                }),
            );
        }
        Ok(json!({
            "total_count": supported.len(),
            "supported_exchanges": supported,
        }))
    }
}

#[async_trait]
impl Tool for SupportedExchangesTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.into(),
            description: "List the supported exchanges and which market data each one provides.".into(),
            parameters: vec![],
            category: Some("market_data".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, _call: &ToolCall) -> ToolResult {
        tracing::info!(tool = Self::NAME, "Listing supported exchanges");
        toolkit::respond(Self::NAME, self.run(), &[])
    }
}

/// Trading rules of a single market
pub struct SymbolInfoTool {
    exchanges: Arc<dyn ExchangeProvider>,
}

impl SymbolInfoTool {
    pub const NAME: &'static str = "get_symbol_info";

    pub fn new(exchanges: Arc<dyn ExchangeProvider>) -> Self {
        Self { exchanges }
    }

    async fn run(&self, call: &ToolCall) -> Result<Value> {
        let symbol = toolkit::symbol(call)?;
        let exchange = toolkit::exchange(call)?;
        tracing::info!(tool = Self::NAME, %symbol, %exchange, "Fetching market info");

        let market = self.exchanges.public(exchange)?.market(&symbol).await?;
        Ok(market_data(&market))
    }
}

fn market_data(market: &Market) -> Value {
    let swap = market.kind == MarketKind::Swap;
    json!({
        "id": market.id,
        "symbol": market.symbol,
        "base": market.base,
        "quote": market.quote,
        "settle": market.settle,
        "active": market.active,
        "type": market.kind,
        "spot": !swap,
        "margin": market.margin,
        "swap": swap,
        "future": swap,
        "contract_size": market.contract_size,
        "precision": market.precision,
        "limits": market.limits,
        "fees": market.fees,
    })
}

#[async_trait]
impl Tool for SymbolInfoTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.into(),
            description: "Get trading rules of a spot pair or perpetual contract: precision, \
                          amount/price/cost limits, fees and contract size."
                .into(),
            parameters: vec![
                agent_core::tool::ParameterSchema::required(
                    "symbol",
                    "string",
                    "Spot pair ('BTC/USDT') or perpetual contract ('BTC/USDT:USDT')",
                ),
                toolkit::exchange_param(),
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
