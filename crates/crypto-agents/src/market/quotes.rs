//! Spot quote tools: ticker, order book, recent trades and market overview.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{Value, json};

use agent_core::tool::ParameterSchema;
use agent_core::{Tool, ToolCall, ToolResult, ToolSchema};

use crate::error::Result;
use crate::exchange::ExchangeProvider;
use crate::model::{Side, Ticker, human_time, iso8601};
use crate::toolkit;

/// Latest 24h ticker for one pair
pub struct TickerTool {
    exchanges: Arc<dyn ExchangeProvider>,
}

impl TickerTool {
    pub const NAME: &'static str = "get_ticker_data";

    pub fn new(exchanges: Arc<dyn ExchangeProvider>) -> Self {
        Self { exchanges }
    }

    async fn run(&self, call: &ToolCall) -> Result<Value> {
        let symbol = toolkit::symbol(call)?;
        let exchange = toolkit::exchange(call)?;
        tracing::info!(tool = Self::NAME, %symbol, %exchange, "Fetching ticker");

        let ticker = self.exchanges.public(exchange)?.ticker(&symbol).await?;
        Ok(ticker_data(&ticker))
    }
}

fn ticker_data(ticker: &Ticker) -> Value {
    json!({
        "symbol": ticker.symbol,
        "last": ticker.last,
        "bid": ticker.bid,
        "ask": ticker.ask,
        "high": ticker.high,
        "low": ticker.low,
        "open": ticker.open,
        "close": ticker.close,
        "volume": ticker.base_volume,
        "quoteVolume": ticker.quote_volume,
        "change": ticker.change,
        "percentage": ticker.percentage,
        "timestamp": ticker.timestamp,
        "datetime": ticker.timestamp.and_then(iso8601),
    })
}

#[async_trait]
impl Tool for TickerTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.into(),
            description: "Get the real-time 24h ticker of a trading pair: last price, best bid/ask, \
                          high, low, open, volume and 24h change."
                .into(),
            parameters: vec![toolkit::spot_symbol_param(), toolkit::exchange_param()],
            category: Some("market_data".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let outcome = self.run(call).await;
        toolkit::respond(Self::NAME, outcome, &context(call))
    }
}

/// Order book depth with liquidity summary
pub struct OrderBookTool {
    exchanges: Arc<dyn ExchangeProvider>,
}

impl OrderBookTool {
    pub const NAME: &'static str = "get_orderbook_data";

    pub fn new(exchanges: Arc<dyn ExchangeProvider>) -> Self {
        Self { exchanges }
    }

    async fn run(&self, call: &ToolCall) -> Result<Value> {
        let symbol = toolkit::symbol(call)?;
        let exchange = toolkit::exchange(call)?;
        let limit = toolkit::bounded(call, "limit", 1..=100)?;
        tracing::info!(tool = Self::NAME, %symbol, %exchange, limit, "Fetching order book");

        let mut book = self.exchanges.public(exchange)?.order_book(&symbol, limit).await?;
        book.bids.truncate(limit);
        book.asks.truncate(limit);

        let spread = match (book.bids.first(), book.asks.first()) {
            (Some((bid, _)), Some((ask, _))) => Some(toolkit::number(ask - bid)),
            _ => None,
        };

        Ok(json!({
            "bids": book.bids,
            "asks": book.asks,
            "timestamp": book.timestamp,
            "datetime": book.timestamp.and_then(iso8601),
            "nonce": book.nonce,
            "summary": {
                "sum_bid": toolkit::number(book.bids.iter().map(|(_, amount)| amount).sum()),
                "sum_ask": toolkit::number(book.asks.iter().map(|(_, amount)| amount).sum()),
                "spread": spread,
            }
        }))
    }
}

#[async_trait]
impl Tool for OrderBookTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.into(),
            description: "Get order book depth (bids and asks) of a trading pair with total bid/ask \
                          size and the bid-ask spread."
                .into(),
            parameters: vec![
                toolkit::spot_symbol_param(),
                toolkit::exchange_param(),
                ParameterSchema::required("limit", "integer", "Number of price levels per side, 1-100"),
            ],
            category: Some("market_data".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let outcome = self.run(call).await;
        let mut context = context(call);
        context.push(("limit", call.int("limit").map_or(Value::Null, Value::from)));
        toolkit::respond(Self::NAME, outcome, &context)
    }
}

/// Recent public trades with buy/sell volume summary
pub struct TradesTool {
    exchanges: Arc<dyn ExchangeProvider>,
}

impl TradesTool {
    pub const NAME: &'static str = "get_trades_data";

    pub fn new(exchanges: Arc<dyn ExchangeProvider>) -> Self {
        Self { exchanges }
    }

    async fn run(&self, call: &ToolCall) -> Result<Value> {
        let symbol = toolkit::symbol(call)?;
        let exchange = toolkit::exchange(call)?;
        let limit = toolkit::bounded(call, "limit", 1..=1000)?;
        tracing::info!(tool = Self::NAME, %symbol, %exchange, limit, "Fetching trades");

        let trades = self.exchanges.public(exchange)?.trades(&symbol, limit).await?;

        let volume = |side: Side| -> Decimal { trades.iter().filter(|t| t.side == side).map(|t| t.amount).sum() };
        let (sum_buy, sum_sell) = (volume(Side::Buy), volume(Side::Sell));
        let latest = trades.last();

        let rows: Vec<Value> = trades
            .iter()
            .map(|t| {
                json!({
                    "id": t.id,
                    "price": t.price,
                    "amount": t.amount,
                    "side": t.side,
                    "timestamp": human_time(t.timestamp),
                })
            })
            .collect();

        Ok(json!({
            "trades": rows,
            "count": trades.len(),
            "summary": {
                "latest_price": latest.map(|t| toolkit::number(t.price)),
                "latest_side": latest.map(|t| t.side.as_str()),
                "sum_buy": toolkit::number(sum_buy),
                "sum_sell": toolkit::number(sum_sell),
                "sum_volume": toolkit::number(sum_buy + sum_sell),
            }
        }))
    }
}

#[async_trait]
impl Tool for TradesTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.into(),
            description: "Get the most recent public trades of a trading pair with buy and sell \
                          volume totals."
                .into(),
            parameters: vec![
                toolkit::spot_symbol_param(),
                toolkit::exchange_param(),
                ParameterSchema::required("limit", "integer", "Number of trades, 1-1000"),
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

/// Top USDT pairs by quote volume
pub struct MarketOverviewTool {
    exchanges: Arc<dyn ExchangeProvider>,
}

impl MarketOverviewTool {
    pub const NAME: &'static str = "get_market_overview";

    const TOP: usize = 10;

    pub fn new(exchanges: Arc<dyn ExchangeProvider>) -> Self {
        Self { exchanges }
    }

    async fn run(&self, call: &ToolCall) -> Result<Value> {
        let exchange = toolkit::exchange(call)?;
        tracing::info!(tool = Self::NAME, %exchange, "Fetching market overview");

        let tickers = self.exchanges.public(exchange)?.tickers().await?;
        Ok(overview(&tickers))
    }
}

fn overview(tickers: &[Ticker]) -> Value {
    let quote_volume = |t: &Ticker| t.quote_volume.unwrap_or_default();

    let mut usdt: Vec<&Ticker> = tickers.iter().filter(|t| t.symbol.ends_with("/USDT")).collect();
    usdt.sort_by(|a, b| quote_volume(b).cmp(&quote_volume(a)));

    let top: Vec<Value> = usdt
        .into_iter()
        .take(MarketOverviewTool::TOP)
        .map(|t| {
            json!({
                "symbol": t.symbol,
                "price": t.last,
                "change": t.change,
                "percentage": t.percentage,
                "volume": t.base_volume,
                "quoteVolume": t.quote_volume,
            })
        })
        .collect();

    json!({
        "top_pairs": top,
        "total_pairs": tickers.len(),
        "market_cap": toolkit::number(tickers.iter().map(quote_volume).sum()),
    })
}

#[async_trait]
impl Tool for MarketOverviewTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.into(),
            description: "Get an exchange-wide overview: the 10 most traded USDT pairs, the number of \
                          listed pairs and total 24h quote volume."
                .into(),
            parameters: vec![toolkit::exchange_param()],
            category: Some("market_data".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let outcome = self.run(call).await;
        toolkit::respond(Self::NAME, outcome, &[("exchange", json!(call.text("exchange_name").to_lowercase()))])
    }
}

/// `exchange` and `symbol` metadata, normalized the way the tools read them
pub(crate) fn context(call: &ToolCall) -> Vec<(&'static str, Value)> {
    vec![
        ("exchange", json!(call.text("exchange_name").to_lowercase())),
        ("symbol", json!(call.text("symbol").to_uppercase())),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::MockExchanges;
    use crate::model::ExchangeId;
    use crate::exchange::MockExchangeClient;

    fn provider() -> Arc<dyn ExchangeProvider> {
        Arc::new(MockExchanges::new())
    }

    #[tokio::test]
    async fn test_ticker_normalizes_inputs() {
        let tool = TickerTool::new(provider());
        let call = ToolCall::new(TickerTool::NAME)
            .arg("symbol", " btc/usdt ")
            .arg("exchange_name", " Binance ");

        let result = tool.execute(&call).await.envelope();
        assert_eq!(result["status"], "success");
        assert_eq!(result["data"]["symbol"], "BTC/USDT");
        assert_eq!(result["data"]["last"], "67000");
        assert_eq!(result["data"]["datetime"], "2024-01-01T00:00:00.000Z");
        assert_eq!(result["metadata"]["exchange"], "binance");
        assert_eq!(result["metadata"]["symbol"], "BTC/USDT");
    }

    #[tokio::test]
    async fn test_ticker_rejects_bad_input() {
        let tool = TickerTool::new(provider());

        let empty = ToolCall::new(TickerTool::NAME).arg("symbol", "  ").arg("exchange_name", "okx");
        let result = tool.execute(&empty).await;
        assert!(!result.is_success());
        assert!(result.error_message.unwrap().contains("cannot be empty"));

        let kraken = ToolCall::new(TickerTool::NAME).arg("symbol", "BTC/USDT").arg("exchange_name", "kraken");
        let result = tool.execute(&kraken).await;
        assert!(result.error_message.unwrap().contains("Unsupported exchange"));

        let unknown = ToolCall::new(TickerTool::NAME).arg("symbol", "FOO/USDT").arg("exchange_name", "okx");
        assert_eq!(tool.execute(&unknown).await.envelope()["status"], "error");
    }

    #[tokio::test]
    async fn test_orderbook_summary() {
        let tool = OrderBookTool::new(provider());
        let call = ToolCall::new(OrderBookTool::NAME)
            .arg("symbol", "BTC/USDT")
            .arg("exchange_name", "okx")
            .arg("limit", 3);

        let result = tool.execute(&call).await.envelope();
        assert_eq!(result["status"], "success");
        assert_eq!(result["data"]["bids"].as_array().unwrap().len(), 3);
        // sizes 1 + 2 + 3
        assert_eq!(result["data"]["summary"]["sum_bid"], json!(6));
        assert_eq!(result["data"]["summary"]["spread"], json!(13.4));
        assert_eq!(result["metadata"]["limit"], 3);
    }

    #[tokio::test]
    async fn test_orderbook_limit_bounds() {
        let tool = OrderBookTool::new(provider());
        for limit in [json!(0), json!(101), json!("ten")] {
            let call = ToolCall::new(OrderBookTool::NAME)
                .arg("symbol", "BTC/USDT")
                .arg("exchange_name", "okx")
                .arg("limit", limit);
            let result = tool.execute(&call).await;
            assert!(result.error_message.unwrap().contains("between 1 and 100"));
        }
    }

    #[tokio::test]
    async fn test_trades_summary_uses_newest_trade() {
        let tool = TradesTool::new(provider());
        let call = ToolCall::new(TradesTool::NAME)
            .arg("symbol", "eth/usdt")
            .arg("exchange_name", "binance")
            .arg("limit", 4);

        let result = tool.execute(&call).await.envelope();
        let data = &result["data"];
        assert_eq!(data["count"], 4);
        assert_eq!(data["trades"][0]["timestamp"], "2024-01-01 00:00:00");
        assert_eq!(data["summary"]["latest_price"], json!(3503));
        assert_eq!(data["summary"]["latest_side"], "sell");
        assert_eq!(data["summary"]["sum_buy"], json!(1));
        assert_eq!(data["summary"]["sum_volume"], json!(2));
    }

    #[tokio::test]
    async fn test_market_overview_ranks_usdt_pairs() {
        let tool = MarketOverviewTool::new(provider());
        let call = ToolCall::new(MarketOverviewTool::NAME).arg("exchange_name", "OKX");

        let result = tool.execute(&call).await.envelope();
        let data = &result["data"];
        let symbols: Vec<&str> = data["top_pairs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["symbol"].as_str().unwrap())
            .collect();
        assert_eq!(symbols, ["BTC/USDT", "ETH/USDT", "SOL/USDT", "DOGE/USDT"]);
        assert_eq!(data["total_pairs"], 5);
        assert_eq!(data["market_cap"], json!(2_690_001_200_u64));
    }

    #[tokio::test]
    async fn test_exchange_failure_becomes_error_envelope() {
        let exchanges = MockExchanges::new().with_client(MockExchangeClient::failing(ExchangeId::Okx, "maintenance"));
        let tool = MarketOverviewTool::new(Arc::new(exchanges));
        let call = ToolCall::new(MarketOverviewTool::NAME).arg("exchange_name", "okx");

        let result = tool.execute(&call).await;
        assert!(!result.is_success());
        assert!(result.error_message.unwrap().contains("maintenance"));
        assert!(result.metadata.unwrap()["timestamp"].is_string());
    }
}
