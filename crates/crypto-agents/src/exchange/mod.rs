//! Exchange Integration
//!
//! Abstractions and implementations for cryptocurrency exchanges.
//! Tools never talk to a venue directly: they ask an [`ExchangeProvider`]
//! for a public or authenticated [`ExchangeClient`].

mod binance;
mod credentials;
pub(crate) mod de;
pub(crate) mod http;
mod mock;
mod okx;

pub use binance::BinanceClient;
pub use credentials::Credentials;
pub use mock::{MockExchangeClient, MockExchanges};
pub use okx::OkxClient;

use std::sync::Arc;

use agent_core::ProxySettings;
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::{ExchangeError, Result};
use crate::model::{
    BalanceEntry, Candle, ExchangeCapabilities, ExchangeId, FundingRate, Market, OpenInterest, Order,
    OrderBook, OrderRequest, Position, SavingsPosition, SavingsProduct, SavingsReceipt, Ticker, Trade,
};

/// Exchange client trait (Strategy pattern)
///
/// Symbols are unified (`BTC/USDT`, `BTC/USDT:USDT`). Swap symbols route
/// to the venue's perpetual futures endpoints.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    fn id(&self) -> ExchangeId;

    fn capabilities(&self) -> ExchangeCapabilities;

    // ---- public market data ----

    async fn ticker(&self, symbol: &str) -> Result<Ticker>;

    /// All spot tickers
    async fn tickers(&self) -> Result<Vec<Ticker>>;

    async fn order_book(&self, symbol: &str, limit: usize) -> Result<OrderBook>;

    /// Most recent trades, oldest first
    async fn trades(&self, symbol: &str, limit: usize) -> Result<Vec<Trade>>;

    /// Spot and perpetual swap markets
    async fn markets(&self) -> Result<Vec<Market>>;

    async fn market(&self, symbol: &str) -> Result<Market> {
        self.markets()
            .await?
            .into_iter()
            .find(|m| m.symbol == symbol)
            .ok_or_else(|| ExchangeError::SymbolNotFound {
                symbol: symbol.to_string(),
                exchange: self.id().to_string(),
            })
    }

    /// Candles, oldest first
    async fn candles(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<Candle>>;

    /// Funding history, oldest first
    async fn funding_rate_history(&self, symbol: &str, limit: usize) -> Result<Vec<FundingRate>>;

    /// Open interest history, oldest first
    async fn open_interest_history(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<OpenInterest>>;

    // ---- spot account ----

    async fn spot_balance(&self) -> Result<Vec<BalanceEntry>>;

    async fn create_spot_order(&self, request: &OrderRequest) -> Result<Order>;

    /// All recent orders. `None` means every symbol where the venue allows it.
    async fn spot_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>>;

    async fn spot_open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>>;

    async fn spot_closed_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>> {
        Ok(self
            .spot_orders(symbol)
            .await?
            .into_iter()
            .filter(|o| !o.status.is_open())
            .collect())
    }

    async fn spot_order(&self, order_id: &str, symbol: &str) -> Result<Order>;

    async fn cancel_spot_order(&self, order_id: &str, symbol: &str) -> Result<Order>;

    // ---- perpetual futures account ----

    async fn futures_balance(&self) -> Result<Vec<BalanceEntry>>;

    async fn futures_positions(&self, symbol: Option<&str>) -> Result<Vec<Position>>;

    /// `request.amount` is in contracts
    async fn create_futures_order(&self, request: &OrderRequest) -> Result<Order>;

    async fn futures_open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>>;

    async fn futures_closed_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>>;

    async fn futures_order(&self, order_id: &str, symbol: &str) -> Result<Order>;

    async fn cancel_futures_order(&self, order_id: &str, symbol: &str) -> Result<Order>;

    // ---- flexible savings ----

    async fn savings_products(&self) -> Result<Vec<SavingsProduct>>;

    async fn savings_positions(&self) -> Result<Vec<SavingsPosition>>;

    async fn subscribe_savings(&self, asset: &str, amount: Decimal) -> Result<SavingsReceipt>;

    async fn redeem_savings(&self, asset: &str, amount: Decimal) -> Result<SavingsReceipt>;
}

/// Hands out exchange clients to tools
pub trait ExchangeProvider: Send + Sync {
    /// Client for market data
    fn public(&self, exchange: ExchangeId) -> Result<Arc<dyn ExchangeClient>>;

    /// Client carrying API credentials
    fn authenticated(&self, exchange: ExchangeId) -> Result<Arc<dyn ExchangeClient>>;
}

type Lookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Live Binance/OKX clients. Credentials are read when a tool needs them,
/// so keys added to the environment after startup are picked up.
pub struct LiveExchanges {
    proxy: ProxySettings,
    lookup: Arc<Lookup>,
}

impl LiveExchanges {
    pub fn new(proxy: ProxySettings) -> Self {
        Self::with_lookup(proxy, |key| std::env::var(key).ok())
    }

    pub fn from_env() -> Self {
        Self::new(ProxySettings::from_env())
    }

    pub fn with_lookup<F>(proxy: ProxySettings, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            proxy,
            lookup: Arc::new(lookup),
        }
    }

    fn build(&self, exchange: ExchangeId, credentials: Option<Credentials>) -> Result<Arc<dyn ExchangeClient>> {
        let http = self.proxy.http_client()?;
        Ok(match exchange {
            ExchangeId::Binance => Arc::new(BinanceClient::new(http, credentials)),
            ExchangeId::Okx => Arc::new(OkxClient::new(http, credentials)),
        })
    }
}

impl ExchangeProvider for LiveExchanges {
    fn public(&self, exchange: ExchangeId) -> Result<Arc<dyn ExchangeClient>> {
        self.build(exchange, None)
    }

    fn authenticated(&self, exchange: ExchangeId) -> Result<Arc<dyn ExchangeClient>> {
        let credentials = Credentials::from_lookup(exchange, |key| (self.lookup)(key))?;
        self.build(exchange, Some(credentials))
    }
}

/// Floor `value` to a whole multiple of `step` (`0.001`, `0.005`, `10`).
/// Without a positive step the value passes through unchanged.
pub fn floor_to_step(value: Decimal, step: Option<Decimal>) -> Decimal {
    match step {
        Some(step) if step > Decimal::ZERO => value
            .checked_div(step)
            .and_then(|steps| steps.floor().checked_mul(step))
            .map_or(value, |floored| floored.normalize()),
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_floor_to_step() {
        assert_eq!(floor_to_step(dec!(1.23456), Some(dec!(0.001))), dec!(1.234));
        assert_eq!(floor_to_step(dec!(67123.98), Some(dec!(0.1))), dec!(67123.9));
        assert_eq!(floor_to_step(dec!(7.9), Some(dec!(1))), dec!(7));
        assert_eq!(floor_to_step(dec!(1234), Some(dec!(10))), dec!(1230));
        assert_eq!(floor_to_step(dec!(0.5), None), dec!(0.5));
        assert_eq!(floor_to_step(dec!(0.5), Some(dec!(0.00100))), dec!(0.5));
        assert_eq!(floor_to_step(dec!(0.5), Some(Decimal::ZERO)), dec!(0.5));
    }

    #[test]
    fn test_floor_to_uneven_step() {
        assert_eq!(floor_to_step(dec!(1.2378), Some(dec!(0.005))), dec!(1.235));
        assert_eq!(floor_to_step(dec!(0.049), Some(dec!(0.025))), dec!(0.025));
        assert_eq!(floor_to_step(dec!(137), Some(dec!(25))), dec!(125));
        assert_eq!(floor_to_step(dec!(0.004), Some(dec!(0.005))), Decimal::ZERO);
        assert_eq!(floor_to_step(dec!(1.2), Some(dec!(0.001))).to_string(), "1.2");
    }

    #[test]
    fn test_live_exchanges_require_credentials() {
        let exchanges = LiveExchanges::with_lookup(ProxySettings::none(), |_| None);
        assert!(exchanges.public(ExchangeId::Okx).is_ok());

        let err = exchanges.authenticated(ExchangeId::Okx).err().unwrap().to_string();
        assert!(err.contains("OKX_API_KEY") && err.contains("OKX_SECRET"));
    }
}
