//! Exchange Data Model
//!
//! Normalized market and account types shared by every exchange client.
//! Uses `rust_decimal` for all prices and amounts - never use f64 for money!
//! Symbols are unified (`BTC/USDT`, `BTC/USDT:USDT`); timestamps are Unix ms.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ExchangeError, Result};

/// Supported exchanges
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeId {
    Binance,
    Okx,
}

impl ExchangeId {
    pub const ALL: [Self; 2] = [Self::Binance, Self::Okx];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Binance => "binance",
            Self::Okx => "okx",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Binance => "Binance",
            Self::Okx => "OKX",
        }
    }

    /// Prefix of the credential variables (`BINANCE_API_KEY`, ...)
    pub fn env_prefix(self) -> &'static str {
        match self {
            Self::Binance => "BINANCE",
            Self::Okx => "OKX",
        }
    }

    pub fn supported_names() -> String {
        Self::ALL.iter().map(|id| id.as_str()).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeId {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "binance" => Ok(Self::Binance),
            "okx" => Ok(Self::Okx),
            other => Err(ExchangeError::UnsupportedExchange {
                name: other.to_string(),
                supported: Self::supported_names(),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl FromStr for Side {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            _ => Err(ExchangeError::InvalidRequest("side must be 'buy' or 'sell'".into())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    #[default]
    Limit,
    Market,
}

impl OrderType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Limit => "limit",
            Self::Market => "market",
        }
    }
}

impl FromStr for OrderType {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "limit" => Ok(Self::Limit),
            "market" => Ok(Self::Market),
            _ => Err(ExchangeError::InvalidRequest("order type must be 'limit' or 'market'".into())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Closed,
    Canceled,
    Expired,
    Rejected,
}

impl OrderStatus {
    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketKind {
    Spot,
    Swap,
}

/// 24h ticker
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub last: Option<Decimal>,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub open: Option<Decimal>,
    pub close: Option<Decimal>,
    pub base_volume: Option<Decimal>,
    pub quote_volume: Option<Decimal>,
    pub change: Option<Decimal>,
    pub percentage: Option<Decimal>,
    pub timestamp: Option<i64>,
}

impl Ticker {
    /// Fill `change`/`percentage` from open and last when the venue omits them
    pub fn derive_change(mut self) -> Self {
        if let (Some(open), Some(last)) = (self.open, self.last) {
            if self.change.is_none() {
                self.change = Some(last - open);
            }
            if self.percentage.is_none() && !open.is_zero() {
                self.percentage = Some(((last - open) / open * Decimal::ONE_HUNDRED).round_dp(4));
            }
        }
        self
    }
}

/// Price level as `[price, amount]`
pub type Level = (Decimal, Decimal);

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OrderBook {
    pub symbol: String,
    /// Best (highest) bid first
    pub bids: Vec<Level>,
    /// Best (lowest) ask first
    pub asks: Vec<Level>,
    pub timestamp: Option<i64>,
    pub nonce: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub symbol: String,
    pub price: Decimal,
    pub amount: Decimal,
    pub side: Side,
    pub timestamp: i64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Precision {
    /// Price tick size
    pub price: Option<Decimal>,
    /// Amount step size (contracts for swaps)
    pub amount: Option<Decimal>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MinMax {
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Limits {
    pub amount: MinMax,
    pub price: MinMax,
    pub cost: MinMax,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Fees {
    pub maker: Option<Decimal>,
    pub taker: Option<Decimal>,
}

/// Tradable instrument
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Market {
    /// Venue-native identifier (`BTCUSDT`, `BTC-USDT-SWAP`)
    pub id: String,
    pub symbol: String,
    pub base: String,
    pub quote: String,
    pub settle: Option<String>,
    pub active: bool,
    #[serde(rename = "type")]
    pub kind: MarketKind,
    pub margin: bool,
    /// Base units per contract (swaps only)
    pub contract_size: Option<Decimal>,
    pub precision: Precision,
    pub limits: Limits,
    pub fees: Fees,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FundingRate {
    pub symbol: String,
    pub rate: Decimal,
    pub timestamp: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OpenInterest {
    pub symbol: String,
    /// Open interest in base currency
    pub amount: Option<Decimal>,
    /// Open interest in quote currency
    pub value: Option<Decimal>,
    pub timestamp: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub asset: String,
    pub free: Decimal,
    pub used: Decimal,
    pub total: Decimal,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Fee {
    pub currency: Option<String>,
    pub cost: Decimal,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub client_order_id: Option<String>,
    pub symbol: String,
    pub side: Side,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub price: Option<Decimal>,
    pub average: Option<Decimal>,
    pub amount: Decimal,
    pub filled: Decimal,
    pub remaining: Decimal,
    pub cost: Option<Decimal>,
    pub fee: Option<Fee>,
    pub position_side: Option<PositionSide>,
    pub timestamp: Option<i64>,
    pub last_trade_timestamp: Option<i64>,
}

/// Order to submit. `amount` is base units for spot and contracts for swaps.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub amount: Decimal,
    pub price: Option<Decimal>,
    pub position_side: Option<PositionSide>,
    pub client_order_id: Option<String>,
}

impl OrderRequest {
    pub fn new(symbol: impl Into<String>, side: Side, order_type: OrderType, amount: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type,
            amount,
            price: None,
            position_side: None,
            client_order_id: Some(client_order_id()),
        }
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_position_side(mut self, side: PositionSide) -> Self {
        self.position_side = Some(side);
        self
    }

    /// Limit orders need a positive price
    pub fn validate(&self) -> Result<()> {
        if self.amount <= Decimal::ZERO {
            return Err(ExchangeError::InvalidRequest("amount must be greater than 0".into()));
        }
        if self.order_type == OrderType::Limit && !self.price.is_some_and(|p| p > Decimal::ZERO) {
            return Err(ExchangeError::InvalidRequest("limit orders require a price greater than 0".into()));
        }
        Ok(())
    }
}

/// Alphanumeric, 32 chars: accepted by both Binance and OKX
fn client_order_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: PositionSide,
    pub contracts: Decimal,
    pub notional: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
    pub percentage: Option<Decimal>,
    pub entry_price: Option<Decimal>,
    pub mark_price: Option<Decimal>,
    pub leverage: Option<Decimal>,
    pub timestamp: Option<i64>,
}

/// Flexible savings product
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SavingsProduct {
    pub asset: String,
    /// Annual rate as a fraction (0.05 = 5%)
    pub rate: Decimal,
    pub product_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SavingsPosition {
    pub asset: String,
    pub amount: Decimal,
    pub earnings: Option<Decimal>,
    pub rate: Option<Decimal>,
}

/// Acknowledgement of a savings subscription or redemption
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SavingsReceipt {
    pub asset: String,
    pub amount: Decimal,
    /// Venue reference (purchase/redeem id)
    pub reference: Option<String>,
    pub success: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExchangeCapabilities {
    pub name: String,
    pub id: String,
    pub has_fetch_ticker: bool,
    pub has_fetch_order_book: bool,
    pub has_fetch_trades: bool,
    pub has_fetch_ohlcv: bool,
    pub has_fetch_funding_rate_history: bool,
    pub has_fetch_open_interest_history: bool,
    /// Minimum milliseconds between requests
    pub rate_limit: u32,
}

/// `2024-01-01T00:00:00.000Z`
pub fn iso8601(millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(millis).map(|t| t.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
}

/// `2024-01-01 00:00:00` (UTC)
pub fn human_time(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_exchange_id_parsing() {
        assert_eq!(" Binance ".parse::<ExchangeId>().unwrap(), ExchangeId::Binance);
        assert_eq!("OKX".parse::<ExchangeId>().unwrap(), ExchangeId::Okx);

        let err = "kraken".parse::<ExchangeId>().unwrap_err().to_string();
        assert!(err.contains("kraken"));
        assert!(err.contains("binance, okx"));
    }

    #[test]
    fn test_order_request_validation() {
        let limit = OrderRequest::new("BTC/USDT", Side::Buy, OrderType::Limit, dec!(0.01));
        assert!(limit.validate().is_err());
        assert!(limit.clone().with_price(dec!(50000)).validate().is_ok());

        let market = OrderRequest::new("BTC/USDT", Side::Sell, OrderType::Market, dec!(0.01));
        assert!(market.validate().is_ok());

        let zero = OrderRequest::new("BTC/USDT", Side::Sell, OrderType::Market, Decimal::ZERO);
        assert!(zero.validate().is_err());
        assert_eq!(market.client_order_id.unwrap().len(), 32);
    }

    #[test]
    fn test_ticker_derives_change() {
        let ticker = Ticker {
            open: Some(dec!(100)),
            last: Some(dec!(110)),
            ..Ticker::default()
        }
        .derive_change();
        assert_eq!(ticker.change, Some(dec!(10)));
        assert_eq!(ticker.percentage, Some(dec!(10)));
    }

    #[test]
    fn test_time_formatting() {
        assert_eq!(iso8601(1_700_000_000_000).unwrap(), "2023-11-14T22:13:20.000Z");
        assert_eq!(human_time(1_700_000_000_000), "2023-11-14 22:13:20");
    }
}
