//! Mock Exchange Client
//!
//! For testing and demo purposes. Every call answers from static fixtures,
//! so results are identical from run to run. Submitted orders are recorded
//! for inspection.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::Mutex;

use super::{ExchangeClient, ExchangeProvider};
use crate::error::{ExchangeError, Result};
use crate::model::{
    BalanceEntry, Candle, ExchangeCapabilities, ExchangeId, Fees, FundingRate, Limits, Market, MarketKind, MinMax,
    OpenInterest, Order, OrderBook, OrderRequest, OrderStatus, OrderType, Position, PositionSide, Precision,
    SavingsPosition, SavingsProduct, SavingsReceipt, Side, Ticker, Trade,
};
use crate::symbol::Symbol;

/// 2024-01-01T00:00:00Z
const EPOCH_MS: i64 = 1_704_067_200_000;
const HOUR_MS: i64 = 3_600_000;

/// Mock exchange client with static prices
pub struct MockExchangeClient {
    id: ExchangeId,
    failure: Option<String>,
    submitted: Mutex<Vec<OrderRequest>>,
}

impl MockExchangeClient {
    pub fn new(id: ExchangeId) -> Self {
        Self {
            id,
            failure: None,
            submitted: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with an API error carrying `message`
    pub fn failing(id: ExchangeId, message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new(id)
        }
    }

    /// Orders submitted so far, in order
    pub async fn submitted_orders(&self) -> Vec<OrderRequest> {
        self.submitted.lock().await.clone()
    }

    fn check(&self) -> Result<()> {
        match &self.failure {
            Some(message) => Err(ExchangeError::Api {
                exchange: self.id.to_string(),
                code: "mock".into(),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn not_found(&self, symbol: &str) -> ExchangeError {
        ExchangeError::SymbolNotFound {
            symbol: symbol.to_string(),
            exchange: self.id.to_string(),
        }
    }

    /// (last price, 24h quote volume)
    fn fixture(base: &str, quote: &str) -> Option<(Decimal, Decimal)> {
        match (base, quote) {
            ("BTC", "USDT") => Some((dec!(67000), dec!(1_500_000_000))),
            ("ETH", "USDT") => Some((dec!(3500), dec!(800_000_000))),
            ("SOL", "USDT") => Some((dec!(150), dec!(300_000_000))),
            ("DOGE", "USDT") => Some((dec!(0.15), dec!(90_000_000))),
            ("ETH", "BTC") => Some((dec!(0.052), dec!(1_200))),
            _ => None,
        }
    }

    fn price(&self, symbol: &str) -> Result<(Symbol, Decimal, Decimal)> {
        let parsed: Symbol = symbol.parse()?;
        let (last, quote_volume) =
            Self::fixture(&parsed.base, &parsed.quote).ok_or_else(|| self.not_found(&parsed.to_string()))?;
        if parsed.is_swap() && !self.swap_symbols().contains(&parsed.to_string().as_str()) {
            return Err(self.not_found(&parsed.to_string()));
        }
        Ok((parsed, last, quote_volume))
    }

    fn swap_symbols(&self) -> [&'static str; 2] {
        ["BTC/USDT:USDT", "ETH/USDT:USDT"]
    }

    fn ticker_for(symbol: &Symbol, last: Decimal, quote_volume: Decimal) -> Ticker {
        Ticker {
            symbol: symbol.to_string(),
            last: Some(last),
            bid: Some(last * dec!(0.9999)),
            ask: Some(last * dec!(1.0001)),
            high: Some(last * dec!(1.02)),
            low: Some(last * dec!(0.97)),
            open: Some(last * dec!(0.99)),
            close: Some(last),
            base_volume: Some((quote_volume / last).round_dp(4)),
            quote_volume: Some(quote_volume),
            change: None,
            percentage: None,
            timestamp: Some(EPOCH_MS),
        }
        .derive_change()
    }

    fn market_for(symbol: &Symbol) -> Market {
        let swap = symbol.is_swap();
        Market {
            id: if swap { symbol.okx_id() } else { symbol.binance_id() },
            symbol: symbol.to_string(),
            base: symbol.base.clone(),
            quote: symbol.quote.clone(),
            settle: symbol.settle.clone(),
            active: true,
            kind: symbol.kind(),
            margin: !swap,
            contract_size: swap.then(|| dec!(0.01)),
            precision: Precision {
                price: Some(dec!(0.1)),
                amount: Some(if swap { Decimal::ONE } else { dec!(0.0001) }),
            },
            limits: Limits {
                amount: MinMax {
                    min: Some(if swap { Decimal::ONE } else { dec!(0.0001) }),
                    max: Some(dec!(10000)),
                },
                price: MinMax::default(),
                cost: MinMax {
                    min: Some(dec!(5)),
                    max: None,
                },
            },
            fees: Fees {
                maker: Some(dec!(0.001)),
                taker: Some(dec!(0.001)),
            },
        }
    }

    fn fixture_orders(kind: MarketKind) -> Vec<Order> {
        let (symbol, other, position_side) = match kind {
            MarketKind::Spot => ("BTC/USDT", "ETH/USDT", None),
            MarketKind::Swap => ("BTC/USDT:USDT", "ETH/USDT:USDT", Some(PositionSide::Long)),
        };
        let order = |id: &str, symbol: &str, status: OrderStatus, filled: Decimal| Order {
            id: id.to_string(),
            client_order_id: None,
            symbol: symbol.to_string(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            status,
            price: Some(dec!(60000)),
            average: (!filled.is_zero()).then_some(dec!(60000)),
            amount: dec!(2),
            filled,
            remaining: dec!(2) - filled,
            cost: Some(filled * dec!(60000)),
            fee: None,
            position_side,
            timestamp: Some(EPOCH_MS),
            last_trade_timestamp: None,
        };
        vec![
            order("1001", symbol, OrderStatus::Open, Decimal::ZERO),
            order("1002", other, OrderStatus::Closed, dec!(2)),
            order("1003", symbol, OrderStatus::Canceled, Decimal::ZERO),
        ]
    }

    fn orders(&self, kind: MarketKind, symbol: Option<&str>, open: Option<bool>) -> Result<Vec<Order>> {
        self.check()?;
        let wanted = symbol.map(str::parse::<Symbol>).transpose()?.map(|s| s.to_string());
        Ok(Self::fixture_orders(kind)
            .into_iter()
            .filter(|o| wanted.as_ref().is_none_or(|w| &o.symbol == w))
            .filter(|o| open.is_none_or(|open| o.status.is_open() == open))
            .collect())
    }

    fn find_order(&self, kind: MarketKind, order_id: &str, symbol: &str) -> Result<Order> {
        self.orders(kind, Some(symbol), None)?
            .into_iter()
            .find(|o| o.id == order_id)
            .ok_or_else(|| ExchangeError::Api {
                exchange: self.id.to_string(),
                code: "-2013".into(),
                message: format!("Order {order_id} does not exist"),
            })
    }

    async fn submit(&self, request: &OrderRequest, kind: MarketKind) -> Result<Order> {
        self.check()?;
        request.validate()?;
        let symbol = match kind {
            MarketKind::Spot => Symbol::parse_spot(&request.symbol)?,
            MarketKind::Swap => Symbol::parse_swap(&request.symbol)?,
        };
        self.price(&symbol.to_string())?;

        let mut submitted = self.submitted.lock().await;
        submitted.push(request.clone());
        Ok(Order {
            id: format!("mock-{}", submitted.len()),
            client_order_id: request.client_order_id.clone(),
            symbol: symbol.to_string(),
            side: request.side,
            order_type: request.order_type,
            status: OrderStatus::Open,
            price: request.price,
            average: None,
            amount: request.amount,
            filled: Decimal::ZERO,
            remaining: request.amount,
            cost: None,
            fee: None,
            position_side: request.position_side,
            timestamp: Some(EPOCH_MS),
            last_trade_timestamp: None,
        })
    }

    fn receipt(&self, asset: &str, amount: Decimal) -> Result<SavingsReceipt> {
        self.check()?;
        if amount <= Decimal::ZERO {
            return Err(ExchangeError::InvalidRequest("amount must be greater than 0".into()));
        }
        Ok(SavingsReceipt {
            asset: asset.to_uppercase(),
            amount,
            reference: Some("mock-savings-1".into()),
            success: true,
        })
    }
}

#[async_trait]
impl ExchangeClient for MockExchangeClient {
    fn id(&self) -> ExchangeId {
        self.id
    }

    fn capabilities(&self) -> ExchangeCapabilities {
        ExchangeCapabilities {
            name: self.id.display_name().into(),
            id: self.id.as_str().into(),
            has_fetch_ticker: true,
            has_fetch_order_book: true,
            has_fetch_trades: true,
            has_fetch_ohlcv: true,
            has_fetch_funding_rate_history: true,
            has_fetch_open_interest_history: true,
            rate_limit: 50,
        }
    }

    async fn ticker(&self, symbol: &str) -> Result<Ticker> {
        self.check()?;
        let (symbol, last, quote_volume) = self.price(symbol)?;
        Ok(Self::ticker_for(&symbol, last, quote_volume))
    }

    async fn tickers(&self) -> Result<Vec<Ticker>> {
        self.check()?;
        Ok(["BTC/USDT", "ETH/USDT", "SOL/USDT", "DOGE/USDT", "ETH/BTC"]
            .iter()
            .filter_map(|s| self.price(s).ok())
            .map(|(symbol, last, volume)| Self::ticker_for(&symbol, last, volume))
            .collect())
    }

    async fn order_book(&self, symbol: &str, limit: usize) -> Result<OrderBook> {
        self.check()?;
        let (symbol, last, _) = self.price(symbol)?;
        let tick = last / dec!(10000);
        let levels = limit.min(20);
        let level = |i: usize| Decimal::from(u32::try_from(i).unwrap_or(u32::MAX));

        Ok(OrderBook {
            symbol: symbol.to_string(),
            bids: (0..levels).map(|i| (last - tick * (level(i) + Decimal::ONE), Decimal::ONE + level(i))).collect(),
            asks: (0..levels).map(|i| (last + tick * (level(i) + Decimal::ONE), Decimal::ONE + level(i))).collect(),
            timestamp: Some(EPOCH_MS),
            nonce: Some(1),
        })
    }

    async fn trades(&self, symbol: &str, limit: usize) -> Result<Vec<Trade>> {
        self.check()?;
        let (symbol, last, _) = self.price(symbol)?;
        Ok((0..limit.min(20))
            .map(|i| {
                let n = i64::try_from(i).unwrap_or_default();
                Trade {
                    id: (n + 1).to_string(),
                    symbol: symbol.to_string(),
                    price: last + Decimal::from(n),
                    amount: dec!(0.5),
                    side: if i % 2 == 0 { Side::Buy } else { Side::Sell },
                    timestamp: EPOCH_MS + n * 1000,
                }
            })
            .collect())
    }

    async fn markets(&self) -> Result<Vec<Market>> {
        self.check()?;
        let mut markets = Vec::new();
        for symbol in ["BTC/USDT", "ETH/USDT", "SOL/USDT", "DOGE/USDT", "ETH/BTC"]
            .into_iter()
            .chain(self.swap_symbols())
        {
            markets.push(Self::market_for(&symbol.parse::<Symbol>()?));
        }
        Ok(markets)
    }

    async fn candles(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<Candle>> {
        self.check()?;
        if !["1m", "5m", "15m", "30m", "1h", "4h", "1d", "1w"].contains(&timeframe) {
            return Err(ExchangeError::UnsupportedTimeframe(timeframe.to_string()));
        }
        let (_, last, _) = self.price(symbol)?;
        Ok((0..limit)
            .map(|i| {
                let n = i64::try_from(i).unwrap_or_default();
                let open = last + Decimal::from(n);
                Candle {
                    timestamp: EPOCH_MS + n * HOUR_MS,
                    open,
                    high: open + dec!(2),
                    low: open - Decimal::ONE,
                    close: open + Decimal::ONE,
                    volume: dec!(10),
                }
            })
            .collect())
    }

    async fn funding_rate_history(&self, symbol: &str, limit: usize) -> Result<Vec<FundingRate>> {
        self.check()?;
        let symbol = Symbol::parse_swap(symbol)?;
        self.price(&symbol.to_string())?;
        let cycle = [dec!(0.0001), dec!(-0.00005), Decimal::ZERO, dec!(0.0002)];
        Ok((0..limit)
            .map(|i| FundingRate {
                symbol: symbol.to_string(),
                rate: cycle[i % cycle.len()],
                timestamp: EPOCH_MS + i64::try_from(i).unwrap_or_default() * 8 * HOUR_MS,
            })
            .collect())
    }

    async fn open_interest_history(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<OpenInterest>> {
        self.check()?;
        if !["5m", "15m", "30m", "1h", "4h", "1d"].contains(&timeframe) {
            return Err(ExchangeError::UnsupportedTimeframe(timeframe.to_string()));
        }
        let symbol = Symbol::parse_swap(symbol)?;
        let (_, last, _) = self.price(&symbol.to_string())?;
        Ok((0..limit)
            .map(|i| {
                let n = i64::try_from(i).unwrap_or_default();
                let amount = dec!(1000) + Decimal::from(n * 10);
                OpenInterest {
                    symbol: symbol.to_string(),
                    amount: Some(amount),
                    value: Some(amount * last),
                    timestamp: EPOCH_MS + n * HOUR_MS,
                }
            })
            .collect())
    }

    async fn spot_balance(&self) -> Result<Vec<BalanceEntry>> {
        self.check()?;
        let entry = |asset: &str, free: Decimal, used: Decimal| BalanceEntry {
            asset: asset.to_string(),
            free,
            used,
            total: free + used,
        };
        Ok(vec![
            entry("USDT", dec!(1000), dec!(100)),
            entry("BTC", dec!(0.5), Decimal::ZERO),
            entry("ETH", Decimal::ZERO, Decimal::ZERO),
        ])
    }

    async fn create_spot_order(&self, request: &OrderRequest) -> Result<Order> {
        self.submit(request, MarketKind::Spot).await
    }

    async fn spot_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>> {
        if symbol.is_none() && self.id == ExchangeId::Binance {
            return Err(ExchangeError::SymbolRequired {
                exchange: self.id.to_string(),
                operation: "spot order history".into(),
            });
        }
        self.orders(MarketKind::Spot, symbol, None)
    }

    async fn spot_open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>> {
        self.orders(MarketKind::Spot, symbol, Some(true))
    }

    async fn spot_order(&self, order_id: &str, symbol: &str) -> Result<Order> {
        self.find_order(MarketKind::Spot, order_id, symbol)
    }

    async fn cancel_spot_order(&self, order_id: &str, symbol: &str) -> Result<Order> {
        let mut order = self.find_order(MarketKind::Spot, order_id, symbol)?;
        order.status = OrderStatus::Canceled;
        Ok(order)
    }

    async fn futures_balance(&self) -> Result<Vec<BalanceEntry>> {
        self.check()?;
        Ok(vec![BalanceEntry {
            asset: "USDT".into(),
            free: dec!(4500),
            used: dec!(500),
            total: dec!(5000),
        }])
    }

    async fn futures_positions(&self, symbol: Option<&str>) -> Result<Vec<Position>> {
        self.check()?;
        let wanted = symbol.map(Symbol::parse_swap).transpose()?.map(|s| s.to_string());
        let position = |symbol: &str, contracts: Decimal, entry: Decimal| Position {
            symbol: symbol.to_string(),
            side: PositionSide::Long,
            contracts,
            notional: Some(contracts * dec!(0.01) * entry),
            unrealized_pnl: Some(dec!(12.5)),
            percentage: Some(dec!(6.25)),
            entry_price: Some(entry),
            mark_price: Some(entry + dec!(100)),
            leverage: Some(dec!(10)),
            timestamp: Some(EPOCH_MS),
        };
        Ok(vec![
            position("BTC/USDT:USDT", dec!(3), dec!(66000)),
            position("ETH/USDT:USDT", Decimal::ZERO, dec!(3400)),
        ]
        .into_iter()
        .filter(|p| wanted.as_ref().is_none_or(|w| &p.symbol == w))
        .collect())
    }

    async fn create_futures_order(&self, request: &OrderRequest) -> Result<Order> {
        self.submit(request, MarketKind::Swap).await
    }

    async fn futures_open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>> {
        self.orders(MarketKind::Swap, symbol, Some(true))
    }

    async fn futures_closed_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>> {
        self.orders(MarketKind::Swap, symbol, Some(false))
    }

    async fn futures_order(&self, order_id: &str, symbol: &str) -> Result<Order> {
        self.find_order(MarketKind::Swap, order_id, symbol)
    }

    async fn cancel_futures_order(&self, order_id: &str, symbol: &str) -> Result<Order> {
        let mut order = self.find_order(MarketKind::Swap, order_id, symbol)?;
        order.status = OrderStatus::Canceled;
        Ok(order)
    }

    async fn savings_products(&self) -> Result<Vec<SavingsProduct>> {
        self.check()?;
        Ok(vec![
            SavingsProduct {
                asset: "USDT".into(),
                rate: dec!(0.05),
                product_id: "USDT001".into(),
            },
            SavingsProduct {
                asset: "BTC".into(),
                rate: dec!(0.01),
                product_id: "BTC001".into(),
            },
        ])
    }

    async fn savings_positions(&self) -> Result<Vec<SavingsPosition>> {
        self.check()?;
        Ok(vec![SavingsPosition {
            asset: "USDT".into(),
            amount: dec!(200),
            earnings: Some(dec!(1.25)),
            rate: Some(dec!(0.05)),
        }])
    }

    async fn subscribe_savings(&self, asset: &str, amount: Decimal) -> Result<SavingsReceipt> {
        self.receipt(asset, amount)
    }

    async fn redeem_savings(&self, asset: &str, amount: Decimal) -> Result<SavingsReceipt> {
        self.receipt(asset, amount)
    }
}

/// [`ExchangeProvider`] over mock clients, one per exchange
pub struct MockExchanges {
    binance: Arc<MockExchangeClient>,
    okx: Arc<MockExchangeClient>,
    credentials: bool,
}

impl Default for MockExchanges {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExchanges {
    pub fn new() -> Self {
        Self {
            binance: Arc::new(MockExchangeClient::new(ExchangeId::Binance)),
            okx: Arc::new(MockExchangeClient::new(ExchangeId::Okx)),
            credentials: true,
        }
    }

    /// `authenticated` fails as if no API keys were configured
    pub fn without_credentials() -> Self {
        Self {
            credentials: false,
            ..Self::new()
        }
    }

    pub fn with_client(mut self, client: MockExchangeClient) -> Self {
        match client.id {
            ExchangeId::Binance => self.binance = Arc::new(client),
            ExchangeId::Okx => self.okx = Arc::new(client),
        }
        self
    }

    pub fn client(&self, exchange: ExchangeId) -> Arc<MockExchangeClient> {
        match exchange {
            ExchangeId::Binance => Arc::clone(&self.binance),
            ExchangeId::Okx => Arc::clone(&self.okx),
        }
    }
}

impl ExchangeProvider for MockExchanges {
    fn public(&self, exchange: ExchangeId) -> Result<Arc<dyn ExchangeClient>> {
        Ok(self.client(exchange))
    }

    fn authenticated(&self, exchange: ExchangeId) -> Result<Arc<dyn ExchangeClient>> {
        if !self.credentials {
            let prefix = exchange.env_prefix();
            return Err(ExchangeError::MissingCredentials {
                exchange: exchange.to_string(),
                key_var: format!("{prefix}_API_KEY"),
                secret_var: format!("{prefix}_SECRET"),
            });
        }
        Ok(self.client(exchange))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_exchange() {
        let exchange = MockExchangeClient::new(ExchangeId::Binance);

        let btc = exchange.ticker("btc/usdt").await.unwrap();
        assert_eq!(btc.symbol, "BTC/USDT");
        assert_eq!(btc.last, Some(dec!(67000)));
        assert!(btc.percentage.is_some());

        let swap = exchange.ticker("BTC/USDT:USDT").await.unwrap();
        assert_eq!(swap.symbol, "BTC/USDT:USDT");
    }

    #[tokio::test]
    async fn test_unsupported_symbol() {
        let exchange = MockExchangeClient::new(ExchangeId::Okx);
        assert!(matches!(
            exchange.ticker("NOTREAL/USDT").await,
            Err(ExchangeError::SymbolNotFound { .. })
        ));
        assert!(exchange.ticker("SOL/USDT:USDT").await.is_err());
    }

    #[tokio::test]
    async fn test_orders_are_recorded() {
        let exchange = MockExchangeClient::new(ExchangeId::Okx);
        let request = OrderRequest::new("ETH/USDT", Side::Buy, OrderType::Limit, dec!(1)).with_price(dec!(3000));
        let order = exchange.create_spot_order(&request).await.unwrap();
        assert_eq!(order.id, "mock-1");
        assert_eq!(order.status, OrderStatus::Open);
        assert_eq!(exchange.submitted_orders().await.len(), 1);

        let invalid = OrderRequest::new("ETH/USDT", Side::Buy, OrderType::Limit, dec!(1));
        assert!(exchange.create_spot_order(&invalid).await.is_err());
        assert_eq!(exchange.submitted_orders().await.len(), 1);
    }

    #[tokio::test]
    async fn test_order_history_filters() {
        let exchange = MockExchangeClient::new(ExchangeId::Okx);
        assert_eq!(exchange.spot_orders(None).await.unwrap().len(), 3);
        assert_eq!(exchange.spot_open_orders(Some("BTC/USDT")).await.unwrap().len(), 1);
        assert_eq!(exchange.spot_closed_orders(None).await.unwrap().len(), 2);

        let binance = MockExchangeClient::new(ExchangeId::Binance);
        assert!(matches!(
            binance.spot_orders(None).await,
            Err(ExchangeError::SymbolRequired { .. })
        ));
    }

    #[tokio::test]
    async fn test_failing_client() {
        let exchange = MockExchangeClient::failing(ExchangeId::Binance, "maintenance");
        let err = exchange.tickers().await.unwrap_err().to_string();
        assert!(err.contains("maintenance"));
    }

    #[test]
    fn test_provider_without_credentials() {
        let exchanges = MockExchanges::without_credentials();
        assert!(exchanges.public(ExchangeId::Binance).is_ok());
        let err = exchanges.authenticated(ExchangeId::Binance).err().unwrap().to_string();
        assert!(err.contains("BINANCE_API_KEY"));
    }
}
