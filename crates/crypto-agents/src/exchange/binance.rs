//! Binance REST client
//!
//! Spot (`api.binance.com/api/v3`), USDⓈ-M perpetuals (`fapi.binance.com`)
//! and Simple Earn flexible products (`/sapi/v1/simple-earn`). Signed
//! requests carry `timestamp`, `recvWindow` and a hex HMAC-SHA256
//! `signature` over the query string.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::OnceCell;

use super::credentials::Credentials;
use super::{ExchangeClient, de, http};
use crate::error::{ExchangeError, Result};
use crate::model::{
    BalanceEntry, Candle, ExchangeCapabilities, ExchangeId, Fees, FundingRate, Limits, Market, MarketKind, MinMax,
    OpenInterest, Order, OrderBook, OrderRequest, OrderStatus, OrderType, Position, PositionSide, Precision,
    SavingsPosition, SavingsProduct, SavingsReceipt, Side, Ticker, Trade,
};
use crate::symbol::Symbol;

const SPOT_URL: &str = "https://api.binance.com";
const FUTURES_URL: &str = "https://fapi.binance.com";
const RECV_WINDOW: &str = "5000";

const INTERVALS: [&str; 15] = [
    "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "3d", "1w", "1M",
];
const OPEN_INTEREST_PERIODS: [&str; 9] = ["5m", "15m", "30m", "1h", "2h", "4h", "6h", "12h", "1d"];
const DEPTH_LIMITS: [usize; 7] = [5, 10, 20, 50, 100, 500, 1000];

#[derive(Clone, Copy)]
enum Venue {
    Spot,
    Futures,
}

impl Venue {
    fn of(symbol: &Symbol) -> Self {
        if symbol.is_swap() { Self::Futures } else { Self::Spot }
    }
}

pub struct BinanceClient {
    http: reqwest::Client,
    credentials: Option<Credentials>,
    spot_url: String,
    futures_url: String,
    spot_markets: OnceCell<Vec<Market>>,
    swap_markets: OnceCell<Vec<Market>>,
}

impl BinanceClient {
    pub fn new(http: reqwest::Client, credentials: Option<Credentials>) -> Self {
        Self {
            http,
            credentials,
            spot_url: SPOT_URL.into(),
            futures_url: FUTURES_URL.into(),
            spot_markets: OnceCell::new(),
            swap_markets: OnceCell::new(),
        }
    }

    /// Point spot and futures requests at other hosts (testnet, local mock)
    pub fn with_base_urls(mut self, spot: impl Into<String>, futures: impl Into<String>) -> Self {
        self.spot_url = spot.into();
        self.futures_url = futures.into();
        self
    }

    fn base(&self, venue: Venue) -> &str {
        match venue {
            Venue::Spot => &self.spot_url,
            Venue::Futures => &self.futures_url,
        }
    }

    fn credentials(&self) -> Result<&Credentials> {
        self.credentials.as_ref().ok_or_else(|| ExchangeError::MissingCredentials {
            exchange: ExchangeId::Binance.to_string(),
            key_var: "BINANCE_API_KEY".into(),
            secret_var: "BINANCE_SECRET".into(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, venue: Venue, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.base(venue), path);
        tracing::debug!(%url, "Binance public request");
        let response = self.http.get(&url).query(query).send().await?;
        http::decode(ExchangeId::Binance, response).await
    }

    async fn signed<T: DeserializeOwned>(
        &self,
        method: Method,
        venue: Venue,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        self.signed_at(method, venue, path, params, Utc::now().timestamp_millis()).await
    }

    async fn signed_at<T: DeserializeOwned>(
        &self,
        method: Method,
        venue: Venue,
        path: &str,
        params: &[(&str, String)],
        timestamp_ms: i64,
    ) -> Result<T> {
        let credentials = self.credentials()?;
        let query = signed_query(&credentials.secret, params, timestamp_ms)?;

        let url = format!("{}{}?{}", self.base(venue), path, query);
        tracing::debug!(%method, path, "Binance signed request");
        let response = self
            .http
            .request(method, &url)
            .header("X-MBX-APIKEY", &credentials.api_key)
            .send()
            .await?;
        http::decode(ExchangeId::Binance, response).await
    }

    async fn venue_markets(&self, kind: MarketKind) -> Result<&[Market]> {
        let cell = match kind {
            MarketKind::Spot => &self.spot_markets,
            MarketKind::Swap => &self.swap_markets,
        };
        let venue = match kind {
            MarketKind::Spot => Venue::Spot,
            MarketKind::Swap => Venue::Futures,
        };
        let path = match kind {
            MarketKind::Spot => "/api/v3/exchangeInfo",
            MarketKind::Swap => "/fapi/v1/exchangeInfo",
        };

        let markets = cell
            .get_or_try_init(|| async {
                let info: RawExchangeInfo = self.get(venue, path, &[]).await?;
                Ok::<_, ExchangeError>(parse_markets(info, kind))
            })
            .await?;
        Ok(markets.as_slice())
    }

    /// Venue id to unified symbol; unknown ids are returned unchanged
    async fn unified(&self, id: &str, kind: MarketKind) -> String {
        match self.venue_markets(kind).await {
            Ok(markets) => markets
                .iter()
                .find(|m| m.id == id)
                .map_or_else(|| id.to_string(), |m| m.symbol.clone()),
            Err(_) => id.to_string(),
        }
    }

    async fn orders(&self, raw: Vec<RawOrder>, kind: MarketKind) -> Result<Vec<Order>> {
        let mut orders = Vec::with_capacity(raw.len());
        for order in raw {
            let symbol = self.unified(&order.symbol, kind).await;
            orders.push(parse_order(order, symbol)?);
        }
        Ok(orders)
    }

    fn order_params(request: &OrderRequest, symbol: &Symbol) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("symbol", symbol.binance_id()),
            ("side", request.side.as_str().to_uppercase()),
            ("type", request.order_type.as_str().to_uppercase()),
            ("quantity", request.amount.normalize().to_string()),
        ];
        if request.order_type == OrderType::Limit {
            params.push(("timeInForce", "GTC".into()));
            if let Some(price) = request.price {
                params.push(("price", price.normalize().to_string()));
            }
        }
        if let Some(side) = request.position_side {
            params.push(("positionSide", side.as_str().to_uppercase()));
        }
        if let Some(id) = &request.client_order_id {
            params.push(("newClientOrderId", id.clone()));
        }
        params
    }

    async fn savings_product_id(&self, asset: &str) -> Result<String> {
        let page: RawRows<RawSavingsProduct> = self
            .signed(
                Method::GET,
                Venue::Spot,
                "/sapi/v1/simple-earn/flexible/list",
                &[("asset", asset.to_string()), ("size", "100".into())],
            )
            .await?;
        page.rows
            .into_iter()
            .find(|p| p.asset.eq_ignore_ascii_case(asset))
            .map(|p| p.product_id)
            .ok_or_else(|| ExchangeError::InvalidRequest(format!("binance has no flexible savings product for {asset}")))
    }
}

#[async_trait]
impl ExchangeClient for BinanceClient {
    fn id(&self) -> ExchangeId {
        ExchangeId::Binance
    }

    fn capabilities(&self) -> ExchangeCapabilities {
        ExchangeCapabilities {
            name: ExchangeId::Binance.display_name().into(),
            id: ExchangeId::Binance.as_str().into(),
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
        let symbol: Symbol = symbol.parse()?;
        let (venue, path) = match Venue::of(&symbol) {
            Venue::Spot => (Venue::Spot, "/api/v3/ticker/24hr"),
            Venue::Futures => (Venue::Futures, "/fapi/v1/ticker/24hr"),
        };
        let raw: RawTicker = self.get(venue, path, &[("symbol", symbol.binance_id())]).await?;
        Ok(parse_ticker(raw, symbol.to_string()))
    }

    async fn tickers(&self) -> Result<Vec<Ticker>> {
        let ids: HashMap<String, String> = self
            .venue_markets(MarketKind::Spot)
            .await?
            .iter()
            .map(|m| (m.id.clone(), m.symbol.clone()))
            .collect();
        let raw: Vec<RawTicker> = self.get(Venue::Spot, "/api/v3/ticker/24hr", &[]).await?;

        Ok(raw
            .into_iter()
            .filter_map(|t| {
                let symbol = ids.get(&t.symbol)?.clone();
                Some(parse_ticker(t, symbol))
            })
            .collect())
    }

    async fn order_book(&self, symbol: &str, limit: usize) -> Result<OrderBook> {
        let symbol: Symbol = symbol.parse()?;
        let depth = DEPTH_LIMITS.iter().copied().find(|d| *d >= limit).unwrap_or(1000);
        let (venue, path) = match Venue::of(&symbol) {
            Venue::Spot => (Venue::Spot, "/api/v3/depth"),
            Venue::Futures => (Venue::Futures, "/fapi/v1/depth"),
        };
        let raw: RawDepth = self
            .get(venue, path, &[("symbol", symbol.binance_id()), ("limit", depth.to_string())])
            .await?;
        Ok(parse_depth(raw, symbol.to_string(), limit))
    }

    async fn trades(&self, symbol: &str, limit: usize) -> Result<Vec<Trade>> {
        let symbol: Symbol = symbol.parse()?;
        let (venue, path) = match Venue::of(&symbol) {
            Venue::Spot => (Venue::Spot, "/api/v3/trades"),
            Venue::Futures => (Venue::Futures, "/fapi/v1/trades"),
        };
        let raw: Vec<RawTrade> = self
            .get(venue, path, &[("symbol", symbol.binance_id()), ("limit", limit.min(1000).to_string())])
            .await?;
        let unified = symbol.to_string();
        Ok(raw.into_iter().map(|t| parse_trade(t, unified.clone())).collect())
    }

    async fn markets(&self) -> Result<Vec<Market>> {
        let mut markets = self.venue_markets(MarketKind::Spot).await?.to_vec();
        markets.extend_from_slice(self.venue_markets(MarketKind::Swap).await?);
        Ok(markets)
    }

    async fn market(&self, symbol: &str) -> Result<Market> {
        let parsed: Symbol = symbol.parse()?;
        let unified = parsed.to_string();
        self.venue_markets(parsed.kind())
            .await?
            .iter()
            .find(|m| m.symbol == unified)
            .cloned()
            .ok_or_else(|| ExchangeError::SymbolNotFound {
                symbol: unified,
                exchange: self.id().to_string(),
            })
    }

    async fn candles(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<Candle>> {
        let symbol: Symbol = symbol.parse()?;
        if !INTERVALS.contains(&timeframe) {
            return Err(ExchangeError::UnsupportedTimeframe(timeframe.to_string()));
        }
        let (venue, path) = match Venue::of(&symbol) {
            Venue::Spot => (Venue::Spot, "/api/v3/klines"),
            Venue::Futures => (Venue::Futures, "/fapi/v1/klines"),
        };
        let rows: Vec<Vec<Value>> = self
            .get(
                venue,
                path,
                &[
                    ("symbol", symbol.binance_id()),
                    ("interval", timeframe.to_string()),
                    ("limit", limit.min(1000).to_string()),
                ],
            )
            .await?;
        de::candle_rows(&rows)
    }

    async fn funding_rate_history(&self, symbol: &str, limit: usize) -> Result<Vec<FundingRate>> {
        let symbol = Symbol::parse_swap(symbol)?;
        let raw: Vec<RawFundingRate> = self
            .get(
                Venue::Futures,
                "/fapi/v1/fundingRate",
                &[("symbol", symbol.binance_id()), ("limit", limit.min(1000).to_string())],
            )
            .await?;
        let unified = symbol.to_string();
        Ok(raw
            .into_iter()
            .map(|r| FundingRate {
                symbol: unified.clone(),
                rate: r.funding_rate,
                timestamp: r.funding_time,
            })
            .collect())
    }

    async fn open_interest_history(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<OpenInterest>> {
        let symbol = Symbol::parse_swap(symbol)?;
        if !OPEN_INTEREST_PERIODS.contains(&timeframe) {
            return Err(ExchangeError::UnsupportedTimeframe(timeframe.to_string()));
        }
        let raw: Vec<RawOpenInterest> = self
            .get(
                Venue::Futures,
                "/futures/data/openInterestHist",
                &[
                    ("symbol", symbol.binance_id()),
                    ("period", timeframe.to_string()),
                    ("limit", limit.min(500).to_string()),
                ],
            )
            .await?;
        let unified = symbol.to_string();
        Ok(raw
            .into_iter()
            .map(|r| OpenInterest {
                symbol: unified.clone(),
                amount: r.sum_open_interest,
                value: r.sum_open_interest_value,
                timestamp: r.timestamp.unwrap_or_default(),
            })
            .collect())
    }

    async fn spot_balance(&self) -> Result<Vec<BalanceEntry>> {
        let account: RawAccount = self.signed(Method::GET, Venue::Spot, "/api/v3/account", &[]).await?;
        Ok(account
            .balances
            .into_iter()
            .map(|b| BalanceEntry {
                total: b.free + b.locked,
                free: b.free,
                used: b.locked,
                asset: b.asset,
            })
            .collect())
    }

    async fn create_spot_order(&self, request: &OrderRequest) -> Result<Order> {
        request.validate()?;
        let symbol = Symbol::parse_spot(&request.symbol)?;
        let params = Self::order_params(request, &symbol);
        let raw: RawOrder = self.signed(Method::POST, Venue::Spot, "/api/v3/order", &params).await?;
        parse_order(raw, symbol.to_string())
    }

    async fn spot_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>> {
        let symbol = symbol.ok_or_else(|| ExchangeError::SymbolRequired {
            exchange: self.id().to_string(),
            operation: "spot order history".into(),
        })?;
        let symbol = Symbol::parse_spot(symbol)?;
        let raw: Vec<RawOrder> = self
            .signed(Method::GET, Venue::Spot, "/api/v3/allOrders", &[("symbol", symbol.binance_id())])
            .await?;
        raw.into_iter().map(|o| parse_order(o, symbol.to_string())).collect()
    }

    async fn spot_open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>> {
        let params = match symbol {
            Some(s) => vec![("symbol", Symbol::parse_spot(s)?.binance_id())],
            None => Vec::new(),
        };
        let raw: Vec<RawOrder> = self.signed(Method::GET, Venue::Spot, "/api/v3/openOrders", &params).await?;
        self.orders(raw, MarketKind::Spot).await
    }

    async fn spot_order(&self, order_id: &str, symbol: &str) -> Result<Order> {
        let symbol = Symbol::parse_spot(symbol)?;
        let raw: RawOrder = self
            .signed(
                Method::GET,
                Venue::Spot,
                "/api/v3/order",
                &[("symbol", symbol.binance_id()), ("orderId", order_id.to_string())],
            )
            .await?;
        parse_order(raw, symbol.to_string())
    }

    async fn cancel_spot_order(&self, order_id: &str, symbol: &str) -> Result<Order> {
        let symbol = Symbol::parse_spot(symbol)?;
        let raw: RawOrder = self
            .signed(
                Method::DELETE,
                Venue::Spot,
                "/api/v3/order",
                &[("symbol", symbol.binance_id()), ("orderId", order_id.to_string())],
            )
            .await?;
        parse_order(raw, symbol.to_string())
    }

    async fn futures_balance(&self) -> Result<Vec<BalanceEntry>> {
        let raw: Vec<RawFuturesBalance> = self.signed(Method::GET, Venue::Futures, "/fapi/v2/balance", &[]).await?;
        Ok(raw
            .into_iter()
            .map(|b| BalanceEntry {
                used: (b.balance - b.available_balance).max(Decimal::ZERO),
                free: b.available_balance,
                total: b.balance,
                asset: b.asset,
            })
            .collect())
    }

    async fn futures_positions(&self, symbol: Option<&str>) -> Result<Vec<Position>> {
        let params = match symbol {
            Some(s) => vec![("symbol", Symbol::parse_swap(s)?.binance_id())],
            None => Vec::new(),
        };
        let raw: Vec<RawPosition> = self.signed(Method::GET, Venue::Futures, "/fapi/v2/positionRisk", &params).await?;

        let mut positions = Vec::with_capacity(raw.len());
        for position in raw {
            let symbol = self.unified(&position.symbol, MarketKind::Swap).await;
            positions.push(parse_position(position, symbol));
        }
        Ok(positions)
    }

    async fn create_futures_order(&self, request: &OrderRequest) -> Result<Order> {
        request.validate()?;
        let symbol = Symbol::parse_swap(&request.symbol)?;
        let params = Self::order_params(request, &symbol);
        let raw: RawOrder = self.signed(Method::POST, Venue::Futures, "/fapi/v1/order", &params).await?;
        parse_order(raw, symbol.to_string())
    }

    async fn futures_open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>> {
        let params = match symbol {
            Some(s) => vec![("symbol", Symbol::parse_swap(s)?.binance_id())],
            None => Vec::new(),
        };
        let raw: Vec<RawOrder> = self.signed(Method::GET, Venue::Futures, "/fapi/v1/openOrders", &params).await?;
        self.orders(raw, MarketKind::Swap).await
    }

    async fn futures_closed_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>> {
        let symbol = symbol.ok_or_else(|| ExchangeError::SymbolRequired {
            exchange: self.id().to_string(),
            operation: "futures order history".into(),
        })?;
        let symbol = Symbol::parse_swap(symbol)?;
        let raw: Vec<RawOrder> = self
            .signed(Method::GET, Venue::Futures, "/fapi/v1/allOrders", &[("symbol", symbol.binance_id())])
            .await?;
        let orders: Vec<Order> = raw
            .into_iter()
            .map(|o| parse_order(o, symbol.to_string()))
            .collect::<Result<_>>()?;
        Ok(orders.into_iter().filter(|o| !o.status.is_open()).collect())
    }

    async fn futures_order(&self, order_id: &str, symbol: &str) -> Result<Order> {
        let symbol = Symbol::parse_swap(symbol)?;
        let raw: RawOrder = self
            .signed(
                Method::GET,
                Venue::Futures,
                "/fapi/v1/order",
                &[("symbol", symbol.binance_id()), ("orderId", order_id.to_string())],
            )
            .await?;
        parse_order(raw, symbol.to_string())
    }

    async fn cancel_futures_order(&self, order_id: &str, symbol: &str) -> Result<Order> {
        let symbol = Symbol::parse_swap(symbol)?;
        let raw: RawOrder = self
            .signed(
                Method::DELETE,
                Venue::Futures,
                "/fapi/v1/order",
                &[("symbol", symbol.binance_id()), ("orderId", order_id.to_string())],
            )
            .await?;
        parse_order(raw, symbol.to_string())
    }

    async fn savings_products(&self) -> Result<Vec<SavingsProduct>> {
        let page: RawRows<RawSavingsProduct> = self
            .signed(Method::GET, Venue::Spot, "/sapi/v1/simple-earn/flexible/list", &[("size", "100".into())])
            .await?;
        Ok(page
            .rows
            .into_iter()
            .map(|p| SavingsProduct {
                asset: p.asset,
                rate: p.latest_annual_percentage_rate,
                product_id: p.product_id,
            })
            .collect())
    }

    async fn savings_positions(&self) -> Result<Vec<SavingsPosition>> {
        let page: RawRows<RawSavingsPosition> = self
            .signed(Method::GET, Venue::Spot, "/sapi/v1/simple-earn/flexible/position", &[("size", "100".into())])
            .await?;
        Ok(page
            .rows
            .into_iter()
            .map(|p| SavingsPosition {
                asset: p.asset,
                amount: p.total_amount,
                earnings: p.cumulative_total_rewards,
                rate: p.latest_annual_percentage_rate,
            })
            .collect())
    }

    async fn subscribe_savings(&self, asset: &str, amount: Decimal) -> Result<SavingsReceipt> {
        let product_id = self.savings_product_id(asset).await?;
        let raw: RawSavingsAck = self
            .signed(
                Method::POST,
                Venue::Spot,
                "/sapi/v1/simple-earn/flexible/subscribe",
                &[("productId", product_id), ("amount", amount.normalize().to_string())],
            )
            .await?;
        Ok(SavingsReceipt {
            asset: asset.to_string(),
            amount,
            reference: raw.purchase_id.filter(|id| !id.is_empty()),
            success: raw.success,
        })
    }

    async fn redeem_savings(&self, asset: &str, amount: Decimal) -> Result<SavingsReceipt> {
        let product_id = self.savings_product_id(asset).await?;
        let raw: RawSavingsAck = self
            .signed(
                Method::POST,
                Venue::Spot,
                "/sapi/v1/simple-earn/flexible/redeem",
                &[("productId", product_id), ("amount", amount.normalize().to_string())],
            )
            .await?;
        Ok(SavingsReceipt {
            asset: asset.to_string(),
            amount,
            reference: raw.redeem_id.filter(|id| !id.is_empty()),
            success: raw.success,
        })
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTicker {
    symbol: String,
    #[serde(default, deserialize_with = "de::decimal")]
    last_price: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    bid_price: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    ask_price: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    high_price: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    low_price: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    open_price: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    volume: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    quote_volume: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    price_change: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    price_change_percent: Option<Decimal>,
    #[serde(default, deserialize_with = "de::millis")]
    close_time: Option<i64>,
}

#[derive(Deserialize)]
struct RawDepth {
    #[serde(default, rename = "lastUpdateId")]
    last_update_id: Option<i64>,
    #[serde(default, rename = "T")]
    transaction_time: Option<i64>,
    #[serde(default)]
    bids: Vec<Vec<Value>>,
    #[serde(default)]
    asks: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTrade {
    #[serde(deserialize_with = "de::id_string")]
    id: String,
    #[serde(deserialize_with = "de::decimal_or_zero")]
    price: Decimal,
    #[serde(deserialize_with = "de::decimal_or_zero")]
    qty: Decimal,
    time: i64,
    is_buyer_maker: bool,
}

#[derive(Deserialize)]
struct RawExchangeInfo {
    #[serde(default)]
    symbols: Vec<RawSymbol>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSymbol {
    symbol: String,
    status: String,
    base_asset: String,
    quote_asset: String,
    #[serde(default)]
    margin_asset: Option<String>,
    #[serde(default)]
    contract_type: Option<String>,
    #[serde(default)]
    is_margin_trading_allowed: bool,
    #[serde(default)]
    filters: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFundingRate {
    #[serde(deserialize_with = "de::decimal_or_zero")]
    funding_rate: Decimal,
    funding_time: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOpenInterest {
    #[serde(default, deserialize_with = "de::decimal")]
    sum_open_interest: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    sum_open_interest_value: Option<Decimal>,
    #[serde(default, deserialize_with = "de::millis")]
    timestamp: Option<i64>,
}

#[derive(Deserialize)]
struct RawAccount {
    #[serde(default)]
    balances: Vec<RawBalance>,
}

#[derive(Deserialize)]
struct RawBalance {
    asset: String,
    #[serde(deserialize_with = "de::decimal_or_zero")]
    free: Decimal,
    #[serde(deserialize_with = "de::decimal_or_zero")]
    locked: Decimal,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFuturesBalance {
    asset: String,
    #[serde(deserialize_with = "de::decimal_or_zero")]
    balance: Decimal,
    #[serde(deserialize_with = "de::decimal_or_zero")]
    available_balance: Decimal,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOrder {
    symbol: String,
    #[serde(deserialize_with = "de::id_string")]
    order_id: String,
    #[serde(default)]
    client_order_id: Option<String>,
    #[serde(default, deserialize_with = "de::decimal")]
    price: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    avg_price: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal_or_zero")]
    orig_qty: Decimal,
    #[serde(default, deserialize_with = "de::decimal_or_zero")]
    executed_qty: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    cummulative_quote_qty: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    cum_quote: Option<Decimal>,
    #[serde(default)]
    status: String,
    #[serde(default, rename = "type")]
    order_type: String,
    side: String,
    #[serde(default)]
    position_side: Option<String>,
    #[serde(default, deserialize_with = "de::millis")]
    time: Option<i64>,
    #[serde(default, deserialize_with = "de::millis")]
    transact_time: Option<i64>,
    #[serde(default, deserialize_with = "de::millis")]
    update_time: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPosition {
    symbol: String,
    #[serde(deserialize_with = "de::decimal_or_zero")]
    position_amt: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    entry_price: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    mark_price: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    un_realized_profit: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    notional: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    leverage: Option<Decimal>,
    #[serde(default)]
    position_side: String,
    #[serde(default, deserialize_with = "de::millis")]
    update_time: Option<i64>,
}

#[derive(Deserialize)]
struct RawRows<T> {
    #[serde(default = "Vec::new")]
    rows: Vec<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSavingsProduct {
    asset: String,
    #[serde(default, deserialize_with = "de::decimal_or_zero")]
    latest_annual_percentage_rate: Decimal,
    #[serde(default, deserialize_with = "de::id_string")]
    product_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSavingsPosition {
    asset: String,
    #[serde(default, deserialize_with = "de::decimal_or_zero")]
    total_amount: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    latest_annual_percentage_rate: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    cumulative_total_rewards: Option<Decimal>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSavingsAck {
    #[serde(default)]
    purchase_id: Option<String>,
    #[serde(default)]
    redeem_id: Option<String>,
    #[serde(default)]
    success: bool,
}

// ============================================================================
// Normalization
// ============================================================================

fn parse_ticker(raw: RawTicker, symbol: String) -> Ticker {
    Ticker {
        symbol,
        last: raw.last_price,
        bid: raw.bid_price,
        ask: raw.ask_price,
        high: raw.high_price,
        low: raw.low_price,
        open: raw.open_price,
        close: raw.last_price,
        base_volume: raw.volume,
        quote_volume: raw.quote_volume,
        change: raw.price_change,
        percentage: raw.price_change_percent,
        timestamp: raw.close_time,
    }
    .derive_change()
}

fn parse_depth(raw: RawDepth, symbol: String, limit: usize) -> OrderBook {
    let mut bids = de::levels(&raw.bids);
    let mut asks = de::levels(&raw.asks);
    bids.truncate(limit);
    asks.truncate(limit);
    OrderBook {
        symbol,
        bids,
        asks,
        timestamp: raw.transaction_time,
        nonce: raw.last_update_id,
    }
}

fn parse_trade(raw: RawTrade, symbol: String) -> Trade {
    Trade {
        id: raw.id,
        symbol,
        price: raw.price,
        amount: raw.qty,
        // The buyer being the maker means the aggressor sold
        side: if raw.is_buyer_maker { Side::Sell } else { Side::Buy },
        timestamp: raw.time,
    }
}

fn filter_value(filters: &[Value], filter_type: &str, keys: &[&str]) -> Option<Decimal> {
    let filter = filters
        .iter()
        .find(|f| f.get("filterType").and_then(Value::as_str) == Some(filter_type))?;
    keys.iter()
        .find_map(|key| filter.get(*key).and_then(de::parse_decimal))
        .filter(|v| !v.is_zero())
}

fn parse_markets(info: RawExchangeInfo, kind: MarketKind) -> Vec<Market> {
    info.symbols
        .into_iter()
        .filter(|s| kind == MarketKind::Spot || s.contract_type.as_deref() == Some("PERPETUAL"))
        .map(|s| {
            let (symbol, settle, contract_size, fees) = match kind {
                MarketKind::Spot => (
                    Symbol::spot(&s.base_asset, &s.quote_asset),
                    None,
                    None,
                    Fees { maker: Some(dec!(0.001)), taker: Some(dec!(0.001)) },
                ),
                MarketKind::Swap => {
                    let settle = s.margin_asset.clone().unwrap_or_else(|| s.quote_asset.clone());
                    (
                        Symbol::swap(&s.base_asset, &s.quote_asset, &settle),
                        Some(settle),
                        Some(Decimal::ONE),
                        Fees { maker: Some(dec!(0.0002)), taker: Some(dec!(0.0005)) },
                    )
                }
            };

            Market {
                id: s.symbol,
                symbol: symbol.to_string(),
                base: s.base_asset,
                quote: s.quote_asset,
                settle,
                active: s.status == "TRADING",
                kind,
                margin: s.is_margin_trading_allowed,
                contract_size,
                precision: Precision {
                    price: filter_value(&s.filters, "PRICE_FILTER", &["tickSize"]),
                    amount: filter_value(&s.filters, "LOT_SIZE", &["stepSize"]),
                },
                limits: Limits {
                    amount: MinMax {
                        min: filter_value(&s.filters, "LOT_SIZE", &["minQty"]),
                        max: filter_value(&s.filters, "LOT_SIZE", &["maxQty"]),
                    },
                    price: MinMax {
                        min: filter_value(&s.filters, "PRICE_FILTER", &["minPrice"]),
                        max: filter_value(&s.filters, "PRICE_FILTER", &["maxPrice"]),
                    },
                    cost: MinMax {
                        min: filter_value(&s.filters, "NOTIONAL", &["minNotional"])
                            .or_else(|| filter_value(&s.filters, "MIN_NOTIONAL", &["minNotional", "notional"])),
                        max: filter_value(&s.filters, "NOTIONAL", &["maxNotional"]),
                    },
                },
                fees,
            }
        })
        .collect()
}

fn order_status(status: &str) -> OrderStatus {
    match status {
        "FILLED" => OrderStatus::Closed,
        "CANCELED" => OrderStatus::Canceled,
        "EXPIRED" | "EXPIRED_IN_MATCH" => OrderStatus::Expired,
        "REJECTED" => OrderStatus::Rejected,
        _ => OrderStatus::Open,
    }
}

fn parse_order(raw: RawOrder, symbol: String) -> Result<Order> {
    let side: Side = raw.side.parse()?;
    let order_type = if raw.order_type.contains("MARKET") && !raw.order_type.contains("LIMIT") {
        OrderType::Market
    } else {
        OrderType::Limit
    };
    let cost = raw.cum_quote.or(raw.cummulative_quote_qty);
    let average = raw.avg_price.filter(|p| !p.is_zero()).or_else(|| match cost {
        Some(cost) if !raw.executed_qty.is_zero() => Some(cost / raw.executed_qty),
        _ => None,
    });
    let position_side = match raw.position_side.as_deref() {
        Some("LONG") => Some(PositionSide::Long),
        Some("SHORT") => Some(PositionSide::Short),
        _ => None,
    };

    Ok(Order {
        id: raw.order_id,
        client_order_id: raw.client_order_id,
        symbol,
        side,
        order_type,
        status: order_status(&raw.status),
        price: raw.price.filter(|p| !p.is_zero()),
        average,
        remaining: (raw.orig_qty - raw.executed_qty).max(Decimal::ZERO),
        amount: raw.orig_qty,
        filled: raw.executed_qty,
        cost,
        fee: None,
        position_side,
        timestamp: raw.time.or(raw.transact_time).or(raw.update_time),
        last_trade_timestamp: raw.update_time,
    })
}

fn parse_position(raw: RawPosition, symbol: String) -> Position {
    let side = match raw.position_side.as_str() {
        "LONG" => PositionSide::Long,
        "SHORT" => PositionSide::Short,
        _ if raw.position_amt < Decimal::ZERO => PositionSide::Short,
        _ => PositionSide::Long,
    };
    let percentage = match (raw.un_realized_profit, raw.notional, raw.leverage) {
        (Some(pnl), Some(notional), Some(leverage)) if !notional.is_zero() && !leverage.is_zero() => {
            Some((pnl / (notional.abs() / leverage) * Decimal::ONE_HUNDRED).round_dp(2))
        }
        _ => None,
    };

    Position {
        symbol,
        side,
        contracts: raw.position_amt.abs(),
        notional: raw.notional.map(|n| n.abs()),
        unrealized_pnl: raw.un_realized_profit,
        percentage,
        entry_price: raw.entry_price.filter(|p| !p.is_zero()),
        mark_price: raw.mark_price,
        leverage: raw.leverage,
        timestamp: raw.update_time,
    }
}

/// `params&recvWindow&timestamp&signature`, the signature being the hex
/// HMAC of everything before it
fn signed_query(secret: &str, params: &[(&str, String)], timestamp_ms: i64) -> Result<String> {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        query.append_pair(key, value);
    }
    query.append_pair("recvWindow", RECV_WINDOW);
    query.append_pair("timestamp", &timestamp_ms.to_string());
    let query = query.finish();
    let signature = http::sign_hex(secret, &query)?;
    Ok(format!("{query}&signature={signature}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_ticker() {
        let raw: RawTicker = serde_json::from_value(json!({
            "symbol": "BTCUSDT", "priceChange": "-94.99", "priceChangePercent": "-0.095",
            "lastPrice": "99910.01", "bidPrice": "99910.00", "askPrice": "99910.01",
            "openPrice": "100005.00", "highPrice": "101000", "lowPrice": "99000",
            "volume": "12000.5", "quoteVolume": "1200000000", "closeTime": 1_700_000_000_000_i64
        }))
        .unwrap();
        let ticker = parse_ticker(raw, "BTC/USDT".into());
        assert_eq!(ticker.last, Some(dec!(99910.01)));
        assert_eq!(ticker.close, ticker.last);
        assert_eq!(ticker.change, Some(dec!(-94.99)));
        assert_eq!(ticker.timestamp, Some(1_700_000_000_000));
    }

    #[test]
    fn test_parse_depth_truncates() {
        let raw: RawDepth = serde_json::from_value(json!({
            "lastUpdateId": 1027024,
            "bids": [["4.00", "431"], ["3.99", "10"], ["3.98", "1"]],
            "asks": [["4.01", "12"], ["4.02", "5"]]
        }))
        .unwrap();
        let book = parse_depth(raw, "BNB/BTC".into(), 2);
        assert_eq!(book.bids.len(), 2);
        assert_eq!(book.asks[0], (dec!(4.01), dec!(12)));
        assert_eq!(book.nonce, Some(1_027_024));
    }

    #[test]
    fn test_trade_side_from_maker_flag() {
        let raw: RawTrade = serde_json::from_value(json!({
            "id": 28457, "price": "4.00", "qty": "12.00", "quoteQty": "48.00",
            "time": 1_499_865_549_590_i64, "isBuyerMaker": true, "isBestMatch": true
        }))
        .unwrap();
        let trade = parse_trade(raw, "BNB/BTC".into());
        assert_eq!(trade.side, Side::Sell);
        assert_eq!(trade.id, "28457");
    }

    #[test]
    fn test_parse_markets() {
        let spot: RawExchangeInfo = serde_json::from_value(json!({"symbols": [{
            "symbol": "BTCUSDT", "status": "TRADING", "baseAsset": "BTC", "quoteAsset": "USDT",
            "isMarginTradingAllowed": true,
            "filters": [
                {"filterType": "PRICE_FILTER", "minPrice": "0.01", "maxPrice": "1000000", "tickSize": "0.01"},
                {"filterType": "LOT_SIZE", "minQty": "0.00001", "maxQty": "9000", "stepSize": "0.00001"},
                {"filterType": "NOTIONAL", "minNotional": "5.0", "maxNotional": "9000000"}
            ]
        }]}))
        .unwrap();
        let market = &parse_markets(spot, MarketKind::Spot)[0];
        assert_eq!(market.symbol, "BTC/USDT");
        assert!(market.margin);
        assert_eq!(market.precision.price, Some(dec!(0.01)));
        assert_eq!(market.limits.cost.min, Some(dec!(5)));

        let futures: RawExchangeInfo = serde_json::from_value(json!({"symbols": [
            {"symbol": "BTCUSDT", "status": "TRADING", "baseAsset": "BTC", "quoteAsset": "USDT",
             "marginAsset": "USDT", "contractType": "PERPETUAL",
             "filters": [{"filterType": "LOT_SIZE", "minQty": "0.001", "maxQty": "1000", "stepSize": "0.001"}]},
            {"symbol": "BTCUSDT_250328", "status": "TRADING", "baseAsset": "BTC", "quoteAsset": "USDT",
             "marginAsset": "USDT", "contractType": "CURRENT_QUARTER", "filters": []}
        ]}))
        .unwrap();
        let swaps = parse_markets(futures, MarketKind::Swap);
        assert_eq!(swaps.len(), 1);
        assert_eq!(swaps[0].symbol, "BTC/USDT:USDT");
        assert_eq!(swaps[0].contract_size, Some(Decimal::ONE));
        assert_eq!(swaps[0].precision.amount, Some(dec!(0.001)));
    }

    #[test]
    fn test_parse_spot_order() {
        let raw: RawOrder = serde_json::from_value(json!({
            "symbol": "BTCUSDT", "orderId": 28, "clientOrderId": "6gCrw2kRUAF9CvJDGP16IP",
            "transactTime": 1_507_725_176_595_i64, "price": "0.00000000", "origQty": "10.00000000",
            "executedQty": "4.00000000", "cummulativeQuoteQty": "40.00000000",
            "status": "PARTIALLY_FILLED", "type": "MARKET", "side": "SELL"
        }))
        .unwrap();
        let order = parse_order(raw, "BTC/USDT".into()).unwrap();
        assert_eq!(order.id, "28");
        assert_eq!(order.order_type, OrderType::Market);
        assert_eq!(order.status, OrderStatus::Open);
        assert_eq!(order.price, None);
        assert_eq!(order.average, Some(dec!(10)));
        assert_eq!(order.remaining, dec!(6));
        assert_eq!(order.timestamp, Some(1_507_725_176_595));
    }

    #[test]
    fn test_parse_hedged_position() {
        let raw: RawPosition = serde_json::from_value(json!({
            "symbol": "BTCUSDT", "positionAmt": "-0.010", "entryPrice": "60000", "markPrice": "59000",
            "unRealizedProfit": "10.0", "notional": "-590", "leverage": "10", "positionSide": "SHORT",
            "updateTime": 1_700_000_000_000_i64
        }))
        .unwrap();
        let position = parse_position(raw, "BTC/USDT:USDT".into());
        assert_eq!(position.side, PositionSide::Short);
        assert_eq!(position.contracts, dec!(0.010));
        assert_eq!(position.notional, Some(dec!(590)));
        assert_eq!(position.percentage, Some(dec!(16.95)));
    }

    #[test]
    fn test_order_params() {
        let request = OrderRequest::new("BTC/USDT:USDT", Side::Buy, OrderType::Limit, dec!(0.010))
            .with_price(dec!(60000.50))
            .with_position_side(PositionSide::Long);
        let symbol = Symbol::parse_swap(&request.symbol).unwrap();
        let params: HashMap<_, _> = BinanceClient::order_params(&request, &symbol).into_iter().collect();
        assert_eq!(params["symbol"], "BTCUSDT");
        assert_eq!(params["side"], "BUY");
        assert_eq!(params["quantity"], "0.01");
        assert_eq!(params["price"], "60000.5");
        assert_eq!(params["timeInForce"], "GTC");
        assert_eq!(params["positionSide"], "LONG");
    }

    #[tokio::test]
    async fn test_private_calls_need_credentials() {
        let client = BinanceClient::new(reqwest::Client::new(), None);
        let err = client.spot_balance().await.unwrap_err();
        assert!(matches!(err, ExchangeError::MissingCredentials { .. }));

        let err = client.spot_orders(None).await.unwrap_err();
        assert!(matches!(err, ExchangeError::SymbolRequired { .. }));
    }

    const SECRET: &str = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";

    fn mocked(server: &httpmock::MockServer) -> BinanceClient {
        BinanceClient::new(reqwest::Client::new(), Some(Credentials::new("test-key", SECRET)))
            .with_base_urls(server.base_url(), server.base_url())
    }

    #[test]
    fn test_signed_query_layout() {
        let query = signed_query(SECRET, &[("symbol", "BTCUSDT".into())], 1_700_000_000_000).unwrap();
        let (payload, signature) = query.split_once("&signature=").unwrap();
        assert_eq!(payload, "symbol=BTCUSDT&recvWindow=5000&timestamp=1700000000000");
        assert_eq!(signature, http::sign_hex(SECRET, payload).unwrap());
    }

    #[tokio::test]
    async fn test_signed_request_over_http() {
        use httpmock::prelude::*;

        let server = MockServer::start_async().await;
        let signature =
            http::sign_hex(SECRET, "symbol=BTCUSDT&recvWindow=5000&timestamp=1700000000000").unwrap();
        let mock = server
            .mock_async(|when, then| {
                when.method(DELETE)
                    .path("/fapi/v1/order")
                    .query_param("symbol", "BTCUSDT")
                    .query_param("recvWindow", "5000")
                    .query_param("timestamp", "1700000000000")
                    .query_param("signature", signature.as_str())
                    .header("X-MBX-APIKEY", "test-key");
                then.status(200).json_body(json!({"orderId": 42}));
            })
            .await;

        let body: Value = mocked(&server)
            .signed_at(
                Method::DELETE,
                Venue::Futures,
                "/fapi/v1/order",
                &[("symbol", "BTCUSDT".into())],
                1_700_000_000_000,
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(body["orderId"], 42);
    }

    #[tokio::test]
    async fn test_spot_balance_over_http() {
        use httpmock::prelude::*;

        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v3/account")
                    .query_param("recvWindow", "5000")
                    .query_param_exists("timestamp")
                    .query_param_exists("signature")
                    .header("X-MBX-APIKEY", "test-key");
                then.status(200).json_body(json!({"balances": [
                    {"asset": "USDT", "free": "150.5", "locked": "49.5"},
                    {"asset": "BTC", "free": "0.002", "locked": "0"}
                ]}));
            })
            .await;

        let balances = mocked(&server).spot_balance().await.unwrap();

        mock.assert_async().await;
        assert_eq!(balances.len(), 2);
        assert_eq!(balances[0].asset, "USDT");
        assert_eq!(balances[0].total, dec!(200));
        assert_eq!(balances[1].used, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_api_error_body_over_http() {
        use httpmock::prelude::*;

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v3/account");
                then.status(401).json_body(json!({"code": -2015, "msg": "Invalid API-key, IP, or permissions for action."}));
            })
            .await;

        let err = mocked(&server).spot_balance().await.unwrap_err();
        assert!(matches!(err, ExchangeError::Api { ref code, .. } if code == "-2015"));
    }
}
