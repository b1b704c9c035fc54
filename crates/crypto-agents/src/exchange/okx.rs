//! OKX v5 REST client
//!
//! Every response is wrapped as `{"code": "0", "msg": "", "data": [...]}`.
//! Private requests sign `timestamp + METHOD + path?query + body` with
//! base64 HMAC-SHA256 and send the `OK-ACCESS-*` headers.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::OnceCell;

use super::credentials::Credentials;
use super::{ExchangeClient, de, http};
use crate::error::{ExchangeError, Result};
use crate::model::{
    BalanceEntry, Candle, ExchangeCapabilities, ExchangeId, Fee, Fees, FundingRate, Limits, Market, MarketKind,
    MinMax, OpenInterest, Order, OrderBook, OrderRequest, OrderStatus, OrderType, Position, PositionSide, Precision,
    SavingsPosition, SavingsProduct, SavingsReceipt, Side, Ticker, Trade,
};
use crate::symbol::Symbol;

const BASE_URL: &str = "https://www.okx.com";

const MAX_BOOK_DEPTH: usize = 400;
const MAX_TRADES: usize = 500;
const MAX_CANDLES: usize = 300;
const MAX_FUNDING: usize = 100;

/// Fixed lending rate sent with savings purchases (OKX minimum)
const SAVINGS_LENDING_RATE: &str = "0.01";

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(deserialize_with = "de::id_string")]
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<Vec<T>> {
        if self.code == "0" {
            Ok(self.data)
        } else {
            Err(ExchangeError::Api {
                exchange: ExchangeId::Okx.to_string(),
                code: self.code,
                message: self.msg,
            })
        }
    }
}

pub struct OkxClient {
    http: reqwest::Client,
    credentials: Option<Credentials>,
    base_url: String,
    spot_markets: OnceCell<Vec<Market>>,
    swap_markets: OnceCell<Vec<Market>>,
}

impl OkxClient {
    pub fn new(http: reqwest::Client, credentials: Option<Credentials>) -> Self {
        Self {
            http,
            credentials,
            base_url: BASE_URL.into(),
            spot_markets: OnceCell::new(),
            swap_markets: OnceCell::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn credentials(&self) -> Result<(&Credentials, &str)> {
        self.credentials
            .as_ref()
            .and_then(|c| c.password.as_deref().map(|p| (c, p)))
            .ok_or_else(|| ExchangeError::MissingCredentials {
                exchange: ExchangeId::Okx.to_string(),
                key_var: "OKX_API_KEY, OKX_SECRET".into(),
                secret_var: "OKX_PASSWORD".into(),
            })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<T>> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(%url, "OKX public request");
        let response = self.http.get(&url).query(query).send().await?;
        let envelope: Envelope<T> = http::decode(ExchangeId::Okx, response).await?;
        envelope.into_data()
    }

    async fn signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Vec<T>> {
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
        self.signed_at(method, path, query, body, timestamp).await
    }

    async fn signed_at<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        timestamp: String,
    ) -> Result<Vec<T>> {
        let (credentials, passphrase) = self.credentials()?;

        let request_path = if query.is_empty() {
            path.to_string()
        } else {
            let mut serializer = url::form_urlencoded::Serializer::new(String::new());
            for (key, value) in query {
                serializer.append_pair(key, value);
            }
            format!("{path}?{}", serializer.finish())
        };
        let body = body.map(Value::to_string).unwrap_or_default();
        let signature = http::sign_base64(&credentials.secret, &prehash(&timestamp, &method, &request_path, &body))?;

        tracing::debug!(%method, path, "OKX signed request");
        let mut request = self
            .http
            .request(method, format!("{}{request_path}", self.base_url))
            .header("OK-ACCESS-KEY", &credentials.api_key)
            .header("OK-ACCESS-SIGN", signature)
            .header("OK-ACCESS-TIMESTAMP", timestamp)
            .header("OK-ACCESS-PASSPHRASE", passphrase)
            .header("Content-Type", "application/json");
        if !body.is_empty() {
            request = request.body(body);
        }

        let envelope: Envelope<T> = http::decode(ExchangeId::Okx, request.send().await?).await?;
        envelope.into_data()
    }

    async fn venue_markets(&self, kind: MarketKind) -> Result<&[Market]> {
        let (cell, inst_type) = match kind {
            MarketKind::Spot => (&self.spot_markets, "SPOT"),
            MarketKind::Swap => (&self.swap_markets, "SWAP"),
        };
        let markets = cell
            .get_or_try_init(|| async {
                let raw: Vec<RawInstrument> = self
                    .get("/api/v5/public/instruments", &[("instType", inst_type.to_string())])
                    .await?;
                Ok::<_, ExchangeError>(raw.into_iter().filter_map(parse_instrument).collect::<Vec<_>>())
            })
            .await?;
        Ok(markets.as_slice())
    }

    async fn contract_size(&self, symbol: &Symbol) -> Decimal {
        let unified = symbol.to_string();
        self.venue_markets(MarketKind::Swap)
            .await
            .ok()
            .and_then(|markets| markets.iter().find(|m| m.symbol == unified).and_then(|m| m.contract_size))
            .unwrap_or(Decimal::ONE)
    }

    async fn place(&self, request: &OrderRequest, symbol: &Symbol) -> Result<Order> {
        request.validate()?;
        let body = order_body(request, symbol);
        let acks: Vec<RawOrderAck> = self.signed(Method::POST, "/api/v5/trade/order", &[], Some(&body)).await?;
        let ack = first_ack(acks)?;

        Ok(Order {
            id: ack.ord_id,
            client_order_id: ack.cl_ord_id.filter(|id| !id.is_empty()),
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
            timestamp: Some(Utc::now().timestamp_millis()),
            last_trade_timestamp: None,
        })
    }

    async fn list_orders(&self, path: &str, kind: MarketKind, symbol: Option<&str>) -> Result<Vec<Order>> {
        let mut query = vec![(
            "instType",
            match kind {
                MarketKind::Spot => "SPOT".to_string(),
                MarketKind::Swap => "SWAP".to_string(),
            },
        )];
        if let Some(symbol) = symbol {
            let symbol = match kind {
                MarketKind::Spot => Symbol::parse_spot(symbol)?,
                MarketKind::Swap => Symbol::parse_swap(symbol)?,
            };
            query.push(("instId", symbol.okx_id()));
        }
        let raw: Vec<RawOrder> = self.signed(Method::GET, path, &query, None).await?;
        let mut orders = Vec::with_capacity(raw.len());
        for order in raw {
            let contract_size = self.swap_contract_size(&order).await;
            orders.push(parse_order(order, contract_size)?);
        }
        Ok(orders)
    }

    /// Contract size of a swap order's instrument; `None` for spot
    async fn swap_contract_size(&self, order: &RawOrder) -> Option<Decimal> {
        let symbol = Symbol::from_okx_id(&order.inst_id)?;
        symbol.is_swap().then_some(())?;
        Some(self.contract_size(&symbol).await)
    }

    async fn order_detail(&self, order_id: &str, symbol: &Symbol) -> Result<Order> {
        let raw: Vec<RawOrder> = self
            .signed(
                Method::GET,
                "/api/v5/trade/order",
                &[("instId", symbol.okx_id()), ("ordId", order_id.to_string())],
                None,
            )
            .await?;
        let order = raw
            .into_iter()
            .next()
            .ok_or_else(|| ExchangeError::InvalidRequest(format!("okx has no order {order_id} for {symbol}")))?;
        let contract_size = self.swap_contract_size(&order).await;
        parse_order(order, contract_size)
    }

    async fn cancel(&self, order_id: &str, symbol: &Symbol) -> Result<Order> {
        let body = json!({ "instId": symbol.okx_id(), "ordId": order_id });
        let acks: Vec<RawOrderAck> = self
            .signed(Method::POST, "/api/v5/trade/cancel-order", &[], Some(&body))
            .await?;
        first_ack(acks)?;
        self.order_detail(order_id, symbol).await
    }

    async fn balances(&self) -> Result<Vec<BalanceEntry>> {
        let accounts: Vec<RawAccount> = self.signed(Method::GET, "/api/v5/account/balance", &[], None).await?;
        Ok(accounts
            .into_iter()
            .flat_map(|a| a.details)
            .map(|d| {
                let total = d.eq.unwrap_or(d.avail_bal + d.frozen_bal);
                BalanceEntry {
                    asset: d.ccy,
                    free: d.avail_bal,
                    used: d.frozen_bal,
                    total,
                }
            })
            .collect())
    }

    async fn savings_receipt(&self, asset: &str, amount: Decimal, side: &str) -> Result<SavingsReceipt> {
        let mut body = json!({
            "ccy": asset.to_uppercase(),
            "amt": amount.normalize().to_string(),
            "side": side,
        });
        if side == "purchase" {
            body["rate"] = json!(SAVINGS_LENDING_RATE);
        }
        let data: Vec<Value> = self
            .signed(Method::POST, "/api/v5/finance/savings/purchase-redempt", &[], Some(&body))
            .await?;
        Ok(SavingsReceipt {
            asset: asset.to_uppercase(),
            amount,
            reference: None,
            success: !data.is_empty(),
        })
    }
}

#[async_trait]
impl ExchangeClient for OkxClient {
    fn id(&self) -> ExchangeId {
        ExchangeId::Okx
    }

    fn capabilities(&self) -> ExchangeCapabilities {
        ExchangeCapabilities {
            name: ExchangeId::Okx.display_name().into(),
            id: ExchangeId::Okx.as_str().into(),
            has_fetch_ticker: true,
            has_fetch_order_book: true,
            has_fetch_trades: true,
            has_fetch_ohlcv: true,
            has_fetch_funding_rate_history: true,
            has_fetch_open_interest_history: true,
            rate_limit: 100,
        }
    }

    async fn ticker(&self, symbol: &str) -> Result<Ticker> {
        let symbol: Symbol = symbol.parse()?;
        let raw: Vec<RawTicker> = self.get("/api/v5/market/ticker", &[("instId", symbol.okx_id())]).await?;
        let raw = raw.into_iter().next().ok_or_else(|| ExchangeError::SymbolNotFound {
            symbol: symbol.to_string(),
            exchange: self.id().to_string(),
        })?;
        Ok(parse_ticker(raw, &symbol))
    }

    async fn tickers(&self) -> Result<Vec<Ticker>> {
        let raw: Vec<RawTicker> = self.get("/api/v5/market/tickers", &[("instType", "SPOT".into())]).await?;
        Ok(raw
            .into_iter()
            .filter_map(|t| {
                let symbol = Symbol::from_okx_id(&t.inst_id)?;
                Some(parse_ticker(t, &symbol))
            })
            .collect())
    }

    async fn order_book(&self, symbol: &str, limit: usize) -> Result<OrderBook> {
        let symbol: Symbol = symbol.parse()?;
        let raw: Vec<RawBook> = self
            .get(
                "/api/v5/market/books",
                &[("instId", symbol.okx_id()), ("sz", limit.clamp(1, MAX_BOOK_DEPTH).to_string())],
            )
            .await?;
        let raw = raw
            .into_iter()
            .next()
            .ok_or_else(|| ExchangeError::decode("empty order book response"))?;
        Ok(parse_book(raw, symbol.to_string(), limit))
    }

    async fn trades(&self, symbol: &str, limit: usize) -> Result<Vec<Trade>> {
        let symbol: Symbol = symbol.parse()?;
        let raw: Vec<RawTrade> = self
            .get(
                "/api/v5/market/trades",
                &[("instId", symbol.okx_id()), ("limit", limit.clamp(1, MAX_TRADES).to_string())],
            )
            .await?;
        parse_trades(raw, &symbol.to_string())
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
        let bar = candle_bar(timeframe).ok_or_else(|| ExchangeError::UnsupportedTimeframe(timeframe.to_string()))?;
        let rows: Vec<Vec<Value>> = self
            .get(
                "/api/v5/market/candles",
                &[
                    ("instId", symbol.okx_id()),
                    ("bar", bar.to_string()),
                    ("limit", limit.clamp(1, MAX_CANDLES).to_string()),
                ],
            )
            .await?;
        let mut candles = de::candle_rows(&rows)?;
        candles.reverse();
        Ok(candles)
    }

    async fn funding_rate_history(&self, symbol: &str, limit: usize) -> Result<Vec<FundingRate>> {
        let symbol = Symbol::parse_swap(symbol)?;
        let raw: Vec<RawFundingRate> = self
            .get(
                "/api/v5/public/funding-rate-history",
                &[("instId", symbol.okx_id()), ("limit", limit.clamp(1, MAX_FUNDING).to_string())],
            )
            .await?;
        let unified = symbol.to_string();
        Ok(raw
            .into_iter()
            .rev()
            .map(|r| FundingRate {
                symbol: unified.clone(),
                rate: r.funding_rate,
                timestamp: r.funding_time.unwrap_or_default(),
            })
            .collect())
    }

    async fn open_interest_history(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<OpenInterest>> {
        let symbol = Symbol::parse_swap(symbol)?;
        let period = open_interest_period(timeframe)
            .ok_or_else(|| ExchangeError::UnsupportedTimeframe(timeframe.to_string()))?;
        let rows: Vec<Vec<Value>> = self
            .get(
                "/api/v5/rubik/stat/contracts/open-interest-history",
                &[
                    ("instId", symbol.okx_id()),
                    ("period", period.to_string()),
                    ("limit", limit.clamp(1, 100).to_string()),
                ],
            )
            .await?;
        Ok(parse_open_interest(&rows, &symbol.to_string()))
    }

    async fn spot_balance(&self) -> Result<Vec<BalanceEntry>> {
        self.balances().await
    }

    async fn create_spot_order(&self, request: &OrderRequest) -> Result<Order> {
        let symbol = Symbol::parse_spot(&request.symbol)?;
        self.place(request, &symbol).await
    }

    async fn spot_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>> {
        let mut orders = self.spot_open_orders(symbol).await?;
        orders.extend(self.spot_closed_orders(symbol).await?);
        Ok(orders)
    }

    async fn spot_open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>> {
        self.list_orders("/api/v5/trade/orders-pending", MarketKind::Spot, symbol)
            .await
    }

    async fn spot_closed_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>> {
        self.list_orders("/api/v5/trade/orders-history", MarketKind::Spot, symbol)
            .await
    }

    async fn spot_order(&self, order_id: &str, symbol: &str) -> Result<Order> {
        self.order_detail(order_id, &Symbol::parse_spot(symbol)?).await
    }

    async fn cancel_spot_order(&self, order_id: &str, symbol: &str) -> Result<Order> {
        self.cancel(order_id, &Symbol::parse_spot(symbol)?).await
    }

    async fn futures_balance(&self) -> Result<Vec<BalanceEntry>> {
        // Unified account: one balance serves spot and derivatives
        self.balances().await
    }

    async fn futures_positions(&self, symbol: Option<&str>) -> Result<Vec<Position>> {
        let mut query = vec![("instType", "SWAP".to_string())];
        if let Some(symbol) = symbol {
            query.push(("instId", Symbol::parse_swap(symbol)?.okx_id()));
        }
        let raw: Vec<RawPosition> = self.signed(Method::GET, "/api/v5/account/positions", &query, None).await?;
        Ok(raw.into_iter().filter_map(parse_position).collect())
    }

    async fn create_futures_order(&self, request: &OrderRequest) -> Result<Order> {
        let symbol = Symbol::parse_swap(&request.symbol)?;
        self.place(request, &symbol).await
    }

    async fn futures_open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>> {
        self.list_orders("/api/v5/trade/orders-pending", MarketKind::Swap, symbol)
            .await
    }

    async fn futures_closed_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>> {
        self.list_orders("/api/v5/trade/orders-history", MarketKind::Swap, symbol)
            .await
    }

    async fn futures_order(&self, order_id: &str, symbol: &str) -> Result<Order> {
        self.order_detail(order_id, &Symbol::parse_swap(symbol)?).await
    }

    async fn cancel_futures_order(&self, order_id: &str, symbol: &str) -> Result<Order> {
        self.cancel(order_id, &Symbol::parse_swap(symbol)?).await
    }

    async fn savings_products(&self) -> Result<Vec<SavingsProduct>> {
        let raw: Vec<RawLendingRate> = self
            .signed(Method::GET, "/api/v5/finance/savings/lending-rate-summary", &[], None)
            .await?;
        Ok(raw
            .into_iter()
            .map(|r| SavingsProduct {
                product_id: r.ccy.clone(),
                asset: r.ccy,
                rate: r.pre_rate.or(r.avg_rate).unwrap_or_default(),
            })
            .collect())
    }

    async fn savings_positions(&self) -> Result<Vec<SavingsPosition>> {
        let raw: Vec<RawSavingsBalance> = self
            .signed(Method::GET, "/api/v5/finance/savings/balance", &[], None)
            .await?;
        Ok(raw
            .into_iter()
            .map(|b| SavingsPosition {
                asset: b.ccy,
                amount: b.amt,
                earnings: b.earnings,
                rate: b.rate,
            })
            .collect())
    }

    async fn subscribe_savings(&self, asset: &str, amount: Decimal) -> Result<SavingsReceipt> {
        self.savings_receipt(asset, amount, "purchase").await
    }

    async fn redeem_savings(&self, asset: &str, amount: Decimal) -> Result<SavingsReceipt> {
        self.savings_receipt(asset, amount, "redempt").await
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTicker {
    inst_id: String,
    #[serde(default, deserialize_with = "de::decimal")]
    last: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    bid_px: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    ask_px: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    open24h: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    high24h: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    low24h: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    vol24h: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    vol_ccy24h: Option<Decimal>,
    #[serde(default, deserialize_with = "de::millis")]
    ts: Option<i64>,
}

#[derive(Deserialize)]
struct RawBook {
    #[serde(default)]
    bids: Vec<Vec<Value>>,
    #[serde(default)]
    asks: Vec<Vec<Value>>,
    #[serde(default, deserialize_with = "de::millis")]
    ts: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTrade {
    #[serde(deserialize_with = "de::id_string")]
    trade_id: String,
    #[serde(deserialize_with = "de::decimal_or_zero")]
    px: Decimal,
    #[serde(deserialize_with = "de::decimal_or_zero")]
    sz: Decimal,
    side: String,
    #[serde(default, deserialize_with = "de::millis")]
    ts: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInstrument {
    inst_type: String,
    inst_id: String,
    #[serde(default)]
    state: String,
    #[serde(default, deserialize_with = "de::decimal")]
    ct_val: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    tick_sz: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    lot_sz: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    min_sz: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    max_lmt_sz: Option<Decimal>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFundingRate {
    #[serde(deserialize_with = "de::decimal_or_zero")]
    funding_rate: Decimal,
    #[serde(default, deserialize_with = "de::millis")]
    funding_time: Option<i64>,
}

#[derive(Deserialize)]
struct RawAccount {
    #[serde(default)]
    details: Vec<RawBalanceDetail>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBalanceDetail {
    ccy: String,
    #[serde(default, deserialize_with = "de::decimal_or_zero")]
    avail_bal: Decimal,
    #[serde(default, deserialize_with = "de::decimal_or_zero")]
    frozen_bal: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    eq: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOrderAck {
    #[serde(default, deserialize_with = "de::id_string")]
    ord_id: String,
    #[serde(default)]
    cl_ord_id: Option<String>,
    #[serde(default, deserialize_with = "de::id_string")]
    s_code: String,
    #[serde(default)]
    s_msg: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOrder {
    inst_id: String,
    #[serde(deserialize_with = "de::id_string")]
    ord_id: String,
    #[serde(default)]
    cl_ord_id: Option<String>,
    #[serde(default, deserialize_with = "de::decimal")]
    px: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    avg_px: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal_or_zero")]
    sz: Decimal,
    #[serde(default, deserialize_with = "de::decimal_or_zero")]
    acc_fill_sz: Decimal,
    #[serde(default)]
    state: String,
    #[serde(default)]
    ord_type: String,
    side: String,
    #[serde(default)]
    pos_side: String,
    #[serde(default, deserialize_with = "de::decimal")]
    fee: Option<Decimal>,
    #[serde(default)]
    fee_ccy: Option<String>,
    #[serde(default, deserialize_with = "de::millis")]
    c_time: Option<i64>,
    #[serde(default, deserialize_with = "de::millis")]
    fill_time: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPosition {
    inst_id: String,
    #[serde(default, deserialize_with = "de::decimal_or_zero")]
    pos: Decimal,
    #[serde(default)]
    pos_side: String,
    #[serde(default, deserialize_with = "de::decimal")]
    avg_px: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    mark_px: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    upl: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    upl_ratio: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    notional_usd: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    lever: Option<Decimal>,
    #[serde(default, deserialize_with = "de::millis")]
    u_time: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLendingRate {
    ccy: String,
    #[serde(default, deserialize_with = "de::decimal")]
    avg_rate: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    pre_rate: Option<Decimal>,
}

#[derive(Deserialize)]
struct RawSavingsBalance {
    ccy: String,
    #[serde(default, deserialize_with = "de::decimal_or_zero")]
    amt: Decimal,
    #[serde(default, deserialize_with = "de::decimal")]
    earnings: Option<Decimal>,
    #[serde(default, deserialize_with = "de::decimal")]
    rate: Option<Decimal>,
}

// ============================================================================
// Normalization
// ============================================================================

/// `1h` → `1H`, `1d` → `1D`; minutes and `1M` pass through
fn candle_bar(timeframe: &str) -> Option<String> {
    const BARS: [&str; 13] = ["1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "12h", "1d", "1w", "1M"];
    BARS.contains(&timeframe).then(|| {
        if timeframe.ends_with('m') || timeframe.ends_with('M') {
            timeframe.to_string()
        } else {
            timeframe.to_uppercase()
        }
    })
}

fn open_interest_period(timeframe: &str) -> Option<&'static str> {
    Some(match timeframe {
        "5m" => "5m",
        "15m" => "15m",
        "30m" => "30m",
        "1h" => "1H",
        "2h" => "2H",
        "4h" => "4H",
        "1d" => "1D",
        _ => return None,
    })
}

fn parse_ticker(raw: RawTicker, symbol: &Symbol) -> Ticker {
    // Swap volumes are reported in contracts (vol24h) and base units (volCcy24h)
    let (base_volume, quote_volume) = if symbol.is_swap() {
        (raw.vol_ccy24h, raw.vol_ccy24h.zip(raw.last).map(|(v, last)| v * last))
    } else {
        (raw.vol24h, raw.vol_ccy24h)
    };
    Ticker {
        symbol: symbol.to_string(),
        last: raw.last,
        bid: raw.bid_px,
        ask: raw.ask_px,
        high: raw.high24h,
        low: raw.low24h,
        open: raw.open24h,
        close: raw.last,
        base_volume,
        quote_volume,
        change: None,
        percentage: None,
        timestamp: raw.ts,
    }
    .derive_change()
}

fn parse_book(raw: RawBook, symbol: String, limit: usize) -> OrderBook {
    let mut bids = de::levels(&raw.bids);
    let mut asks = de::levels(&raw.asks);
    bids.truncate(limit);
    asks.truncate(limit);
    OrderBook {
        symbol,
        bids,
        asks,
        timestamp: raw.ts,
        nonce: None,
    }
}

/// OKX returns newest first; the result is oldest first
fn parse_trades(raw: Vec<RawTrade>, symbol: &str) -> Result<Vec<Trade>> {
    raw.into_iter()
        .rev()
        .map(|t| {
            Ok(Trade {
                id: t.trade_id,
                symbol: symbol.to_string(),
                price: t.px,
                amount: t.sz,
                side: t.side.parse()?,
                timestamp: t.ts.unwrap_or_default(),
            })
        })
        .collect()
}

/// Rows are `[ts, oi (contracts), oiCcy (base), oiUsd]`, newest first
fn parse_open_interest(rows: &[Vec<Value>], symbol: &str) -> Vec<OpenInterest> {
    rows.iter()
        .rev()
        .filter_map(|row| {
            Some(OpenInterest {
                symbol: symbol.to_string(),
                timestamp: de::parse_millis(row.first()?)?,
                amount: row.get(2).and_then(de::parse_decimal),
                value: row.get(3).and_then(de::parse_decimal),
            })
        })
        .collect()
}

fn parse_instrument(raw: RawInstrument) -> Option<Market> {
    let symbol = Symbol::from_okx_id(&raw.inst_id)?;
    let kind = symbol.kind();
    let fees = match kind {
        MarketKind::Spot => Fees { maker: Some(dec!(0.0008)), taker: Some(dec!(0.001)) },
        MarketKind::Swap => Fees { maker: Some(dec!(0.0002)), taker: Some(dec!(0.0005)) },
    };

    Some(Market {
        id: raw.inst_id,
        symbol: symbol.to_string(),
        base: symbol.base.clone(),
        quote: symbol.quote.clone(),
        settle: symbol.settle.clone(),
        active: raw.state == "live",
        kind,
        margin: raw.inst_type == "MARGIN",
        contract_size: if kind == MarketKind::Swap { raw.ct_val } else { None },
        precision: Precision {
            price: raw.tick_sz,
            amount: raw.lot_sz,
        },
        limits: Limits {
            amount: MinMax {
                min: raw.min_sz,
                max: raw.max_lmt_sz,
            },
            price: MinMax::default(),
            cost: MinMax::default(),
        },
        fees,
    })
}

fn order_status(state: &str) -> OrderStatus {
    match state {
        "filled" => OrderStatus::Closed,
        "canceled" | "mmp_canceled" => OrderStatus::Canceled,
        _ => OrderStatus::Open,
    }
}

/// `contract_size` is set for swaps; `cost` is then contracts x size x price
fn parse_order(raw: RawOrder, contract_size: Option<Decimal>) -> Result<Order> {
    let symbol = Symbol::from_okx_id(&raw.inst_id).map_or_else(|| raw.inst_id.clone(), |s| s.to_string());
    let average = raw.avg_px.filter(|p| !p.is_zero());
    let cost = average.map(|avg| avg * raw.acc_fill_sz * contract_size.unwrap_or(Decimal::ONE));
    let position_side = match raw.pos_side.as_str() {
        "long" => Some(PositionSide::Long),
        "short" => Some(PositionSide::Short),
        _ => None,
    };
    let fee = raw.fee.map(|cost| Fee {
        currency: raw.fee_ccy.clone().filter(|c| !c.is_empty()),
        cost: cost.abs(),
    });

    Ok(Order {
        id: raw.ord_id,
        client_order_id: raw.cl_ord_id.filter(|id| !id.is_empty()),
        symbol,
        side: raw.side.parse()?,
        order_type: if raw.ord_type == "market" { OrderType::Market } else { OrderType::Limit },
        status: order_status(&raw.state),
        price: raw.px.filter(|p| !p.is_zero()),
        average,
        remaining: (raw.sz - raw.acc_fill_sz).max(Decimal::ZERO),
        amount: raw.sz,
        filled: raw.acc_fill_sz,
        cost,
        fee,
        position_side,
        timestamp: raw.c_time,
        last_trade_timestamp: raw.fill_time,
    })
}

fn parse_position(raw: RawPosition) -> Option<Position> {
    let symbol = Symbol::from_okx_id(&raw.inst_id)?;
    let side = match raw.pos_side.as_str() {
        "long" => PositionSide::Long,
        "short" => PositionSide::Short,
        _ if raw.pos < Decimal::ZERO => PositionSide::Short,
        _ => PositionSide::Long,
    };
    Some(Position {
        symbol: symbol.to_string(),
        side,
        contracts: raw.pos.abs(),
        notional: raw.notional_usd,
        unrealized_pnl: raw.upl,
        percentage: raw.upl_ratio.map(|r| (r * Decimal::ONE_HUNDRED).round_dp(2)),
        entry_price: raw.avg_px,
        mark_price: raw.mark_px,
        leverage: raw.lever,
        timestamp: raw.u_time,
    })
}

/// Signed payload: `timestamp + METHOD + path?query + body`
fn prehash(timestamp: &str, method: &Method, request_path: &str, body: &str) -> String {
    format!("{timestamp}{}{request_path}{body}", method.as_str())
}

fn order_body(request: &OrderRequest, symbol: &Symbol) -> Value {
    let mut body = json!({
        "instId": symbol.okx_id(),
        "tdMode": if symbol.is_swap() { "cross" } else { "cash" },
        "side": request.side.as_str(),
        "ordType": request.order_type.as_str(),
        "sz": request.amount.normalize().to_string(),
    });
    if request.order_type == OrderType::Limit {
        if let Some(price) = request.price {
            body["px"] = json!(price.normalize().to_string());
        }
    }
    if let Some(side) = request.position_side {
        body["posSide"] = json!(side.as_str());
    }
    if let Some(id) = &request.client_order_id {
        body["clOrdId"] = json!(id);
    }
    if !symbol.is_swap() && request.order_type == OrderType::Market {
        // Spot market sizes are base units, matching limit orders
        body["tgtCcy"] = json!("base_ccy");
    }
    body
}

fn first_ack(acks: Vec<RawOrderAck>) -> Result<RawOrderAck> {
    let ack = acks
        .into_iter()
        .next()
        .ok_or_else(|| ExchangeError::decode("empty order response"))?;
    if ack.s_code.is_empty() || ack.s_code == "0" {
        Ok(ack)
    } else {
        Err(ExchangeError::Api {
            exchange: ExchangeId::Okx.to_string(),
            code: ack.s_code,
            message: ack.s_msg,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_errors() {
        let ok: Envelope<Value> = serde_json::from_value(json!({"code": "0", "msg": "", "data": [{}]})).unwrap();
        assert_eq!(ok.into_data().unwrap().len(), 1);

        let err: Envelope<Value> =
            serde_json::from_value(json!({"code": "51001", "msg": "Instrument ID does not exist", "data": []})).unwrap();
        let message = err.into_data().unwrap_err().to_string();
        assert!(message.contains("51001"));
        assert!(message.contains("Instrument ID does not exist"));
    }

    #[test]
    fn test_spot_and_swap_ticker_volumes() {
        let fixture = json!({
            "instId": "BTC-USDT", "last": "100", "askPx": "100.1", "bidPx": "99.9",
            "open24h": "90", "high24h": "105", "low24h": "88",
            "vol24h": "12", "volCcy24h": "1150", "ts": "1700000000000"
        });
        let spot = parse_ticker(serde_json::from_value(fixture.clone()).unwrap(), &Symbol::spot("BTC", "USDT"));
        assert_eq!(spot.base_volume, Some(dec!(12)));
        assert_eq!(spot.quote_volume, Some(dec!(1150)));
        assert_eq!(spot.change, Some(dec!(10)));
        assert_eq!(spot.timestamp, Some(1_700_000_000_000));

        let swap = parse_ticker(
            serde_json::from_value(fixture).unwrap(),
            &Symbol::swap("BTC", "USDT", "USDT"),
        );
        assert_eq!(swap.base_volume, Some(dec!(1150)));
        assert_eq!(swap.quote_volume, Some(dec!(115000)));
    }

    #[test]
    fn test_trades_are_oldest_first() {
        let raw: Vec<RawTrade> = serde_json::from_value(json!([
            {"instId": "BTC-USDT", "tradeId": "2", "px": "101", "sz": "0.5", "side": "sell", "ts": "1700000001000"},
            {"instId": "BTC-USDT", "tradeId": "1", "px": "100", "sz": "1", "side": "buy", "ts": "1700000000000"}
        ]))
        .unwrap();
        let trades = parse_trades(raw, "BTC/USDT").unwrap();
        assert_eq!(trades[0].id, "1");
        assert_eq!(trades[1].side, Side::Sell);
    }

    #[test]
    fn test_timeframe_mapping() {
        assert_eq!(candle_bar("1h").as_deref(), Some("1H"));
        assert_eq!(candle_bar("1d").as_deref(), Some("1D"));
        assert_eq!(candle_bar("15m").as_deref(), Some("15m"));
        assert_eq!(candle_bar("1M").as_deref(), Some("1M"));
        assert_eq!(candle_bar("2d"), None);
        assert_eq!(open_interest_period("4h"), Some("4H"));
        assert_eq!(open_interest_period("8h"), None);
    }

    #[test]
    fn test_open_interest_rows() {
        let rows: Vec<Vec<Value>> = serde_json::from_value(json!([
            ["1700003600000", "2000", "20", "2000000"],
            ["1700000000000", "1000", "10", "1000000"]
        ]))
        .unwrap();
        let points = parse_open_interest(&rows, "BTC/USDT:USDT");
        assert_eq!(points[0].timestamp, 1_700_000_000_000);
        assert_eq!(points[0].amount, Some(dec!(10)));
        assert_eq!(points[1].value, Some(dec!(2000000)));
    }

    #[test]
    fn test_parse_swap_instrument() {
        let raw: RawInstrument = serde_json::from_value(json!({
            "instType": "SWAP", "instId": "BTC-USDT-SWAP", "state": "live", "ctVal": "0.01",
            "tickSz": "0.1", "lotSz": "0.01", "minSz": "0.01", "maxLmtSz": "100000",
            "baseCcy": "", "quoteCcy": "", "settleCcy": "USDT"
        }))
        .unwrap();
        let market = parse_instrument(raw).unwrap();
        assert_eq!(market.symbol, "BTC/USDT:USDT");
        assert_eq!(market.contract_size, Some(dec!(0.01)));
        assert_eq!(market.precision.price, Some(dec!(0.1)));
        assert_eq!(market.limits.amount.min, Some(dec!(0.01)));
        assert!(market.active);
    }

    #[test]
    fn test_parse_filled_order() {
        let raw: RawOrder = serde_json::from_value(json!({
            "instId": "ETH-USDT-SWAP", "ordId": "312269865356374016", "clOrdId": "",
            "px": "", "avgPx": "2000", "sz": "10", "accFillSz": "10", "state": "filled",
            "ordType": "market", "side": "buy", "posSide": "long", "fee": "-0.5", "feeCcy": "USDT",
            "cTime": "1700000000000", "fillTime": "1700000000100"
        }))
        .unwrap();
        let order = parse_order(raw, Some(dec!(0.1))).unwrap();
        assert_eq!(order.symbol, "ETH/USDT:USDT");
        assert_eq!(order.status, OrderStatus::Closed);
        assert_eq!(order.order_type, OrderType::Market);
        assert_eq!(order.price, None);
        assert_eq!(order.client_order_id, None);
        assert_eq!(order.cost, Some(dec!(2000)));
        assert_eq!(order.fee.unwrap().cost, dec!(0.5));
        assert_eq!(order.position_side, Some(PositionSide::Long));
    }

    #[test]
    fn test_order_body() {
        let spot = OrderRequest::new("BTC/USDT", Side::Buy, OrderType::Market, dec!(0.5));
        let body = order_body(&spot, &Symbol::spot("BTC", "USDT"));
        assert_eq!(body["tdMode"], "cash");
        assert_eq!(body["tgtCcy"], "base_ccy");
        assert!(body.get("px").is_none());

        let swap = OrderRequest::new("BTC/USDT:USDT", Side::Sell, OrderType::Limit, dec!(3))
            .with_price(dec!(65000.10))
            .with_position_side(PositionSide::Short);
        let body = order_body(&swap, &Symbol::swap("BTC", "USDT", "USDT"));
        assert_eq!(body["instId"], "BTC-USDT-SWAP");
        assert_eq!(body["tdMode"], "cross");
        assert_eq!(body["px"], "65000.1");
        assert_eq!(body["posSide"], "short");
        assert!(body.get("tgtCcy").is_none());
    }

    #[test]
    fn test_rejected_order_ack() {
        let acks: Vec<RawOrderAck> = serde_json::from_value(json!([
            {"ordId": "", "clOrdId": "abc", "sCode": "51008", "sMsg": "Insufficient balance"}
        ]))
        .unwrap();
        let err = first_ack(acks).unwrap_err().to_string();
        assert!(err.contains("Insufficient balance"));
    }

    #[tokio::test]
    async fn test_passphrase_required() {
        let client = OkxClient::new(reqwest::Client::new(), Some(Credentials::new("key", "secret")));
        let err = client.spot_balance().await.unwrap_err().to_string();
        assert!(err.contains("OKX_PASSWORD"));
    }

    const TIMESTAMP: &str = "2024-05-01T08:00:00.123Z";

    fn mocked(server: &httpmock::MockServer) -> OkxClient {
        let credentials = Credentials::new("test-key", "test-secret").with_password("test-pass");
        OkxClient::new(reqwest::Client::new(), Some(credentials)).with_base_url(server.base_url())
    }

    #[test]
    fn test_prehash_layout() {
        assert_eq!(
            prehash(TIMESTAMP, &Method::GET, "/api/v5/account/balance?ccy=BTC", ""),
            "2024-05-01T08:00:00.123ZGET/api/v5/account/balance?ccy=BTC"
        );
        assert_eq!(
            prehash(TIMESTAMP, &Method::POST, "/api/v5/trade/order", r#"{"instId":"BTC-USDT"}"#),
            r#"2024-05-01T08:00:00.123ZPOST/api/v5/trade/order{"instId":"BTC-USDT"}"#
        );
    }

    #[tokio::test]
    async fn test_signed_get_over_http() {
        use httpmock::prelude::*;

        let server = MockServer::start_async().await;
        let signature = http::sign_base64(
            "test-secret",
            "2024-05-01T08:00:00.123ZGET/api/v5/account/balance?ccy=BTC",
        )
        .unwrap();
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v5/account/balance")
                    .query_param("ccy", "BTC")
                    .header("OK-ACCESS-KEY", "test-key")
                    .header("OK-ACCESS-SIGN", signature.as_str())
                    .header("OK-ACCESS-TIMESTAMP", TIMESTAMP)
                    .header("OK-ACCESS-PASSPHRASE", "test-pass");
                then.status(200).json_body(json!({"code": "0", "msg": "", "data": [
                    {"details": [{"ccy": "BTC", "availBal": "0.5", "frozenBal": "0.1", "eq": "0.6"}]}
                ]}));
            })
            .await;

        let accounts: Vec<RawAccount> = mocked(&server)
            .signed_at(
                Method::GET,
                "/api/v5/account/balance",
                &[("ccy", "BTC".into())],
                None,
                TIMESTAMP.into(),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(accounts[0].details[0].eq, Some(dec!(0.6)));
    }

    #[tokio::test]
    async fn test_signed_post_body_over_http() {
        use httpmock::prelude::*;

        let server = MockServer::start_async().await;
        let body = json!({"ordId": "123", "instId": "BTC-USDT"});
        let signature = http::sign_base64(
            "test-secret",
            &format!("{TIMESTAMP}POST/api/v5/trade/cancel-order{body}"),
        )
        .unwrap();
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v5/trade/cancel-order")
                    .header("Content-Type", "application/json")
                    .header("OK-ACCESS-SIGN", signature.as_str())
                    .json_body(body.clone());
                then.status(200).json_body(json!({"code": "0", "msg": "", "data": [
                    {"ordId": "123", "clOrdId": "", "sCode": "0", "sMsg": ""}
                ]}));
            })
            .await;

        let acks: Vec<RawOrderAck> = mocked(&server)
            .signed_at(Method::POST, "/api/v5/trade/cancel-order", &[], Some(&body), TIMESTAMP.into())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(first_ack(acks).unwrap().ord_id, "123");
    }

    #[tokio::test]
    async fn test_balance_and_error_envelope_over_http() {
        use httpmock::prelude::*;

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v5/account/balance")
                    .header_exists("OK-ACCESS-SIGN")
                    .header_exists("OK-ACCESS-TIMESTAMP");
                then.status(200).json_body(json!({"code": "0", "msg": "", "data": [
                    {"details": [{"ccy": "USDT", "availBal": "90", "frozenBal": "10", "eq": ""}]}
                ]}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v5/account/positions");
                then.status(200).json_body(json!({"code": "50113", "msg": "Invalid Sign", "data": []}));
            })
            .await;

        let client = mocked(&server);
        let balances = client.spot_balance().await.unwrap();
        assert_eq!(balances[0].asset, "USDT");
        assert_eq!(balances[0].total, dec!(100));

        let err = client.futures_positions(None).await.unwrap_err();
        assert!(matches!(err, ExchangeError::Api { ref code, .. } if code == "50113"));
    }
}
