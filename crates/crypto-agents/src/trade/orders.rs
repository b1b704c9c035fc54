//! Order placement, history, detail and cancellation for spot pairs and
//! perpetual contracts.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{Value, json};

use agent_core::tool::ParameterSchema;
use agent_core::{Tool, ToolCall, ToolResult, ToolSchema};

use crate::error::{ExchangeError, Result};
use crate::exchange::{ExchangeClient, ExchangeProvider, floor_to_step};
use crate::model::{MarketKind, Order, OrderRequest, OrderType, PositionSide, Side, iso8601};
use crate::toolkit;

use super::{closed_order_row, order_detail, order_row};

/// `exchange`, `symbol` and `order_id` metadata for trade envelopes
pub(crate) fn context(call: &ToolCall) -> Vec<(&'static str, Value)> {
    let order_id = call.text("order_id");
    vec![
        ("exchange", json!(call.text("exchange_name").to_lowercase())),
        ("symbol", json!(call.text("symbol").to_uppercase())),
        ("order_id", if order_id.is_empty() { Value::Null } else { json!(order_id) }),
    ]
}

fn order_type(call: &ToolCall) -> Result<OrderType> {
    match call.text("order_type") {
        t if t.is_empty() => Ok(OrderType::Limit),
        t => t.parse(),
    }
}

fn order_type_param() -> ParameterSchema {
    ParameterSchema::optional("order_type", "string", "Order type", json!("limit")).one_of(&["limit", "market"])
}

fn kind_symbol(call: &ToolCall, kind: MarketKind) -> Result<String> {
    match kind {
        MarketKind::Spot => toolkit::symbol(call),
        MarketKind::Swap => toolkit::swap_symbol(call),
    }
}

fn kind_symbol_param(kind: MarketKind) -> ParameterSchema {
    match kind {
        MarketKind::Spot => toolkit::spot_symbol_param(),
        MarketKind::Swap => toolkit::swap_symbol_param(),
    }
}

fn placed(order: &Order) -> Value {
    json!({
        "order_id": order.id,
        "symbol": order.symbol,
        "side": order.side,
        "amount": order.amount,
        "price": order.price,
        "type": order.order_type,
        "status": order.status,
        "timestamp": order.timestamp,
        "datetime": order.timestamp.and_then(iso8601),
    })
}

/// Places a spot limit or market order
pub struct PlaceSpotOrderTool {
    exchanges: Arc<dyn ExchangeProvider>,
}

impl PlaceSpotOrderTool {
    pub const NAME: &'static str = "place_spot_order";

    pub fn new(exchanges: Arc<dyn ExchangeProvider>) -> Self {
        Self { exchanges }
    }

    fn request(call: &ToolCall) -> Result<OrderRequest> {
        let symbol = toolkit::symbol(call)?;
        let side: Side = toolkit::required(call, "side", "side")?.parse()?;
        let amount = toolkit::positive(call, "amount")?;
        let order_type = order_type(call)?;

        let mut request = OrderRequest::new(symbol, side, order_type, amount);
        if order_type == OrderType::Limit {
            if let Some(price) = toolkit::decimal(call, "price") {
                request = request.with_price(price);
            }
        }
        request.validate()?;
        Ok(request)
    }

    async fn run(&self, call: &ToolCall) -> Result<Value> {
        let request = Self::request(call)?;
        let exchange = toolkit::exchange(call)?;
        tracing::info!(
            tool = Self::NAME,
            symbol = %request.symbol,
            side = request.side.as_str(),
            amount = %request.amount,
            order_type = request.order_type.as_str(),
            %exchange,
            "Placing spot order"
        );

        let order = self.exchanges.authenticated(exchange)?.create_spot_order(&request).await?;
        Ok(placed(&order))
    }
}

#[async_trait]
impl Tool for PlaceSpotOrderTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.into(),
            description: "Place a spot buy or sell order. Limit orders need a price; amount is in the \
                          base currency (e.g. BTC for BTC/USDT)."
                .into(),
            parameters: vec![
                toolkit::spot_symbol_param(),
                ParameterSchema::required("side", "string", "Order side").one_of(&["buy", "sell"]),
                ParameterSchema::required("amount", "number", "Quantity in base currency, greater than 0"),
                ParameterSchema::required("price", "number", "Limit price in quote currency (ignored for market orders)"),
                toolkit::exchange_param(),
                order_type_param(),
            ],
            category: Some("trading".into()),
            has_side_effects: true,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let outcome = self.run(call).await;
        toolkit::respond(Self::NAME, outcome, &context(call))
    }
}

/// Position action of a perpetual order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FuturesAction {
    OpenLong,
    OpenShort,
    CloseLong,
    CloseShort,
}

impl FuturesAction {
    /// Order side and the hedge-mode position it acts on
    pub fn legs(self) -> (Side, PositionSide) {
        match self {
            Self::OpenLong => (Side::Buy, PositionSide::Long),
            Self::OpenShort => (Side::Sell, PositionSide::Short),
            Self::CloseLong => (Side::Sell, PositionSide::Long),
            Self::CloseShort => (Side::Buy, PositionSide::Short),
        }
    }
}

impl FromStr for FuturesAction {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "open_long" => Ok(Self::OpenLong),
            "open_short" => Ok(Self::OpenShort),
            "close_long" => Ok(Self::CloseLong),
            "close_short" => Ok(Self::CloseShort),
            _ => Err(ExchangeError::InvalidRequest(
                "side must be one of 'open_long', 'open_short', 'close_long', 'close_short'".into(),
            )),
        }
    }
}

/// Places a perpetual order sized in coin units
pub struct PlaceFuturesOrderTool {
    exchanges: Arc<dyn ExchangeProvider>,
}

impl PlaceFuturesOrderTool {
    pub const NAME: &'static str = "place_futures_order";

    pub fn new(exchanges: Arc<dyn ExchangeProvider>) -> Self {
        Self { exchanges }
    }

    async fn run(&self, call: &ToolCall) -> Result<Value> {
        let symbol = toolkit::swap_symbol(call)?;
        let action: FuturesAction = toolkit::required(call, "side", "side")?.parse()?;
        let amount = toolkit::positive(call, "amount")?;
        let order_type = order_type(call)?;
        let price = toolkit::decimal(call, "price").filter(|p| *p > Decimal::ZERO);
        if order_type == OrderType::Limit && price.is_none() {
            return Err(ExchangeError::InvalidRequest("limit orders require a price greater than 0".into()));
        }
        let exchange = toolkit::exchange(call)?;

        let client = self.exchanges.authenticated(exchange)?;
        let (request, contract_size) = size_order(client.as_ref(), &symbol, action, amount, order_type, price).await?;
        tracing::info!(
            tool = Self::NAME,
            %symbol,
            ?action,
            contracts = %request.amount,
            %exchange,
            "Placing futures order"
        );

        let order = client.create_futures_order(&request).await?;
        let mut data = placed(&order);
        data["position_side"] = json!(order.position_side);
        data["requested_amount"] = json!(amount);
        data["contract_size"] = json!(contract_size);
        Ok(data)
    }
}

/// Convert a coin amount into whole contract steps and floor the price to
/// the market's tick
async fn size_order(
    client: &dyn ExchangeClient,
    symbol: &str,
    action: FuturesAction,
    amount: Decimal,
    order_type: OrderType,
    price: Option<Decimal>,
) -> Result<(OrderRequest, Decimal)> {
    let market = client.market(symbol).await?;
    let contract_size = market.contract_size.filter(|c| !c.is_zero()).unwrap_or(Decimal::ONE);

    let contracts = floor_to_step(amount / contract_size, market.precision.amount);
    if contracts <= Decimal::ZERO {
        return Err(ExchangeError::InvalidRequest(format!(
            "amount {amount} is smaller than the minimum order size of {symbol} (one contract = {contract_size})"
        )));
    }

    let (side, position_side) = action.legs();
    let mut request = OrderRequest::new(symbol, side, order_type, contracts).with_position_side(position_side);
    if let (OrderType::Limit, Some(price)) = (order_type, price) {
        request = request.with_price(floor_to_step(price, market.precision.price));
    }
    request.validate()?;
    Ok((request, contract_size))
}

#[async_trait]
impl Tool for PlaceFuturesOrderTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.into(),
            description: "Open or close a USDT-margined perpetual position. Amount is in coin units \
                          (e.g. 0.01 BTC) and is converted to contracts."
                .into(),
            parameters: vec![
                toolkit::swap_symbol_param(),
                ParameterSchema::required("side", "string", "Position action").one_of(&[
                    "open_long",
                    "open_short",
                    "close_long",
                    "close_short",
                ]),
                ParameterSchema::required("amount", "number", "Quantity in coin units, greater than 0"),
                ParameterSchema::required("price", "number", "Limit price (ignored for market orders)"),
                toolkit::exchange_param(),
                order_type_param(),
            ],
            category: Some("trading".into()),
            has_side_effects: true,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let outcome = self.run(call).await;
        toolkit::respond(Self::NAME, outcome, &context(call))
    }
}

/// Which order list a history tool reads
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderQuery {
    Spot,
    SpotOpen,
    SpotClosed,
    FuturesOpen,
    FuturesClosed,
}

impl OrderQuery {
    pub fn tool_name(self) -> &'static str {
        match self {
            Self::Spot => "get_spot_orders",
            Self::SpotOpen => "get_spot_open_orders",
            Self::SpotClosed => "get_spot_closed_orders",
            Self::FuturesOpen => "get_futures_open_orders",
            Self::FuturesClosed => "get_futures_closed_orders",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::Spot => "Get recent spot orders (open and finished).",
            Self::SpotOpen => "Get spot orders that are still open.",
            Self::SpotClosed => "Get finished spot orders (filled or canceled) with cost and fee.",
            Self::FuturesOpen => "Get perpetual futures orders that are still open.",
            Self::FuturesClosed => "Get finished perpetual futures orders with cost and fee.",
        }
    }

    fn kind(self) -> MarketKind {
        match self {
            Self::Spot | Self::SpotOpen | Self::SpotClosed => MarketKind::Spot,
            Self::FuturesOpen | Self::FuturesClosed => MarketKind::Swap,
        }
    }

    fn closed(self) -> bool {
        matches!(self, Self::SpotClosed | Self::FuturesClosed)
    }

    async fn fetch(self, client: &dyn ExchangeClient, symbol: Option<&str>) -> Result<Vec<Order>> {
        match self {
            Self::Spot => client.spot_orders(symbol).await,
            Self::SpotOpen => client.spot_open_orders(symbol).await,
            Self::SpotClosed => client.spot_closed_orders(symbol).await,
            Self::FuturesOpen => client.futures_open_orders(symbol).await,
            Self::FuturesClosed => client.futures_closed_orders(symbol).await,
        }
    }
}

/// Order history for one symbol, or every symbol when `symbol` is empty
pub struct OrderListTool {
    exchanges: Arc<dyn ExchangeProvider>,
    query: OrderQuery,
}

impl OrderListTool {
    pub fn new(exchanges: Arc<dyn ExchangeProvider>, query: OrderQuery) -> Self {
        Self { exchanges, query }
    }

    async fn run(&self, call: &ToolCall) -> Result<Value> {
        let symbol = toolkit::optional_symbol(call);
        if let (MarketKind::Swap, Some(symbol)) = (self.query.kind(), symbol.as_deref()) {
            if !symbol.contains(':') {
                return Err(ExchangeError::InvalidSymbol(symbol.to_string()));
            }
        }
        let exchange = toolkit::exchange(call)?;
        tracing::info!(
            tool = self.query.tool_name(),
            symbol = symbol.as_deref().unwrap_or("*"),
            %exchange,
            "Fetching orders"
        );

        let client = self.exchanges.authenticated(exchange)?;
        let orders = self.query.fetch(client.as_ref(), symbol.as_deref()).await?;
        let row = if self.query.closed() { closed_order_row } else { order_row };
        let rows: Vec<Value> = orders.iter().map(row).collect();

        Ok(json!({ "count": rows.len(), "orders": rows }))
    }
}

#[async_trait]
impl Tool for OrderListTool {
    fn schema(&self) -> ToolSchema {
        let symbol_hint = match self.query.kind() {
            MarketKind::Spot => "Trading pair such as 'BTC/USDT', or an empty string for all pairs (Binance needs a pair)",
            MarketKind::Swap => {
                "Contract such as 'BTC/USDT:USDT', or an empty string for all contracts (Binance needs a contract for history)"
            }
        };
        ToolSchema {
            name: self.query.tool_name().into(),
            description: self.query.description().into(),
            parameters: vec![
                ParameterSchema::required("symbol", "string", symbol_hint),
                toolkit::exchange_param(),
            ],
            category: Some("trading".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let outcome = self.run(call).await;
        toolkit::respond(self.query.tool_name(), outcome, &context(call))
    }
}

fn order_id(call: &ToolCall) -> Result<String> {
    toolkit::required(call, "order_id", "order_id")
}

fn order_id_param() -> ParameterSchema {
    ParameterSchema::required("order_id", "string", "Exchange order id")
}

/// Full detail of one order
pub struct OrderDetailTool {
    exchanges: Arc<dyn ExchangeProvider>,
    kind: MarketKind,
}

impl OrderDetailTool {
    pub fn new(exchanges: Arc<dyn ExchangeProvider>, kind: MarketKind) -> Self {
        Self { exchanges, kind }
    }

    fn name(&self) -> &'static str {
        match self.kind {
            MarketKind::Spot => "get_spot_order_detail",
            MarketKind::Swap => "get_futures_order_detail",
        }
    }

    async fn run(&self, call: &ToolCall) -> Result<Value> {
        let order_id = order_id(call)?;
        let symbol = kind_symbol(call, self.kind)?;
        let exchange = toolkit::exchange(call)?;
        tracing::info!(tool = self.name(), %order_id, %symbol, %exchange, "Fetching order");

        let client = self.exchanges.authenticated(exchange)?;
        let order = match self.kind {
            MarketKind::Spot => client.spot_order(&order_id, &symbol).await?,
            MarketKind::Swap => client.futures_order(&order_id, &symbol).await?,
        };
        Ok(order_detail(&order))
    }
}

#[async_trait]
impl Tool for OrderDetailTool {
    fn schema(&self) -> ToolSchema {
        let description = match self.kind {
            MarketKind::Spot => "Get the status, fill progress, average price and fee of a spot order.",
            MarketKind::Swap => "Get the status, fill progress, average price and fee of a perpetual futures order.",
        };
        ToolSchema {
            name: self.name().into(),
            description: description.into(),
            parameters: vec![order_id_param(), kind_symbol_param(self.kind), toolkit::exchange_param()],
            category: Some("trading".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let outcome = self.run(call).await;
        toolkit::respond(self.name(), outcome, &context(call))
    }
}

/// Cancels an open order
pub struct CancelOrderTool {
    exchanges: Arc<dyn ExchangeProvider>,
    kind: MarketKind,
}

impl CancelOrderTool {
    pub fn new(exchanges: Arc<dyn ExchangeProvider>, kind: MarketKind) -> Self {
        Self { exchanges, kind }
    }

    fn name(&self) -> &'static str {
        match self.kind {
            MarketKind::Spot => "cancel_spot_order",
            MarketKind::Swap => "cancel_futures_order",
        }
    }

    async fn run(&self, call: &ToolCall) -> Result<Value> {
        let order_id = order_id(call)?;
        let symbol = kind_symbol(call, self.kind)?;
        let exchange = toolkit::exchange(call)?;
        tracing::info!(tool = self.name(), %order_id, %symbol, %exchange, "Canceling order");

        let client = self.exchanges.authenticated(exchange)?;
        let order = match self.kind {
            MarketKind::Spot => client.cancel_spot_order(&order_id, &symbol).await?,
            MarketKind::Swap => client.cancel_futures_order(&order_id, &symbol).await?,
        };
        Ok(json!({
            "order_id": order.id,
            "symbol": order.symbol,
            "status": order.status,
        }))
    }
}

#[async_trait]
impl Tool for CancelOrderTool {
    fn schema(&self) -> ToolSchema {
        let description = match self.kind {
            MarketKind::Spot => "Cancel an open spot order.",
            MarketKind::Swap => "Cancel an open perpetual futures order.",
        };
        ToolSchema {
            name: self.name().into(),
            description: description.into(),
            parameters: vec![order_id_param(), kind_symbol_param(self.kind), toolkit::exchange_param()],
            category: Some("trading".into()),
            has_side_effects: true,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let outcome = self.run(call).await;
        toolkit::respond(self.name(), outcome, &context(call))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::MockExchanges;
    use crate::model::ExchangeId;
    use rust_decimal_macros::dec;

    fn spot_order_call() -> ToolCall {
        ToolCall::new(PlaceSpotOrderTool::NAME)
            .arg("symbol", " btc/usdt ")
            .arg("side", "BUY")
            .arg("amount", 0.01)
            .arg("price", "65000")
            .arg("exchange_name", "binance")
    }

    #[tokio::test]
    async fn test_place_spot_limit_order() {
        let exchanges = Arc::new(MockExchanges::new());
        let tool = PlaceSpotOrderTool::new(exchanges.clone());

        let result = tool.execute(&spot_order_call()).await.envelope();
        assert_eq!(result["status"], "success");
        assert_eq!(result["data"]["order_id"], "mock-1");
        assert_eq!(result["data"]["side"], "buy");
        assert_eq!(result["data"]["type"], "limit");
        assert_eq!(result["data"]["status"], "open");

        let submitted = exchanges.client(ExchangeId::Binance).submitted_orders().await;
        assert_eq!(submitted[0].symbol, "BTC/USDT");
        assert_eq!(submitted[0].amount, dec!(0.01));
        assert_eq!(submitted[0].price, Some(dec!(65000)));
    }

    #[tokio::test]
    async fn test_place_spot_market_order_ignores_price() {
        let exchanges = Arc::new(MockExchanges::new());
        let tool = PlaceSpotOrderTool::new(exchanges.clone());
        let call = spot_order_call().arg("order_type", "Market").arg("price", 0);

        assert!(tool.execute(&call).await.is_success());
        let submitted = exchanges.client(ExchangeId::Binance).submitted_orders().await;
        assert_eq!(submitted[0].order_type, OrderType::Market);
        assert_eq!(submitted[0].price, None);
    }

    #[tokio::test]
    async fn test_invalid_orders_never_reach_exchange() {
        let exchanges = Arc::new(MockExchanges::new());
        let tool = PlaceSpotOrderTool::new(exchanges.clone());

        let cases = [
            (spot_order_call().arg("side", "hold"), "side must be"),
            (spot_order_call().arg("amount", 0), "amount must be"),
            (spot_order_call().arg("amount", "lots"), "amount must be"),
            (spot_order_call().arg("price", -5), "require a price"),
            (spot_order_call().arg("order_type", "stop"), "order type must be"),
            (spot_order_call().arg("symbol", ""), "cannot be empty"),
        ];
        for (call, expected) in cases {
            let result = tool.execute(&call).await;
            let message = result.error_message.unwrap();
            assert!(message.contains(expected), "{message}");
        }
        assert!(exchanges.client(ExchangeId::Binance).submitted_orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_place_futures_order_converts_to_contracts() {
        let exchanges = Arc::new(MockExchanges::new());
        let tool = PlaceFuturesOrderTool::new(exchanges.clone());
        let call = ToolCall::new(PlaceFuturesOrderTool::NAME)
            .arg("symbol", "btc/usdt:usdt")
            .arg("side", "close_long")
            .arg("amount", 0.035)
            .arg("price", 67123.98)
            .arg("exchange_name", "okx");

        let result = tool.execute(&call).await.envelope();
        assert_eq!(result["status"], "success", "{result}");
        assert_eq!(result["data"]["side"], "sell");
        assert_eq!(result["data"]["position_side"], "long");
        assert_eq!(result["data"]["contract_size"], "0.01");

        let submitted = exchanges.client(ExchangeId::Okx).submitted_orders().await;
        assert_eq!(submitted[0].amount, dec!(3));
        assert_eq!(submitted[0].price, Some(dec!(67123.9)));
        assert_eq!(submitted[0].position_side, Some(PositionSide::Long));
    }

    #[tokio::test]
    async fn test_futures_order_validation() {
        let tool = PlaceFuturesOrderTool::new(Arc::new(MockExchanges::new()));
        let base = ToolCall::new(PlaceFuturesOrderTool::NAME)
            .arg("symbol", "BTC/USDT:USDT")
            .arg("side", "open_long")
            .arg("amount", 0.001)
            .arg("price", 60000)
            .arg("exchange_name", "okx");

        let too_small = tool.execute(&base).await;
        assert!(too_small.error_message.unwrap().contains("minimum order size"));

        let spot = tool.execute(&base.clone().arg("symbol", "BTC/USDT")).await;
        assert!(spot.error_message.unwrap().contains("BASE/QUOTE:SETTLE"));

        let side = tool.execute(&base.clone().arg("side", "buy")).await;
        assert!(side.error_message.unwrap().contains("open_long"));
    }

    #[test]
    fn test_futures_action_legs() {
        assert_eq!(FuturesAction::OpenShort.legs(), (Side::Sell, PositionSide::Short));
        assert_eq!(FuturesAction::CloseShort.legs(), (Side::Buy, PositionSide::Short));
        assert_eq!(" OPEN_LONG ".parse::<FuturesAction>().unwrap(), FuturesAction::OpenLong);
    }

    #[tokio::test]
    async fn test_order_lists() {
        let exchanges: Arc<dyn ExchangeProvider> = Arc::new(MockExchanges::new());

        let okx_all = ToolCall::new("q").arg("symbol", "").arg("exchange_name", "okx");
        let result = OrderListTool::new(exchanges.clone(), OrderQuery::Spot).execute(&okx_all).await.envelope();
        assert_eq!(result["data"]["count"], 3);

        let binance_all = ToolCall::new("q").arg("symbol", "").arg("exchange_name", "binance");
        let result = OrderListTool::new(exchanges.clone(), OrderQuery::Spot).execute(&binance_all).await;
        assert!(result.error_message.unwrap().contains("requires a symbol"));

        let btc = ToolCall::new("q").arg("symbol", "btc/usdt").arg("exchange_name", "binance");
        let open = OrderListTool::new(exchanges.clone(), OrderQuery::SpotOpen).execute(&btc).await.envelope();
        assert_eq!(open["data"]["count"], 1);
        assert_eq!(open["data"]["orders"][0]["id"], "1001");
        assert!(open["data"]["orders"][0].get("cost").is_none());

        let closed = OrderListTool::new(exchanges.clone(), OrderQuery::SpotClosed).execute(&btc).await.envelope();
        assert_eq!(closed["data"]["orders"][0]["status"], "canceled");
        assert!(closed["data"]["orders"][0].get("cost").is_some());

        let swap = ToolCall::new("q").arg("symbol", "").arg("exchange_name", "okx");
        let result = OrderListTool::new(exchanges, OrderQuery::FuturesClosed).execute(&swap).await.envelope();
        assert_eq!(result["data"]["count"], 2);
        assert_eq!(result["data"]["orders"][0]["position_side"], "long");
    }

    #[tokio::test]
    async fn test_order_detail_and_cancel() {
        let exchanges: Arc<dyn ExchangeProvider> = Arc::new(MockExchanges::new());
        let call = ToolCall::new("q")
            .arg("order_id", "1001")
            .arg("symbol", "BTC/USDT")
            .arg("exchange_name", "binance");

        let detail = OrderDetailTool::new(exchanges.clone(), MarketKind::Spot).execute(&call).await.envelope();
        assert_eq!(detail["data"]["id"], "1001");
        assert!(detail["data"].get("average").is_some());
        assert_eq!(detail["metadata"]["order_id"], "1001");

        let cancel = CancelOrderTool::new(exchanges.clone(), MarketKind::Spot).execute(&call).await.envelope();
        assert_eq!(cancel["data"]["status"], "canceled");

        let unknown = call.clone().arg("order_id", "9999");
        let result = CancelOrderTool::new(exchanges.clone(), MarketKind::Spot).execute(&unknown).await;
        assert!(result.error_message.unwrap().contains("-2013"));

        let futures = OrderDetailTool::new(exchanges, MarketKind::Swap);
        assert_eq!(futures.schema().name, "get_futures_order_detail");
        assert!(!futures.execute(&call).await.is_success());
    }
}
