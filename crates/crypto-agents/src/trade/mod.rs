//! Account and trading tools for the crypto trade agent
//!
//! Every tool here needs API credentials. Inputs are validated before a
//! client is requested, so a malformed call never reaches the exchange.

mod account;
mod orders;
mod savings;

pub use account::{BalanceTool, PositionsTool};
pub use orders::{CancelOrderTool, FuturesAction, OrderDetailTool, OrderListTool, OrderQuery, PlaceFuturesOrderTool, PlaceSpotOrderTool};
pub use savings::{SavingsBalanceTool, SavingsProductsTool, SavingsRedeemTool, SavingsSubscribeTool, SavingsYieldTool};

use std::sync::Arc;

use serde_json::{Value, json};

use agent_core::ToolRegistry;

use crate::exchange::ExchangeProvider;
use crate::model::{MarketKind, Order, iso8601};

/// Every trade tool
pub fn trade_tools(exchanges: &Arc<dyn ExchangeProvider>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(BalanceTool::new(exchanges.clone(), MarketKind::Spot));
    registry.register(PlaceSpotOrderTool::new(exchanges.clone()));
    for query in [OrderQuery::Spot, OrderQuery::SpotOpen, OrderQuery::SpotClosed] {
        registry.register(OrderListTool::new(exchanges.clone(), query));
    }
    registry.register(OrderDetailTool::new(exchanges.clone(), MarketKind::Spot));
    registry.register(CancelOrderTool::new(exchanges.clone(), MarketKind::Spot));

    registry.register(BalanceTool::new(exchanges.clone(), MarketKind::Swap));
    registry.register(PositionsTool::new(exchanges.clone()));
    registry.register(PlaceFuturesOrderTool::new(exchanges.clone()));
    for query in [OrderQuery::FuturesOpen, OrderQuery::FuturesClosed] {
        registry.register(OrderListTool::new(exchanges.clone(), query));
    }
    registry.register(OrderDetailTool::new(exchanges.clone(), MarketKind::Swap));
    registry.register(CancelOrderTool::new(exchanges.clone(), MarketKind::Swap));

    registry.register(SavingsProductsTool::new(exchanges.clone()));
    registry.register(SavingsYieldTool::new(exchanges.clone()));
    registry.register(SavingsSubscribeTool::new(exchanges.clone()));
    registry.register(SavingsRedeemTool::new(exchanges.clone()));
    registry.register(SavingsBalanceTool::new(exchanges.clone()));

    registry
}

/// Order as listed by the order history tools
fn order_row(order: &Order) -> Value {
    let mut row = json!({
        "id": order.id,
        "symbol": order.symbol,
        "side": order.side,
        "amount": order.amount,
        "price": order.price,
        "type": order.order_type,
        "status": order.status,
        "filled": order.filled,
        "remaining": order.remaining,
        "timestamp": order.timestamp,
        "datetime": order.timestamp.and_then(iso8601),
    });
    if let Some(side) = order.position_side {
        row["position_side"] = json!(side);
    }
    row
}

/// Finished orders also report what they cost
fn closed_order_row(order: &Order) -> Value {
    let mut row = order_row(order);
    row["cost"] = json!(order.cost);
    row["fee"] = json!(order.fee);
    row
}

fn order_detail(order: &Order) -> Value {
    let mut row = closed_order_row(order);
    row["average"] = json!(order.average);
    row["client_order_id"] = json!(order.client_order_id);
    row["lastTradeTimestamp"] = json!(order.last_trade_timestamp);
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::MockExchanges;

    #[test]
    fn test_trade_tools_registered() {
        let exchanges: Arc<dyn ExchangeProvider> = Arc::new(MockExchanges::new());
        let registry = trade_tools(&exchanges);

        let mut names = registry.names();
        names.sort_unstable();
        assert_eq!(
            names,
            [
                "cancel_futures_order",
                "cancel_spot_order",
                "get_futures_balance",
                "get_futures_closed_orders",
                "get_futures_open_orders",
                "get_futures_order_detail",
                "get_futures_positions",
                "get_savings_balance",
                "get_savings_products",
                "get_savings_yield_by_asset",
                "get_spot_balance",
                "get_spot_closed_orders",
                "get_spot_open_orders",
                "get_spot_order_detail",
                "get_spot_orders",
                "place_futures_order",
                "place_spot_order",
                "purchase_savings_product",
                "redeem_savings_product",
            ]
        );

        let side_effects: Vec<String> = registry
            .schemas()
            .into_iter()
            .filter(|s| s.has_side_effects)
            .map(|s| s.name)
            .collect();
        assert_eq!(side_effects.len(), 6);
    }
}
