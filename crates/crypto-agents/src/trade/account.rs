//! Balances and open positions.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use agent_core::tool::ParameterSchema;
use agent_core::{Tool, ToolCall, ToolResult, ToolSchema};

use crate::error::{ExchangeError, Result};
use crate::exchange::ExchangeProvider;
use crate::model::{BalanceEntry, MarketKind};
use crate::toolkit;

/// Spot or futures wallet balance, assets with a zero total left out
pub struct BalanceTool {
    exchanges: Arc<dyn ExchangeProvider>,
    kind: MarketKind,
}

impl BalanceTool {
    pub fn new(exchanges: Arc<dyn ExchangeProvider>, kind: MarketKind) -> Self {
        Self { exchanges, kind }
    }

    fn name(&self) -> &'static str {
        match self.kind {
            MarketKind::Spot => "get_spot_balance",
            MarketKind::Swap => "get_futures_balance",
        }
    }

    async fn run(&self, call: &ToolCall) -> Result<Value> {
        let exchange = toolkit::exchange(call)?;
        tracing::info!(tool = self.name(), %exchange, "Fetching balance");

        let client = self.exchanges.authenticated(exchange)?;
        let entries = match self.kind {
            MarketKind::Spot => client.spot_balance().await?,
            MarketKind::Swap => client.futures_balance().await?,
        };
        Ok(balance_data(&entries))
    }
}

fn balance_data(entries: &[BalanceEntry]) -> Value {
    let balances: Map<String, Value> = entries
        .iter()
        .filter(|e| !e.total.is_zero())
        .map(|e| {
            (
                e.asset.clone(),
                json!({ "free": e.free, "used": e.used, "total": e.total }),
            )
        })
        .collect();

    json!({
        "total_currencies": balances.len(),
        "balances": balances,
    })
}

#[async_trait]
impl Tool for BalanceTool {
    fn schema(&self) -> ToolSchema {
        let description = match self.kind {
            MarketKind::Spot => "Get the spot account balance: free, used and total amount of every held asset.",
            MarketKind::Swap => {
                "Get the USDT-margined futures account balance: free, used (margin) and total per asset."
            }
        };
        ToolSchema {
            name: self.name().into(),
            description: description.into(),
            parameters: vec![toolkit::exchange_param()],
            category: Some("account".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let outcome = self.run(call).await;
        toolkit::respond(self.name(), outcome, &[("exchange", json!(call.text("exchange_name").to_lowercase()))])
    }
}

/// Open perpetual positions
pub struct PositionsTool {
    exchanges: Arc<dyn ExchangeProvider>,
}

impl PositionsTool {
    pub const NAME: &'static str = "get_futures_positions";

    pub fn new(exchanges: Arc<dyn ExchangeProvider>) -> Self {
        Self { exchanges }
    }

    async fn run(&self, call: &ToolCall) -> Result<Value> {
        let symbol = toolkit::optional_symbol(call);
        if let Some(symbol) = symbol.as_deref().filter(|s| !s.contains(':')) {
            return Err(ExchangeError::InvalidRequest(format!(
                "{symbol} is not a contract symbol; use BASE/QUOTE:SETTLE such as 'BTC/USDT:USDT' or leave it empty"
            )));
        }
        let exchange = toolkit::exchange(call)?;
        tracing::info!(tool = Self::NAME, symbol = symbol.as_deref().unwrap_or("*"), %exchange, "Fetching positions");

        let positions = self
            .exchanges
            .authenticated(exchange)?
            .futures_positions(symbol.as_deref())
            .await?;

        let rows: Vec<Value> = positions
            .iter()
            .filter(|p| !p.contracts.is_zero())
            .map(|p| {
                json!({
                    "symbol": p.symbol,
                    "side": p.side,
                    "size": p.contracts,
                    "notional": p.notional,
                    "unrealized_pnl": p.unrealized_pnl,
                    "percentage": p.percentage,
                    "entry_price": p.entry_price,
                    "mark_price": p.mark_price,
                    "leverage": p.leverage,
                    "timestamp": p.timestamp,
                })
            })
            .collect();

        Ok(json!({ "count": rows.len(), "positions": rows }))
    }
}

#[async_trait]
impl Tool for PositionsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.into(),
            description: "Get open perpetual futures positions with size (contracts), entry and mark \
                          price, unrealized PnL and leverage."
                .into(),
            parameters: vec![
                ParameterSchema::required(
                    "symbol",
                    "string",
                    "Contract such as 'BTC/USDT:USDT', or an empty string for all positions",
                ),
                toolkit::exchange_param(),
            ],
            category: Some("account".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let outcome = self.run(call).await;
        toolkit::respond(Self::NAME, outcome, &super::orders::context(call))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::MockExchanges;

    #[tokio::test]
    async fn test_spot_balance_skips_empty_assets() {
        let tool = BalanceTool::new(Arc::new(MockExchanges::new()), MarketKind::Spot);
        let result = tool.execute(&ToolCall::new("get_spot_balance").arg("exchange_name", "Binance")).await.envelope();

        assert_eq!(result["status"], "success");
        let data = &result["data"];
        assert_eq!(data["total_currencies"], 2);
        assert_eq!(data["balances"]["USDT"]["total"], "1100");
        assert!(data["balances"].get("ETH").is_none());
    }

    #[tokio::test]
    async fn test_futures_balance() {
        let tool = BalanceTool::new(Arc::new(MockExchanges::new()), MarketKind::Swap);
        assert_eq!(tool.schema().name, "get_futures_balance");

        let result = tool.execute(&ToolCall::new("get_futures_balance").arg("exchange_name", "okx")).await.envelope();
        assert_eq!(result["data"]["balances"]["USDT"]["used"], "500");
    }

    #[tokio::test]
    async fn test_balance_requires_credentials() {
        let tool = BalanceTool::new(Arc::new(MockExchanges::without_credentials()), MarketKind::Spot);
        let result = tool.execute(&ToolCall::new("get_spot_balance").arg("exchange_name", "okx")).await;

        assert!(!result.is_success());
        let message = result.error_message.unwrap();
        assert!(message.contains("OKX_API_KEY") && message.contains("OKX_SECRET"));
    }

    #[tokio::test]
    async fn test_positions_only_nonzero() {
        let tool = PositionsTool::new(Arc::new(MockExchanges::new()));

        let all = ToolCall::new(PositionsTool::NAME).arg("symbol", "").arg("exchange_name", "binance");
        let result = tool.execute(&all).await.envelope();
        assert_eq!(result["data"]["count"], 1);
        assert_eq!(result["data"]["positions"][0]["symbol"], "BTC/USDT:USDT");
        assert_eq!(result["data"]["positions"][0]["side"], "long");
        assert_eq!(result["data"]["positions"][0]["size"], "3");

        let eth = ToolCall::new(PositionsTool::NAME).arg("symbol", "eth/usdt:usdt").arg("exchange_name", "binance");
        assert_eq!(tool.execute(&eth).await.envelope()["data"]["count"], 0);

        let spot = ToolCall::new(PositionsTool::NAME).arg("symbol", "ETH/USDT").arg("exchange_name", "binance");
        assert!(!tool.execute(&spot).await.is_success());
    }
}
