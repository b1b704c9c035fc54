//! Flexible savings (Binance Simple Earn, OKX Savings).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use agent_core::tool::ParameterSchema;
use agent_core::{Tool, ToolCall, ToolResult, ToolSchema};

use crate::error::{ExchangeError, Result};
use crate::exchange::ExchangeProvider;
use crate::model::SavingsReceipt;
use crate::toolkit;

fn asset(call: &ToolCall) -> Result<String> {
    Ok(toolkit::required(call, "asset", "asset (e.g. 'USDT')")?.to_uppercase())
}

fn asset_param() -> ParameterSchema {
    ParameterSchema::required("asset", "string", "Currency code such as 'USDT', 'BTC'")
}

fn context(call: &ToolCall) -> Vec<(&'static str, Value)> {
    let asset = call.text("asset").to_uppercase();
    vec![
        ("exchange", json!(call.text("exchange_name").to_lowercase())),
        ("asset", if asset.is_empty() { Value::Null } else { json!(asset) }),
    ]
}

/// Flexible products and their current annual rate
pub struct SavingsProductsTool {
    exchanges: Arc<dyn ExchangeProvider>,
}

impl SavingsProductsTool {
    pub const NAME: &'static str = "get_savings_products";

    pub fn new(exchanges: Arc<dyn ExchangeProvider>) -> Self {
        Self { exchanges }
    }

    async fn run(&self, call: &ToolCall) -> Result<Value> {
        let exchange = toolkit::exchange(call)?;
        tracing::info!(tool = Self::NAME, %exchange, "Fetching savings products");

        let products = self.exchanges.authenticated(exchange)?.savings_products().await?;
        Ok(json!({
            "count": products.len(),
            "products": toolkit::to_value(&products)?,
        }))
    }
}

#[async_trait]
impl Tool for SavingsProductsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.into(),
            description: "List flexible savings products with their annual rate (0.05 = 5%).".into(),
            parameters: vec![toolkit::exchange_param()],
            category: Some("savings".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let outcome = self.run(call).await;
        toolkit::respond(Self::NAME, outcome, &context(call))
    }
}

/// Annual rate of one asset's flexible product
pub struct SavingsYieldTool {
    exchanges: Arc<dyn ExchangeProvider>,
}

impl SavingsYieldTool {
    pub const NAME: &'static str = "get_savings_yield_by_asset";

    pub fn new(exchanges: Arc<dyn ExchangeProvider>) -> Self {
        Self { exchanges }
    }

    async fn run(&self, call: &ToolCall) -> Result<Value> {
        let asset = asset(call)?;
        let exchange = toolkit::exchange(call)?;
        tracing::info!(tool = Self::NAME, %asset, %exchange, "Looking up savings yield");

        let products = self.exchanges.authenticated(exchange)?.savings_products().await?;
        let product = products
            .iter()
            .find(|p| p.asset.eq_ignore_ascii_case(&asset))
            .ok_or_else(|| {
                ExchangeError::InvalidRequest(format!("{exchange} has no flexible savings product for {asset}"))
            })?;

        Ok(json!({
            "asset": product.asset,
            "yield": product.rate,
            "product_id": product.product_id,
        }))
    }
}

#[async_trait]
impl Tool for SavingsYieldTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.into(),
            description: "Get the annual rate of the flexible savings product of one asset.".into(),
            parameters: vec![asset_param(), toolkit::exchange_param()],
            category: Some("savings".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let outcome = self.run(call).await;
        toolkit::respond(Self::NAME, outcome, &context(call))
    }
}

fn receipt_data(receipt: &SavingsReceipt) -> Value {
    json!({
        "asset": receipt.asset,
        "amount": receipt.amount,
        "reference": receipt.reference,
        "success": receipt.success,
    })
}

/// Moves funds into flexible savings
pub struct SavingsSubscribeTool {
    exchanges: Arc<dyn ExchangeProvider>,
}

impl SavingsSubscribeTool {
    pub const NAME: &'static str = "purchase_savings_product";

    pub fn new(exchanges: Arc<dyn ExchangeProvider>) -> Self {
        Self { exchanges }
    }

    async fn run(&self, call: &ToolCall) -> Result<Value> {
        let asset = asset(call)?;
        let amount = toolkit::positive(call, "amount")?;
        let exchange = toolkit::exchange(call)?;
        tracing::info!(tool = Self::NAME, %asset, %amount, %exchange, "Subscribing to savings");

        let receipt = self
            .exchanges
            .authenticated(exchange)?
            .subscribe_savings(&asset, amount)
            .await?;
        Ok(receipt_data(&receipt))
    }
}

#[async_trait]
impl Tool for SavingsSubscribeTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.into(),
            description: "Subscribe an amount of an asset from the funding/spot wallet into flexible savings.".into(),
            parameters: vec![
                asset_param(),
                ParameterSchema::required("amount", "number", "Amount to subscribe, greater than 0"),
                toolkit::exchange_param(),
            ],
            category: Some("savings".into()),
            has_side_effects: true,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let outcome = self.run(call).await;
        toolkit::respond(Self::NAME, outcome, &context(call))
    }
}

/// Redeems funds from flexible savings
pub struct SavingsRedeemTool {
    exchanges: Arc<dyn ExchangeProvider>,
}

impl SavingsRedeemTool {
    pub const NAME: &'static str = "redeem_savings_product";

    pub fn new(exchanges: Arc<dyn ExchangeProvider>) -> Self {
        Self { exchanges }
    }

    async fn run(&self, call: &ToolCall) -> Result<Value> {
        let asset = asset(call)?;
        let amount = toolkit::positive(call, "amount")?;
        let exchange = toolkit::exchange(call)?;
        tracing::info!(tool = Self::NAME, %asset, %amount, %exchange, "Redeeming savings");

        let receipt = self.exchanges.authenticated(exchange)?.redeem_savings(&asset, amount).await?;
        Ok(receipt_data(&receipt))
    }
}

#[async_trait]
impl Tool for SavingsRedeemTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.into(),
            description: "Redeem an amount of an asset from flexible savings back to the wallet.".into(),
            parameters: vec![
                asset_param(),
                ParameterSchema::required("amount", "number", "Amount to redeem, greater than 0"),
                toolkit::exchange_param(),
            ],
            category: Some("savings".into()),
            has_side_effects: true,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let outcome = self.run(call).await;
        toolkit::respond(Self::NAME, outcome, &context(call))
    }
}

/// Holdings currently in flexible savings
pub struct SavingsBalanceTool {
    exchanges: Arc<dyn ExchangeProvider>,
}

impl SavingsBalanceTool {
    pub const NAME: &'static str = "get_savings_balance";

    pub fn new(exchanges: Arc<dyn ExchangeProvider>) -> Self {
        Self { exchanges }
    }

    async fn run(&self, call: &ToolCall) -> Result<Value> {
        let exchange = toolkit::exchange(call)?;
        tracing::info!(tool = Self::NAME, %exchange, "Fetching savings balance");

        let positions = self.exchanges.authenticated(exchange)?.savings_positions().await?;
        Ok(json!({
            "count": positions.len(),
            "positions": toolkit::to_value(&positions)?,
        }))
    }
}

#[async_trait]
impl Tool for SavingsBalanceTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.into(),
            description: "Get the assets held in flexible savings with accrued earnings.".into(),
            parameters: vec![toolkit::exchange_param()],
            category: Some("savings".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let outcome = self.run(call).await;
        toolkit::respond(Self::NAME, outcome, &context(call))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::MockExchanges;

    fn provider() -> Arc<dyn ExchangeProvider> {
        Arc::new(MockExchanges::new())
    }

    #[tokio::test]
    async fn test_products_and_yield() {
        let call = ToolCall::new("s").arg("exchange_name", "okx").arg("asset", " usdt ");

        let products = SavingsProductsTool::new(provider()).execute(&call).await.envelope();
        assert_eq!(products["data"]["count"], 2);
        assert_eq!(products["data"]["products"][1]["product_id"], "BTC001");

        let result = SavingsYieldTool::new(provider()).execute(&call).await.envelope();
        assert_eq!(result["data"]["yield"], "0.05");
        assert_eq!(result["metadata"]["asset"], "USDT");

        let missing = call.clone().arg("asset", "DOGE");
        let result = SavingsYieldTool::new(provider()).execute(&missing).await;
        assert!(result.error_message.unwrap().contains("no flexible savings product for DOGE"));
    }

    #[tokio::test]
    async fn test_subscribe_and_redeem() {
        let call = ToolCall::new("s")
            .arg("asset", "usdt")
            .arg("amount", "25.5")
            .arg("exchange_name", "binance");

        let result = SavingsSubscribeTool::new(provider()).execute(&call).await.envelope();
        assert_eq!(result["status"], "success");
        assert_eq!(result["data"]["asset"], "USDT");
        assert_eq!(result["data"]["amount"], "25.5");

        let result = SavingsRedeemTool::new(provider()).execute(&call.clone().arg("amount", 0)).await;
        assert!(result.error_message.unwrap().contains("greater than 0"));
    }

    #[tokio::test]
    async fn test_savings_balance_requires_credentials() {
        let call = ToolCall::new("s").arg("exchange_name", "binance");

        let result = SavingsBalanceTool::new(provider()).execute(&call).await.envelope();
        assert_eq!(result["data"]["positions"][0]["amount"], "200");

        let locked = SavingsBalanceTool::new(Arc::new(MockExchanges::without_credentials()));
        let result = locked.execute(&call).await;
        assert!(result.error_message.unwrap().contains("BINANCE_API_KEY"));
    }
}
