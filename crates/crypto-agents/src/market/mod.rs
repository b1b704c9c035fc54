//! Market data tools for the crypto market agent

mod coin_info;
mod derivatives;
mod instruments;
mod quotes;

pub use coin_info::{IntroductionTool, WhitepaperTool, extract_introduction, parse_whitepaper};
pub use derivatives::{FundingRateTool, KlineTool, OpenInterestTool};
pub use instruments::{SupportedExchangesTool, SymbolInfoTool};
pub use quotes::{MarketOverviewTool, OrderBookTool, TickerTool, TradesTool};

use std::sync::Arc;

use agent_core::ToolRegistry;

use crate::exchange::ExchangeProvider;

/// Every market tool. `http` is used for CoinMarketCap requests.
pub fn market_tools(exchanges: &Arc<dyn ExchangeProvider>, http: &reqwest::Client) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(TickerTool::new(exchanges.clone()));
    registry.register(OrderBookTool::new(exchanges.clone()));
    registry.register(TradesTool::new(exchanges.clone()));
    registry.register(MarketOverviewTool::new(exchanges.clone()));
    registry.register(SupportedExchangesTool::new(exchanges.clone()));
    registry.register(SymbolInfoTool::new(exchanges.clone()));
    registry.register(KlineTool::new(exchanges.clone()));
    registry.register(FundingRateTool::new(exchanges.clone()));
    registry.register(OpenInterestTool::new(exchanges.clone()));
    registry.register(WhitepaperTool::new(http.clone()));
    registry.register(IntroductionTool::new(http.clone()));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::MockExchanges;

    #[test]
    fn test_market_tools_registered() {
        let exchanges: Arc<dyn ExchangeProvider> = Arc::new(MockExchanges::new());
        let registry = market_tools(&exchanges, &reqwest::Client::new());

        assert_eq!(registry.len(), 11);
        for name in [
            "get_ticker_data",
            "get_orderbook_data",
            "get_trades_data",
            "get_market_overview",
            "get_supported_exchanges",
            "get_symbol_info",
            "get_kline_data",
            "get_funding_rate",
            "get_open_interest_data",
            "get_coin_introduction_by_whitepaper",
            "get_coin_introduction",
        ] {
            assert!(registry.get(name).is_some(), "missing {name}");
        }
        assert!(registry.schemas().iter().all(|s| !s.has_side_effects));
    }
}
