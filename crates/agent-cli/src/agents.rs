//! Agent assembly: six specialists behind one coordinator.

use std::sync::Arc;

use agent_core::tool::DateTimeTool;
use agent_core::{Agent, AgentBuilder, AgentTool, LlmProvider, Result, ToolRegistry};
use code_runner::{CodeExecutionTool, PythonSandbox};
use crypto_agents::ExchangeProvider;
use web_agents::{Browser, NewsFeed};

use crate::config::AppConfig;

pub const COORDINATOR_NAME: &str = "coordinator";

pub const COORDINATOR_PROMPT: &str = r"You are the coordinator of a team of specialist agents. You do
not have data tools yourself: delegate each task to the right specialist by calling it with a
complete `request` that repeats every detail from the user (symbols, exchanges, amounts, URLs,
code, keywords).

Specialists:
- `code_execution_agent`: run Python for calculations, data analysis or scripts.
- `web_scrapy_agent`: read the content of a specific web page (the user gives a URL).
- `google_search_agent`: find information on the web when no URL is given.
- `market_news_agent`: crypto news flashes, keyword news searches, macro-economic news.
- `crypto_market_agent`: prices, order books, trades, candles, funding rates, open interest,
  exchange and symbol info, coin introductions and whitepapers.
- `crypto_trade_agent`: balances, positions, placing or canceling orders, order history,
  flexible savings. Only when the user explicitly asks to trade or check their account.

Use `datetime` for the current date and time.

Rules:
1. Split multi-part questions and call one specialist per part, then combine the answers.
2. Pass the specialist's findings on faithfully; do not invent numbers.
3. If a specialist reports an error, tell the user what failed and what they can do.
4. Answer greetings and questions about yourself directly.";

/// External services the tools talk to
pub struct Backends {
    pub browser: Arc<dyn Browser>,
    pub http: reqwest::Client,
    pub exchanges: Arc<dyn ExchangeProvider>,
    pub news: Arc<dyn NewsFeed>,
    pub sandbox: PythonSandbox,
}

fn specialist(
    provider: &Arc<dyn LlmProvider>,
    config: &AppConfig,
    name: &str,
    description: &str,
    prompt: &str,
    tools: ToolRegistry,
) -> Result<Arc<Agent>> {
    tracing::debug!(agent = name, tools = tools.len(), "Building specialist");
    let agent = AgentBuilder::new()
        .provider(provider.clone())
        .name(name)
        .description(description)
        .system_prompt(prompt)
        .model(config.model.clone())
        .max_iterations(config.max_iterations)
        .tools(tools)
        .build()?;
    Ok(Arc::new(agent))
}

pub fn specialists(provider: &Arc<dyn LlmProvider>, config: &AppConfig, backends: Backends) -> Result<Vec<Arc<Agent>>> {
    let mut code_tools = ToolRegistry::new();
    code_tools.register(CodeExecutionTool::new(backends.sandbox));

    Ok(vec![
        specialist(
            provider,
            config,
            code_runner::CODE_AGENT_NAME,
            code_runner::CODE_AGENT_DESCRIPTION,
            code_runner::CODE_AGENT_PROMPT,
            code_tools,
        )?,
        specialist(
            provider,
            config,
            web_agents::SCRAPE_AGENT_NAME,
            web_agents::SCRAPE_AGENT_DESCRIPTION,
            web_agents::SCRAPE_AGENT_PROMPT,
            web_agents::scrape_tools(&backends.browser),
        )?,
        specialist(
            provider,
            config,
            web_agents::SEARCH_AGENT_NAME,
            web_agents::SEARCH_AGENT_DESCRIPTION,
            web_agents::SEARCH_AGENT_PROMPT,
            web_agents::search_tools(&backends.browser, &backends.http),
        )?,
        specialist(
            provider,
            config,
            web_agents::NEWS_AGENT_NAME,
            web_agents::NEWS_AGENT_DESCRIPTION,
            web_agents::NEWS_AGENT_PROMPT,
            web_agents::news_tools(&backends.news),
        )?,
        specialist(
            provider,
            config,
            crypto_agents::MARKET_AGENT_NAME,
            crypto_agents::MARKET_AGENT_DESCRIPTION,
            crypto_agents::MARKET_AGENT_PROMPT,
            crypto_agents::market_tools(&backends.exchanges, &backends.http),
        )?,
        specialist(
            provider,
            config,
            crypto_agents::TRADE_AGENT_NAME,
            crypto_agents::TRADE_AGENT_DESCRIPTION,
            crypto_agents::TRADE_AGENT_PROMPT,
            crypto_agents::trade_tools(&backends.exchanges),
        )?,
    ])
}

/// Coordinator holding one delegation tool per specialist plus `datetime`
pub fn coordinator(provider: &Arc<dyn LlmProvider>, config: &AppConfig, specialists: Vec<Arc<Agent>>) -> Result<Agent> {
    let mut builder = AgentBuilder::new()
        .provider(provider.clone())
        .name(COORDINATOR_NAME)
        .description("Routes user requests to specialist agents")
        .system_prompt(COORDINATOR_PROMPT)
        .model(config.model.clone())
        .max_iterations(config.max_iterations)
        .tool(DateTimeTool);

    for agent in specialists {
        builder = builder.tool(AgentTool::new(agent));
    }
    builder.build()
}
