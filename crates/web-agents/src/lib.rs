//! # web-agents
//!
//! Tools for the `web_scrapy_agent`, the `google_search_agent` and the
//! `market_news_agent`.
//!
//! ```text
//! ┌──────────────┐  ┌──────────────────┐  ┌─────────────────┐
//! │ ScrapeTool   │  │ Google search x3 │  │ news tools x4   │
//! └──────┬───────┘  └──┬────────────┬──┘  └────────┬────────┘
//!        ▼             ▼            ▼ result pages ▼
//!   Browser (WebDriver, thirtyfour)   reqwest ──► NewsFeed (AiCoin, Jin10)
//! ```
//!
//! Browser visits and HTTP requests honor the proxy from `https_proxy` /
//! `http_proxy` (see [`agent_core::ProxySettings::http_client`]).

pub mod browser;
pub mod error;
pub mod extract;
pub mod http;
pub mod news;
pub mod report;
pub mod scrape;
pub mod search;

use std::sync::Arc;

use agent_core::ToolRegistry;

pub use browser::{Browser, BrowserConfig, PageVisit, WebDriverBrowser};
pub use error::{Result, WebError};
pub use news::{
    BatchNewsSearchTool, LatestNewsTool, LiveNewsFeed, MacroDataTool, NewsEndpoints, NewsFeed, NewsSearchTool,
};
pub use scrape::ScrapeTool;
pub use search::{GoogleSearchTool, QuickSearchTool, SearchExtractTool};

pub fn scrape_tools(browser: &Arc<dyn Browser>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(ScrapeTool::new(browser.clone()));
    registry
}

pub fn search_tools(browser: &Arc<dyn Browser>, http: &reqwest::Client) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(GoogleSearchTool::new(browser.clone()));
    registry.register(QuickSearchTool::new(browser.clone()));
    registry.register(SearchExtractTool::new(browser.clone(), http.clone()));
    registry
}

pub fn news_tools(feed: &Arc<dyn NewsFeed>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(LatestNewsTool::new(feed.clone()));
    registry.register(NewsSearchTool::new(feed.clone()));
    registry.register(BatchNewsSearchTool::new(feed.clone()));
    registry.register(MacroDataTool::new(feed.clone()));
    registry
}

pub const SCRAPE_AGENT_NAME: &str = "web_scrapy_agent";

pub const SCRAPE_AGENT_DESCRIPTION: &str = "Web page scraper. Opens a URL in a headless browser, \
renders JavaScript and returns the page text, title and links.";

pub const SCRAPE_AGENT_PROMPT: &str = r"You are a web scraping assistant.

Use `web_scrapy_playwright(url)` to load a page and read its content. URLs without a scheme are
opened over https.

- Check `status` first. On `error`, explain `error_message` and suggest a fix (typo in the URL,
  site unreachable, page too slow).
- On `success`, summarize `data.content` for the user's question and cite `data.url`.
- Mention relevant entries of `data.links` when the user wants to go deeper.
- Do not invent content that is not on the page.";

pub const SEARCH_AGENT_NAME: &str = "google_search_agent";

pub const SEARCH_AGENT_DESCRIPTION: &str = "Google search agent. Finds web pages for a query, \
optionally downloading each result page to answer from its content.";

pub const SEARCH_AGENT_PROMPT: &str = r"You are a web search assistant backed by Google.

Tools:
1. `quick_google_search(query)`: 10 results in Chinese. Use it for most questions.
2. `google_search_playwright(query, num_results, lang)`: choose the count (1-100) and language
   (e.g. `en`, `zh-CN`).
3. `search_and_extract_content(query, num_results)`: also downloads up to 10 result pages and
   returns their main text. Use it when snippets are not enough to answer.

Workflow:
- Check `status`. If Google blocked the request, say so and suggest retrying later.
- Rank results by relevance, quote titles and links, and base answers on descriptions or
  extracted `content`. Say which results had no content available.";

pub const NEWS_AGENT_NAME: &str = "market_news_agent";

pub const NEWS_AGENT_DESCRIPTION: &str = "Market news agent: latest crypto news flashes, keyword \
and multi-keyword news search from AiCoin, and macro-economic flashes from Jin10.";

pub const NEWS_AGENT_PROMPT: &str = r"You are a market news assistant for crypto and macro news.

Tools:
1. `get_latest_market_news(limit)`: the newest AiCoin flashes.
2. `search_market_news(keyword, page_size)`: flashes about one keyword. Chinese keywords such as
   `比特币` or `美联储` usually match best.
3. `batch_search_market_news(keywords, page_size_per_keyword)`: several keywords at once.
   `partial_success` means some keywords failed; report those separately.
4. `get_macro_data(limit)`: macro-economic flashes from Jin10.

Always include the time of each flash you cite, highlight market-moving items, and give counts
where useful. On `error`, explain `error_message`.";
