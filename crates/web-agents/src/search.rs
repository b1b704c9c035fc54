//! Google search through the headless browser, for the
//! `google_search_agent`.
//!
//! The results page is read by an in-page script that returns raw result
//! blocks; ranking, deduplication and block-page detection happen in
//! [`parse_search_payload`] so they can be exercised without a browser.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use agent_core::{ParameterSchema, Tool, ToolCall, ToolResult, ToolSchema};

use crate::browser::{Browser, PageVisit};
use crate::error::{Result, WebError};
use crate::extract;
use crate::report::{self, Reply};

pub const SEARCH_TOOL: &str = "google_search_playwright";
pub const QUICK_SEARCH_TOOL: &str = "quick_google_search";
pub const SEARCH_EXTRACT_TOOL: &str = "search_and_extract_content";

const GOOGLE_SEARCH_URL: &str = "https://www.google.com/search";
const QUICK_LANGUAGE: &str = "zh-CN";
const QUICK_RESULTS: usize = 10;

const BLOCK_MARKERS: [&str; 3] = ["unusual traffic", "检测到异常流量", "our systems have detected"];

const SEARCH_SCRIPT: &str = r#"
const text = el => ((el && (el.innerText || el.textContent)) || '').trim();
const pick = (root, selectors) => {
    for (const selector of selectors) {
        const value = text(root.querySelector(selector));
        if (value) return value;
    }
    return '';
};
const items = [];
document.querySelectorAll('div[data-ved]').forEach(block => {
    const heading = block.querySelector('h3');
    const anchor = block.querySelector('a[href^="http"]');
    if (!heading || !anchor) return;
    items.push({
        title: text(heading),
        url: anchor.href,
        description: pick(block, ['div[data-sncf="1"]', 'div[style*="-webkit-line-clamp"]', 'span[style*="-webkit-line-clamp"]', '.VwiC3b']),
        displayed_url: pick(block, ['cite', 'span[style*="color"]', '.UdQCqe'])
    });
});
return {
    items: items,
    search_stats: text(document.querySelector('#result-stats')),
    page_text: document.body ? document.body.innerText.slice(0, 5000) : ''
};
"#;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub displayed_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub position: usize,
}

#[derive(Debug, Default, Deserialize)]
struct SearchPayload {
    #[serde(default)]
    items: Vec<SearchResult>,
    #[serde(default)]
    search_stats: String,
    #[serde(default)]
    page_text: String,
}

/// One parsed results page
#[derive(Clone, Debug, Default)]
pub struct SearchPage {
    pub search_url: String,
    pub results: Vec<SearchResult>,
    pub search_stats: String,
}

impl SearchPage {
    fn data(&self, query: &str) -> Value {
        json!({
            "query": query,
            "results": self.results,
            "total_results": self.results.len(),
            "search_url": self.search_url,
            "search_stats": self.search_stats,
        })
    }
}

/// `https://www.google.com/search?q=<query>&hl=<lang>&num=<n>`
pub fn search_url(query: &str, lang: &str, num_results: usize) -> Result<String> {
    let num = num_results.to_string();
    let url = Url::parse_with_params(GOOGLE_SEARCH_URL, &[("q", query), ("hl", lang), ("num", num.as_str())])
        .map_err(|e| WebError::invalid(format!("cannot build search URL: {e}")))?;
    Ok(url.into())
}

/// Rank the raw blocks: links must be absolute, the first occurrence of a
/// link wins, positions count from 1 and at most `num_results` are kept.
pub fn parse_search_payload(visit: &PageVisit, num_results: usize) -> Result<SearchPage> {
    let payload: SearchPayload = serde_json::from_value(visit.payload.clone())
        .map_err(|e| WebError::Decode(format!("search script output: {e}")))?;

    let lowered = payload.page_text.to_lowercase();
    if visit.final_url.contains("/sorry/") || BLOCK_MARKERS.iter().any(|m| lowered.contains(m)) {
        return Err(WebError::Blocked);
    }

    let mut seen = HashSet::new();
    let mut results = Vec::new();
    for item in payload.items {
        if results.len() >= num_results {
            break;
        }
        let title = item.title.trim();
        let url = item.url.trim();
        if title.is_empty() || !url.starts_with("http") || !seen.insert(url.to_string()) {
            continue;
        }
        results.push(SearchResult {
            title: title.to_string(),
            url: url.to_string(),
            displayed_url: item.displayed_url.trim().to_string(),
            description: item.description.trim().to_string(),
            position: results.len() + 1,
        });
    }

    Ok(SearchPage {
        search_url: String::new(),
        results,
        search_stats: payload.search_stats.trim().to_string(),
    })
}

async fn google(browser: &dyn Browser, query: &str, num_results: usize, lang: &str) -> Result<SearchPage> {
    let url = search_url(query, lang, num_results)?;
    tracing::info!(query, lang, num_results, "Searching Google");

    let visit = browser.visit(&url, SEARCH_SCRIPT).await?;
    let mut page = parse_search_payload(&visit, num_results)?;
    page.search_url = url;
    tracing::debug!(results = page.results.len(), "Search results parsed");
    Ok(page)
}

fn query(call: &ToolCall) -> Result<String> {
    let query = call.text("query");
    if query.is_empty() {
        return Err(WebError::invalid("query cannot be empty"));
    }
    Ok(query)
}

fn num_results(call: &ToolCall, max: i64) -> Result<usize> {
    call.int("num_results")
        .filter(|n| (1..=max).contains(n))
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| WebError::invalid(format!("num_results must be an integer between 1 and {max}")))
}

fn query_context(call: &ToolCall) -> [(&'static str, Value); 1] {
    [("processed_query", json!(call.text("query")))]
}

fn query_param() -> ParameterSchema {
    ParameterSchema::required("query", "string", "Search keywords")
}

/// Full-control Google search
pub struct GoogleSearchTool {
    browser: Arc<dyn Browser>,
}

impl GoogleSearchTool {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self { browser }
    }

    async fn run(&self, call: &ToolCall) -> Result<Reply> {
        let query = query(call)?;
        let num_results = num_results(call, 100)?;
        let lang = call.text("lang");
        if lang.is_empty() {
            return Err(WebError::invalid("lang cannot be empty (e.g. 'en', 'zh-CN')"));
        }

        let page = google(self.browser.as_ref(), &query, num_results, &lang).await?;
        let meta = report::fields([
            ("search_language", json!(lang)),
            ("requested_results", json!(num_results)),
            ("results_count", json!(page.results.len())),
        ]);
        Ok((page.data(&query), meta))
    }
}

#[async_trait]
impl Tool for GoogleSearchTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: SEARCH_TOOL.into(),
            description: "Search Google in a headless browser and return ranked results with title, \
                url, displayed_url and description."
                .into(),
            parameters: vec![
                query_param(),
                ParameterSchema::required("num_results", "integer", "Number of results, 1-100"),
                ParameterSchema::required("lang", "string", "Interface language such as 'en' or 'zh-CN'"),
            ],
            category: Some("search".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let outcome = self.run(call).await;
        report::respond(SEARCH_TOOL, outcome, &query_context(call))
    }
}

/// Ten Chinese-language results with no other knobs
pub struct QuickSearchTool {
    browser: Arc<dyn Browser>,
}

impl QuickSearchTool {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self { browser }
    }

    async fn run(&self, call: &ToolCall) -> Result<Reply> {
        let query = query(call)?;
        let page = google(self.browser.as_ref(), &query, QUICK_RESULTS, QUICK_LANGUAGE).await?;
        let meta = report::fields([
            ("search_language", json!(QUICK_LANGUAGE)),
            ("requested_results", json!(QUICK_RESULTS)),
            ("results_count", json!(page.results.len())),
            ("search_type", json!("quick_search")),
            ("default_params_used", json!(true)),
        ]);
        Ok((page.data(&query), meta))
    }
}

#[async_trait]
impl Tool for QuickSearchTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: QUICK_SEARCH_TOOL.into(),
            description: "Quick Google search: 10 results in zh-CN. Use google_search_playwright to \
                choose the count or language."
                .into(),
            parameters: vec![query_param()],
            category: Some("search".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let outcome = self.run(call).await;
        report::respond(QUICK_SEARCH_TOOL, outcome, &query_context(call))
    }
}

/// Search result carrying the text of the page it links to
fn with_content(result: &SearchResult, page: Result<String>) -> Value {
    let mut row = json!(result);
    match page {
        Ok(html) => {
            let text = extract::extract(&html);
            row["page_title"] = json!(text.title);
            row["content"] = json!(text.content);
            row["content_available"] = json!(true);
        }
        Err(e) => {
            row["content"] = json!("");
            row["content_available"] = json!(false);
            row["content_error"] = json!(format!("Content extraction failed: {e}"));
        }
    }
    row
}

/// Search, then fetch and extract each result page over HTTP
pub struct SearchExtractTool {
    browser: Arc<dyn Browser>,
    http: reqwest::Client,
}

impl SearchExtractTool {
    pub fn new(browser: Arc<dyn Browser>, http: reqwest::Client) -> Self {
        Self { browser, http }
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.http.get(url).send().await?;
        crate::http::text(response).await
    }

    async fn run(&self, call: &ToolCall) -> Result<Reply> {
        let query = query(call)?;
        let num_results = match call.arguments.get("num_results") {
            None | Some(Value::Null) => QUICK_RESULTS,
            Some(_) => num_results(call, 10)?,
        };

        let page = google(self.browser.as_ref(), &query, num_results, QUICK_LANGUAGE).await?;

        let mut rows = Vec::with_capacity(page.results.len());
        for result in &page.results {
            tracing::debug!(url = %result.url, "Fetching result page");
            rows.push(with_content(result, self.fetch(&result.url).await));
        }
        let with_text = rows.iter().filter(|r| r["content_available"] == true).count();

        let mut data = page.data(&query);
        data["results"] = Value::Array(rows);
        data["content_extracted"] = json!(true);

        let meta = report::fields([
            ("content_extraction_performed", json!(true)),
            ("results_with_content", json!(with_text)),
        ]);
        Ok((data, meta))
    }
}

#[async_trait]
impl Tool for SearchExtractTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: SEARCH_EXTRACT_TOOL.into(),
            description: "Search Google (zh-CN) and download every result page, returning each \
                result with its page title and main text."
                .into(),
            parameters: vec![
                query_param(),
                ParameterSchema::optional("num_results", "integer", "Number of results, 1-10", json!(10)),
            ],
            category: Some("search".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let outcome = self.run(call).await;
        report::respond(SEARCH_EXTRACT_TOOL, outcome, &query_context(call))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::scripted::ScriptedBrowser;

    fn results_page() -> Value {
        json!({
            "items": [
                {"title": "Bitcoin - Wikipedia", "url": "https://en.wikipedia.org/wiki/Bitcoin",
                 "displayed_url": "https://en.wikipedia.org › wiki › Bitcoin", "description": " Bitcoin is a cryptocurrency. "},
                {"title": "Bitcoin - Wikipedia", "url": "https://en.wikipedia.org/wiki/Bitcoin"},
                {"title": "", "url": "https://untitled.example"},
                {"title": "Relative", "url": "/search?q=more"},
                {"title": "Bitcoin.org", "url": "https://bitcoin.org/en/", "description": "Open source P2P money"},
                {"title": "CoinDesk", "url": "https://www.coindesk.com/price/bitcoin"}
            ],
            "search_stats": " About 1,230,000,000 results ",
            "page_text": "Bitcoin - Wikipedia ..."
        })
    }

    fn visit(payload: Value) -> PageVisit {
        PageVisit {
            final_url: "https://www.google.com/search?q=bitcoin".into(),
            title: "bitcoin - Google Search".into(),
            payload,
        }
    }

    #[test]
    fn test_search_url_encoding() {
        let url = search_url("btc price & news", "zh-CN", 10).unwrap();
        assert_eq!(url, "https://www.google.com/search?q=btc+price+%26+news&hl=zh-CN&num=10");
    }

    #[test]
    fn test_parse_dedupes_and_numbers() {
        let page = parse_search_payload(&visit(results_page()), 10).unwrap();

        let urls: Vec<&str> = page.results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            [
                "https://en.wikipedia.org/wiki/Bitcoin",
                "https://bitcoin.org/en/",
                "https://www.coindesk.com/price/bitcoin"
            ]
        );
        assert_eq!(page.results[0].description, "Bitcoin is a cryptocurrency.");
        assert_eq!(page.results[2].position, 3);
        assert_eq!(page.search_stats, "About 1,230,000,000 results");

        let two = parse_search_payload(&visit(results_page()), 2).unwrap();
        assert_eq!(two.results.len(), 2);
    }

    #[test]
    fn test_block_page_detected() {
        let blocked = visit(json!({
            "items": [],
            "page_text": "Our systems have detected unusual traffic from your computer network."
        }));
        assert!(matches!(parse_search_payload(&blocked, 10), Err(WebError::Blocked)));

        let sorry = PageVisit {
            final_url: "https://www.google.com/sorry/index?continue=x".into(),
            ..visit(json!({}))
        };
        assert!(matches!(parse_search_payload(&sorry, 10), Err(WebError::Blocked)));
    }

    #[tokio::test]
    async fn test_google_search_envelope() {
        let browser = Arc::new(ScriptedBrowser::returning("https://www.google.com/search", "", results_page()));
        let tool = GoogleSearchTool::new(browser.clone());
        let call = ToolCall::new(SEARCH_TOOL)
            .arg("query", "  bitcoin ")
            .arg("num_results", 5)
            .arg("lang", "en");

        let result = tool.execute(&call).await.envelope();

        assert_eq!(browser.visits(), ["https://www.google.com/search?q=bitcoin&hl=en&num=5"]);
        assert_eq!(result["status"], "success");
        assert_eq!(result["data"]["query"], "bitcoin");
        assert_eq!(result["data"]["total_results"], 3);
        assert_eq!(result["metadata"]["processed_query"], "bitcoin");
        assert_eq!(result["metadata"]["search_language"], "en");
        assert_eq!(result["metadata"]["requested_results"], 5);
        assert_eq!(result["metadata"]["results_count"], 3);
    }

    #[tokio::test]
    async fn test_google_search_validation() {
        let browser = Arc::new(ScriptedBrowser::returning("", "", results_page()));
        let tool = GoogleSearchTool::new(browser.clone());

        for call in [
            ToolCall::new(SEARCH_TOOL).arg("query", " ").arg("num_results", 5).arg("lang", "en"),
            ToolCall::new(SEARCH_TOOL).arg("query", "btc").arg("num_results", 0).arg("lang", "en"),
            ToolCall::new(SEARCH_TOOL).arg("query", "btc").arg("num_results", 101).arg("lang", "en"),
            ToolCall::new(SEARCH_TOOL).arg("query", "btc").arg("num_results", 5).arg("lang", ""),
        ] {
            let result = tool.execute(&call).await;
            assert!(!result.is_success());
        }
        assert!(browser.visits().is_empty());
    }

    #[tokio::test]
    async fn test_quick_search_defaults() {
        let browser = Arc::new(ScriptedBrowser::returning("", "", results_page()));
        let tool = QuickSearchTool::new(browser.clone());

        let result = tool.execute(&ToolCall::new(QUICK_SEARCH_TOOL).arg("query", "以太坊")).await.envelope();

        assert!(browser.visits()[0].ends_with("&hl=zh-CN&num=10"));
        assert_eq!(result["metadata"]["search_type"], "quick_search");
        assert_eq!(result["metadata"]["default_params_used"], true);
        assert_eq!(result["metadata"]["search_language"], "zh-CN");
    }

    #[test]
    fn test_with_content() {
        let result = SearchResult {
            title: "t".into(),
            url: "https://a.com".into(),
            position: 1,
            ..SearchResult::default()
        };

        let row = with_content(&result, Ok("<title>A</title><main>Body text</main>".into()));
        assert_eq!(row["page_title"], "A");
        assert_eq!(row["content"], "Body text");
        assert_eq!(row["content_available"], true);
        assert_eq!(row["position"], 1);

        let failed = with_content(
            &result,
            Err(WebError::Http {
                status: 403,
                url: "https://a.com".into(),
            }),
        );
        assert_eq!(failed["content_available"], false);
        assert!(failed["content_error"].as_str().unwrap().contains("403"));
    }

    #[tokio::test]
    async fn test_extract_rejects_large_counts() {
        let browser = Arc::new(ScriptedBrowser::returning("", "", results_page()));
        let tool = SearchExtractTool::new(browser.clone(), reqwest::Client::new());
        let call = ToolCall::new(SEARCH_EXTRACT_TOOL).arg("query", "btc").arg("num_results", 11);

        let result = tool.execute(&call).await;
        assert!(result.error_message.unwrap().contains("between 1 and 10"));
        assert!(browser.visits().is_empty());
    }
}
