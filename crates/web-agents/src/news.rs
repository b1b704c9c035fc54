//! Market news flashes for the `market_news_agent`
//!
//! ```text
//! get_latest_market_news ─┐
//! search_market_news ─────┼──► NewsFeed ──► AiCoin flash list / search
//! batch_search_market_news┘        └──────► Jin10 macro flashes
//! get_macro_data ─────────────────┘
//! ```
//!
//! [`NewsFeed`] returns the raw JSON bodies; the `parse_*` functions turn
//! them into news items.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use serde::Serialize;
use serde_json::{Map, Value, json};

use agent_core::{ParameterSchema, Tool, ToolCall, ToolResult, ToolSchema};

use crate::error::{Result, WebError};
use crate::report::{self, Reply};

pub const AICOIN_FLASH_URL: &str = "https://api-test.aicoin.com/v3/hotFlash/getNewsFlashList";
pub const AICOIN_SEARCH_URL: &str = "https://www.aicoin.com/api/upgrade/search/newsflashByScore";
pub const JIN10_FLASH_URL: &str = "https://flash-api.jin10.com/get_flash_list";

const AICOIN_APP_AGENT: &str = "AICoin_Test/2.5.54 (android SDK 31; OnePlus/900 screenSize/1080x2208 \
density/3.0 isStoreRelease/false)";
/// Public web-client id the Jin10 site sends with every flash request
const JIN10_APP_ID: &str = "bVBF4FyRTn5NJF5n";
const JIN10_MACRO_CHANNEL: &str = "-8200";

const FLASH_ATTEMPTS: u32 = 3;
const FLASH_RETRY_DELAY: Duration = Duration::from_secs(1);
const BATCH_PAUSE: Duration = Duration::from_millis(500);
const DEFAULT_BATCH_PAGE_SIZE: usize = 10;
const DEFAULT_MACRO_LIMIT: usize = 50;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const LATEST_NEWS_TOOL: &str = "get_latest_market_news";
pub const SEARCH_NEWS_TOOL: &str = "search_market_news";
pub const BATCH_SEARCH_TOOL: &str = "batch_search_market_news";
pub const MACRO_DATA_TOOL: &str = "get_macro_data";

#[async_trait]
pub trait NewsFeed: Send + Sync {
    /// AiCoin newest flashes (one page of up to 1000)
    async fn latest_flashes(&self) -> Result<Value>;

    /// AiCoin flashes ranked by relevance to `keyword`
    async fn search_flashes(&self, keyword: &str, page_size: usize) -> Result<Value>;

    /// Jin10 macro flashes published before `max_time` (`%Y-%m-%d %H:%M:%S`)
    async fn macro_flashes(&self, max_time: &str) -> Result<Value>;
}

/// Where [`LiveNewsFeed`] sends its three requests
#[derive(Clone, Debug)]
pub struct NewsEndpoints {
    pub flash_url: String,
    pub search_url: String,
    pub macro_url: String,
}

impl Default for NewsEndpoints {
    fn default() -> Self {
        Self {
            flash_url: AICOIN_FLASH_URL.into(),
            search_url: AICOIN_SEARCH_URL.into(),
            macro_url: JIN10_FLASH_URL.into(),
        }
    }
}

/// The public AiCoin and Jin10 endpoints
pub struct LiveNewsFeed {
    http: reqwest::Client,
    endpoints: NewsEndpoints,
}

impl LiveNewsFeed {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_endpoints(http, NewsEndpoints::default())
    }

    pub fn with_endpoints(http: reqwest::Client, endpoints: NewsEndpoints) -> Self {
        Self { http, endpoints }
    }

    async fn json(response: reqwest::Response) -> Result<Value> {
        let url = response.url().to_string();
        let body = crate::http::text(response).await?;
        serde_json::from_str(&body).map_err(|e| WebError::Decode(format!("{url}: {e}")))
    }
}

#[async_trait]
impl NewsFeed for LiveNewsFeed {
    async fn latest_flashes(&self) -> Result<Value> {
        let params = json!({
            "type": "1",
            "lan": "cn",
            "userid": "",
            "lastid": "",
            "pagesize": 1000,
            "version": "v1",
        });
        let response = self
            .http
            .post(&self.endpoints.flash_url)
            .header(reqwest::header::USER_AGENT, AICOIN_APP_AGENT)
            .json(&params)
            .send()
            .await?;
        Self::json(response).await
    }

    async fn search_flashes(&self, keyword: &str, page_size: usize) -> Result<Value> {
        let params = json!({ "keyWord": keyword, "page": 1, "pageSize": page_size });
        let response = self.http.post(&self.endpoints.search_url).json(&params).send().await?;
        Self::json(response).await
    }

    async fn macro_flashes(&self, max_time: &str) -> Result<Value> {
        let response = self
            .http
            .get(&self.endpoints.macro_url)
            .query(&[("channel", JIN10_MACRO_CHANNEL), ("vip", "1"), ("max_time", max_time)])
            .header("x-app-id", JIN10_APP_ID)
            .header("x-version", "1.0.0")
            .header(reqwest::header::ACCEPT, "application/json, text/plain, */*")
            .header(reqwest::header::ACCEPT_LANGUAGE, "zh-CN,zh;q=0.9,en;q=0.8")
            .header(reqwest::header::REFERER, "https://www.jin10.com/")
            .send()
            .await?;
        Self::json(response).await
    }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct NewsItem {
    pub title: String,
    pub content: String,
    pub time: String,
    pub source: String,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct MacroItem {
    pub time: String,
    pub content: String,
}

/// Epoch seconds as `%Y-%m-%d %H:%M:%S` in `zone`
pub fn format_epoch<Tz: TimeZone>(seconds: i64, zone: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    DateTime::from_timestamp(seconds, 0)
        .map(|t| t.with_timezone(zone).format(TIME_FORMAT).to_string())
        .unwrap_or_default()
}

fn str_field(item: &Value, key: &str) -> String {
    match item.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn epoch_field(item: &Value, key: &str) -> i64 {
    match item.get(key) {
        Some(Value::Number(n)) => n.as_i64().unwrap_or_default(),
        Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    }
}

fn news_item<Tz: TimeZone>(item: &Value, time_key: &str, zone: &Tz) -> NewsItem
where
    Tz::Offset: std::fmt::Display,
{
    NewsItem {
        title: str_field(item, "title"),
        content: str_field(item, "content"),
        time: format_epoch(epoch_field(item, time_key), zone),
        source: str_field(item, "source"),
    }
}

/// `data.tbody` of the AiCoin flash list
pub fn parse_flash_list<Tz: TimeZone>(body: &Value, zone: &Tz) -> Result<Vec<NewsItem>>
where
    Tz::Offset: std::fmt::Display,
{
    let rows = body
        .pointer("/data/tbody")
        .and_then(Value::as_array)
        .ok_or_else(|| WebError::Decode("AiCoin flash list has no data.tbody".into()))?;
    Ok(rows.iter().map(|row| news_item(row, "time", zone)).collect())
}

/// Search hits plus the total match count the API reports
pub fn parse_search_response<Tz: TimeZone>(body: &Value, zone: &Tz) -> Result<(Vec<NewsItem>, u64)>
where
    Tz::Offset: std::fmt::Display,
{
    if body.get("success").and_then(Value::as_bool) != Some(true) {
        let message = body
            .get("message")
            .or_else(|| body.get("msg"))
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(WebError::Api {
            source_name: "AiCoin".into(),
            message: message.to_string(),
        });
    }

    let items: Vec<NewsItem> = body
        .pointer("/data/list")
        .and_then(Value::as_array)
        .map(|list| list.iter().map(|row| news_item(row, "createTime", zone)).collect())
        .unwrap_or_default();
    let total = body
        .pointer("/data/count")
        .and_then(Value::as_u64)
        .unwrap_or(items.len() as u64);
    Ok((items, total))
}

/// Jin10 `data` rows; a missing or non-array `data` reads as empty
pub fn parse_macro_list(body: &Value) -> Result<Vec<MacroItem>> {
    if !body.is_object() {
        return Err(WebError::Decode("Jin10 response is not an object".into()));
    }
    Ok(body
        .get("data")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .map(|row| MacroItem {
                    time: str_field(row, "time"),
                    content: row
                        .pointer("/data/content")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                })
                .collect()
        })
        .unwrap_or_default())
}

fn limit(call: &ToolCall, key: &str, max: i64) -> Option<usize> {
    call.int(key)
        .filter(|n| (1..=max).contains(n))
        .and_then(|n| usize::try_from(n).ok())
}

fn count_info(total: usize, requested: usize, returned: usize) -> Value {
    json!({
        "total_available": total,
        "requested_limit": requested,
        "actual_returned": returned,
    })
}

/// Newest AiCoin flashes
pub struct LatestNewsTool {
    feed: Arc<dyn NewsFeed>,
}

impl LatestNewsTool {
    pub fn new(feed: Arc<dyn NewsFeed>) -> Self {
        Self { feed }
    }

    async fn fetch_with_retry(&self) -> Result<Value> {
        let mut attempt = 1;
        loop {
            match self.feed.latest_flashes().await {
                Ok(body) => return Ok(body),
                Err(e) if attempt < FLASH_ATTEMPTS => {
                    tracing::warn!(attempt, error = %e, "AiCoin flash list failed, retrying");
                    tokio::time::sleep(FLASH_RETRY_DELAY).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn run(&self, call: &ToolCall) -> Result<Reply> {
        let limit = limit(call, "limit", 1000)
            .ok_or_else(|| WebError::invalid("limit must be an integer between 1 and 1000"))?;
        tracing::info!(tool = LATEST_NEWS_TOOL, limit, "Fetching latest flashes");

        let body = self.fetch_with_retry().await?;
        let mut news = parse_flash_list(&body, &Local)?;
        let total = news.len();
        news.truncate(limit);

        let meta = report::fields([
            ("data_source", json!("AiCoin")),
            ("requested_limit", json!(limit)),
            ("total_available_count", json!(total)),
            ("returned_count", json!(news.len())),
        ]);
        let data = json!({
            "news": news,
            "count_info": count_info(total, limit, news.len()),
        });
        Ok((data, meta))
    }
}

#[async_trait]
impl Tool for LatestNewsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: LATEST_NEWS_TOOL.into(),
            description: "Get the newest crypto market news flashes from AiCoin (title, content, time, source).".into(),
            parameters: vec![ParameterSchema::required("limit", "integer", "Number of flashes, 1-1000")],
            category: Some("news".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let outcome = self.run(call).await;
        report::respond(LATEST_NEWS_TOOL, outcome, &[])
    }
}

/// One keyword search, shared with the batch tool
async fn search(feed: &dyn NewsFeed, keyword: &str, page_size: usize) -> Result<Reply> {
    let body = feed.search_flashes(keyword, page_size).await?;
    let (news, total) = parse_search_response(&body, &Local)?;

    let meta = report::fields([
        ("api_url", json!(AICOIN_SEARCH_URL)),
        ("search_keyword", json!(keyword)),
        ("requested_page_size", json!(page_size)),
        ("actual_returned_count", json!(news.len())),
    ]);
    let data = json!({
        "keyword": keyword,
        "page_info": {
            "current_page": 1,
            "page_size": page_size,
            "total_count": total,
            "returned_count": news.len(),
        },
        "news": news,
    });
    Ok((data, meta))
}

/// AiCoin keyword search
pub struct NewsSearchTool {
    feed: Arc<dyn NewsFeed>,
}

impl NewsSearchTool {
    pub fn new(feed: Arc<dyn NewsFeed>) -> Self {
        Self { feed }
    }

    async fn run(&self, call: &ToolCall) -> Result<Reply> {
        let keyword = call.text("keyword");
        if keyword.is_empty() {
            return Err(WebError::invalid("keyword cannot be empty"));
        }
        let page_size = limit(call, "page_size", 100)
            .ok_or_else(|| WebError::invalid("page_size must be an integer between 1 and 100"))?;
        tracing::info!(tool = SEARCH_NEWS_TOOL, %keyword, page_size, "Searching flashes");

        search(self.feed.as_ref(), &keyword, page_size).await
    }
}

#[async_trait]
impl Tool for NewsSearchTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: SEARCH_NEWS_TOOL.into(),
            description: "Search AiCoin news flashes for one keyword, e.g. '比特币', '美联储', 'ETF'.".into(),
            parameters: vec![
                ParameterSchema::required("keyword", "string", "Search keyword"),
                ParameterSchema::required("page_size", "integer", "Flashes to return, 1-100"),
            ],
            category: Some("news".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let outcome = self.run(call).await;
        report::respond(SEARCH_NEWS_TOOL, outcome, &[("search_keyword", json!(call.text("keyword")))])
    }
}

/// Several keyword searches in sequence
pub struct BatchNewsSearchTool {
    feed: Arc<dyn NewsFeed>,
}

impl BatchNewsSearchTool {
    pub fn new(feed: Arc<dyn NewsFeed>) -> Self {
        Self { feed }
    }

    async fn keyword_result(&self, keyword: &str, page_size: usize) -> (Value, usize) {
        match search(self.feed.as_ref(), keyword, page_size).await {
            Ok((data, meta)) => {
                let count = data["news"].as_array().map_or(0, Vec::len);
                tracing::debug!(keyword, count, "Keyword search succeeded");
                let row = json!({
                    "keyword": keyword,
                    "status": "success",
                    "news": data["news"],
                    "news_count": count,
                    "search_metadata": meta,
                });
                (row, count)
            }
            Err(e) => {
                tracing::warn!(keyword, error = %e, "Keyword search failed");
                let row = json!({
                    "keyword": keyword,
                    "status": "error",
                    "news": [],
                    "news_count": 0,
                    "error_message": e.to_string(),
                });
                (row, 0)
            }
        }
    }
}

#[async_trait]
impl Tool for BatchNewsSearchTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: BATCH_SEARCH_TOOL.into(),
            description: "Search AiCoin news flashes for several keywords at once and summarize the hits \
                per keyword. Status is partial_success when only some keywords succeed."
                .into(),
            parameters: vec![
                ParameterSchema::required("keywords", "array", "Keywords, e.g. [\"比特币\", \"以太坊\"]"),
                ParameterSchema::optional(
                    "page_size_per_keyword",
                    "integer",
                    "Flashes per keyword, 1-100",
                    json!(DEFAULT_BATCH_PAGE_SIZE),
                ),
            ],
            category: Some("news".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let keywords = call.list("keywords");
        if keywords.is_empty() {
            return report::failure(BATCH_SEARCH_TOOL, &WebError::invalid("keywords must contain at least one non-empty keyword"), &[]);
        }
        let page_size = limit(call, "page_size_per_keyword", 100).unwrap_or(DEFAULT_BATCH_PAGE_SIZE);
        tracing::info!(tool = BATCH_SEARCH_TOOL, keywords = keywords.len(), page_size, "Batch searching flashes");

        let mut results = Vec::with_capacity(keywords.len());
        let (mut succeeded, mut total_news) = (0_usize, 0_usize);
        for (i, keyword) in keywords.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(BATCH_PAUSE).await;
            }
            let (row, count) = self.keyword_result(keyword, page_size).await;
            if row["status"] == "success" {
                succeeded += 1;
            }
            total_news += count;
            results.push(row);
        }

        let failed = keywords.len() - succeeded;
        let summary = batch_summary(keywords.len(), succeeded, total_news);
        let data = json!({ "results": results, "summary": summary });
        let meta = report::metadata(
            &[],
            report::fields([
                ("requested_keywords", json!(keywords)),
                ("page_size_per_keyword", json!(page_size)),
                ("api_calls_made", json!(keywords.len())),
            ]),
        );

        if succeeded == 0 {
            tracing::warn!(tool = BATCH_SEARCH_TOOL, failed, "Every keyword search failed");
            ToolResult::failure(
                BATCH_SEARCH_TOOL,
                format!("Batch search failed: {failed}/{} keyword searches failed", keywords.len()),
            )
            .with_data(data)
            .with_metadata(meta)
        } else if failed > 0 {
            tracing::info!(tool = BATCH_SEARCH_TOOL, succeeded, failed, "Batch search partly succeeded");
            ToolResult::partial(BATCH_SEARCH_TOOL, data).with_metadata(meta)
        } else {
            tracing::info!(tool = BATCH_SEARCH_TOOL, total_news, "Tool completed");
            ToolResult::success(BATCH_SEARCH_TOOL, data).with_metadata(meta)
        }
    }
}

fn batch_summary(total: usize, succeeded: usize, news_found: usize) -> Value {
    #[allow(clippy::cast_precision_loss)]
    let rate = if total == 0 {
        0.0
    } else {
        (succeeded as f64 / total as f64 * 10_000.0).round() / 100.0
    };
    json!({
        "total_keywords": total,
        "successful_searches": succeeded,
        "failed_searches": total - succeeded,
        "total_news_found": news_found,
        "success_rate": rate,
    })
}

/// Jin10 macro-economic flashes older than one hour
pub struct MacroDataTool {
    feed: Arc<dyn NewsFeed>,
}

impl MacroDataTool {
    pub fn new(feed: Arc<dyn NewsFeed>) -> Self {
        Self { feed }
    }

    async fn run(&self, call: &ToolCall) -> Result<Reply> {
        let limit = limit(call, "limit", 100).unwrap_or(DEFAULT_MACRO_LIMIT);
        let max_time = (Local::now() - chrono::Duration::hours(1)).format(TIME_FORMAT).to_string();
        tracing::info!(tool = MACRO_DATA_TOOL, limit, %max_time, "Fetching macro flashes");

        let body = self.feed.macro_flashes(&max_time).await?;
        let mut items = parse_macro_list(&body)?;
        let total = items.len();
        items.truncate(limit);

        let meta: Map<String, Value> = report::fields([
            ("data_source", json!("Jin10")),
            ("api_url", json!(JIN10_FLASH_URL)),
            ("max_time_used", json!(max_time)),
            ("requested_limit", json!(limit)),
            ("total_available_count", json!(total)),
            ("returned_count", json!(items.len())),
        ]);
        let data = json!({
            "macro_data": items,
            "count_info": count_info(total, limit, items.len()),
        });
        Ok((data, meta))
    }
}

#[async_trait]
impl Tool for MacroDataTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: MACRO_DATA_TOOL.into(),
            description: "Get the latest macro-economic news flashes from Jin10 (rates, CPI, central banks).".into(),
            parameters: vec![ParameterSchema::optional(
                "limit",
                "integer",
                "Number of flashes, 1-100",
                json!(DEFAULT_MACRO_LIMIT),
            )],
            category: Some("news".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let outcome = self.run(call).await;
        report::respond(MACRO_DATA_TOOL, outcome, &[])
    }
}
