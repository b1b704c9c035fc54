//! Coin background from CoinMarketCap: whitepaper summaries and the
//! currency page introduction.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::StatusCode;
use serde_json::{Value, json};

use agent_core::tool::ParameterSchema;
use agent_core::{Tool, ToolCall, ToolResult, ToolSchema};

use crate::error::{ExchangeError, Result};
use crate::toolkit;

const WHITEPAPER_URL: &str = "https://s3.coinmarketcap.com/whitepaper/summaries";
const CURRENCY_URL: &str = "https://www.coinmarketcap.com/currencies";

const WHITEPAPER_SECTIONS: [&str; 5] = ["tldr", "technology", "team", "tokenomics", "roadmap"];

static NEXT_DATA: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"(?s)<script[^>]*id="__NEXT_DATA__"[^>]*>(.*?)</script>"#).ok());

fn coin_param() -> ParameterSchema {
    ParameterSchema::required(
        "coin_name",
        "string",
        "Coin name as used in CoinMarketCap URLs, e.g. 'bitcoin', 'ethereum'",
    )
}

fn coin_name(call: &ToolCall) -> Result<String> {
    Ok(toolkit::required(call, "coin_name", "coin_name")?.to_lowercase())
}

async fn fetch(http: &reqwest::Client, url: &str, coin: &str, what: &str) -> Result<(StatusCode, String)> {
    tracing::debug!(%url, "Requesting CoinMarketCap");
    let response = http.get(url).send().await?;
    let status = response.status();
    match status {
        StatusCode::OK => Ok((status, response.text().await?)),
        StatusCode::NOT_FOUND => Err(ExchangeError::InvalidRequest(format!(
            "No {what} found for '{coin}'; check the coin name"
        ))),
        _ => Err(ExchangeError::InvalidRequest(format!(
            "Failed to fetch {what} for '{coin}': HTTP {}",
            status.as_u16()
        ))),
    }
}

/// `expert` sections of a whitepaper summary document
pub fn parse_whitepaper(coin: &str, document: &Value) -> Result<Value> {
    let expert = document
        .get("expert")
        .filter(|e| e.as_object().is_some_and(|o| !o.is_empty()))
        .ok_or_else(|| ExchangeError::InvalidRequest(format!("No whitepaper analysis available for '{coin}'")))?;

    let mut data = json!({ "coin_name": coin });
    for section in WHITEPAPER_SECTIONS {
        data[section] = json!(expert.get(section).and_then(Value::as_str).unwrap_or_default());
    }
    Ok(data)
}

fn completeness(data: &Value) -> Value {
    let mut flags = serde_json::Map::new();
    for section in WHITEPAPER_SECTIONS {
        let present = data[section].as_str().is_some_and(|s| !s.is_empty());
        flags.insert(format!("has_{section}"), json!(present));
    }
    Value::Object(flags)
}

/// Expert summary of a coin's whitepaper
pub struct WhitepaperTool {
    http: reqwest::Client,
}

impl WhitepaperTool {
    pub const NAME: &'static str = "get_coin_introduction_by_whitepaper";

    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn run(&self, coin: &str, url: &str) -> Result<(Value, u16)> {
        let (status, body) = fetch(&self.http, url, coin, "whitepaper summary").await?;
        let document: Value = serde_json::from_str(&body)?;
        Ok((parse_whitepaper(coin, &document)?, status.as_u16()))
    }
}

#[async_trait]
impl Tool for WhitepaperTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.into(),
            description: "Get an expert summary of a coin's whitepaper: TL;DR, technology, team, \
                          tokenomics and roadmap."
                .into(),
            parameters: vec![coin_param()],
            category: Some("coin_research".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let coin = match coin_name(call) {
            Ok(coin) => coin,
            Err(e) => return toolkit::failure(Self::NAME, &e, &[]),
        };
        let url = format!("{WHITEPAPER_URL}/{coin}/en.json");
        tracing::info!(tool = Self::NAME, %coin, "Fetching whitepaper summary");

        match self.run(&coin, &url).await {
            Ok((data, status)) => {
                let context = [
                    ("data_source", json!("CoinMarketCap Whitepaper Summaries API")),
                    ("source_url", json!(url)),
                    ("requested_coin", json!(call.text("coin_name"))),
                    ("response_status_code", json!(status)),
                    ("data_completeness", completeness(&data)),
                ];
                toolkit::success(Self::NAME, data, &context)
            }
            Err(e) => toolkit::failure(Self::NAME, &e, &[("source_url", json!(url))]),
        }
    }
}

/// `props.pageProps.cdpFaqData.faqDescription` from a currency page
pub fn extract_introduction(html: &str) -> Result<String> {
    let script = NEXT_DATA
        .as_ref()
        .and_then(|re| re.captures(html))
        .and_then(|c| c.get(1))
        .ok_or_else(|| ExchangeError::decode("page has no __NEXT_DATA__ script"))?;

    let next_data: Value = serde_json::from_str(script.as_str())?;
    next_data
        .pointer("/props/pageProps/cdpFaqData/faqDescription")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ExchangeError::decode("page has no introduction"))
}

/// Short project introduction from the CoinMarketCap currency page
pub struct IntroductionTool {
    http: reqwest::Client,
}

impl IntroductionTool {
    pub const NAME: &'static str = "get_coin_introduction";

    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn run(&self, coin: &str, url: &str) -> Result<Value> {
        let (_, html) = fetch(&self.http, url, coin, "coin page").await?;
        let introduction = extract_introduction(&html)?;
        Ok(json!({
            "coin_name": coin,
            "introduction": introduction,
        }))
    }
}

#[async_trait]
impl Tool for IntroductionTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: Self::NAME.into(),
            description: "Get a short introduction of a coin: what the project is and what it is used for.".into(),
            parameters: vec![coin_param()],
            category: Some("coin_research".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let coin = match coin_name(call) {
            Ok(coin) => coin,
            Err(e) => return toolkit::failure(Self::NAME, &e, &[]),
        };
        let url = format!("{CURRENCY_URL}/{coin}/");
        tracing::info!(tool = Self::NAME, %coin, "Fetching coin introduction");

        let outcome = self.run(&coin, &url).await;
        let has_introduction = outcome.is_ok();
        toolkit::respond(
            Self::NAME,
            outcome,
            &[
                ("data_source", json!("CoinMarketCap")),
                ("source_url", json!(url)),
                ("data_completeness", json!({ "has_introduction": has_introduction })),
            ],
        )
    }
}
