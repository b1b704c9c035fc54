//! Web page scraping for the `web_scrapy_agent`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use agent_core::{ParameterSchema, Tool, ToolCall, ToolResult, ToolSchema};

use crate::browser::Browser;
use crate::error::{Result, WebError};
use crate::report::{self, Reply};

pub const TOOL_NAME: &str = "web_scrapy_playwright";

const LINK_TEXT_LIMIT: usize = 100;

/// Page text, every anchor and the navigation status when the browser
/// exposes it
const SCRAPE_SCRIPT: &str = r"
const nav = performance.getEntriesByType('navigation')[0];
return {
    content: document.body ? document.body.innerText : '',
    links: Array.from(document.querySelectorAll('a[href]')).map(a => ({
        href: a.href,
        text: (a.innerText || a.textContent || '').trim()
    })),
    status: nav && nav.responseStatus ? nav.responseStatus : null
};
";

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct PageLink {
    pub url: String,
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawLink {
    #[serde(default)]
    href: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct ScrapePayload {
    #[serde(default)]
    content: String,
    #[serde(default)]
    links: Vec<RawLink>,
    #[serde(default)]
    status: Option<u16>,
}

/// Trim, default to https and require a host
pub fn normalize_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(WebError::invalid("URL cannot be empty"));
    }

    let candidate = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    match Url::parse(&candidate) {
        Ok(url) if url.host_str().is_some_and(|h| !h.is_empty()) => Ok(candidate),
        _ => Err(WebError::invalid(format!("Invalid URL: {trimmed}"))),
    }
}

/// Absolute http(s) links with a host; link text cut to 100 characters
fn keep_links(raw: Vec<RawLink>) -> Vec<PageLink> {
    raw.into_iter()
        .filter(|link| {
            Url::parse(&link.href)
                .is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        })
        .map(|link| PageLink {
            url: link.href,
            text: link.text.trim().chars().take(LINK_TEXT_LIMIT).collect(),
        })
        .collect()
}

/// Loads a page in the browser and returns its text and links
pub struct ScrapeTool {
    browser: Arc<dyn Browser>,
}

impl ScrapeTool {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self { browser }
    }

    async fn run(&self, call: &ToolCall) -> Result<Reply> {
        let url = normalize_url(&call.text("url"))?;
        tracing::info!(tool = TOOL_NAME, %url, "Scraping page");

        let visit = self.browser.visit(&url, SCRAPE_SCRIPT).await?;
        let payload: ScrapePayload = serde_json::from_value(visit.payload)
            .map_err(|e| WebError::Decode(format!("scrape script output: {e}")))?;

        let links = keep_links(payload.links);
        let content_length = payload.content.chars().count();
        let final_url = if visit.final_url.is_empty() { url } else { visit.final_url };

        let meta = report::fields([
            ("links_count", json!(links.len())),
            ("content_length", json!(content_length)),
            ("status_code", json!(payload.status)),
            ("final_url", json!(final_url)),
            ("viewport", json!(self.browser.config().viewport())),
        ]);
        let data = json!({
            "url": final_url,
            "content": payload.content,
            "title": visit.title,
            "links": links,
        });
        Ok((data, meta))
    }
}

#[async_trait]
impl Tool for ScrapeTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: TOOL_NAME.into(),
            description: "Open a web page in a headless browser (JavaScript rendered) and return its \
                visible text, title and outgoing links. URLs without a scheme get https://."
                .into(),
            parameters: vec![ParameterSchema::required(
                "url",
                "string",
                "Page to scrape, e.g. 'https://example.com'",
            )],
            category: Some("web".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> ToolResult {
        let outcome = self.run(call).await;
        report::respond(TOOL_NAME, outcome, &[("requested_url", Value::String(call.text("url")))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::scripted::ScriptedBrowser;

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("  example.com/a ").unwrap(), "https://example.com/a");
        assert_eq!(normalize_url("http://localhost:3000").unwrap(), "http://localhost:3000");
        assert!(normalize_url("   ").unwrap_err().to_string().contains("empty"));
        assert!(normalize_url("https://").unwrap_err().to_string().contains("Invalid URL"));
    }

    #[test]
    fn test_keep_links_filters_and_truncates() {
        let long = "x".repeat(150);
        let links = keep_links(vec![
            RawLink { href: "https://a.com/1".into(), text: "  First ".into() },
            RawLink { href: "javascript:void(0)".into(), text: "js".into() },
            RawLink { href: "mailto:me@a.com".into(), text: "mail".into() },
            RawLink { href: "/relative".into(), text: "rel".into() },
            RawLink { href: "http://b.com".into(), text: long },
        ]);

        assert_eq!(links.len(), 2);
        assert_eq!(links[0], PageLink { url: "https://a.com/1".into(), text: "First".into() });
        assert_eq!(links[1].text.chars().count(), 100);
    }

    #[tokio::test]
    async fn test_scrape_envelope() {
        let browser = Arc::new(ScriptedBrowser::returning(
            "https://example.com/",
            "Example Domain",
            json!({
                "content": "Example Domain\nThis domain is for use in examples.",
                "links": [{"href": "https://www.iana.org/domains/example", "text": "More information..."}],
                "status": 200
            }),
        ));
        let tool = ScrapeTool::new(browser.clone());

        let result = tool.execute(&ToolCall::new(TOOL_NAME).arg("url", " example.com ")).await.envelope();

        assert_eq!(browser.visits(), ["https://example.com"]);
        assert_eq!(result["status"], "success");
        assert_eq!(result["data"]["url"], "https://example.com/");
        assert_eq!(result["data"]["title"], "Example Domain");
        assert_eq!(result["data"]["links"][0]["url"], "https://www.iana.org/domains/example");
        assert_eq!(result["metadata"]["links_count"], 1);
        assert_eq!(result["metadata"]["content_length"], 50);
        assert_eq!(result["metadata"]["status_code"], 200);
        assert_eq!(result["metadata"]["viewport"], "1920x1080");
    }

    #[tokio::test]
    async fn test_browser_failure_is_error_envelope() {
        let browser = Arc::new(ScriptedBrowser::new(|_| Err(WebError::Timeout(60))));
        let result = ScrapeTool::new(browser).execute(&ToolCall::new(TOOL_NAME).arg("url", "example.com")).await;

        assert!(!result.is_success());
        assert!(result.error_message.unwrap().contains("60 seconds"));
    }

    #[tokio::test]
    async fn test_empty_url_never_reaches_browser() {
        let browser = Arc::new(ScriptedBrowser::returning("", "", json!({})));
        let result = ScrapeTool::new(browser.clone()).execute(&ToolCall::new(TOOL_NAME)).await;

        assert!(!result.is_success());
        assert!(browser.visits().is_empty());
    }
}
