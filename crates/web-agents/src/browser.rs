//! Headless browser access over WebDriver
//!
//! Each visit opens a fresh Chrome session, loads the page, runs one
//! extraction script and quits the session again, whether or not the visit
//! succeeded. Tools only see the [`Browser`] trait.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thirtyfour::prelude::*;

use agent_core::ProxySettings;
use agent_core::config::{DESKTOP_USER_AGENT, lookup_or};

use crate::error::{Result, WebError};

pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";


/// Browser configuration
#[derive(Clone, Debug)]
pub struct BrowserConfig {
    /// WebDriver endpoint (chromedriver or a Selenium grid)
    pub webdriver_url: String,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub page_load_timeout: Duration,
    /// Upper bound for load plus script
    pub overall_timeout: Duration,
    pub user_agent: String,
    pub proxy: ProxySettings,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: DEFAULT_WEBDRIVER_URL.into(),
            headless: true,
            viewport_width: 1920,
            viewport_height: 1080,
            page_load_timeout: Duration::from_secs(30),
            overall_timeout: Duration::from_secs(60),
            user_agent: DESKTOP_USER_AGENT.into(),
            proxy: ProxySettings::none(),
        }
    }
}

impl BrowserConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let webdriver_url = lookup("WEBDRIVER_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.webdriver_url);

        Self {
            webdriver_url,
            headless: lookup_or(&lookup, "BROWSER_HEADLESS", defaults.headless),
            proxy: ProxySettings::from_lookup(&lookup),
            ..defaults
        }
    }

    /// `{width}x{height}` as reported in scrape metadata
    pub fn viewport(&self) -> String {
        format!("{}x{}", self.viewport_width, self.viewport_height)
    }
}

/// What a visit brings back
#[derive(Clone, Debug, Default)]
pub struct PageVisit {
    /// URL after redirects
    pub final_url: String,
    pub title: String,
    /// JSON returned by the extraction script
    pub payload: Value,
}

#[async_trait]
pub trait Browser: Send + Sync {
    /// Load `url`, run `script` (a function body ending in `return ...`)
    /// and report its result.
    async fn visit(&self, url: &str, script: &str) -> Result<PageVisit>;

    fn config(&self) -> &BrowserConfig;
}

/// Chrome over WebDriver via thirtyfour
pub struct WebDriverBrowser {
    config: BrowserConfig,
}

impl WebDriverBrowser {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    fn capabilities(&self) -> Result<Capabilities> {
        let mut caps = DesiredCapabilities::chrome();
        if self.config.headless {
            caps.add_arg("--headless=new").map_err(WebError::browser)?;
        }
        caps.add_arg("--no-sandbox").map_err(WebError::browser)?;
        caps.add_arg("--disable-dev-shm-usage").map_err(WebError::browser)?;
        caps.add_arg("--disable-blink-features=AutomationControlled")
            .map_err(WebError::browser)?;
        caps.add_arg(&format!("--user-agent={}", self.config.user_agent))
            .map_err(WebError::browser)?;
        if let Some(proxy) = &self.config.proxy.url {
            caps.add_arg(&format!("--proxy-server={proxy}")).map_err(WebError::browser)?;
        }
        Ok(caps.into())
    }

    async fn start(&self) -> Result<WebDriver> {
        let driver = WebDriver::new(&self.config.webdriver_url, self.capabilities()?)
            .await
            .map_err(|e| WebError::Browser(format!("failed to start browser at {}: {e}", self.config.webdriver_url)))?;

        let prepared = async {
            driver.set_page_load_timeout(self.config.page_load_timeout).await?;
            driver
                .set_window_rect(0, 0, self.config.viewport_width, self.config.viewport_height)
                .await
        }
        .await;

        match prepared {
            Ok(()) => Ok(driver),
            Err(e) => {
                let _ = driver.quit().await;
                Err(WebError::browser(e))
            }
        }
    }

    async fn load(driver: &WebDriver, url: &str, script: &str) -> Result<PageVisit> {
        driver.goto(url).await.map_err(WebError::browser)?;

        let final_url = driver.current_url().await.map_err(WebError::browser)?.to_string();
        let title = driver.title().await.map_err(WebError::browser)?;
        let payload = driver
            .execute(script, Vec::new())
            .await
            .map_err(WebError::browser)?
            .json()
            .clone();

        Ok(PageVisit {
            final_url,
            title,
            payload,
        })
    }
}

#[async_trait]
impl Browser for WebDriverBrowser {
    async fn visit(&self, url: &str, script: &str) -> Result<PageVisit> {
        tracing::debug!(url, webdriver = %self.config.webdriver_url, "Opening browser session");
        let driver = self.start().await?;

        let outcome = tokio::time::timeout(self.config.overall_timeout, Self::load(&driver, url, script)).await;

        if let Err(e) = driver.quit().await {
            tracing::warn!(error = %e, "Failed to close browser session");
        }

        outcome.map_err(|_| WebError::Timeout(self.config.overall_timeout.as_secs()))?
    }

    fn config(&self) -> &BrowserConfig {
        &self.config
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    use std::sync::Mutex;

    use super::*;

    type Handler = Box<dyn Fn(&str) -> Result<PageVisit> + Send + Sync>;

    /// Answers visits from a closure and records the URLs it was sent to
    pub struct ScriptedBrowser {
        config: BrowserConfig,
        handler: Handler,
        pub visited: Mutex<Vec<String>>,
    }

    impl ScriptedBrowser {
        pub fn new(handler: impl Fn(&str) -> Result<PageVisit> + Send + Sync + 'static) -> Self {
            Self {
                config: BrowserConfig::default(),
                handler: Box::new(handler),
                visited: Mutex::new(Vec::new()),
            }
        }

        /// Every visit lands on `final_url` with the same payload
        pub fn returning(final_url: &str, title: &str, payload: Value) -> Self {
            let (final_url, title) = (final_url.to_string(), title.to_string());
            Self::new(move |_| {
                Ok(PageVisit {
                    final_url: final_url.clone(),
                    title: title.clone(),
                    payload: payload.clone(),
                })
            })
        }

        pub fn visits(&self) -> Vec<String> {
            self.visited.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Browser for ScriptedBrowser {
        async fn visit(&self, url: &str, _script: &str) -> Result<PageVisit> {
            self.visited.lock().unwrap().push(url.to_string());
            (self.handler)(url)
        }

        fn config(&self) -> &BrowserConfig {
            &self.config
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BrowserConfig::from_lookup(env(&[]));
        assert_eq!(config.webdriver_url, "http://localhost:4444");
        assert!(config.headless);
        assert_eq!(config.viewport(), "1920x1080");
        assert_eq!(config.page_load_timeout, Duration::from_secs(30));
        assert_eq!(config.overall_timeout, Duration::from_secs(60));
        assert!(config.user_agent.contains("Chrome/120"));
        assert!(!config.proxy.is_set());
    }

    #[test]
    fn test_env_overrides() {
        let config = BrowserConfig::from_lookup(env(&[
            ("WEBDRIVER_URL", " http://grid:4444/ "),
            ("BROWSER_HEADLESS", "false"),
            ("https_proxy", "http://127.0.0.1:7890"),
        ]));
        assert_eq!(config.webdriver_url, "http://grid:4444");
        assert!(!config.headless);
        assert_eq!(config.proxy.url.as_deref(), Some("http://127.0.0.1:7890"));
    }

    #[test]
    fn test_capabilities_carry_proxy() {
        let browser = WebDriverBrowser::new(BrowserConfig {
            proxy: ProxySettings {
                url: Some("http://127.0.0.1:7890".into()),
            },
            ..BrowserConfig::default()
        });
        let caps = serde_json::to_string(&browser.capabilities().unwrap()).unwrap();
        assert!(caps.contains("--proxy-server=http://127.0.0.1:7890"));
        assert!(caps.contains("--headless=new"));
    }
}
