//! Environment-driven settings shared by every tool crate.

use std::time::Duration;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Proxy variables in lookup order; https wins over http
pub const PROXY_VARS: [&str; 4] = ["https_proxy", "HTTPS_PROXY", "http_proxy", "HTTP_PROXY"];

/// Outbound proxy used by HTTP clients and the browser
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProxySettings {
    pub url: Option<String>,
}

impl ProxySettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (tests pass a closure over a map)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = PROXY_VARS
            .iter()
            .filter_map(|key| lookup(key))
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty());

        Self { url }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.url.is_some()
    }

    /// reqwest client with the 30 s timeout, a desktop user agent and this
    /// proxy for every scheme
    pub fn http_client(&self) -> reqwest::Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(DESKTOP_USER_AGENT);

        if let Some(url) = &self.url {
            tracing::debug!(proxy = %url, "Routing outbound requests through proxy");
            builder = builder.proxy(reqwest::Proxy::all(url)?);
        }

        builder.build()
    }
}

/// Read a typed value from a lookup, falling back to `default` when the key
/// is missing or does not parse
pub fn lookup_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
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
    fn test_https_proxy_preferred() {
        let proxy = ProxySettings::from_lookup(env(&[
            ("HTTP_PROXY", "http://plain:8080"),
            ("HTTPS_PROXY", "http://secure:8443"),
        ]));
        assert_eq!(proxy.url.as_deref(), Some("http://secure:8443"));
    }

    #[test]
    fn test_blank_values_skipped() {
        let proxy = ProxySettings::from_lookup(env(&[("https_proxy", "  "), ("http_proxy", " http://p:1 ")]));
        assert_eq!(proxy.url.as_deref(), Some("http://p:1"));

        assert!(!ProxySettings::from_lookup(env(&[])).is_set());
    }

    #[test]
    fn test_http_client_with_and_without_proxy() {
        assert!(ProxySettings::none().http_client().is_ok());

        let proxy = ProxySettings::from_lookup(env(&[("https_proxy", "http://127.0.0.1:7890")]));
        assert!(proxy.http_client().is_ok());
    }

    #[test]
    fn test_lookup_or() {
        let lookup = env(&[("N", " 42 "), ("BAD", "x")]);
        assert_eq!(lookup_or(&lookup, "N", 7_u64), 42);
        assert_eq!(lookup_or(&lookup, "BAD", 7_u64), 7);
        assert_eq!(lookup_or(&lookup, "MISSING", 7_u64), 7);
    }
}
