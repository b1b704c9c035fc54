//! Application Configuration

use agent_core::ProxySettings;
use agent_core::config::lookup_or;
use agent_runtime::OllamaConfig;
use code_runner::SandboxConfig;
use web_agents::BrowserConfig;

pub const DEFAULT_MODEL: &str = "llama3.2";
pub const DEFAULT_MAX_ITERATIONS: usize = 10;
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Everything the binary reads from the environment
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Model used by the coordinator and every specialist
    pub model: String,
    pub max_iterations: usize,
    /// `RUST_LOG` directives for the tracing filter
    pub log_filter: String,
    pub ollama: OllamaConfig,
    pub browser: BrowserConfig,
    pub sandbox: SandboxConfig,
    pub proxy: ProxySettings,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let model = lookup("AGENT_MODEL")
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.into());

        let log_filter = lookup("RUST_LOG")
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.into());

        Self {
            model,
            log_filter,
            max_iterations: lookup_or(&lookup, "AGENT_MAX_ITERATIONS", DEFAULT_MAX_ITERATIONS).max(1),
            ollama: OllamaConfig::from_lookup(&lookup),
            browser: BrowserConfig::from_lookup(&lookup),
            sandbox: SandboxConfig::from_lookup(&lookup),
            proxy: ProxySettings::from_lookup(&lookup),
        }
    }
}
