//! Multi-tool agent command line
//!
//! Reads questions from the terminal and hands them to the coordinator, which
//! delegates to the code, web scraping, search, news, market and trade agents.

mod agents;
mod config;
mod repl;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::LlmProvider;
use agent_runtime::OllamaProvider;
use code_runner::PythonSandbox;
use crypto_agents::LiveExchanges;
use web_agents::{LiveNewsFeed, WebDriverBrowser};

use crate::agents::Backends;
use crate::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env first so RUST_LOG from it reaches the filter
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env();

    // Logs go to stderr so answers on stdout stay readable
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let provider: Arc<dyn LlmProvider> = Arc::new(OllamaProvider::from_config(config.ollama.clone()));

    match provider.health_check().await {
        Ok(true) => tracing::info!(host = %config.ollama.host, model = %config.model, "✓ Connected to Ollama"),
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ Ollama not available - requests will fail");
            tracing::warn!("  Make sure Ollama is running: ollama serve");
        }
    }

    let http = config.proxy.http_client()?;
    let backends = Backends {
        browser: Arc::new(WebDriverBrowser::new(config.browser.clone())),
        news: Arc::new(LiveNewsFeed::new(http.clone())),
        http,
        exchanges: Arc::new(LiveExchanges::new(config.proxy.clone())),
        sandbox: PythonSandbox::new(config.sandbox.clone()),
    };

    let team = agents::specialists(&provider, &config, backends)?;
    for agent in &team {
        tracing::info!(agent = agent.name(), tools = ?agent.tools().names(), "Registered specialist");
    }

    let coordinator = agents::coordinator(&provider, &config, team)?;
    tracing::info!(tools = ?coordinator.tools().names(), "Coordinator ready");

    repl::run(&coordinator).await
}
