//! Error Types for exchange access

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExchangeError>;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Unsupported exchange: {name}. Supported exchanges: {supported}")]
    UnsupportedExchange { name: String, supported: String },

    #[error("Set {key_var} and {secret_var} to use {exchange} account features")]
    MissingCredentials {
        exchange: String,
        key_var: String,
        secret_var: String,
    },

    #[error("Symbol {symbol} is not listed on {exchange}")]
    SymbolNotFound { symbol: String, exchange: String },

    #[error("Invalid symbol '{0}': expected BASE/QUOTE or BASE/QUOTE:SETTLE")]
    InvalidSymbol(String),

    #[error("Unsupported timeframe '{0}'")]
    UnsupportedTimeframe(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{exchange} requires a symbol for {operation}")]
    SymbolRequired { exchange: String, operation: String },

    #[error("{exchange} API error {code}: {message}")]
    Api {
        exchange: String,
        code: String,
        message: String,
    },

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ExchangeError {
    pub fn decode(context: impl std::fmt::Display) -> Self {
        Self::Decode(context.to_string())
    }
}
