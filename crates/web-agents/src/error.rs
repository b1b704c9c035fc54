//! Error Types for browser, search and news access

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WebError>;

#[derive(Error, Debug)]
pub enum WebError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Page did not finish within {0} seconds")]
    Timeout(u64),

    #[error("Google blocked the request (unusual traffic detected); try again later or use a proxy")]
    Blocked,

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("{source_name} returned an error: {message}")]
    Api { source_name: String, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WebError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn browser(error: impl std::fmt::Display) -> Self {
        Self::Browser(error.to_string())
    }
}
