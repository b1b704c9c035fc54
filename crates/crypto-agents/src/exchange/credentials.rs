//! API credentials from the environment

use std::fmt;

use crate::error::{ExchangeError, Result};
use crate::model::ExchangeId;

#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub secret: String,
    /// OKX passphrase
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("secret", &"<redacted>")
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret: secret.into(),
            password: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn from_env(exchange: ExchangeId) -> Result<Self> {
        Self::from_lookup(exchange, |key| std::env::var(key).ok())
    }

    /// Reads `{EXCHANGE}_API_KEY`, `{EXCHANGE}_SECRET` and `{EXCHANGE}_PASSWORD`.
    /// Key and secret are required.
    pub fn from_lookup<F>(exchange: ExchangeId, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = exchange.env_prefix();
        let key_var = format!("{prefix}_API_KEY");
        let secret_var = format!("{prefix}_SECRET");
        let read = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        match (read(&key_var), read(&secret_var)) {
            (Some(api_key), Some(secret)) => Ok(Self {
                api_key,
                secret,
                password: read(&format!("{prefix}_PASSWORD")),
            }),
            _ => Err(ExchangeError::MissingCredentials {
                exchange: exchange.as_str().to_string(),
                key_var,
                secret_var,
            }),
        }
    }
}
