//! Unified symbols
//!
//! `BASE/QUOTE` for spot, `BASE/QUOTE:SETTLE` for perpetual swaps.

use std::fmt;
use std::str::FromStr;

use crate::error::{ExchangeError, Result};
use crate::model::MarketKind;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub base: String,
    pub quote: String,
    pub settle: Option<String>,
}

impl Symbol {
    pub fn spot(base: &str, quote: &str) -> Self {
        Self {
            base: base.to_uppercase(),
            quote: quote.to_uppercase(),
            settle: None,
        }
    }

    pub fn swap(base: &str, quote: &str, settle: &str) -> Self {
        Self {
            settle: Some(settle.to_uppercase()),
            ..Self::spot(base, quote)
        }
    }

    pub fn kind(&self) -> MarketKind {
        if self.settle.is_some() {
            MarketKind::Swap
        } else {
            MarketKind::Spot
        }
    }

    pub fn is_swap(&self) -> bool {
        self.settle.is_some()
    }

    /// Parse a spot symbol; swaps are rejected
    pub fn parse_spot(symbol: &str) -> Result<Self> {
        let parsed: Self = symbol.parse()?;
        if parsed.is_swap() {
            return Err(ExchangeError::InvalidRequest(format!(
                "{parsed} is a perpetual swap symbol; spot symbols look like BTC/USDT"
            )));
        }
        Ok(parsed)
    }

    /// Parse a perpetual swap symbol; spot pairs are rejected
    pub fn parse_swap(symbol: &str) -> Result<Self> {
        let parsed: Self = symbol.parse()?;
        if !parsed.is_swap() {
            return Err(ExchangeError::InvalidRequest(format!(
                "{parsed} is not a perpetual swap symbol; use BASE/QUOTE:SETTLE such as BTC/USDT:USDT"
            )));
        }
        Ok(parsed)
    }

    /// Binance id: `BTCUSDT` for both spot and USDⓈ-M perpetuals
    pub fn binance_id(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }

    /// OKX instrument id: `BTC-USDT` or `BTC-USDT-SWAP`
    pub fn okx_id(&self) -> String {
        if self.is_swap() {
            format!("{}-{}-SWAP", self.base, self.quote)
        } else {
            format!("{}-{}", self.base, self.quote)
        }
    }

    /// Parse an OKX instrument id. Inverse swaps settle in the base currency.
    pub fn from_okx_id(inst_id: &str) -> Option<Self> {
        let mut parts = inst_id.split('-');
        let base = parts.next().filter(|s| !s.is_empty())?;
        let quote = parts.next().filter(|s| !s.is_empty())?;
        match parts.next() {
            None => Some(Self::spot(base, quote)),
            Some("SWAP") => {
                let settle = if quote.eq_ignore_ascii_case("USD") { base } else { quote };
                Some(Self::swap(base, quote, settle))
            }
            Some(_) => None,
        }
    }
}

impl FromStr for Symbol {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_uppercase();
        let invalid = || ExchangeError::InvalidSymbol(s.trim().to_string());

        let (pair, settle) = match normalized.split_once(':') {
            Some((pair, settle)) => (pair, Some(settle)),
            None => (normalized.as_str(), None),
        };
        let (base, quote) = pair.split_once('/').ok_or_else(invalid)?;

        let valid = |part: &str| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric());
        if !valid(base) || !valid(quote) || settle.is_some_and(|s| !valid(s)) {
            return Err(invalid());
        }

        Ok(match settle {
            Some(settle) => Self::swap(base, quote, settle),
            None => Self::spot(base, quote),
        })
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.settle {
            Some(settle) => write!(f, "{}/{}:{}", self.base, self.quote, settle),
            None => write!(f, "{}/{}", self.base, self.quote),
        }
    }
}
