//! Shared HTTP plumbing: response decoding and request signatures.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::Sha256;

use crate::error::{ExchangeError, Result};
use crate::model::ExchangeId;

type HmacSha256 = Hmac<Sha256>;

/// Decode a JSON body, turning non-2xx responses into errors. Venue error
/// bodies (`{"code": ..., "msg": ...}`) become `ExchangeError::Api`.
pub async fn decode<T: DeserializeOwned>(exchange: ExchangeId, response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let url = response.url().to_string();
    let body = response.text().await?;

    if !status.is_success() {
        tracing::warn!(%exchange, status = status.as_u16(), %url, "Exchange request failed");
        return Err(api_error(exchange, &body).unwrap_or(ExchangeError::Http {
            status: status.as_u16(),
            url,
        }));
    }

    serde_json::from_str(&body).map_err(|e| ExchangeError::decode(format!("{url}: {e}")))
}

fn api_error(exchange: ExchangeId, body: &str) -> Option<ExchangeError> {
    let value: Value = serde_json::from_str(body).ok()?;
    let code = value.get("code")?;
    let message = value
        .get("msg")
        .or_else(|| value.get("message"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    Some(ExchangeError::Api {
        exchange: exchange.as_str().to_string(),
        code: code.as_str().map_or_else(|| code.to_string(), str::to_string),
        message: message.to_string(),
    })
}

fn mac(secret: &str, payload: &str) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| ExchangeError::InvalidRequest("unusable API secret".into()))?;
    mac.update(payload.as_bytes());
    Ok(mac)
}

/// Binance: lowercase hex HMAC-SHA256 of the query string
pub fn sign_hex(secret: &str, payload: &str) -> Result<String> {
    Ok(hex::encode(mac(secret, payload)?.finalize().into_bytes()))
}

/// OKX: base64 HMAC-SHA256 of `timestamp + method + path + body`
pub fn sign_base64(secret: &str, payload: &str) -> Result<String> {
    Ok(BASE64.encode(mac(secret, payload)?.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binance_reference_signature() {
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            sign_hex(secret, query).unwrap(),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_base64_signature_shape() {
        let payload = "2020-12-08T09:08:57.715ZGET/api/v5/account/balance?ccy=BTC";
        let first = sign_base64("secret", payload).unwrap();
        assert_eq!(first, sign_base64("secret", payload).unwrap());
        assert_ne!(first, sign_base64("other", payload).unwrap());
        assert_eq!(BASE64.decode(first).unwrap().len(), 32);
    }

    #[test]
    fn test_api_error_bodies() {
        let binance = api_error(ExchangeId::Binance, r#"{"code": -1121, "msg": "Invalid symbol."}"#).unwrap();
        assert!(binance.to_string().contains("-1121"));

        let okx = api_error(ExchangeId::Okx, r#"{"code": "51000", "msg": "Parameter error"}"#).unwrap();
        assert!(okx.to_string().contains("51000"));

        assert!(api_error(ExchangeId::Okx, "<html>").is_none());
    }
}
