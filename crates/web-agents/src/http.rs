//! Response handling shared by the page fetcher and the news feeds.

use crate::error::{Result, WebError};

/// Body of a 2xx response, anything else is `WebError::Http`
pub async fn text(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    if !status.is_success() {
        return Err(WebError::Http {
            status: status.as_u16(),
            url: response.url().to_string(),
        });
    }
    Ok(response.text().await?)
}
