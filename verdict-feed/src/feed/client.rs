//! HTTP client for feed slices
//!
//! Slices live at `{base_url}/{slice}.{json|jsonp}`. The body is a JSON
//! array, optionally wrapped in a JSONP callback.

use super::{FeedFormat, Slice, SliceName};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("verdict-feed/", env!("CARGO_PKG_VERSION"));

/// Slice fetch errors
#[derive(Debug, Error)]
pub enum FeedError {
    /// Network communication error (includes timeouts)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Feed host returned a non-success status
    #[error("HTTP error {0}: {1}")]
    HttpStatus(u16, String),

    /// Body was not a (possibly JSONP-wrapped) JSON array
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Fetches feed slices from one base URL
#[derive(Debug, Clone)]
pub struct FeedClient {
    http_client: reqwest::Client,
    base_url: String,
    format: FeedFormat,
}

impl FeedClient {
    pub fn new(base_url: &str, format: FeedFormat, timeout: Duration) -> Result<Self, FeedError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::NetworkError(e.to_string()))?;

        Ok(Self::with_http_client(http_client, base_url, format))
    }

    /// Use a preconfigured reqwest client (proxy or TLS settings)
    pub fn with_http_client(http_client: reqwest::Client, base_url: &str, format: FeedFormat) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            format,
        }
    }

    /// URL of one slice
    pub fn slice_url(&self, name: &SliceName) -> String {
        format!("{}/{}.{}", self.base_url, name, self.format.extension())
    }

    /// Fetch and decode one slice
    pub async fn fetch_slice(&self, name: &SliceName) -> Result<Slice, FeedError> {
        let url = self.slice_url(name);
        tracing::debug!(slice = %name, url = %url, "Fetching feed slice");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| FeedError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("").to_string();
            return Err(FeedError::HttpStatus(status.as_u16(), reason));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FeedError::NetworkError(e.to_string()))?;

        let rows = decode_payload(&body, self.format)?;
        tracing::debug!(slice = %name, rows = rows.len(), "Decoded feed slice");

        Ok(Slice::new(name.clone(), rows))
    }
}

/// Decode a slice body into its top-level array
pub fn decode_payload(body: &str, format: FeedFormat) -> Result<Vec<Value>, FeedError> {
    let json = match format {
        FeedFormat::Json => body.trim(),
        FeedFormat::Jsonp => unwrap_jsonp(body)?,
    };

    match serde_json::from_str::<Value>(json) {
        Ok(Value::Array(rows)) => Ok(rows),
        Ok(_) => Err(FeedError::ParseError(
            "expected a top-level JSON array".to_string(),
        )),
        Err(e) => Err(FeedError::ParseError(e.to_string())),
    }
}

/// Strip a `callback( ... );` wrapper, returning the inner JSON text
pub fn unwrap_jsonp(body: &str) -> Result<&str, FeedError> {
    let trimmed = body.trim().trim_end_matches(';').trim_end();

    let open = trimmed
        .find('(')
        .ok_or_else(|| FeedError::ParseError("JSONP body has no '('".to_string()))?;
    if !trimmed.ends_with(')') {
        return Err(FeedError::ParseError("JSONP body has no closing ')'".to_string()));
    }

    let callback = trimmed[..open].trim();
    let valid_callback = !callback.is_empty()
        && callback
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.');
    if !valid_callback {
        return Err(FeedError::ParseError(format!(
            "invalid JSONP callback name '{}'",
            callback
        )));
    }

    Ok(trimmed[open + 1..trimmed.len() - 1].trim())
}
