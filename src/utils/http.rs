//! HTTP client utilities.

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::sources::ProviderError;

/// Longest body excerpt kept in error messages
const ERROR_BODY_LIMIT: usize = 200;

/// Shared HTTP client with sensible defaults
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Create a client with a custom request timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| ProviderError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Issue a single GET and decode the JSON body.
    ///
    /// Status codes are mapped onto [`ProviderError`] so the retry layer can tell
    /// transient failures (429, 5xx, timeouts) from permanent ones.
    pub async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, ProviderError> {
        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok());
            return Err(ProviderError::RateLimit { retry_after });
        }

        if status.is_server_error() {
            return Err(ProviderError::Server {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(format!(
                "HTTP {}: {}",
                status.as_u16(),
                truncate(&body, ERROR_BODY_LIMIT)
            )));
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
