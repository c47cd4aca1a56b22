//! Scholarly search provider plugins.
//!
//! The pipeline talks to the upstream search service only through the
//! [`ScholarProvider`] trait. [`SerpApiProvider`] is the production implementation
//! (Google Scholar author listings via SerpAPI); [`MockProvider`] replays scripted
//! pages and clusters for tests.
//!
//! Providers issue exactly one request per call. Retries, backoff and caching are
//! layered on top by the pipeline so that every provider gets the same discipline.

mod mock;
mod serpapi;

pub use mock::MockProvider;
pub use serpapi::{SerpApiProvider, SERPAPI_URL};

use async_trait::async_trait;
use serde_json::Value;

/// One page request for an author's publication listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// External author id
    pub author_id: String,

    /// Offset cursor of the first item on the page
    pub start: usize,

    /// Number of items per page
    pub page_size: usize,

    /// Provider sort order (e.g. `pubdate`)
    pub sort: String,
}

/// One page of an author's publication listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthorPage {
    /// Publication items in provider order
    pub articles: Vec<Value>,

    /// Offset of the next page, if the provider reports one
    pub next_offset: Option<usize>,

    /// Author profile block, when the provider includes one
    pub author: Option<Value>,
}

/// Interface to a scholarly search provider
#[async_trait]
pub trait ScholarProvider: Send + Sync + std::fmt::Debug {
    /// Short identifier used in logs
    fn id(&self) -> &str;

    /// Fetch one page of an author's publications
    async fn fetch_author_page(&self, request: &PageRequest) -> Result<AuthorPage, ProviderError>;

    /// Resolve a result cluster into its detailed listings
    async fn fetch_cluster(&self, cluster_id: &str) -> Result<Vec<Value>, ProviderError>;
}

/// Errors that can occur when talking to a provider
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// The request did not complete in time
    #[error("Request timed out")]
    Timeout,

    /// Provider asked us to slow down
    #[error("Rate limit exceeded")]
    RateLimit {
        /// Seconds from a `Retry-After` header, if present
        retry_after: Option<u64>,
    },

    /// 5xx response
    #[error("Server error: HTTP {status}")]
    Server { status: u16 },

    /// Provider rejected the request or reported an error in the body
    #[error("API error: {0}")]
    Api(String),

    /// Response body could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Request parameters were invalid before anything was sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        // The request URL carries the api_key query parameter.
        let err = err.without_url();
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::Parse(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Parse(format!("JSON: {}", err))
    }
}
