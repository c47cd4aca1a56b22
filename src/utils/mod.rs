//! Utility modules supporting the resolution pipeline.
//!
//! - [`HttpClient`]: HTTP client with status-to-error mapping
//! - [`RetryConfig`] / [`with_retry`]: bounded retries with exponential backoff
//! - [`CacheService`]: per-author on-disk cache with a freshness window
//! - [`merge_records`]: collapse duplicate records for one author
//! - [`validate_author_id`] / [`parse_http_url`]: input validation
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use scholar_resolver::sources::ProviderError;
//! use scholar_resolver::utils::{with_retry, RetryConfig};
//!
//! # async fn fetch_data() -> Result<String, ProviderError> { Ok("data".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), ProviderError> {
//! let config = RetryConfig::default().max_attempts(3);
//! let result = with_retry(config, "fetch", || fetch_data()).await?;
//! # Ok(())
//! # }
//! ```

mod cache;
mod dedup;
mod http;
mod retry;
mod validate;

pub use cache::{CacheResult, CacheService, CacheStats, Clock, FixedClock, SystemClock};
pub(crate) use cache::write_json;
pub use dedup::{merge_records, prefer, title_key, DedupeKey};
pub use http::HttpClient;
pub use retry::{with_retry, RetryConfig, TransientError};
pub use validate::{http_host, parse_http_url, validate_author_id, ValidationError};
