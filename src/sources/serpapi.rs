//! Google Scholar author listings via SerpAPI.
//!
//! Author pages use the `google_scholar_author` engine; cluster lookups use the
//! plain `google_scholar` engine with a `cluster` parameter. Both return JSON.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::sources::{AuthorPage, PageRequest, ProviderError, ScholarProvider};
use crate::utils::HttpClient;

/// Default SerpAPI search endpoint
pub const SERPAPI_URL: &str = "https://serpapi.com/search.json";

const AUTHOR_ENGINE: &str = "google_scholar_author";
const CLUSTER_ENGINE: &str = "google_scholar";

/// SerpAPI-backed Google Scholar provider
#[derive(Debug, Clone)]
pub struct SerpApiProvider {
    client: HttpClient,
    base_url: String,
    api_key: String,
}

impl SerpApiProvider {
    /// Create a provider against the public endpoint
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            client: HttpClient::new()?,
            base_url: SERPAPI_URL.to_string(),
            api_key: api_key.into(),
        })
    }

    /// Create a provider from the `[provider]` config section
    pub fn from_config(api_key: impl Into<String>, config: &ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: HttpClient::with_timeout(Duration::from_secs(config.request_timeout_secs))?,
            base_url: config.base_url.clone(),
            api_key: api_key.into(),
        })
    }

    /// Point the provider at another endpoint (used by tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn author_params(&self, request: &PageRequest) -> Vec<(&'static str, String)> {
        vec![
            ("engine", AUTHOR_ENGINE.to_string()),
            ("author_id", request.author_id.clone()),
            ("api_key", self.api_key.clone()),
            ("sort", request.sort.clone()),
            ("num", request.page_size.to_string()),
            ("start", request.start.to_string()),
        ]
    }

    fn cluster_params(&self, cluster_id: &str) -> Vec<(&'static str, String)> {
        vec![
            ("engine", CLUSTER_ENGINE.to_string()),
            ("cluster", cluster_id.to_string()),
            ("api_key", self.api_key.clone()),
        ]
    }
}

#[async_trait]
impl ScholarProvider for SerpApiProvider {
    fn id(&self) -> &str {
        "serpapi"
    }

    async fn fetch_author_page(&self, request: &PageRequest) -> Result<AuthorPage, ProviderError> {
        if request.author_id.trim().is_empty() {
            return Err(ProviderError::InvalidRequest("empty author id".to_string()));
        }

        tracing::debug!(
            "Requesting author page: author={} start={} num={}",
            request.author_id,
            request.start,
            request.page_size
        );

        let body = self
            .client
            .get_json(&self.base_url, &self.author_params(request))
            .await?;

        parse_author_page(body)
    }

    async fn fetch_cluster(&self, cluster_id: &str) -> Result<Vec<Value>, ProviderError> {
        if cluster_id.trim().is_empty() {
            return Err(ProviderError::InvalidRequest("empty cluster id".to_string()));
        }

        tracing::debug!("Requesting cluster {}", cluster_id);

        let body = self
            .client
            .get_json(&self.base_url, &self.cluster_params(cluster_id))
            .await?;

        if let Some(empty) = check_body_error(&body)? {
            return Ok(empty);
        }

        Ok(body
            .get("organic_results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }
}

/// Interpret a body-level `error` field.
///
/// Returns `Ok(Some(vec![]))` when the provider only reports an empty result set,
/// `Err` for any other reported error, and `Ok(None)` when there is no error.
fn check_body_error(body: &Value) -> Result<Option<Vec<Value>>, ProviderError> {
    match body.get("error").and_then(Value::as_str) {
        Some(msg) if is_empty_result_message(msg) => Ok(Some(Vec::new())),
        Some(msg) => Err(ProviderError::Api(msg.to_string())),
        None => Ok(None),
    }
}

fn is_empty_result_message(msg: &str) -> bool {
    let msg = msg.to_lowercase();
    msg.contains("hasn't returned any results") || msg.contains("no results")
}

/// Decode one `google_scholar_author` response
pub(crate) fn parse_author_page(body: Value) -> Result<AuthorPage, ProviderError> {
    if !body.is_object() {
        return Err(ProviderError::Parse("author page is not a JSON object".to_string()));
    }

    if check_body_error(&body)?.is_some() {
        return Ok(AuthorPage::default());
    }

    let articles = body
        .get("articles")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let pagination = body.get("serpapi_pagination");
    let has_next = pagination
        .and_then(|p| p.get("next"))
        .and_then(Value::as_str)
        .is_some_and(|next| !next.is_empty());
    let next_offset = pagination
        .and_then(|p| p.get("next_offset"))
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
        .filter(|_| has_next);

    let author = body.get("author").filter(|a| a.is_object()).cloned();

    Ok(AuthorPage {
        articles,
        next_offset,
        author,
    })
}
