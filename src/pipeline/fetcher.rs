//! Paginated retrieval of an author's full publication list.
//!
//! A fresh cache entry short-circuits the network entirely. Otherwise pages are
//! requested one at a time, each under the retry policy; a page that still fails
//! after the last attempt aborts the whole fetch and nothing is cached.

use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::ProviderConfig;
use crate::models::RawPublication;
use crate::sources::{PageRequest, ProviderError, ScholarProvider};
use crate::utils::{with_retry, CacheResult, CacheService, RetryConfig};

/// Upper bound on pages per author, in case a provider keeps advancing forever
const MAX_PAGES: usize = 500;

/// Paging parameters
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSettings {
    pub page_size: usize,
    pub sort: String,

    /// Pause between successive page requests
    pub politeness_delay: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self::from_config(&ProviderConfig::default())
    }
}

impl FetchSettings {
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            page_size: config.page_size.max(1),
            sort: config.sort.clone(),
            politeness_delay: Duration::from_millis(config.politeness_delay_ms),
        }
    }

    /// No pause between pages
    pub fn without_delay(mut self) -> Self {
        self.politeness_delay = Duration::ZERO;
        self
    }
}

/// Result of one fetch
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    /// Page-merged items in provider order
    pub publications: Vec<Value>,

    pub from_cache: bool,

    /// Pages requested from the provider; zero on a cache hit
    pub pages: usize,
}

/// Drives pagination against a provider, with caching and retry
#[derive(Debug, Clone)]
pub struct PaginatedFetcher {
    provider: Arc<dyn ScholarProvider>,
    cache: CacheService,
    retry: RetryConfig,
    settings: FetchSettings,
}

impl PaginatedFetcher {
    pub fn new(
        provider: Arc<dyn ScholarProvider>,
        cache: CacheService,
        retry: RetryConfig,
        settings: FetchSettings,
    ) -> Self {
        Self {
            provider,
            cache,
            retry,
            settings,
        }
    }

    pub fn cache(&self) -> &CacheService {
        &self.cache
    }

    /// Fetch every publication for an author, from cache when fresh
    pub async fn fetch(&self, author_id: &str) -> Result<FetchOutcome, ProviderError> {
        match self.cache.get_publications(author_id) {
            CacheResult::Hit(publications) => {
                tracing::info!(
                    "Using {} cached publications for {}",
                    publications.len(),
                    author_id
                );
                return Ok(FetchOutcome {
                    publications,
                    from_cache: true,
                    pages: 0,
                });
            }
            CacheResult::Expired => tracing::info!("Cached list for {} expired, refetching", author_id),
            CacheResult::Miss => {}
        }

        let mut publications = Vec::new();
        let mut start = 0;
        let mut pages = 0;

        loop {
            if pages > 0 && !self.settings.politeness_delay.is_zero() {
                sleep(self.settings.politeness_delay).await;
            }

            let request = PageRequest {
                author_id: author_id.to_string(),
                start,
                page_size: self.settings.page_size,
                sort: self.settings.sort.clone(),
            };
            let page = with_retry(self.retry, "author page", || {
                let provider = Arc::clone(&self.provider);
                let request = request.clone();
                async move { provider.fetch_author_page(&request).await }
            })
            .await?;
            pages += 1;

            tracing::info!(
                "Fetched page at offset {} for {} ({} items)",
                start,
                author_id,
                page.articles.len()
            );

            if pages == 1 {
                if let Some(profile) = &page.author {
                    self.cache.set_author_profile(author_id, profile);
                }
            }

            if page.articles.is_empty() {
                break;
            }
            publications.extend(page.articles);

            match page.next_offset {
                Some(next) if next > start && pages < MAX_PAGES => start = next,
                Some(next) if next <= start => {
                    tracing::warn!(
                        "Provider offset did not advance ({} -> {}), stopping",
                        start,
                        next
                    );
                    break;
                }
                Some(_) => {
                    tracing::warn!("Stopping after {} pages for {}", MAX_PAGES, author_id);
                    break;
                }
                None => break,
            }
        }

        self.cache.set_publications(author_id, &publications);

        Ok(FetchOutcome {
            publications,
            from_cache: false,
            pages,
        })
    }
}

/// Drop items repeating a `citation_id` (or, lacking one, a primary link) seen
/// earlier in the list. Items with neither always pass.
pub fn suppress_repeats(items: Vec<Value>) -> Vec<Value> {
    let mut seen = HashSet::new();
    let before = items.len();

    let kept: Vec<Value> = items
        .into_iter()
        .filter(|item| {
            let raw = RawPublication::new(item.clone());
            let key = raw
                .citation_id()
                .map(|id| format!("citation:{}", id))
                .or_else(|| raw.str_at(&["link"]).map(|link| format!("link:{}", link)));
            match key {
                Some(key) => {
                    let fresh = seen.insert(key.clone());
                    if !fresh {
                        tracing::debug!("Dropping repeated item {}", key);
                    }
                    fresh
                }
                None => true,
            }
        })
        .collect();

    if kept.len() < before {
        tracing::debug!("Suppressed {} repeated items", before - kept.len());
    }
    kept
}
