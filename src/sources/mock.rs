//! Mock provider for testing purposes.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::sources::{AuthorPage, PageRequest, ProviderError, ScholarProvider};

/// A provider that replays scripted pages and clusters and counts every call.
///
/// Queued failures are returned before any scripted response, one per call, which
/// makes it easy to exercise the retry path.
#[derive(Debug, Default)]
pub struct MockProvider {
    pages: Mutex<HashMap<usize, AuthorPage>>,
    page_failures: Mutex<VecDeque<ProviderError>>,
    clusters: Mutex<HashMap<String, Vec<Value>>>,
    cluster_failures: Mutex<HashSet<String>>,
    requested_starts: Mutex<Vec<usize>>,
    page_calls: AtomicUsize,
    cluster_calls: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockProvider {
    /// Create a new mock provider with no pages.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script consecutive pages of `page_size` items each, chained by offsets.
    pub fn with_pages(pages: Vec<Vec<Value>>, page_size: usize) -> Self {
        let provider = Self::new();
        let count = pages.len();
        for (idx, articles) in pages.into_iter().enumerate() {
            let next_offset = (idx + 1 < count).then(|| (idx + 1) * page_size);
            provider.set_page(
                idx * page_size,
                AuthorPage {
                    articles,
                    next_offset,
                    author: None,
                },
            );
        }
        provider
    }

    /// Set the page returned for a given offset.
    pub fn set_page(&self, start: usize, page: AuthorPage) {
        lock(&self.pages).insert(start, page);
    }

    /// Queue a failure for the next author-page call.
    pub fn push_page_failure(&self, error: ProviderError) {
        lock(&self.page_failures).push_back(error);
    }

    /// Set the listings returned for a cluster id.
    pub fn set_cluster(&self, cluster_id: &str, results: Vec<Value>) {
        lock(&self.clusters).insert(cluster_id.to_string(), results);
    }

    /// Make every lookup of this cluster fail with a server error.
    pub fn fail_cluster(&self, cluster_id: &str) {
        lock(&self.cluster_failures).insert(cluster_id.to_string());
    }

    /// Number of author-page calls made, including failed ones.
    pub fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    /// Number of cluster calls made, including failed ones.
    pub fn cluster_calls(&self) -> usize {
        self.cluster_calls.load(Ordering::SeqCst)
    }

    /// Offsets requested so far, in call order.
    pub fn requested_starts(&self) -> Vec<usize> {
        lock(&self.requested_starts).clone()
    }
}

#[async_trait]
impl ScholarProvider for MockProvider {
    fn id(&self) -> &str {
        "mock"
    }

    async fn fetch_author_page(&self, request: &PageRequest) -> Result<AuthorPage, ProviderError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.requested_starts).push(request.start);

        if let Some(error) = lock(&self.page_failures).pop_front() {
            return Err(error);
        }

        Ok(lock(&self.pages)
            .get(&request.start)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_cluster(&self, cluster_id: &str) -> Result<Vec<Value>, ProviderError> {
        self.cluster_calls.fetch_add(1, Ordering::SeqCst);

        if lock(&self.cluster_failures).contains(cluster_id) {
            return Err(ProviderError::Server { status: 503 });
        }

        Ok(lock(&self.clusters)
            .get(cluster_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(start: usize) -> PageRequest {
        PageRequest {
            author_id: "a".to_string(),
            start,
            page_size: 2,
            sort: "pubdate".to_string(),
        }
    }

    #[test]
    fn test_pages_are_chained() {
        let provider = MockProvider::with_pages(
            vec![vec![json!({"title": "A"})], vec![json!({"title": "B"})]],
            2,
        );

        let first = tokio_test::block_on(provider.fetch_author_page(&request(0))).unwrap();
        assert_eq!(first.next_offset, Some(2));
        let second = tokio_test::block_on(provider.fetch_author_page(&request(2))).unwrap();
        assert_eq!(second.next_offset, None);
        assert_eq!(provider.requested_starts(), vec![0, 2]);
    }

    #[test]
    fn test_failures_come_first() {
        let provider = MockProvider::with_pages(vec![vec![json!({"title": "A"})]], 2);
        provider.push_page_failure(ProviderError::RateLimit { retry_after: None });

        assert!(tokio_test::block_on(provider.fetch_author_page(&request(0))).is_err());
        assert!(tokio_test::block_on(provider.fetch_author_page(&request(0))).is_ok());
        assert_eq!(provider.page_calls(), 2);
    }
}
