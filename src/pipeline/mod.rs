//! The identifier-resolution pipeline.
//!
//! One author query flows through these stages, strictly in order:
//!
//! 1. [`PaginatedFetcher`]: full raw publication list, cached per author
//! 2. [`LinkCollector`]: candidate links per item, with a cluster lookup when needed
//! 3. [`resolve`]: preferred link and canonical identifier
//! 4. [`normalize`]: uniform output record with caller tags applied
//! 5. [`merge_records`]: one record per logical publication
//!
//! A [`DebugSink`] observes every item and writes its trace at the end of the run.
//!
//! # Example
//!
//! ```rust,no_run
//! use scholar_resolver::config::load_config;
//! use scholar_resolver::models::AuthorQuery;
//! use scholar_resolver::pipeline::Pipeline;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config(None)?;
//! let pipeline = Pipeline::from_config(&config)?;
//! let records = pipeline
//!     .run(&AuthorQuery::new("secQmYUAAAAJ").tag("group", "lab"))
//!     .await?;
//! println!("{}", serde_json::to_string_pretty(&records)?);
//! # Ok(())
//! # }
//! ```

mod fetcher;
mod links;
mod normalize;
mod resolver;
mod trace;

pub use fetcher::{suppress_repeats, FetchOutcome, FetchSettings, PaginatedFetcher};
pub use links::{dedupe_preserving_order, extract_links, CollectedLinks, LinkCollector};
pub use normalize::{author_names, normalize, NormalizeError};
pub use resolver::{choose_link, classify, is_arxiv_link, is_doi_link, resolve, LinkPolicy, Resolution};
pub use trace::{DebugSink, ResolutionTrace};

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{Config, ConfigError};
use crate::models::{AuthorQuery, NormalizedRecord, RawPublication};
use crate::sources::{ProviderError, ScholarProvider, SerpApiProvider};
use crate::utils::{merge_records, validate_author_id, CacheService, RetryConfig, ValidationError};

/// Errors that abort a whole author run
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to fetch publications: {0}")]
    Fetch(#[from] ProviderError),
}

impl From<ValidationError> for PipelineError {
    fn from(err: ValidationError) -> Self {
        let detail = match err {
            ValidationError::InvalidAuthorId(detail) => detail,
            ValidationError::PathTraversal(id) => format!("path traversal in {:?}", id),
        };
        PipelineError::Config(ConfigError::InvalidAuthorId(detail))
    }
}

/// Everything a [`Pipeline`] needs besides the provider
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub retry: RetryConfig,
    pub fetch: FetchSettings,
    pub policy: LinkPolicy,
    pub cache: CacheService,

    /// Where resolution traces go; `None` disables them
    pub debug_dir: Option<PathBuf>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            fetch: FetchSettings::default(),
            policy: LinkPolicy::default(),
            cache: CacheService::disabled(),
            debug_dir: None,
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        let cache = CacheService::from_config(&config.cache);
        let debug_dir = config.debug.enabled.then(|| {
            config
                .debug
                .directory
                .clone()
                .unwrap_or_else(|| config.cache.resolved_directory())
        });

        Self {
            retry: RetryConfig::from_settings(&config.retry),
            fetch: FetchSettings::from_config(&config.provider),
            policy: LinkPolicy::new(config.provider.aggregator_hosts.iter().cloned()),
            cache,
            debug_dir,
        }
    }
}

/// Result of one author run, with the per-item traces
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub records: Vec<NormalizedRecord>,
    pub traces: Vec<ResolutionTrace>,

    /// Whether the raw list came from the cache
    pub from_cache: bool,

    /// Raw items considered after repeat suppression
    pub considered: usize,

    /// Items that could not be normalized
    pub skipped: usize,
}

/// Resolves one author at a time
#[derive(Debug, Clone)]
pub struct Pipeline {
    fetcher: PaginatedFetcher,
    links: LinkCollector,
    policy: LinkPolicy,
    debug_dir: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(provider: Arc<dyn ScholarProvider>, settings: PipelineSettings) -> Self {
        let PipelineSettings {
            retry,
            fetch,
            policy,
            cache,
            debug_dir,
        } = settings;

        Self {
            fetcher: PaginatedFetcher::new(Arc::clone(&provider), cache, retry, fetch),
            links: LinkCollector::new(provider, retry, policy.clone()),
            policy,
            debug_dir,
        }
    }

    /// Build the production pipeline; fails before any network call when the
    /// credential is missing
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let api_key = config.api_key()?;
        let provider = SerpApiProvider::from_config(api_key, &config.provider)?;
        tracing::debug!("Using provider endpoint {}", config.provider.base_url);
        Ok(Self::new(Arc::new(provider), PipelineSettings::from_config(config)))
    }

    pub fn cache(&self) -> &CacheService {
        self.fetcher.cache()
    }

    /// Resolve an author's publications into deduplicated records
    pub async fn run(&self, query: &AuthorQuery) -> Result<Vec<NormalizedRecord>, PipelineError> {
        Ok(self.run_detailed(query).await?.records)
    }

    /// Like [`Pipeline::run`], also returning traces and counters
    pub async fn run_detailed(&self, query: &AuthorQuery) -> Result<RunOutcome, PipelineError> {
        if query.author_id.trim().is_empty() {
            return Err(ConfigError::MissingAuthorId.into());
        }
        let author_id = validate_author_id(&query.author_id)?;

        let fetched = self.fetcher.fetch(&author_id).await?;
        let items = suppress_repeats(fetched.publications);
        let considered = items.len();

        let mut sink = DebugSink::new(self.debug_dir.clone());
        let mut records = Vec::with_capacity(items.len());
        let mut skipped = 0;

        for (position, value) in items.into_iter().enumerate() {
            let item = RawPublication::new(value);
            let collected = self.links.collect(&item).await;
            let resolution = resolve(&collected.candidates, &self.policy);

            match normalize(&item, &resolution, &collected.candidates, &query.tags) {
                Ok(record) => {
                    sink.record(ResolutionTrace {
                        title: record.title.clone(),
                        year: normalize::year(&item),
                        cluster_id: collected.cluster_id,
                        candidates: collected.candidates,
                        chosen: resolution.chosen,
                        escalated: collected.escalated,
                        identifier: resolution.identifier,
                    });
                    records.push(record);
                }
                Err(e) => {
                    skipped += 1;
                    tracing::warn!("Skipping item {} for {}: {}", position, author_id, e);
                }
            }
        }

        let records = merge_records(records);
        sink.flush(&author_id);

        let resolved = records.iter().filter(|r| r.identifier.is_resolved()).count();
        tracing::info!(
            "Resolved {} of {} records for {} ({} items considered, {} skipped)",
            resolved,
            records.len(),
            author_id,
            considered,
            skipped
        );

        Ok(RunOutcome {
            records,
            traces: sink.traces().to_vec(),
            from_cache: fetched.from_cache,
            considered,
            skipped,
        })
    }
}
