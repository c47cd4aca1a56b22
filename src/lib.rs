//! # Scholar Resolver
//!
//! Resolves a scholar profile's publication list into canonical bibliographic
//! identifiers (DOI, arXiv id or publisher URL) for a citation-rendering pipeline.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Author queries, raw provider items, identifiers and output records
//! - [`sources`]: The search-provider trait, SerpAPI implementation and a mock
//! - [`pipeline`]: Fetching, link collection, resolution, normalization and traces
//! - [`utils`]: HTTP client, retry policy, cache, deduplication and validation
//! - [`config`]: Configuration management

pub mod config;
pub mod models;
pub mod pipeline;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use models::{AuthorQuery, CanonicalId, NormalizedRecord};
pub use pipeline::{Pipeline, PipelineError, PipelineSettings};
pub use sources::ScholarProvider;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
