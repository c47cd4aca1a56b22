//! Local caching for provider responses.
//!
//! One JSON file per author holds the page-merged publication list plus the time it
//! was written. Entries older than the freshness window, and files that cannot be
//! read or parsed, are treated as misses.
//!
//! # Cache Structure
//!
//! ```text
//! ~/.cache/scholar-resolver/
//!   <author_id>.json          publication list
//!   <author_id>.author.json   author profile block
//!   <author_id>.resolved.json resolution trace (written by the debug sink)
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::config::CacheConfig;
use crate::utils::validate_author_id;

/// Source of wall-clock time, in seconds since the Unix epoch
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> u64;
}

/// The real system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// A settable clock for tests
#[derive(Debug, Default)]
pub struct FixedClock(AtomicU64);

impl FixedClock {
    pub fn new(now: u64) -> Self {
        Self(AtomicU64::new(now))
    }

    pub fn set(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.0.fetch_add(by.as_secs(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Cache metadata stored with each cached item
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheMetadata {
    /// When the item was cached (Unix timestamp)
    cached_at: u64,

    /// Author the list belongs to
    author_id: String,
}

/// Wrapper for a cached publication list
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedPublications {
    metadata: CacheMetadata,
    publications: Vec<Value>,
}

/// Result of a cache lookup
#[derive(Debug, PartialEq)]
pub enum CacheResult<T> {
    /// Item was found and is valid
    Hit(T),

    /// Item was not found, or could not be parsed
    Miss,

    /// Item was found but has expired
    Expired,
}

/// Cache service for provider responses
#[derive(Debug, Clone)]
pub struct CacheService {
    base_dir: PathBuf,
    enabled: bool,
    freshness: Duration,
    clock: Arc<dyn Clock>,
}

impl CacheService {
    /// Create a cache rooted at `base_dir` with the given freshness window
    pub fn new(base_dir: impl Into<PathBuf>, freshness: Duration) -> Self {
        Self {
            base_dir: base_dir.into(),
            enabled: true,
            freshness,
            clock: Arc::new(SystemClock),
        }
    }

    /// Create a cache service with the given config
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            base_dir: config.resolved_directory(),
            enabled: config.enabled,
            freshness: Duration::from_secs(config.freshness_secs),
            clock: Arc::new(SystemClock),
        }
    }

    /// A cache that never hits and never writes
    pub fn disabled() -> Self {
        Self {
            base_dir: PathBuf::new(),
            enabled: false,
            freshness: Duration::ZERO,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used for timestamps and expiry
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Check if caching is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Get the cache directory
    pub fn cache_dir(&self) -> &Path {
        &self.base_dir
    }

    /// File for one author's entry, or `None` when the id is not file-name safe
    fn entry_path(&self, author_id: &str, suffix: &str) -> Option<PathBuf> {
        match validate_author_id(author_id) {
            Ok(id) => Some(self.base_dir.join(format!("{}{}", id, suffix))),
            Err(e) => {
                tracing::warn!("Not caching for {:?}: {}", author_id, e);
                None
            }
        }
    }

    fn publications_path(&self, author_id: &str) -> Option<PathBuf> {
        self.entry_path(author_id, ".json")
    }

    fn author_path(&self, author_id: &str) -> Option<PathBuf> {
        self.entry_path(author_id, ".author.json")
    }

    /// Read the cached publication list for an author
    pub fn get_publications(&self, author_id: &str) -> CacheResult<Vec<Value>> {
        if !self.enabled {
            return CacheResult::Miss;
        }

        let Some(path) = self.publications_path(author_id) else {
            return CacheResult::Miss;
        };
        if !path.is_file() {
            tracing::debug!("Cache MISS for author {}", author_id);
            return CacheResult::Miss;
        }

        let cached = match read_json::<CachedPublications>(&path) {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!(
                    "Ignoring unreadable cache entry {}: {}",
                    path.display(),
                    e
                );
                return CacheResult::Miss;
            }
        };

        let age = self.clock.now().saturating_sub(cached.metadata.cached_at);
        if Duration::from_secs(age) >= self.freshness {
            tracing::debug!("Cache expired for author {} (age {}s)", author_id, age);
            CacheResult::Expired
        } else {
            tracing::debug!("Cache HIT for author {} (age {}s)", author_id, age);
            CacheResult::Hit(cached.publications)
        }
    }

    /// Cache the page-merged publication list for an author
    pub fn set_publications(&self, author_id: &str, publications: &[Value]) {
        if !self.enabled {
            return;
        }

        let Some(path) = self.publications_path(author_id) else {
            return;
        };

        let cached = CachedPublications {
            metadata: CacheMetadata {
                cached_at: self.clock.now(),
                author_id: author_id.to_string(),
            },
            publications: publications.to_vec(),
        };

        if let Err(e) = write_json(&path, &cached) {
            tracing::warn!("Failed to cache publications for {}: {}", author_id, e);
        } else {
            tracing::debug!(
                "Cached {} publications for {}",
                publications.len(),
                author_id
            );
        }
    }

    /// Store the author profile block; failures are ignored
    pub fn set_author_profile(&self, author_id: &str, profile: &Value) {
        if !self.enabled {
            return;
        }
        let Some(path) = self.author_path(author_id) else {
            return;
        };
        if let Err(e) = write_json(&path, profile) {
            tracing::debug!("Failed to cache author profile for {}: {}", author_id, e);
        }
    }

    /// Read the stored author profile block, ignoring freshness
    pub fn get_author_profile(&self, author_id: &str) -> Option<Value> {
        if !self.enabled {
            return None;
        }
        read_json(&self.author_path(author_id)?).ok()
    }

    /// Remove the `.json` entries (and leftover `.json.tmp` files) in the cache
    /// directory. Anything else in the directory is left alone.
    pub fn clear_all(&self) -> std::io::Result<()> {
        if !self.enabled || !self.base_dir.is_dir() {
            return Ok(());
        }

        let mut removed = 0;
        for entry in self.base_dir.read_dir()? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.ends_with(".json") || name.ends_with(".json.tmp") {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        tracing::info!("Cache cleared ({} files removed)", removed);
        Ok(())
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        if !self.enabled {
            return CacheStats::disabled();
        }

        let mut stats = CacheStats {
            enabled: true,
            cache_dir: self.base_dir.clone(),
            author_count: 0,
            total_size_kb: 0,
            freshness: self.freshness,
        };

        if let Ok(entries) = self.base_dir.read_dir() {
            let mut bytes = 0;
            for entry in entries.flatten() {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if name.ends_with(".json")
                    && !name.ends_with(".author.json")
                    && !name.ends_with(".resolved.json")
                {
                    stats.author_count += 1;
                }
                bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
            }
            stats.total_size_kb = bytes / 1024;
        }

        stats
    }
}

/// Statistics about the cache
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Whether caching is enabled
    pub enabled: bool,

    /// Cache directory path
    pub cache_dir: PathBuf,

    /// Number of cached publication lists
    pub author_count: usize,

    /// Total size in KB
    pub total_size_kb: u64,

    /// Freshness window
    pub freshness: Duration,
}

impl CacheStats {
    /// Return stats indicating cache is disabled
    fn disabled() -> Self {
        Self {
            enabled: false,
            cache_dir: PathBuf::new(),
            author_count: 0,
            total_size_kb: 0,
            freshness: Duration::ZERO,
        }
    }
}

/// Read a file and deserialize it
pub(crate) fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, std::io::Error> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
}

/// Serialize and write a file via a temporary sibling, so readers never see a
/// half-written entry on filesystems with atomic rename
pub(crate) fn write_json<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(data)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)
}
