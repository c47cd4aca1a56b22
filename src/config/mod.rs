//! Configuration management.
//!
//! Settings come from an optional TOML file plus `SCHOLAR_RESOLVER_*` environment
//! overrides (`__` separates section and key, e.g. `SCHOLAR_RESOLVER_CACHE__ENABLED`).
//!
//! ```toml
//! [api_keys]
//! serpapi = "your-serpapi-key"
//!
//! [provider]
//! page_size = 20
//! sort = "pubdate"
//! politeness_delay_ms = 800
//!
//! [retry]
//! max_attempts = 5
//! initial_delay_ms = 2000
//!
//! [cache]
//! enabled = true
//! freshness_secs = 86400
//!
//! [debug]
//! enabled = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::sources::SERPAPI_URL;

/// Environment variable holding the SerpAPI key
pub const API_KEY_VAR: &str = "GOOGLE_SCHOLAR_API_KEY";

/// Prefix for environment overrides
const ENV_PREFIX: &str = "SCHOLAR_RESOLVER";

/// File name looked up in the working directory
const LOCAL_CONFIG_FILE: &str = "scholar-resolver.toml";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api_keys: ApiKeys,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub debug: DebugConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// API keys for external services
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiKeys {
    /// Local developer override; the environment variable wins when both are set
    #[serde(default)]
    pub serpapi: Option<String>,
}

/// Upstream search provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(default = "default_sort")]
    pub sort: String,

    /// Pause between successive page requests
    #[serde(default = "default_politeness_delay_ms")]
    pub politeness_delay_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Host patterns of the aggregator's own domains; a trailing `.` matches any suffix
    #[serde(default = "default_aggregator_hosts")]
    pub aggregator_hosts: Vec<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            page_size: default_page_size(),
            sort: default_sort(),
            politeness_delay_ms: default_politeness_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            aggregator_hosts: default_aggregator_hosts(),
        }
    }
}

fn default_base_url() -> String {
    SERPAPI_URL.to_string()
}

fn default_page_size() -> usize {
    20
}

fn default_sort() -> String {
    "pubdate".to_string()
}

fn default_politeness_delay_ms() -> u64 {
    800
}

fn default_request_timeout_secs() -> u64 {
    30
}

pub fn default_aggregator_hosts() -> Vec<String> {
    vec![
        "scholar.google.".to_string(),
        "scholar.googleusercontent.com".to_string(),
        "serpapi.com".to_string(),
    ]
}

/// Retry settings for provider calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_max_total_secs")]
    pub max_total_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_total_secs: default_max_total_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    2000
}

fn default_max_delay_ms() -> u64 {
    120_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_total_secs() -> u64 {
    300
}

/// On-disk cache of provider responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Defaults to `<cache dir>/scholar-resolver`
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Maximum age of a cached publication list
    #[serde(default = "default_freshness_secs")]
    pub freshness_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
            freshness_secs: default_freshness_secs(),
        }
    }
}

impl CacheConfig {
    pub fn resolved_directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(default_cache_dir)
    }
}

fn default_true() -> bool {
    true
}

fn default_freshness_secs() -> u64 {
    24 * 60 * 60
}

/// Resolution trace artifacts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Defaults to the cache directory
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration errors; all of them abort a run before any network call
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required API key: set GOOGLE_SCHOLAR_API_KEY or [api_keys] serpapi")]
    MissingCredential,

    #[error("Missing author id")]
    MissingAuthorId,

    #[error("Invalid author id: {0}")]
    InvalidAuthorId(String),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Failed to write configuration: {0}")]
    Write(String),
}

impl Config {
    /// Resolve the SerpAPI key: environment first, then the config file
    pub fn api_key(&self) -> Result<String, ConfigError> {
        let from_env = std::env::var(API_KEY_VAR).ok();
        pick_api_key(from_env, self.api_keys.serpapi.clone())
    }

    /// Write this configuration as TOML
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Write(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write(e.to_string()))
    }
}

fn pick_api_key(from_env: Option<String>, from_file: Option<String>) -> Result<String, ConfigError> {
    [from_env, from_file]
        .into_iter()
        .flatten()
        .map(|key| key.trim().to_string())
        .find(|key| !key.is_empty())
        .ok_or(ConfigError::MissingCredential)
}

/// Load configuration from an optional file plus environment overrides
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Find a configuration file in the default locations
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }

    default_config_path().filter(|p| p.is_file())
}

/// `<config dir>/scholar-resolver/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("scholar-resolver").join("config.toml"))
}

/// `<cache dir>/scholar-resolver`, or `./.cache/scholar-resolver` without a home
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("scholar-resolver")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.provider.page_size, 20);
        assert_eq!(config.provider.sort, "pubdate");
        assert_eq!(config.cache.freshness_secs, 86_400);
        assert!(config.cache.enabled);
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn test_config_file_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[api_keys]
serpapi = "file-key"

[provider]
page_size = 50
aggregator_hosts = ["scholar.aggregator.example"]

[cache]
enabled = false
freshness_secs = 60
"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.api_keys.serpapi.as_deref(), Some("file-key"));
        assert_eq!(config.provider.page_size, 50);
        assert_eq!(config.provider.sort, "pubdate");
        assert_eq!(
            config.provider.aggregator_hosts,
            vec!["scholar.aggregator.example".to_string()]
        );
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.freshness_secs, 60);
        assert_eq!(config.retry, RetrySettings::default());
    }

    #[test]
    fn test_config_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.provider.politeness_delay_ms = 0;
        config.save(&path).unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.provider.politeness_delay_ms, 0);
    }

    #[test]
    fn test_config_file_nonexistent() {
        let result = load_config(Some(Path::new("/nonexistent/config.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_api_key_precedence() {
        assert_eq!(
            pick_api_key(Some("env".into()), Some("file".into())).unwrap(),
            "env"
        );
        assert_eq!(
            pick_api_key(Some("  ".into()), Some("file".into())).unwrap(),
            "file"
        );
        assert!(matches!(
            pick_api_key(None, None),
            Err(ConfigError::MissingCredential)
        ));
    }
}
