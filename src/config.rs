//! Run configuration, built once at startup and shared by reference with
//! every component that issues requests.

use crate::retry::RetryConfig;
use crate::{CatalogError, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Largest page the catalog API accepts for album and track listings.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Longest cooldown honored from a `Retry-After` hint; larger hints are clamped.
pub const MAX_COOLDOWN: Duration = Duration::from_secs(60 * 60);

pub const DEFAULT_BASE_URL: &str = "https://api.spotify.com/v1";

/// Upper bounds on concurrently running workers per stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcurrencyConfig {
    /// Track discovery workers (one album each)
    pub album_workers: usize,
    /// Track detail workers (one track each)
    pub track_workers: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            album_workers: 8,
            track_workers: 16,
        }
    }
}

/// Configuration for a single export run.
///
/// # Examples
///
/// ```rust
/// use artist_catalog::ExportConfig;
/// use std::time::Duration;
///
/// let config = ExportConfig::new()
///     .with_page_size(20)
///     .with_flush_on_throttle(true)
///     .with_flush_interval(Duration::from_secs(30));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Base URL of the catalog API, without a trailing slash
    pub base_url: String,
    /// Page size for album and track listings
    pub page_size: u32,
    /// Timeout for a single HTTP round trip
    pub request_timeout: Duration,
    /// Retry configuration shared by all three fetch call sites
    pub retry: RetryConfig,
    /// Worker pool sizes
    pub concurrency: ConcurrencyConfig,
    /// Flush collected records before sleeping out a rate limit cooldown
    pub flush_on_throttle: bool,
    /// Flush in the background at this interval while the run is in progress
    pub flush_interval: Option<Duration>,
    /// Where the delimited output is written
    pub output_path: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: MAX_PAGE_SIZE,
            request_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            flush_on_throttle: false,
            flush_interval: None,
            output_path: PathBuf::from("output.csv"),
        }
    }
}

impl ExportConfig {
    /// Create a new config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a config from `CATALOG_*` environment variables, falling back to defaults.
    ///
    /// Recognized variables: `CATALOG_BASE_URL`, `CATALOG_PAGE_SIZE`,
    /// `CATALOG_OUTPUT_FILE`, `CATALOG_MAX_RETRIES`, `CATALOG_ALBUM_WORKERS`,
    /// `CATALOG_TRACK_WORKERS`, `CATALOG_FLUSH_ON_THROTTLE`,
    /// `CATALOG_FLUSH_INTERVAL_SECS`, `CATALOG_REQUEST_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(base_url) = env::var("CATALOG_BASE_URL") {
            config = config.with_base_url(&base_url);
        }
        if let Some(page_size) = parse_env::<u32>("CATALOG_PAGE_SIZE")? {
            config.page_size = page_size;
        }
        if let Ok(output) = env::var("CATALOG_OUTPUT_FILE") {
            config.output_path = PathBuf::from(output);
        }
        if let Some(max_retries) = parse_env::<u32>("CATALOG_MAX_RETRIES")? {
            config.retry.max_retries = max_retries;
        }
        if let Some(workers) = parse_env::<usize>("CATALOG_ALBUM_WORKERS")? {
            config.concurrency.album_workers = workers;
        }
        if let Some(workers) = parse_env::<usize>("CATALOG_TRACK_WORKERS")? {
            config.concurrency.track_workers = workers;
        }
        if let Some(flush) = parse_env::<bool>("CATALOG_FLUSH_ON_THROTTLE")? {
            config.flush_on_throttle = flush;
        }
        if let Some(secs) = parse_env::<u64>("CATALOG_FLUSH_INTERVAL_SECS")? {
            config.flush_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(secs) = parse_env::<u64>("CATALOG_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set custom retry configuration
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_concurrency(mut self, album_workers: usize, track_workers: usize) -> Self {
        self.concurrency = ConcurrencyConfig {
            album_workers,
            track_workers,
        };
        self
    }

    pub fn with_flush_on_throttle(mut self, enabled: bool) -> Self {
        self.flush_on_throttle = enabled;
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = Some(interval);
        self
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(CatalogError::Config("base URL is empty".to_string()));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(CatalogError::Config(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        if self.concurrency.album_workers == 0 || self.concurrency.track_workers == 0 {
            return Err(CatalogError::Config(
                "worker pools need at least one worker".to_string(),
            ));
        }
        if self.retry.min_backoff > self.retry.max_backoff {
            return Err(CatalogError::Config(format!(
                "min backoff {:?} exceeds max backoff {:?}",
                self.retry.min_backoff, self.retry.max_backoff
            )));
        }
        if matches!(self.flush_interval, Some(interval) if interval.is_zero()) {
            return Err(CatalogError::Config(
                "flush interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| CatalogError::Config(format!("{name} has invalid value '{raw}'"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ExportConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.page_size, 50);
        assert_eq!(config.retry.max_retries, 5);
        assert!(!config.flush_on_throttle);
    }

    #[test]
    fn test_page_size_bounds() {
        assert!(ExportConfig::new().with_page_size(0).validate().is_err());
        assert!(ExportConfig::new().with_page_size(51).validate().is_err());
        assert!(ExportConfig::new().with_page_size(1).validate().is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = ExportConfig::new().with_concurrency(0, 4);
        assert!(matches!(config.validate(), Err(CatalogError::Config(_))));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = ExportConfig::new().with_base_url("http://localhost:8080/v1/");
        assert_eq!(config.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_inverted_backoff_rejected() {
        let config = ExportConfig::new().with_retry_config(RetryConfig::with_delays(
            Duration::from_secs(10),
            Duration::from_secs(1),
        ));
        assert!(config.validate().is_err());
    }
}
