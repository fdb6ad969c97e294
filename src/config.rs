//! Configuration types for manga-fetcher

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path, path::PathBuf, time::Duration};

/// Download pipeline configuration (directories, concurrency, page retries, packaging)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Root directory for downloaded chapters (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Maximum concurrent page downloads within one chapter (default: 4)
    #[serde(default = "default_page_concurrency")]
    pub page_concurrency: usize,

    /// Logical retries per page after a transient failure (default: 2)
    ///
    /// Separate from the fetch client's transport-level retries: a logical retry
    /// re-resolves the image URL and downloads the page again.
    #[serde(default = "default_page_retry_budget")]
    pub page_retry_budget: u32,

    /// Base delay between logical page retries (default: 500ms)
    #[serde(default = "default_page_retry_delay", with = "duration_ms_serde")]
    pub page_retry_delay: Duration,

    /// When a chapter may be packaged into an archive
    #[serde(default)]
    pub archive_policy: ArchivePolicy,

    /// Delete loose page images once the archive is written (default: false)
    #[serde(default)]
    pub cleanup_after_archive: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            page_concurrency: default_page_concurrency(),
            page_retry_budget: default_page_retry_budget(),
            page_retry_delay: default_page_retry_delay(),
            archive_policy: ArchivePolicy::default(),
            cleanup_after_archive: false,
        }
    }
}

/// Archive gating policy for chapters with failed pages
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ArchivePolicy {
    /// Only chapters with zero failed pages are packaged (default)
    #[default]
    RequireComplete,
    /// Chapters are packaged when failed pages do not exceed the threshold
    AllowPartial {
        /// Maximum number of failed pages tolerated in a packaged chapter
        max_failed_pages: usize,
    },
}

impl ArchivePolicy {
    /// Whether a chapter with `failed` failed pages may be packaged
    pub fn permits(&self, failed: usize) -> bool {
        match self {
            ArchivePolicy::RequireComplete => failed == 0,
            ArchivePolicy::AllowPartial { max_failed_pages } => failed <= *max_failed_pages,
        }
    }
}

/// HTTP fetch client configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout (default: 20 seconds)
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// User-Agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Transport-level retry policy
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            user_agent: default_user_agent(),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_ms_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_ms_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Per-source settings
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Override for the source's base URL (mirrors, test servers)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Minimum delay between two requests to this source (politeness throttle)
    #[serde(default, with = "optional_duration_ms_serde")]
    pub min_request_interval: Option<Duration>,
}

/// Main configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Source used when a request does not name one
    #[serde(default = "default_source")]
    pub default_source: String,

    /// Download pipeline settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Per-source settings keyed by source identifier
    #[serde(default)]
    pub sources: HashMap<String, SourceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_source: default_source(),
            download: DownloadConfig::default(),
            http: HttpConfig::default(),
            sources: HashMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.default_source.trim().is_empty() {
            return Err(Error::config("default_source", "must not be empty"));
        }
        if self.download.page_concurrency == 0 {
            return Err(Error::config("page_concurrency", "must be at least 1"));
        }
        if self.download.page_concurrency > MAX_PAGE_CONCURRENCY {
            return Err(Error::config(
                "page_concurrency",
                format!("must not exceed {MAX_PAGE_CONCURRENCY}"),
            ));
        }
        if self.http.retry.backoff_multiplier < 1.0 {
            return Err(Error::config(
                "backoff_multiplier",
                "must be greater than or equal to 1.0",
            ));
        }
        if self.http.timeout.is_zero() {
            return Err(Error::config("timeout", "must be greater than zero"));
        }
        Ok(())
    }

    /// Settings for one source (defaults when the source has no entry)
    pub fn source(&self, id: &str) -> SourceConfig {
        self.sources.get(id).cloned().unwrap_or_default()
    }

    /// Download root directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.download.download_dir
    }
}

/// Upper bound for `page_concurrency`
pub const MAX_PAGE_CONCURRENCY: usize = 32;

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_page_concurrency() -> usize {
    4
}

fn default_page_retry_budget() -> u32 {
    2
}

fn default_page_retry_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64) Gecko/20100101 Firefox/121.0".to_string()
}

fn default_source() -> String {
    "kisslove".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

// Optional Duration serialization helper (milliseconds)
mod optional_duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = Option::<u64>::deserialize(deserializer)?;
        Ok(ms.map(Duration::from_millis))
    }
}
