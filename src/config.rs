//! Configuration types for article-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path, path::PathBuf, time::Duration};

/// Output layout configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory that holds one subdirectory per archived article (default: "./downloads")
    #[serde(default = "default_output_root")]
    pub root: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: default_output_root(),
        }
    }
}

/// Network fetching configuration (relays, concurrency, timeouts)
///
/// Groups settings related to how articles and assets are fetched.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Relay endpoints; each one receives `?url=<target>&headers=<json>` and performs the real fetch.
    ///
    /// Empty means requests go straight to the origin.
    #[serde(default)]
    pub relays: Vec<String>,

    /// Maximum in-flight fetches per batch (default: 5).
    ///
    /// Clamped to the number of relays when relays are configured, so that
    /// concurrent fetches never share a relay.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Timeout for article document fetches (default: 30 seconds)
    #[serde(default = "default_article_timeout", with = "duration_serde")]
    pub article_timeout: Duration,

    /// Timeout for asset fetches (default: 10 seconds)
    #[serde(default = "default_asset_timeout", with = "duration_serde")]
    pub asset_timeout: Duration,

    /// Rewrite `http://` and `//host` URLs to `https://` before dispatch (default: true)
    #[serde(default = "default_true")]
    pub upgrade_insecure: bool,

    /// User-Agent header sent with every request
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Headers attached to credentialed (article document) requests, e.g. a cookie
    #[serde(default)]
    pub credential_headers: BTreeMap<String, String>,

    /// Pause after each successfully fetched article in a multi-article batch (default: 2 seconds)
    #[serde(default = "default_article_pause", with = "duration_serde")]
    pub article_pause: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            relays: Vec::new(),
            workers: default_workers(),
            article_timeout: default_article_timeout(),
            asset_timeout: default_asset_timeout(),
            upgrade_insecure: true,
            user_agent: None,
            credential_headers: BTreeMap::new(),
            article_pause: default_article_pause(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
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

/// Offline document rendering configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenderingConfig {
    /// Stylesheet links placed in the document shell head
    #[serde(default = "default_stylesheets")]
    pub stylesheets: Vec<String>,

    /// UTC offset used to render the publish time, in minutes.
    ///
    /// `None` uses the local timezone of the machine.
    #[serde(default)]
    pub publish_time_utc_offset_minutes: Option<i32>,
}

impl Default for RenderingConfig {
    fn default() -> Self {
        Self {
            stylesheets: default_stylesheets(),
            publish_time_utc_offset_minutes: None,
        }
    }
}

/// Raster recompression applied to saved assets after archiving
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Enable recompression (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Images wider than this are downscaled, aspect preserved (default: 1000)
    #[serde(default = "default_max_width")]
    pub max_width: u32,

    /// JPEG encoder quality, 1-100 (default: 80)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_width: default_max_width(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

/// Main configuration for ArticleDownloader
///
/// Fields are organized into logical sub-configs:
/// - [`output`](OutputConfig) - where archives are written
/// - [`fetch`](FetchConfig) - relays, concurrency, timeouts, credentials
/// - [`retry`](RetryConfig) - caller-level retry of article fetches
/// - [`rendering`](RenderingConfig) - offline document shell and time rendering
/// - [`compression`](CompressionConfig) - raster post-processing
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Output layout
    #[serde(default)]
    pub output: OutputConfig,

    /// Fetch behavior
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Retry behavior for article fetches
    #[serde(default)]
    pub retry: RetryConfig,

    /// Document rendering
    #[serde(default)]
    pub rendering: RenderingConfig,

    /// Image recompression
    #[serde(default)]
    pub compression: CompressionConfig,
}

impl Config {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Check settings that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.fetch.workers == 0 {
            return Err(config_error("workers must be at least 1", "fetch.workers"));
        }
        for relay in &self.fetch.relays {
            if let Err(e) = url::Url::parse(relay) {
                return Err(config_error(
                    &format!("invalid relay endpoint {relay}: {e}"),
                    "fetch.relays",
                ));
            }
        }
        if self.fetch.article_timeout.is_zero() || self.fetch.asset_timeout.is_zero() {
            return Err(config_error("timeouts must be non-zero", "fetch"));
        }
        if !(1..=100).contains(&self.compression.jpeg_quality) {
            return Err(config_error(
                "jpeg_quality must be between 1 and 100",
                "compression.jpeg_quality",
            ));
        }
        if self.compression.max_width == 0 {
            return Err(config_error(
                "max_width must be positive",
                "compression.max_width",
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(config_error(
                "backoff_multiplier must be at least 1.0",
                "retry.backoff_multiplier",
            ));
        }
        Ok(())
    }
}

fn config_error(message: &str, key: &str) -> Error {
    Error::Config {
        message: message.to_string(),
        key: Some(key.to_string()),
    }
}

fn default_output_root() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_workers() -> usize {
    5
}

fn default_article_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_asset_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_article_pause() -> Duration {
    Duration::from_secs(2)
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

fn default_stylesheets() -> Vec<String> {
    (1..=6).map(|n| format!("/assets/css/{n}.css")).collect()
}

fn default_max_width() -> u32 {
    1000
}

fn default_jpeg_quality() -> u8 {
    80
}

// Duration serialization helper
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
