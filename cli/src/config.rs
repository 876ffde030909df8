//! Analysis configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use hotspot_client::{Backoff, FetchOptions};
use hotspot_utils::LogFormat;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(String),

    #[error("{0}")]
    Invalid(String),
}

/// Settings for `helium-analysis`.
///
/// Loaded from a TOML file via [`AnalysisConfig::from_toml_file`]; every field
/// has a default, and command-line flags override what the file says.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// LMDB environment directory.
    #[serde(default = "default_database")]
    pub database: PathBuf,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Lookback window in days.
    #[serde(default = "default_days")]
    pub days: u64,

    /// Slack between the newest cached record and "now".
    #[serde(default = "default_holddown_hours")]
    pub holddown_hours: u64,

    /// Valid samples a direction needs before a peer report includes it.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    #[serde(default = "default_directory_page_delay_ms")]
    pub directory_page_delay_ms: u64,

    /// Retries per request after its first failure.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Backoff unit; attempt `n` waits `n * retry_base_ms`.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    /// Wait after a rate-limit response that carries no hint.
    #[serde(default = "default_rate_limit_fallback_ms")]
    pub rate_limit_fallback_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Blocks the stored directory may trail the chain before a refresh.
    #[serde(default = "default_directory_max_lag_blocks")]
    pub directory_max_lag_blocks: u64,

    /// One named database per cached hotspot, plus four fixed ones.
    #[serde(default = "default_max_dbs")]
    pub max_dbs: u32,

    #[serde(default = "default_map_size_mb")]
    pub map_size_mb: usize,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_database() -> PathBuf {
    PathBuf::from("./helium_data")
}

fn default_api_url() -> String {
    hotspot_client::DEFAULT_API_URL.to_string()
}

fn default_days() -> u64 {
    30
}

fn default_holddown_hours() -> u64 {
    6
}

fn default_min_samples() -> usize {
    5
}

fn default_page_delay_ms() -> u64 {
    750
}

fn default_directory_page_delay_ms() -> u64 {
    250
}

fn default_retry_attempts() -> u32 {
    10
}

fn default_retry_base_ms() -> u64 {
    1500
}

fn default_rate_limit_fallback_ms() -> u64 {
    5000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_directory_max_lag_blocks() -> u64 {
    1440
}

fn default_max_dbs() -> u32 {
    hotspot_store_lmdb::DEFAULT_MAX_DBS
}

fn default_map_size_mb() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl AnalysisConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_samples < 2 {
            return Err(ConfigError::Invalid(format!(
                "min_samples must be at least 2, got {}",
                self.min_samples
            )));
        }
        if self.days == 0 {
            return Err(ConfigError::Invalid("days must be at least 1".into()));
        }
        Ok(())
    }

    pub fn lookback(&self) -> Duration {
        Duration::from_secs(self.days.saturating_mul(86_400))
    }

    pub fn holddown(&self) -> Duration {
        Duration::from_secs(self.holddown_hours.saturating_mul(3600))
    }

    pub fn map_size(&self) -> usize {
        self.map_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn rate_limit_fallback(&self) -> Duration {
        Duration::from_millis(self.rate_limit_fallback_ms)
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.retry_attempts, Duration::from_millis(self.retry_base_ms))
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            page_delay: Duration::from_millis(self.page_delay_ms),
            directory_page_delay: Duration::from_millis(self.directory_page_delay_ms),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            api_url: default_api_url(),
            days: default_days(),
            holddown_hours: default_holddown_hours(),
            min_samples: default_min_samples(),
            page_delay_ms: default_page_delay_ms(),
            directory_page_delay_ms: default_directory_page_delay_ms(),
            retry_attempts: default_retry_attempts(),
            retry_base_ms: default_retry_base_ms(),
            rate_limit_fallback_ms: default_rate_limit_fallback_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            directory_max_lag_blocks: default_directory_max_lag_blocks(),
            max_dbs: default_max_dbs(),
            map_size_mb: default_map_size_mb(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}
