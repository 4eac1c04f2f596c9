//! Run configuration
//!
//! Loaded once at startup (JSON file and/or command-line flags) and never
//! re-read during a run.

use crate::queries::DEFAULT_SPOT_PRICE_METRIC;
use crate::retry::{RetryMode, RetryPolicy, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY_SECS};
use serde::{Deserialize, Serialize};
use spot_ranker_core::{RankerError, Result, DEFAULT_TOP_N};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default Prometheus endpoint
pub const DEFAULT_PROMETHEUS_URL: &str = "http://127.0.0.1:9090";

/// Trailing window for volatility ranking (1 week)
pub const DEFAULT_VOLATILITY_WINDOW_SECS: u64 = 7 * 24 * 3600;

/// Sampling resolution inside the volatility window (1 minute)
pub const DEFAULT_VOLATILITY_RESOLUTION_SECS: u64 = 60;

/// Where the on-demand price table comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CatalogSource {
    /// HTTP price server; `url` may contain a `{region}` placeholder
    PriceServer { url: String },

    /// Local JSON file in the price server format
    File { path: PathBuf },
}

/// Spot ranker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankerConfig {
    /// Region to rank (e.g. "us-east-2")
    #[serde(default = "default_region")]
    pub region: String,

    /// Zone for cheapest/most-expensive ranking (e.g. "use2-az1")
    #[serde(default = "default_zone")]
    pub zone: String,

    /// Prometheus base URL
    #[serde(default = "default_prometheus_url")]
    pub prometheus_url: String,

    /// Per-request timeout for the Prometheus API (seconds)
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,

    /// Spot price gauge name
    #[serde(default = "default_metric_name")]
    pub metric_name: String,

    /// On-demand price source; there is no default endpoint
    #[serde(default)]
    pub price_catalog: Option<CatalogSource>,

    /// Entries kept per ranking
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Attempts per ranking operation
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Pause between attempts (seconds)
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Which failures are retried
    #[serde(default)]
    pub retry_mode: RetryMode,

    /// Trailing window for volatility ranking (seconds)
    #[serde(default = "default_volatility_window_secs")]
    pub volatility_window_secs: u64,

    /// Resolution inside the volatility window (seconds)
    #[serde(default = "default_volatility_resolution_secs")]
    pub volatility_resolution_secs: u64,

    /// Run the three rankings concurrently
    #[serde(default)]
    pub parallel: bool,
}

fn default_region() -> String {
    "us-east-2".to_string()
}

fn default_zone() -> String {
    "use2-az1".to_string()
}

fn default_prometheus_url() -> String {
    DEFAULT_PROMETHEUS_URL.to_string()
}

fn default_query_timeout_secs() -> u64 {
    10
}

fn default_metric_name() -> String {
    DEFAULT_SPOT_PRICE_METRIC.to_string()
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

fn default_retry_attempts() -> u32 {
    DEFAULT_RETRY_ATTEMPTS
}

fn default_retry_delay_secs() -> u64 {
    DEFAULT_RETRY_DELAY_SECS
}

fn default_volatility_window_secs() -> u64 {
    DEFAULT_VOLATILITY_WINDOW_SECS
}

fn default_volatility_resolution_secs() -> u64 {
    DEFAULT_VOLATILITY_RESOLUTION_SECS
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            zone: default_zone(),
            prometheus_url: default_prometheus_url(),
            query_timeout_secs: default_query_timeout_secs(),
            metric_name: default_metric_name(),
            price_catalog: None,
            top_n: default_top_n(),
            retry_attempts: default_retry_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            retry_mode: RetryMode::default(),
            volatility_window_secs: default_volatility_window_secs(),
            volatility_resolution_secs: default_volatility_resolution_secs(),
            parallel: false,
        }
    }
}

impl RankerConfig {
    /// Create a config for a region and zone
    pub fn new(region: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            zone: zone.into(),
            ..Default::default()
        }
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RankerError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    /// Parse from a JSON document
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| RankerError::config(format!("Invalid config JSON: {}", e)))
    }

    /// Set Prometheus URL
    pub fn with_prometheus_url(mut self, url: impl Into<String>) -> Self {
        self.prometheus_url = url.into();
        self
    }

    /// Set price catalog source
    pub fn with_price_catalog(mut self, source: CatalogSource) -> Self {
        self.price_catalog = Some(source);
        self
    }

    /// Set entries kept per ranking
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// Set retry attempts and delay
    pub fn with_retry(mut self, attempts: u32, delay_secs: u64) -> Self {
        self.retry_attempts = attempts;
        self.retry_delay_secs = delay_secs;
        self
    }

    /// Set retry mode
    pub fn with_retry_mode(mut self, mode: RetryMode) -> Self {
        self.retry_mode = mode;
        self
    }

    /// Enable concurrent ranking
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, Duration::from_secs(self.retry_delay_secs))
            .with_mode(self.retry_mode)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn volatility_window(&self) -> Duration {
        Duration::from_secs(self.volatility_window_secs)
    }

    pub fn volatility_resolution(&self) -> Duration {
        Duration::from_secs(self.volatility_resolution_secs)
    }

    /// Configured on-demand price source
    pub fn price_source(&self) -> Result<&CatalogSource> {
        self.price_catalog.as_ref().ok_or_else(|| {
            RankerError::config("no price catalog source: set a price server URL or a price file")
        })
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        self.price_source()?;
        if self.region.trim().is_empty() {
            return Err(RankerError::config("region must not be empty"));
        }
        if self.zone.trim().is_empty() {
            return Err(RankerError::config("zone must not be empty"));
        }
        if self.prometheus_url.trim().is_empty() {
            return Err(RankerError::config("prometheus_url must not be empty"));
        }
        if self.metric_name.trim().is_empty() {
            return Err(RankerError::config("metric_name must not be empty"));
        }
        if self.top_n == 0 {
            return Err(RankerError::config("top_n must be at least 1"));
        }
        if self.query_timeout_secs == 0 {
            return Err(RankerError::config("query_timeout_secs must be at least 1"));
        }
        if self.volatility_window_secs == 0 || self.volatility_resolution_secs == 0 {
            return Err(RankerError::config(
                "volatility window and resolution must be non-zero",
            ));
        }
        if self.volatility_resolution_secs > self.volatility_window_secs {
            return Err(RankerError::config(format!(
                "volatility resolution ({}s) exceeds window ({}s)",
                self.volatility_resolution_secs, self.volatility_window_secs
            )));
        }
        Ok(())
    }
}
