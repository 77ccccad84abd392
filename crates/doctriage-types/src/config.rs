//! Configuration schema.
//!
//! All sections and fields are optional in the YAML file; missing values
//! fall back to the defaults below. Unknown fields are ignored for forward
//! compatibility.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

// ── Root config ──────────────────────────────────────────────────────────

/// Root configuration for a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnalyzerConfig {
    /// Remote classification service settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Adaptive submission-spacing settings.
    #[serde(default)]
    pub throttle: ThrottleConfig,

    /// Worker pool settings.
    #[serde(default)]
    pub workers: WorkerConfig,

    /// Result cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

impl AnalyzerConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&raw)?)
    }
}

// ── API ──────────────────────────────────────────────────────────────────

/// Remote classification service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the service, without a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token sent on all calls except the health probe.
    #[serde(default)]
    pub token: Option<String>,

    /// Global per-item time budget in seconds. Also the ceiling for the
    /// adaptive per-item timeout.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Timeout for a single HTTP request (upload or one poll), in seconds.
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            timeout_seconds: default_timeout_seconds(),
            http_timeout_seconds: default_http_timeout_seconds(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".into()
}

fn default_timeout_seconds() -> u64 {
    300
}

fn default_http_timeout_seconds() -> u64 {
    30
}

// ── Throttle ─────────────────────────────────────────────────────────────

/// Adaptive submission-spacing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Spacing between submissions at startup, in seconds.
    #[serde(default = "default_initial_delay")]
    pub initial_delay_seconds: f64,

    /// Lower clamp for the spacing, in seconds.
    #[serde(default = "default_min_delay")]
    pub min_delay_seconds: f64,

    /// Upper clamp for the spacing, in seconds.
    #[serde(default = "default_max_delay")]
    pub max_delay_seconds: f64,

    /// Mean response time above which spacing widens, in seconds.
    #[serde(default = "default_response_time_threshold")]
    pub response_time_threshold: f64,

    /// Step by which spacing widens or narrows, in seconds.
    #[serde(default = "default_adjustment_step")]
    pub adjustment_step: f64,

    /// Whether the feedback loop adjusts spacing at all.
    #[serde(default = "default_true")]
    pub enable_adaptive_spacing: bool,

    /// Depth of the processing hand-off buffer between upload and result
    /// collection.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            initial_delay_seconds: default_initial_delay(),
            min_delay_seconds: default_min_delay(),
            max_delay_seconds: default_max_delay(),
            response_time_threshold: default_response_time_threshold(),
            adjustment_step: default_adjustment_step(),
            enable_adaptive_spacing: true,
            buffer_size: default_buffer_size(),
        }
    }
}

fn default_initial_delay() -> f64 {
    5.0
}

fn default_min_delay() -> f64 {
    1.0
}

fn default_max_delay() -> f64 {
    99.0
}

fn default_response_time_threshold() -> f64 {
    5.0
}

fn default_adjustment_step() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_buffer_size() -> usize {
    2
}

// ── Workers ──────────────────────────────────────────────────────────────

/// Worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Maximum number of concurrently executing remote calls.
    #[serde(default = "default_worker_count")]
    pub count: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
        }
    }
}

fn default_worker_count() -> usize {
    4
}

// ── Cache ────────────────────────────────────────────────────────────────

/// Result cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Path of the SQLite cache database.
    #[serde(default = "default_cache_db_path")]
    pub db_path: String,

    /// Time-to-live of a cache entry, in hours.
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,

    /// Storage cap. Exceeding it triggers least-hit eviction.
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,

    /// Interval between automatic cleanup sweeps, in hours.
    #[serde(default = "default_cleanup_interval_hours")]
    pub cleanup_interval_hours: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: default_cache_db_path(),
            ttl_hours: default_ttl_hours(),
            max_size_mb: default_max_size_mb(),
            cleanup_interval_hours: default_cleanup_interval_hours(),
        }
    }
}

fn default_cache_db_path() -> String {
    "doctriage_cache.db".into()
}

fn default_ttl_hours() -> u64 {
    168
}

fn default_max_size_mb() -> u64 {
    1024
}

fn default_cleanup_interval_hours() -> u64 {
    24
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_from_empty_yaml() {
        let cfg: AnalyzerConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg.api.timeout_seconds, 300);
        assert_eq!(cfg.api.http_timeout_seconds, 30);
        assert!((cfg.throttle.initial_delay_seconds - 5.0).abs() < f64::EPSILON);
        assert!((cfg.throttle.min_delay_seconds - 1.0).abs() < f64::EPSILON);
        assert!((cfg.throttle.max_delay_seconds - 99.0).abs() < f64::EPSILON);
        assert!(cfg.throttle.enable_adaptive_spacing);
        assert_eq!(cfg.workers.count, 4);
        assert_eq!(cfg.cache.ttl_hours, 168);
        assert_eq!(cfg.cache.max_size_mb, 1024);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let yaml = r#"
api:
  base_url: https://docs.internal:9443
  token: sekret
throttle:
  initial_delay_seconds: 2.0
"#;
        let cfg: AnalyzerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.api.base_url, "https://docs.internal:9443");
        assert_eq!(cfg.api.token.as_deref(), Some("sekret"));
        assert_eq!(cfg.api.timeout_seconds, 300);
        assert!((cfg.throttle.initial_delay_seconds - 2.0).abs() < f64::EPSILON);
        assert!((cfg.throttle.max_delay_seconds - 99.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_fields_ignored() {
        let yaml = r#"
api:
  base_url: http://localhost:1234
  some_future_flag: true
"#;
        let cfg: AnalyzerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.api.base_url, "http://localhost:1234");
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "workers:\n  count: 8").unwrap();
        let cfg = AnalyzerConfig::load(file.path()).unwrap();
        assert_eq!(cfg.workers.count, 8);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = AnalyzerConfig::load("/nonexistent/doctriage.yaml").unwrap_err();
        assert!(matches!(err, crate::error::ConfigError::Io(_)));
    }
}
