//! Gateway configuration with atomic state management
//! 
//! Timeouts and retry knobs are atomics so a shared `Arc<Config>` can be
//! tuned at runtime without locking.

use crate::error::SyncError;
use crate::types::SERVER_CATEGORY;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// Default remote feed
pub const DEFAULT_SERVER_URL: &str = "https://jsonplaceholder.typicode.com";

/// Gateway configuration
#[derive(Debug)]
pub struct Config {
    /// Server base URL (e.g., "https://jsonplaceholder.typicode.com")
    pub server_url: String,

    /// Path serving the snapshot (GET)
    pub snapshot_path: String,

    /// Path accepting new quotes (POST)
    pub publish_path: String,

    /// Category label given to every fetched record
    pub remote_category: String,

    /// Connection timeout in milliseconds
    pub connect_timeout: AtomicU64,

    /// Request timeout in milliseconds; bounds every fetch and publish attempt
    pub request_timeout: AtomicU64,

    /// Maximum number of publish retries after the first attempt
    pub max_retries: AtomicU32,

    /// Initial retry delay in milliseconds
    pub initial_retry_delay: AtomicU64,

    /// Maximum retry delay in milliseconds
    pub max_retry_delay: AtomicU64,

    /// Retry backoff multiplier (as integer, divide by 100 for actual value)
    pub retry_multiplier: AtomicU32,

    /// Whether to add jitter to retry delays
    pub retry_jitter: AtomicBool,

    /// Whether to verify TLS certificates
    pub tls_verify: AtomicBool,
}

impl Config {
    /// Create a new configuration with default values
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            snapshot_path: "/posts".to_string(),
            publish_path: "/posts".to_string(),
            remote_category: SERVER_CATEGORY.to_string(),
            connect_timeout: AtomicU64::new(10_000),
            request_timeout: AtomicU64::new(30_000),
            max_retries: AtomicU32::new(3),
            initial_retry_delay: AtomicU64::new(500),
            max_retry_delay: AtomicU64::new(30_000),
            retry_multiplier: AtomicU32::new(200), // 2.0 * 100
            retry_jitter: AtomicBool::new(true),
            tls_verify: AtomicBool::new(true),
        }
    }

    /// Full URL for a configured path
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.server_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout.load(Ordering::Relaxed))
    }

    pub fn set_connect_timeout(&self, timeout: Duration) {
        self.connect_timeout.store(timeout.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout.load(Ordering::Relaxed))
    }

    pub fn set_request_timeout(&self, timeout: Duration) {
        self.request_timeout.store(timeout.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries.load(Ordering::Relaxed)
    }

    pub fn set_max_retries(&self, retries: u32) {
        self.max_retries.store(retries, Ordering::Relaxed);
    }

    pub fn initial_retry_delay(&self) -> Duration {
        Duration::from_millis(self.initial_retry_delay.load(Ordering::Relaxed))
    }

    pub fn set_initial_retry_delay(&self, delay: Duration) {
        self.initial_retry_delay.store(delay.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay.load(Ordering::Relaxed))
    }

    pub fn set_max_retry_delay(&self, delay: Duration) {
        self.max_retry_delay.store(delay.as_millis() as u64, Ordering::Relaxed);
    }

    /// Backoff multiplier as a float
    pub fn retry_multiplier(&self) -> f64 {
        self.retry_multiplier.load(Ordering::Relaxed) as f64 / 100.0
    }

    pub fn set_retry_multiplier(&self, multiplier: f64) {
        self.retry_multiplier.store((multiplier * 100.0) as u32, Ordering::Relaxed);
    }

    pub fn retry_jitter(&self) -> bool {
        self.retry_jitter.load(Ordering::Relaxed)
    }

    pub fn set_retry_jitter(&self, enabled: bool) {
        self.retry_jitter.store(enabled, Ordering::Relaxed);
    }

    pub fn tls_verify(&self) -> bool {
        self.tls_verify.load(Ordering::Relaxed)
    }

    pub fn set_tls_verify(&self, verify: bool) {
        self.tls_verify.store(verify, Ordering::Relaxed);
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.server_url.is_empty() {
            return Err(config_error("server_url", "URL cannot be empty"));
        }

        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            return Err(config_error("server_url", "URL must start with http:// or https://"));
        }

        if self.remote_category.trim().is_empty() {
            return Err(config_error("remote_category", "label cannot be empty"));
        }

        if self.request_timeout().is_zero() {
            return Err(config_error("request_timeout", "must be greater than 0"));
        }

        if self.connect_timeout().is_zero() {
            return Err(config_error("connect_timeout", "must be greater than 0"));
        }

        if self.max_retry_delay() < self.initial_retry_delay() {
            return Err(config_error("max_retry_delay", "must be >= initial retry delay"));
        }

        if self.retry_multiplier() < 1.0 {
            return Err(config_error("retry_multiplier", "must be at least 1.0"));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_URL)
    }
}

fn config_error(field: &str, error: &str) -> SyncError {
    SyncError::Config {
        field: field.to_string(),
        error: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.remote_category, "server");
        assert_eq!(config.retry_multiplier(), 2.0);
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let config = Config::new("http://localhost:9000/");
        assert_eq!(config.endpoint("/posts"), "http://localhost:9000/posts");
        assert_eq!(config.endpoint("posts"), "http://localhost:9000/posts");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(Config::new("").validate().is_err());
        assert!(Config::new("ftp://example.com").validate().is_err());

        let config = Config::default();
        config.set_request_timeout(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = Config::default();
        config.set_initial_retry_delay(Duration::from_secs(10));
        config.set_max_retry_delay(Duration::from_secs(1));
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.remote_category = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
