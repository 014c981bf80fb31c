//! Console application configuration

use crate::scheduler::DEFAULT_SYNC_INTERVAL;
use crate::{ConsoleError, Result};
use quotesync_client::config::DEFAULT_SERVER_URL;
use quotesync_client::SERVER_CATEGORY;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tracing_subscriber::EnvFilter;

/// Console application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the remote quote feed
    pub server_url: String,

    /// Path serving the remote snapshot
    pub snapshot_path: String,

    /// Path accepting newly added quotes
    pub publish_path: String,

    /// Category label given to every remote record
    pub remote_category: String,

    /// Directory holding the durable quote store
    pub data_dir: PathBuf,

    /// Directory receiving `quotes.json` exports
    pub export_dir: PathBuf,

    /// Periodic reconciliation interval in seconds
    pub sync_interval_secs: u64,

    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,

    /// Request timeout in seconds; bounds every fetch and publish attempt
    pub request_timeout_secs: u64,

    /// Maximum publish attempts
    pub max_retry_attempts: u32,

    /// Initial publish retry delay in milliseconds
    pub initial_retry_delay_ms: u64,

    /// Maximum publish retry delay in milliseconds
    pub max_retry_delay_ms: u64,

    /// Enable TLS certificate verification
    pub verify_tls: bool,

    /// Capacity of the status broadcast channel
    pub status_channel_capacity: usize,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            snapshot_path: "/posts".to_string(),
            publish_path: "/posts".to_string(),
            remote_category: SERVER_CATEGORY.to_string(),
            data_dir: default_data_dir(),
            export_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            sync_interval_secs: DEFAULT_SYNC_INTERVAL.as_secs(),
            connection_timeout_secs: 10,
            request_timeout_secs: 30,
            max_retry_attempts: 3,
            initial_retry_delay_ms: 500,
            max_retry_delay_ms: 30000,
            verify_tls: true,
            status_channel_capacity: 64,
            log_level: "info".to_string(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("quotesync"))
        .unwrap_or_else(|| PathBuf::from(".quotesync"))
}

impl Config {
    /// Load configuration from multiple sources with precedence:
    /// 1. Command line arguments (highest priority)
    /// 2. Environment variables
    /// 3. Configuration file
    /// 4. Default values (lowest priority)
    pub async fn load(
        config_path: Option<&str>,
        cli_server_url: Option<String>,
        cli_data_dir: Option<String>,
    ) -> Result<Self> {
        let mut config = if let Some(path) = config_path {
            Self::load_from_file(path).await?
        } else {
            Self::try_load_default_config().await.unwrap_or_default()
        };

        config.load_from_env();

        if let Some(server_url) = cli_server_url {
            config.server_url = server_url;
        }

        if let Some(data_dir) = cli_data_dir {
            config.data_dir = PathBuf::from(data_dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| ConsoleError::Config(format!("Failed to read config file '{}': {}", path, e)))?;

        let config: Config = if path.ends_with(".toml") {
            toml::from_str(&content)
                .map_err(|e| ConsoleError::Config(format!("Failed to parse TOML config: {}", e)))?
        } else {
            serde_json::from_str(&content)
                .map_err(|e| ConsoleError::Config(format!("Failed to parse JSON config: {}", e)))?
        };

        Ok(config)
    }

    /// Try to load configuration from default locations
    async fn try_load_default_config() -> Result<Self> {
        let default_paths = [
            "quotesync.json",
            "quotesync.toml",
            ".quotesync.json",
            ".quotesync.toml",
        ];

        if let Some(config_dir) = dirs::config_dir() {
            let user_config_path = config_dir.join("quotesync").join("config.json");
            if user_config_path.exists() {
                if let Ok(config) = Self::load_from_file(&user_config_path.to_string_lossy()).await {
                    return Ok(config);
                }
            }
        }

        for path in &default_paths {
            if PathBuf::from(path).exists() {
                if let Ok(config) = Self::load_from_file(path).await {
                    return Ok(config);
                }
            }
        }

        Err(ConsoleError::Config("No default configuration file found".to_string()))
    }

    /// Load configuration overrides from environment variables
    pub fn load_from_env(&mut self) {
        if let Ok(server_url) = std::env::var("QUOTESYNC_SERVER_URL") {
            self.server_url = server_url;
        }

        if let Ok(category) = std::env::var("QUOTESYNC_REMOTE_CATEGORY") {
            self.remote_category = category;
        }

        if let Ok(data_dir) = std::env::var("QUOTESYNC_DATA_DIR") {
            self.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(export_dir) = std::env::var("QUOTESYNC_EXPORT_DIR") {
            self.export_dir = PathBuf::from(export_dir);
        }

        if let Ok(interval) = std::env::var("QUOTESYNC_SYNC_INTERVAL_SECS") {
            if let Ok(interval) = interval.parse() {
                self.sync_interval_secs = interval;
            }
        }

        if let Ok(conn_timeout) = std::env::var("QUOTESYNC_CONNECTION_TIMEOUT_SECS") {
            if let Ok(timeout) = conn_timeout.parse() {
                self.connection_timeout_secs = timeout;
            }
        }

        if let Ok(req_timeout) = std::env::var("QUOTESYNC_REQUEST_TIMEOUT_SECS") {
            if let Ok(timeout) = req_timeout.parse() {
                self.request_timeout_secs = timeout;
            }
        }

        if let Ok(max_retries) = std::env::var("QUOTESYNC_MAX_RETRY_ATTEMPTS") {
            if let Ok(retries) = max_retries.parse() {
                self.max_retry_attempts = retries;
            }
        }

        if let Ok(verify_tls) = std::env::var("QUOTESYNC_VERIFY_TLS") {
            self.verify_tls = verify_tls.to_lowercase() == "true" || verify_tls == "1";
        }

        if let Ok(log_level) = std::env::var("QUOTESYNC_LOG_LEVEL") {
            self.log_level = log_level;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server_url.is_empty() {
            return Err(ConsoleError::Config("Server URL cannot be empty".to_string()));
        }

        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            return Err(ConsoleError::Config("Server URL must start with http:// or https://".to_string()));
        }

        if self.remote_category.trim().is_empty() {
            return Err(ConsoleError::Config("Remote category label cannot be empty".to_string()));
        }

        if self.data_dir.as_os_str().is_empty() {
            return Err(ConsoleError::Config("Data directory cannot be empty".to_string()));
        }

        if self.sync_interval_secs == 0 {
            return Err(ConsoleError::Config("Sync interval must be greater than 0".to_string()));
        }

        if self.connection_timeout_secs == 0 {
            return Err(ConsoleError::Config("Connection timeout must be greater than 0".to_string()));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConsoleError::Config("Request timeout must be greater than 0".to_string()));
        }

        if self.max_retry_attempts == 0 {
            return Err(ConsoleError::Config("Max retry attempts must be greater than 0".to_string()));
        }

        if self.max_retry_delay_ms < self.initial_retry_delay_ms {
            return Err(ConsoleError::Config("Max retry delay must be >= initial retry delay".to_string()));
        }

        if self.status_channel_capacity == 0 {
            return Err(ConsoleError::Config("Status channel capacity must be greater than 0".to_string()));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConsoleError::Config(format!(
                "Invalid log level '{}'. Valid levels: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Log filter for the configured level, `info` if it does not parse
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(self.log_level.to_lowercase()).unwrap_or_else(|_| EnvFilter::new("info"))
    }

    /// Location of the RocksDB quote store
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("quotes.db")
    }

    /// Gateway configuration derived from these settings
    pub fn client_config(&self) -> quotesync_client::Config {
        let mut client = quotesync_client::Config::new(self.server_url.clone());
        client.snapshot_path = self.snapshot_path.clone();
        client.publish_path = self.publish_path.clone();
        client.remote_category = self.remote_category.clone();
        client.set_connect_timeout(self.connection_timeout());
        client.set_request_timeout(self.request_timeout());
        // Attempts include the first try
        client.set_max_retries(self.max_retry_attempts.saturating_sub(1));
        client.set_initial_retry_delay(Duration::from_millis(self.initial_retry_delay_ms));
        client.set_max_retry_delay(Duration::from_millis(self.max_retry_delay_ms));
        client.set_tls_verify(self.verify_tls);
        client
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &str) -> Result<()> {
        let content = if path.ends_with(".toml") {
            toml::to_string_pretty(self)
                .map_err(|e| ConsoleError::Config(format!("Failed to serialize TOML config: {}", e)))?
        } else {
            serde_json::to_string_pretty(self)
                .map_err(|e| ConsoleError::Config(format!("Failed to serialize JSON config: {}", e)))?
        };

        fs::write(path, content)
            .await
            .map_err(|e| ConsoleError::Config(format!("Failed to write config file '{}': {}", path, e)))?;

        Ok(())
    }
}
