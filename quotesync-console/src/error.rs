//! Console application error types

use quotesync_client::SyncError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Quote not found: {text}")]
    NotFound { text: String },

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),
}

impl ConsoleError {
    /// Whether the application stays usable after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ConsoleError::Config(_))
    }
}

impl From<rocksdb::Error> for ConsoleError {
    fn from(err: rocksdb::Error) -> Self {
        ConsoleError::Storage(err.to_string())
    }
}
