//! Error types for remote gateway operations
//! 
//! Every transport, timeout and remote failure is reported as a [`SyncError`]
//! so callers can log it, publish it on a status channel and retry later.

use thiserror::Error;

/// Failure while talking to the remote feed
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Connection failed: {error}")]
    Connection { error: String },

    #[error("Timeout after {duration_ms}ms for operation: {operation}")]
    Timeout { duration_ms: u64, operation: String },

    #[error("Server error: {status} - {message}")]
    Server { status: u16, message: String },

    #[error("Invalid response format: {error}")]
    InvalidResponse { error: String },

    #[error("Serialization error: {operation} - {error}")]
    Serialization { operation: String, error: String },

    #[error("Configuration error: {field} - {error}")]
    Config { field: String, error: String },

    #[error("Retry limit exceeded: {attempts} attempts failed")]
    RetryLimitExceeded { attempts: u32 },
}

impl SyncError {
    /// Map a transport error, folding reqwest's own timeouts into [`SyncError::Timeout`]
    pub fn from_transport(err: reqwest::Error, operation: &str, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            SyncError::Timeout {
                duration_ms: timeout_ms,
                operation: operation.to_string(),
            }
        } else {
            SyncError::Network(err)
        }
    }

    /// Stable short code for status reporting
    pub fn error_code(&self) -> &'static str {
        match self {
            SyncError::Network(_) | SyncError::Connection { .. } => "network",
            SyncError::Timeout { .. } => "timeout",
            SyncError::Server { .. } => "server",
            SyncError::InvalidResponse { .. } => "invalid_response",
            SyncError::Serialization { .. } => "serialization",
            SyncError::Config { .. } => "config",
            SyncError::RetryLimitExceeded { .. } => "retry_limit",
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Network(_) => true,
            SyncError::Connection { .. } => true,
            SyncError::Timeout { .. } => true,
            SyncError::Server { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization {
            operation: "json".to_string(),
            error: err.to_string(),
        }
    }
}

impl Clone for SyncError {
    fn clone(&self) -> Self {
        match self {
            SyncError::Network(e) => SyncError::Connection {
                error: e.to_string(),
            },
            SyncError::Connection { error } => SyncError::Connection {
                error: error.clone(),
            },
            SyncError::Timeout { duration_ms, operation } => SyncError::Timeout {
                duration_ms: *duration_ms,
                operation: operation.clone(),
            },
            SyncError::Server { status, message } => SyncError::Server {
                status: *status,
                message: message.clone(),
            },
            SyncError::InvalidResponse { error } => SyncError::InvalidResponse {
                error: error.clone(),
            },
            SyncError::Serialization { operation, error } => SyncError::Serialization {
                operation: operation.clone(),
                error: error.clone(),
            },
            SyncError::Config { field, error } => SyncError::Config {
                field: field.clone(),
                error: error.clone(),
            },
            SyncError::RetryLimitExceeded { attempts } => SyncError::RetryLimitExceeded {
                attempts: *attempts,
            },
        }
    }
}
