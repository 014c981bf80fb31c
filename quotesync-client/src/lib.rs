//! Quotesync Client Library
//! 
//! Remote gateway for the quotesync reconciliation core: fetches the remote
//! snapshot and publishes locally added quotes, with bounded waits and retry
//! logic. Transport failures surface as a typed [`SyncError`], never a panic.

pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod retry;
pub mod types;

pub use client::Client;
pub use config::Config;
pub use error::SyncError;
pub use gateway::RemoteGateway;
pub use types::*;

/// Client result type
pub type Result<T> = std::result::Result<T, SyncError>;
