//! Quotesync Console Library
//! 
//! Offline-first quote collection with periodic reconciliation against a
//! remote feed. The local collection is the source of truth for display; the
//! remote snapshot is merged in additively, with the remote winning category
//! conflicts until the user overrides them.

pub mod app;
pub mod category_index;
pub mod config;
pub mod conflict_resolver;
pub mod error;
pub mod outbound_queue;
pub mod quote_store;
pub mod reconciler;
pub mod scheduler;
pub mod storage;
pub mod sync_manager;
pub mod transfer;

pub use app::App;
pub use config::Config;
pub use error::ConsoleError;

/// Console result type
pub type Result<T> = std::result::Result<T, ConsoleError>;
