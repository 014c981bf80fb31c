//! Remote gateway abstraction
//! 
//! The reconciliation core only ever talks to the remote feed through this
//! trait, so tests and alternative transports can stand in for HTTP.

use crate::types::QuoteRecord;
use crate::Result;
use async_trait::async_trait;

/// Source of remote snapshots and sink for locally added quotes.
///
/// Implementations must bound their own waits and report every failure as a
/// [`crate::SyncError`]; neither method may panic on transport faults.
#[async_trait]
pub trait RemoteGateway: Send + Sync + std::fmt::Debug {
    /// Fetch the current remote snapshot
    async fn fetch_snapshot(&self) -> Result<Vec<QuoteRecord>>;

    /// Publish one newly added quote
    async fn publish(&self, record: &QuoteRecord) -> Result<()>;
}
