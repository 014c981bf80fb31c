//! Outbound publish queue
//! 
//! Locally added quotes are handed to a background worker that publishes them
//! through the remote gateway. The local append has already been persisted by
//! the time a quote is queued, so a publish failure is only reported on the
//! status channel and never rolls anything back.

use crate::sync_manager::SyncStatus;
use quotesync_client::{QuoteRecord, RemoteGateway};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Statistics for the publish queue
#[derive(Debug, Default)]
pub struct OutboundStats {
    pub queued: AtomicU64,
    pub published: AtomicU64,
    pub failed: AtomicU64,
}

impl OutboundStats {
    /// Queued but not yet attempted to completion
    pub fn pending(&self) -> u64 {
        let done = self.published.load(Ordering::Acquire) + self.failed.load(Ordering::Acquire);
        self.queued.load(Ordering::Acquire).saturating_sub(done)
    }
}

/// Fire-and-forget publishing of new quotes
#[derive(Debug)]
pub struct OutboundQueue {
    tx: mpsc::UnboundedSender<QuoteRecord>,
    worker: JoinHandle<()>,
    stats: Arc<OutboundStats>,
}

impl OutboundQueue {
    /// Spawn the publish worker
    pub fn start(gateway: Arc<dyn RemoteGateway>, status_tx: broadcast::Sender<SyncStatus>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<QuoteRecord>();
        let stats = Arc::new(OutboundStats::default());
        let worker_stats = stats.clone();

        let worker = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                match gateway.publish(&record).await {
                    Ok(()) => {
                        worker_stats.published.fetch_add(1, Ordering::AcqRel);
                        debug!("Published quote: {}", record);
                        let _ = status_tx.send(SyncStatus::Published { text: record.text });
                    }
                    Err(e) => {
                        worker_stats.failed.fetch_add(1, Ordering::AcqRel);
                        warn!(error_code = e.error_code(), "Failed to publish quote {}: {}", record, e);
                        let _ = status_tx.send(SyncStatus::PublishFailed {
                            text: record.text,
                            error: e.to_string(),
                        });
                    }
                }
            }
            debug!("Outbound queue drained");
        });

        Self { tx, worker, stats }
    }

    /// Queue a quote for publishing; `false` if the worker has stopped
    pub fn enqueue(&self, record: QuoteRecord) -> bool {
        self.stats.queued.fetch_add(1, Ordering::AcqRel);
        if self.tx.send(record).is_err() {
            self.stats.queued.fetch_sub(1, Ordering::AcqRel);
            warn!("Outbound queue closed, quote will not be published");
            return false;
        }
        true
    }

    pub fn stats(&self) -> &Arc<OutboundStats> {
        &self.stats
    }

    /// Stop accepting quotes and wait for queued ones to be attempted
    pub async fn shutdown(self) {
        let Self { tx, worker, stats } = self;
        drop(tx);
        if let Err(e) = worker.await {
            warn!("Outbound worker ended abnormally: {}", e);
        }
        info!(
            "Outbound queue stopped: {} published, {} failed",
            stats.published.load(Ordering::Acquire),
            stats.failed.load(Ordering::Acquire)
        );
    }
}
