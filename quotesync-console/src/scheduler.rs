//! Periodic reconciliation with a cancel handle
//! 
//! The first pass runs immediately, then one per interval. Ticks that land
//! while a pass is still running are skipped rather than queued, and manual
//! triggers that overlap a scheduled pass are coalesced by the sync manager.
//! Cancelling while a fetch is outstanding abandons that pass; no mutation
//! happens before the fetch resolves.

use crate::sync_manager::SyncManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Default reconciliation interval
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Handle to a running periodic sync task. Dropping it stops the task.
#[derive(Debug)]
pub struct ScheduledSync {
    shutdown_tx: broadcast::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledSync {
    /// Stop the task and wait for it to exit
    pub async fn cancel(mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!("Periodic sync task ended abnormally: {}", e);
                }
            }
        }
        info!("Periodic sync cancelled");
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |handle| handle.is_finished())
    }
}

impl Drop for ScheduledSync {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Spawns periodic reconciliation passes
pub struct SyncScheduler;

impl SyncScheduler {
    /// Start syncing now and then every `period`
    pub fn start(manager: Arc<SyncManager>, period: Duration) -> ScheduledSync {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!("Periodic sync started with interval {:?}", period);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = ticker.tick() => {}
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Abandoning in-flight reconciliation on shutdown");
                        break;
                    }
                    result = manager.sync_now() => {
                        if let Err(e) = result {
                            // Retried on the next tick
                            warn!("Scheduled sync failed: {}", e);
                        }
                    }
                }
            }

            debug!("Periodic sync loop exited");
        });

        ScheduledSync {
            shutdown_tx,
            handle: Some(handle),
        }
    }
}
