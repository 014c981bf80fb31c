//! Sync manager coordinating reconciliation passes
//! 
//! A pass fetches the remote snapshot, then, under the conflict surface lock
//! and the record store's single-writer lock, reconciles, persists and
//! records the conflict batch. Nothing is mutated until the fetch resolves, so
//! a failed or abandoned fetch leaves the collection and the surface exactly
//! as they were.
//!
//! The conflict batch is persisted in the same storage write as the collection
//! and no await follows that write, so dropping a pass cannot leave the
//! collection reconciled with its batch lost.
//!
//! Overlapping triggers are coalesced: while one pass is in flight, further
//! calls return [`SyncOutcome::Coalesced`] without fetching.

use crate::conflict_resolver::{ConflictResolver, ManualResolution, SurfaceTransition};
use crate::quote_store::QuoteStore;
use crate::reconciler::{reconcile, ReconcileReport};
use crate::Result;
use quotesync_client::RemoteGateway;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

/// Events published on the status channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Syncing,
    Synced { appended: usize, overwritten: usize },
    ConflictsDetected { count: usize },
    ConflictsCleared,
    ManuallyResolved { count: usize },
    Failed { error: String },
    Coalesced,
    Published { text: String },
    PublishFailed { text: String, error: String },
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Syncing => write!(f, "Syncing with server..."),
            SyncStatus::Synced { appended, overwritten } => write!(
                f,
                "Sync complete: {} new, {} updated",
                appended, overwritten
            ),
            SyncStatus::ConflictsDetected { count } => {
                write!(f, "{} conflict(s) detected. Server version applied.", count)
            }
            SyncStatus::ConflictsCleared => write!(f, "Conflicts cleared"),
            SyncStatus::ManuallyResolved { count } => {
                write!(f, "{} conflict(s) manually resolved", count)
            }
            SyncStatus::Failed { error } => write!(f, "Sync failed: {}", error),
            SyncStatus::Coalesced => write!(f, "Sync already in progress"),
            SyncStatus::Published { text } => write!(f, "Published \"{}\"", text),
            SyncStatus::PublishFailed { text, error } => {
                write!(f, "Failed to publish \"{}\": {}", text, error)
            }
        }
    }
}

/// Outcome of a sync trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A pass ran to completion
    Completed {
        report: ReconcileReport,
        transition: SurfaceTransition,
    },
    /// Another pass was already in flight; nothing was done
    Coalesced,
}

/// Counters for sync activity
#[derive(Debug, Default)]
pub struct SyncStats {
    pub passes_completed: AtomicU64,
    pub passes_failed: AtomicU64,
    pub passes_coalesced: AtomicU64,
    pub records_appended: AtomicU64,
    pub conflicts_detected: AtomicU64,
}

/// Point-in-time copy of [`SyncStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatsSnapshot {
    pub passes_completed: u64,
    pub passes_failed: u64,
    pub passes_coalesced: u64,
    pub records_appended: u64,
    pub conflicts_detected: u64,
}

impl SyncStats {
    pub fn snapshot(&self) -> SyncStatsSnapshot {
        SyncStatsSnapshot {
            passes_completed: self.passes_completed.load(Ordering::Relaxed),
            passes_failed: self.passes_failed.load(Ordering::Relaxed),
            passes_coalesced: self.passes_coalesced.load(Ordering::Relaxed),
            records_appended: self.records_appended.load(Ordering::Relaxed),
            conflicts_detected: self.conflicts_detected.load(Ordering::Relaxed),
        }
    }
}

/// Clears the in-flight flag when a pass ends, including when it is dropped
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Coordinates reconciliation passes against the remote gateway
#[derive(Debug)]
pub struct SyncManager {
    gateway: Arc<dyn RemoteGateway>,
    store: Arc<QuoteStore>,
    conflicts: Arc<ConflictResolver>,
    status_tx: broadcast::Sender<SyncStatus>,
    in_flight: AtomicBool,
    stats: SyncStats,
}

impl SyncManager {
    pub fn new(
        gateway: Arc<dyn RemoteGateway>,
        store: Arc<QuoteStore>,
        conflicts: Arc<ConflictResolver>,
        status_tx: broadcast::Sender<SyncStatus>,
    ) -> Self {
        Self {
            gateway,
            store,
            conflicts,
            status_tx,
            in_flight: AtomicBool::new(false),
            stats: SyncStats::default(),
        }
    }

    /// Run one reconciliation pass unless one is already in flight
    #[instrument(skip(self))]
    pub async fn sync_now(&self) -> Result<SyncOutcome> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            debug!("Reconciliation already in flight, coalescing trigger");
            self.stats.passes_coalesced.fetch_add(1, Ordering::Relaxed);
            self.notify(SyncStatus::Coalesced);
            return Ok(SyncOutcome::Coalesced);
        };

        let pass_id = uuid::Uuid::new_v4();
        info!("Starting reconciliation pass {}", pass_id);
        self.notify(SyncStatus::Syncing);

        let remote = match self.gateway.fetch_snapshot().await {
            Ok(remote) => remote,
            Err(e) => {
                warn!(error_code = e.error_code(), "Reconciliation pass {} aborted: {}", pass_id, e);
                self.stats.passes_failed.fetch_add(1, Ordering::Relaxed);
                self.notify(SyncStatus::Failed { error: e.to_string() });
                return Err(e.into());
            }
        };
        debug!("Fetched remote snapshot with {} records", remote.len());

        let mut surface = self.conflicts.lock().await;
        let report = match self
            .store
            .mutate_with_conflicts(|quotes| {
                let report = reconcile(quotes, &remote);
                let conflicts = report.conflicts.clone();
                Ok((report, conflicts))
            })
            .await
        {
            Ok(report) => report,
            Err(e) => {
                warn!("Reconciliation pass {} could not persist: {}", pass_id, e);
                self.stats.passes_failed.fetch_add(1, Ordering::Relaxed);
                self.notify(SyncStatus::Failed { error: e.to_string() });
                return Err(e);
            }
        };
        let transition = surface.record(report.conflicts.clone());
        drop(surface);

        self.stats.passes_completed.fetch_add(1, Ordering::Relaxed);
        self.stats
            .records_appended
            .fetch_add(report.appended as u64, Ordering::Relaxed);
        self.stats
            .conflicts_detected
            .fetch_add(report.conflicts.len() as u64, Ordering::Relaxed);

        info!(
            "Reconciliation pass {} complete: {} appended, {} conflicts, {} overwritten",
            pass_id,
            report.appended,
            report.conflicts.len(),
            report.overwritten
        );

        match transition {
            SurfaceTransition::Pending { count } => {
                self.notify(SyncStatus::ConflictsDetected { count })
            }
            SurfaceTransition::Cleared => self.notify(SyncStatus::ConflictsCleared),
            SurfaceTransition::Unchanged => {}
        }
        self.notify(SyncStatus::Synced {
            appended: report.appended,
            overwritten: report.overwritten,
        });

        Ok(SyncOutcome::Completed { report, transition })
    }

    /// Revert the pending conflict batch to local values
    #[instrument(skip(self))]
    pub async fn resolve_manually(&self) -> Result<Option<ManualResolution>> {
        let resolution = self.conflicts.resolve_manually(&self.store).await?;
        if let Some(resolution) = &resolution {
            self.notify(SyncStatus::ManuallyResolved {
                count: resolution.reverted,
            });
        }
        Ok(resolution)
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncStatus> {
        self.status_tx.subscribe()
    }

    pub fn stats(&self) -> SyncStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn store(&self) -> &Arc<QuoteStore> {
        &self.store
    }

    pub fn conflicts(&self) -> &Arc<ConflictResolver> {
        &self.conflicts
    }

    fn notify(&self, status: SyncStatus) {
        // No receivers is fine
        let _ = self.status_tx.send(status);
    }
}
