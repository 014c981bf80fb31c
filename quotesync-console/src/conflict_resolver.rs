//! Conflict resolution surface
//! 
//! Holds the conflict batch left by the last reconciliation pass. The pass has
//! already applied the remote version; a manual override reverts the batch to
//! the local values and returns the surface to idle.
//!
//! The batch is persisted next to the collection, so a pending surface
//! survives restarts and the override can be issued from a later process.
//!
//! Lock order is surface first, then record store. Both the sync manager and
//! manual resolution follow it, so a revert can never interleave with a pass.

use crate::quote_store::QuoteStore;
use crate::reconciler::revert_conflicts;
use crate::storage::{Storage, PENDING_CONFLICTS_KEY};
use crate::Result;
use quotesync_client::{Collection, QuoteRecord};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Load the persisted conflict batch; absent or corrupt state yields none
pub fn load_pending(storage: &dyn Storage) -> Vec<QuoteRecord> {
    match storage.get(PENDING_CONFLICTS_KEY) {
        Ok(Some(bytes)) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            warn!("Persisted conflict batch is unparsable, treating as none: {}", e);
            Vec::new()
        }),
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!("Failed to read persisted conflict batch, treating as none: {}", e);
            Vec::new()
        }
    }
}

/// Pending conflicts, if any
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SurfaceState {
    #[default]
    Idle,
    Pending(Vec<QuoteRecord>),
}

/// Observable effect of recording a pass's conflict batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceTransition {
    Unchanged,
    Pending { count: usize },
    Cleared,
}

impl SurfaceState {
    pub fn from_batch(batch: Vec<QuoteRecord>) -> Self {
        if batch.is_empty() {
            SurfaceState::Idle
        } else {
            SurfaceState::Pending(batch)
        }
    }

    /// Record the batch from one reconciliation pass
    pub fn record(&mut self, batch: Vec<QuoteRecord>) -> SurfaceTransition {
        if batch.is_empty() {
            let was_pending = self.is_pending();
            *self = SurfaceState::Idle;
            if was_pending {
                SurfaceTransition::Cleared
            } else {
                SurfaceTransition::Unchanged
            }
        } else {
            let count = batch.len();
            *self = SurfaceState::Pending(batch);
            SurfaceTransition::Pending { count }
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, SurfaceState::Pending(_))
    }

    pub fn pending(&self) -> &[QuoteRecord] {
        match self {
            SurfaceState::Idle => &[],
            SurfaceState::Pending(batch) => batch,
        }
    }
}

/// Result of a manual override
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualResolution {
    /// Records written back to their local values
    pub reverted: usize,
    /// Collection after the revert
    pub collection: Collection,
}

/// Conflict resolver for the pending batch
#[derive(Debug, Default)]
pub struct ConflictResolver {
    state: Mutex<SurfaceState>,
}

impl ConflictResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore the surface from the batch persisted by the last pass
    pub fn open(storage: &dyn Storage) -> Self {
        let state = SurfaceState::from_batch(load_pending(storage));
        if state.is_pending() {
            info!("Restored {} pending conflicts", state.pending().len());
        }
        Self {
            state: Mutex::new(state),
        }
    }

    /// Exclusive access to the surface; held across a pass's store mutation
    pub(crate) async fn lock(&self) -> MutexGuard<'_, SurfaceState> {
        self.state.lock().await
    }

    pub async fn state(&self) -> SurfaceState {
        self.state.lock().await.clone()
    }

    pub async fn pending(&self) -> Vec<QuoteRecord> {
        self.state.lock().await.pending().to_vec()
    }

    pub async fn is_pending(&self) -> bool {
        self.state.lock().await.is_pending()
    }

    /// Revert the pending batch to local values, persist and go idle.
    ///
    /// A no-op returning `None` when nothing is pending. If persisting fails
    /// the surface stays pending so the override can be retried.
    pub async fn resolve_manually(&self, store: &QuoteStore) -> Result<Option<ManualResolution>> {
        let mut state = self.state.lock().await;
        let batch = match &*state {
            SurfaceState::Idle => {
                debug!("Manual resolution requested with no pending conflicts");
                return Ok(None);
            }
            SurfaceState::Pending(batch) => batch.clone(),
        };

        let resolution = store
            .mutate_with_conflicts(|quotes| {
                let reverted = revert_conflicts(quotes, &batch);
                let resolution = ManualResolution {
                    reverted,
                    collection: quotes.clone(),
                };
                Ok((resolution, Vec::new()))
            })
            .await?;

        *state = SurfaceState::Idle;
        info!("Manually resolved {} conflicts in favour of local versions", resolution.reverted);
        Ok(Some(resolution))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::reconcile;
    use crate::storage::MemoryStorage;
    use std::sync::Arc;

    fn q(text: &str, category: &str) -> QuoteRecord {
        QuoteRecord::new(text, category)
    }

    #[test]
    fn test_state_transitions() {
        let mut state = SurfaceState::Idle;

        assert_eq!(state.record(Vec::new()), SurfaceTransition::Unchanged);
        assert_eq!(
            state.record(vec![q("A", "X"), q("B", "X")]),
            SurfaceTransition::Pending { count: 2 }
        );
        assert_eq!(state.pending().len(), 2);
        assert_eq!(state.record(vec![q("C", "X")]), SurfaceTransition::Pending { count: 1 });
        assert_eq!(state.record(Vec::new()), SurfaceTransition::Cleared);
        assert_eq!(state, SurfaceState::Idle);
    }

    #[tokio::test]
    async fn test_resolve_when_idle_is_noop() {
        let store = QuoteStore::open(Arc::new(MemoryStorage::new()));
        store.add("A", "X").await.unwrap();
        let resolver = ConflictResolver::new();

        assert!(resolver.resolve_manually(&store).await.unwrap().is_none());
        assert_eq!(store.snapshot().await, vec![q("A", "X")]);
    }

    #[tokio::test]
    async fn test_manual_override_restores_local_value() {
        let store = QuoteStore::open(Arc::new(MemoryStorage::new()));
        store.add("A", "X").await.unwrap();
        let resolver = ConflictResolver::new();

        {
            let mut state = resolver.lock().await;
            let report = store
                .mutate(|quotes| Ok(reconcile(quotes, &[q("A", "Y")])))
                .await
                .unwrap();
            state.record(report.conflicts);
        }
        assert_eq!(store.snapshot().await, vec![q("A", "Y")]);
        assert!(resolver.is_pending().await);

        let resolution = resolver.resolve_manually(&store).await.unwrap().unwrap();

        assert_eq!(resolution.reverted, 1);
        assert_eq!(resolution.collection, vec![q("A", "X")]);
        assert_eq!(store.snapshot().await, vec![q("A", "X")]);
        assert_eq!(resolver.state().await, SurfaceState::Idle);
    }

    #[test]
    fn test_open_restores_persisted_batch() {
        let storage = MemoryStorage::new().with_entry(
            PENDING_CONFLICTS_KEY,
            r#"[{"text":"A","category":"X"}]"#,
        );
        let resolver = ConflictResolver::open(&storage);
        assert_eq!(
            resolver.state.try_lock().unwrap().clone(),
            SurfaceState::Pending(vec![q("A", "X")])
        );

        let empty = MemoryStorage::new().with_entry(PENDING_CONFLICTS_KEY, "[]");
        assert_eq!(*ConflictResolver::open(&empty).state.try_lock().unwrap(), SurfaceState::Idle);

        let corrupt = MemoryStorage::new().with_entry(PENDING_CONFLICTS_KEY, "{oops");
        assert!(load_pending(&corrupt).is_empty());
        assert!(load_pending(&MemoryStorage::new()).is_empty());
    }

    #[tokio::test]
    async fn test_manual_override_clears_persisted_batch() {
        let storage = Arc::new(MemoryStorage::new().with_entry(
            PENDING_CONFLICTS_KEY,
            r#"[{"text":"A","category":"X"}]"#,
        ));
        let store = QuoteStore::open(storage.clone());
        store.add("A", "Y").await.unwrap();

        let resolver = ConflictResolver::open(storage.as_ref());
        assert!(resolver.is_pending().await);

        resolver.resolve_manually(&store).await.unwrap().unwrap();
        assert_eq!(store.snapshot().await, vec![q("A", "X")]);
        assert!(load_pending(storage.as_ref()).is_empty());
        assert!(!ConflictResolver::open(storage.as_ref()).is_pending().await);
    }

    #[tokio::test]
    async fn test_failed_persist_keeps_surface_pending() {
        let storage = Arc::new(MemoryStorage::new());
        let store = QuoteStore::open(storage.clone());
        store.add("A", "Y").await.unwrap();
        let resolver = ConflictResolver::new();
        resolver.lock().await.record(vec![q("A", "X")]);

        storage.set_fail_writes(true);
        assert!(resolver.resolve_manually(&store).await.is_err());
        assert!(resolver.is_pending().await);
        assert_eq!(store.snapshot().await, vec![q("A", "Y")]);
        assert!(storage.get(PENDING_CONFLICTS_KEY).unwrap().is_none());

        storage.set_fail_writes(false);
        assert!(resolver.resolve_manually(&store).await.unwrap().is_some());
        assert!(!resolver.is_pending().await);
    }
}
