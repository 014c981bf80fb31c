//! Merge of a remote snapshot into the local collection
//! 
//! One pass runs four steps in a fixed order:
//! 1. conflict detection on the pre-merge collection: every local record whose
//!    text appears remotely under a different category;
//! 2. additive merge: every remote record whose exact `(text, category)` pair
//!    is absent locally is appended, in snapshot order;
//! 3. remote-wins resolution: for each conflict, the first local record with
//!    that text takes the category of the first remote record with that text;
//! 4. (caller) persist, refresh categories, publish the conflict batch.
//!
//! Step 3 never leaves behind a copy appended by step 2 of the same pass: when
//! the overwritten record becomes identical to such a copy, the copy is
//! dropped. Running a pass twice against the same snapshot is a no-op the
//! second time.

use quotesync_client::{Collection, QuoteRecord};
use tracing::debug;

/// What a single pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Local records that disagreed with the remote, pre-resolution values
    pub conflicts: Vec<QuoteRecord>,
    /// Remote records appended by the additive merge (net of dropped copies)
    pub appended: usize,
    /// Local records whose category was overwritten by the remote version
    pub overwritten: usize,
}

impl ReconcileReport {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    pub fn is_noop(&self) -> bool {
        self.conflicts.is_empty() && self.appended == 0 && self.overwritten == 0
    }
}

/// Step 1: local records conflicting with any remote record, in local order
pub fn detect_conflicts(local: &[QuoteRecord], remote: &[QuoteRecord]) -> Vec<QuoteRecord> {
    local
        .iter()
        .filter(|l| remote.iter().any(|r| l.conflicts_with(r)))
        .cloned()
        .collect()
}

/// Reconcile `local` against `remote` in place
pub fn reconcile(local: &mut Collection, remote: &[QuoteRecord]) -> ReconcileReport {
    // Step 1, before any mutation
    let conflicts = detect_conflicts(local, remote);

    // Step 2
    let merge_start = local.len();
    for r in remote {
        if !local.iter().any(|l| l == r) {
            local.push(r.clone());
        }
    }

    // Step 3
    let mut overwritten = 0;
    for conflict in &conflicts {
        let Some(remote_version) = remote.iter().find(|r| r.text == conflict.text) else {
            continue;
        };
        let Some(index) = local.iter().position(|l| l.text == conflict.text) else {
            continue;
        };

        if local[index].category != remote_version.category {
            local[index].category = remote_version.category.clone();
            overwritten += 1;
        }

        if index < merge_start {
            let duplicate = local[merge_start..]
                .iter()
                .position(|l| *l == local[index])
                .map(|offset| merge_start + offset);
            if let Some(duplicate) = duplicate {
                local.remove(duplicate);
            }
        }
    }

    let appended = local.len() - merge_start;
    debug!(
        "Reconciled {} remote records: {} appended, {} conflicts, {} overwritten",
        remote.len(),
        appended,
        conflicts.len(),
        overwritten
    );

    ReconcileReport {
        conflicts,
        appended,
        overwritten,
    }
}

/// Revert a batch of automatically resolved conflicts to their local values.
///
/// Each entry overwrites the first record with the same text; entries with no
/// matching record are skipped. Returns how many records were written.
pub fn revert_conflicts(local: &mut Collection, batch: &[QuoteRecord]) -> usize {
    let mut reverted = 0;
    for original in batch {
        if let Some(index) = local.iter().position(|l| l.text == original.text) {
            local[index] = original.clone();
            reverted += 1;
        }
    }
    reverted
}
