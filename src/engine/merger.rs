//! Merge freshly enriched records into the previous snapshot.
//!
//! Fresh records are authoritative for their IDs. Previous records that
//! were not re-emitted this run (IDs below the floor, or IDs whose
//! procedure failed) are carried over unchanged, so the result is always
//! a superset by ID of the input.

use std::collections::BTreeMap;
use tracing::debug;

use crate::types::{AccountId, AccountRecord, Snapshot};

/// The merged snapshot plus a breakdown of where its records came from.
#[derive(Debug)]
pub struct MergeOutcome {
    pub snapshot: Snapshot,
    /// IDs present before and refreshed this run.
    pub refreshed: usize,
    /// IDs seen for the first time.
    pub added: usize,
    /// Previous records kept as-is.
    pub carried_over: usize,
}

/// Combine `previous` with `fresh`; output is unique by ID and ascending.
pub fn merge(previous: &[AccountRecord], fresh: Vec<AccountRecord>) -> MergeOutcome {
    let mut by_id: BTreeMap<AccountId, AccountRecord> =
        previous.iter().map(|r| (r.id, r.clone())).collect();
    let previous_ids = by_id.len();

    let mut refreshed = 0;
    let mut added = 0;
    for record in fresh {
        match by_id.insert(record.id, record) {
            Some(_) => refreshed += 1,
            None => added += 1,
        }
    }

    let carried_over = previous_ids.saturating_sub(refreshed);
    let snapshot = Snapshot::from_sorted(by_id.into_values().collect());

    debug!(
        total = snapshot.total_users,
        refreshed,
        added,
        carried_over,
        "Merged snapshot"
    );

    MergeOutcome {
        snapshot,
        refreshed,
        added,
        carried_over,
    }
}
