//! Store interfaces the reconciler reads from and writes to.
//!
//! Each view of the data sits behind its own trait so tests can swap in
//! [`MemoryStore`] for the hosted [`PostgrestStore`].

pub mod memory;
pub mod postgrest;

pub use memory::{FailPoint, MemoryStore};
pub use postgrest::PostgrestStore;

use crate::error::Result;
use crate::model::{AggregateSnapshot, LedgerEvent, LedgerRow, LegacyLevelRow, LoadedViews, SnapshotRow};

/// Legacy level on each skill row
pub trait LegacyFieldStore {
    fn fetch_legacy_levels(&self, actor_id: &str) -> Result<Vec<LegacyLevelRow>>;
}

/// Authoritative level/prestige snapshots
pub trait SnapshotStore {
    fn fetch_snapshots(&self, actor_id: &str) -> Result<Vec<SnapshotRow>>;

    /// Insert or replace by (actor, subject). Not atomic across rows.
    fn upsert_snapshots(&self, actor_id: &str, rows: &[SnapshotRow]) -> Result<()>;
}

/// Append-only event ledger
pub trait LedgerStore {
    fn fetch_ledger(&self, actor_id: &str) -> Result<Vec<LedgerRow>>;

    /// Append events in order. Rows written before a failure stay written.
    fn append_events(&self, events: &[LedgerEvent]) -> Result<()>;
}

/// Externally maintained running total (read-only)
pub trait AggregateView {
    fn fetch_aggregate(&self, actor_id: &str) -> Result<Option<AggregateSnapshot>>;
}

/// Everything a reconciliation run needs
pub trait ReconcileStore: LegacyFieldStore + SnapshotStore + LedgerStore + AggregateView {}

impl<T> ReconcileStore for T where T: LegacyFieldStore + SnapshotStore + LedgerStore + AggregateView {}

/// Load the three per-skill views for an actor
pub fn load_views<S: ReconcileStore + ?Sized>(store: &S, actor_id: &str) -> Result<LoadedViews> {
    let legacy = store.fetch_legacy_levels(actor_id)?;
    let snapshots = store.fetch_snapshots(actor_id)?;
    let ledger = store.fetch_ledger(actor_id)?;

    tracing::debug!(
        actor_id,
        skills = legacy.len(),
        snapshots = snapshots.len(),
        ledger_rows = ledger.len(),
        "Loaded views"
    );

    Ok(LoadedViews {
        legacy,
        snapshots,
        ledger,
    })
}
