//! In-memory store for tests and rehearsals.
//!
//! Keeps the same contracts as the hosted store, counts every write, and can
//! be told to fail at one point. Appending events also bumps the actor's
//! aggregate total the way the database trigger does.

use std::sync::{Mutex, MutexGuard};

use super::{AggregateView, LedgerStore, LegacyFieldStore, SnapshotStore};
use crate::codec::SkillSnapshot;
use crate::error::{ReconcileError, Result};
use crate::model::{AggregateSnapshot, LedgerEvent, LedgerRow, LegacyLevelRow, SnapshotRow};

/// Where an injected failure fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    FetchLegacy,
    FetchSnapshots,
    FetchLedger,
    FetchAggregate,
    UpsertSnapshots,
    AppendEvents,
}

#[derive(Debug, Default)]
struct MemoryState {
    skills: Vec<(String, LegacyLevelRow)>,
    snapshots: Vec<(String, SnapshotRow)>,
    ledger: Vec<(String, LedgerRow)>,
    aggregates: Vec<(String, AggregateSnapshot)>,
    written_events: Vec<LedgerEvent>,
    upsert_calls: usize,
    append_calls: usize,
    fail_on: Option<FailPoint>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a skill with its legacy level
    pub fn with_skill(self, actor_id: &str, subject_id: &str, legacy_level: i64) -> Self {
        self.lock()
            .skills
            .push((actor_id.to_string(), LegacyLevelRow::new(subject_id, legacy_level)));
        self
    }

    pub fn with_snapshot(self, actor_id: &str, subject_id: &str, snapshot: SkillSnapshot) -> Self {
        self.lock()
            .snapshots
            .push((actor_id.to_string(), SnapshotRow::new(subject_id, snapshot)));
        self
    }

    /// Seed a ledger total as unit rows (negative totals become -1 rows)
    pub fn with_ledger_total(self, actor_id: &str, subject_id: &str, total: i64) -> Self {
        {
            let mut state = self.lock();
            let amount = total.signum();
            for _ in 0..total.unsigned_abs() {
                state.ledger.push((
                    actor_id.to_string(),
                    LedgerRow {
                        subject_id: subject_id.to_string(),
                        amount,
                    },
                ));
            }
        }
        self
    }

    pub fn with_aggregate(self, actor_id: &str, aggregate: AggregateSnapshot) -> Self {
        self.lock().aggregates.push((actor_id.to_string(), aggregate));
        self
    }

    pub fn fail_on(self, point: FailPoint) -> Self {
        self.lock().fail_on = Some(point);
        self
    }

    /// Clear an injected failure
    pub fn heal(&self) {
        self.lock().fail_on = None;
    }

    pub fn snapshot_of(&self, actor_id: &str, subject_id: &str) -> Option<SkillSnapshot> {
        self.lock()
            .snapshots
            .iter()
            .find(|(actor, row)| actor == actor_id && row.subject_id == subject_id)
            .map(|(_, row)| row.snapshot())
    }

    pub fn ledger_total(&self, actor_id: &str, subject_id: &str) -> i64 {
        self.lock()
            .ledger
            .iter()
            .filter(|(actor, row)| actor == actor_id && row.subject_id == subject_id)
            .map(|(_, row)| row.amount)
            .sum()
    }

    /// Events appended through the store interface, in order
    pub fn written_events(&self) -> Vec<LedgerEvent> {
        self.lock().written_events.clone()
    }

    pub fn upsert_calls(&self) -> usize {
        self.lock().upsert_calls
    }

    pub fn append_calls(&self) -> usize {
        self.lock().append_calls
    }

    /// Upserts plus appends
    pub fn write_calls(&self) -> usize {
        let state = self.lock();
        state.upsert_calls + state.append_calls
    }

    fn check(state: &MemoryState, point: FailPoint) -> std::result::Result<(), String> {
        if state.fail_on == Some(point) {
            return Err(format!("injected failure at {:?}", point));
        }
        Ok(())
    }
}

impl LegacyFieldStore for MemoryStore {
    fn fetch_legacy_levels(&self, actor_id: &str) -> Result<Vec<LegacyLevelRow>> {
        let state = self.lock();
        Self::check(&state, FailPoint::FetchLegacy).map_err(|m| ReconcileError::fetch("skills", m))?;
        Ok(state
            .skills
            .iter()
            .filter(|(actor, _)| actor == actor_id)
            .map(|(_, row)| row.clone())
            .collect())
    }
}

impl SnapshotStore for MemoryStore {
    fn fetch_snapshots(&self, actor_id: &str) -> Result<Vec<SnapshotRow>> {
        let state = self.lock();
        Self::check(&state, FailPoint::FetchSnapshots)
            .map_err(|m| ReconcileError::fetch("skill_progress", m))?;
        Ok(state
            .snapshots
            .iter()
            .filter(|(actor, _)| actor == actor_id)
            .map(|(_, row)| row.clone())
            .collect())
    }

    fn upsert_snapshots(&self, actor_id: &str, rows: &[SnapshotRow]) -> Result<()> {
        let mut state = self.lock();
        state.upsert_calls += 1;
        Self::check(&state, FailPoint::UpsertSnapshots)
            .map_err(|m| ReconcileError::write("skill_progress", m))?;

        for row in rows {
            let existing = state
                .snapshots
                .iter()
                .position(|(actor, stored)| actor == actor_id && stored.subject_id == row.subject_id);
            match existing {
                Some(index) => state.snapshots[index].1 = row.clone(),
                None => state.snapshots.push((actor_id.to_string(), row.clone())),
            }
        }
        Ok(())
    }
}

impl LedgerStore for MemoryStore {
    fn fetch_ledger(&self, actor_id: &str) -> Result<Vec<LedgerRow>> {
        let state = self.lock();
        Self::check(&state, FailPoint::FetchLedger)
            .map_err(|m| ReconcileError::fetch("dark_xp_events", m))?;
        Ok(state
            .ledger
            .iter()
            .filter(|(actor, _)| actor == actor_id)
            .map(|(_, row)| row.clone())
            .collect())
    }

    fn append_events(&self, events: &[LedgerEvent]) -> Result<()> {
        let mut state = self.lock();
        state.append_calls += 1;
        Self::check(&state, FailPoint::AppendEvents)
            .map_err(|m| ReconcileError::write("dark_xp_events", m))?;

        for event in events {
            state.ledger.push((
                event.actor_id.clone(),
                LedgerRow {
                    subject_id: event.subject_id.clone(),
                    amount: event.amount,
                },
            ));
            let existing = state
                .aggregates
                .iter()
                .position(|(actor, _)| *actor == event.actor_id);
            match existing {
                Some(index) => state.aggregates[index].1.total += event.amount,
                None => state.aggregates.push((
                    event.actor_id.clone(),
                    AggregateSnapshot {
                        total: event.amount,
                        inferred_level: 1,
                    },
                )),
            }
            state.written_events.push(event.clone());
        }
        Ok(())
    }
}

impl AggregateView for MemoryStore {
    fn fetch_aggregate(&self, actor_id: &str) -> Result<Option<AggregateSnapshot>> {
        let state = self.lock();
        Self::check(&state, FailPoint::FetchAggregate)
            .map_err(|m| ReconcileError::fetch("user_progress", m))?;
        Ok(state
            .aggregates
            .iter()
            .find(|(actor, _)| actor == actor_id)
            .map(|(_, aggregate)| *aggregate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_reads_are_scoped_to_actor() {
        let store = MemoryStore::new()
            .with_skill("u1", "s1", 4)
            .with_skill("u2", "s2", 9)
            .with_ledger_total("u1", "s1", 3);

        assert_eq!(store.fetch_legacy_levels("u1").unwrap().len(), 1);
        assert_eq!(store.fetch_ledger("u1").unwrap().len(), 3);
        assert!(store.fetch_ledger("u2").unwrap().is_empty());
    }

    #[test]
    fn test_upsert_replaces_existing_row() {
        let store = MemoryStore::new().with_snapshot("u1", "s1", SkillSnapshot::new(2, 0));
        store
            .upsert_snapshots("u1", &[SnapshotRow::new("s1", SkillSnapshot::new(8, 0))])
            .unwrap();
        assert_eq!(store.snapshot_of("u1", "s1"), Some(SkillSnapshot::new(8, 0)));
        assert_eq!(store.fetch_snapshots("u1").unwrap().len(), 1);
        assert_eq!(store.upsert_calls(), 1);
    }

    #[test]
    fn test_append_updates_aggregate() {
        let store = MemoryStore::new().with_aggregate(
            "u1",
            AggregateSnapshot {
                total: 10,
                inferred_level: 2,
            },
        );
        let event = LedgerEvent {
            actor_id: "u1".to_string(),
            subject_id: "s1".to_string(),
            amount: 1,
            resulting_level: 2,
            timestamp: Utc::now(),
        };
        store.append_events(&[event.clone(), event]).unwrap();

        assert_eq!(store.fetch_aggregate("u1").unwrap().unwrap().total, 12);
        assert_eq!(store.ledger_total("u1", "s1"), 2);
        assert_eq!(store.written_events().len(), 2);
    }

    #[test]
    fn test_injected_failure() {
        let store = MemoryStore::new().fail_on(FailPoint::FetchSnapshots);
        let err = store.fetch_snapshots("u1").unwrap_err();
        assert!(matches!(err, ReconcileError::StoreFetch { .. }));

        store.heal();
        assert!(store.fetch_snapshots("u1").is_ok());
    }
}
