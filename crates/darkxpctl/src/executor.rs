//! Reconciliation pipeline
//!
//! One run, one actor:
//!
//! 1. Load legacy levels, snapshots, ledger rows and the aggregate
//! 2. Classify legacy/snapshot alignment
//! 3. Stop if snapshots are stale and no sync was allowed; otherwise sync and reload
//! 4. Detect ledger drift against the snapshots
//! 5. Stop if there is nothing to repair
//! 6. Expand every diff into unit events
//! 7. Stop here on a dry run
//! 8. Append all events
//! 9. Reload the aggregate for the before/after report
//!
//! Writes happen only in steps 3 and 8. Running two passes for the same actor
//! at once is not supported.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use darkxp_common::planner::{detect_drift, plan_alignment, AlignmentReport, DriftReport, SyncEntry};
use darkxp_common::store::{load_views, ReconcileStore};
use darkxp_common::{AggregateSnapshot, EventGenerator, LedgerEvent, ReconcileError, SubjectState};

use crate::cli::RunOptions;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The actor has no snapshots
    NothingToDo,
    /// Stale snapshots found and the operator did not allow a sync
    SyncRequired,
    /// Ledger already matches every snapshot
    AlreadyConsistent,
    /// Plan computed, nothing written
    DryRun,
    /// Events written
    Applied,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::NothingToDo => "nothing_to_do",
            Outcome::SyncRequired => "sync_required",
            Outcome::AlreadyConsistent => "already_consistent",
            Outcome::DryRun => "dry_run",
            Outcome::Applied => "applied",
        }
    }
}

/// Everything the reporter needs about one run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub actor_id: String,
    pub dry_run: bool,
    pub sync_requested: bool,
    pub outcome: Outcome,
    pub started_at: DateTime<Utc>,
    pub aggregate_before: Option<AggregateSnapshot>,
    pub aggregate_after: Option<AggregateSnapshot>,
    /// Alignment as first loaded, before any sync
    pub alignment: AlignmentReport,
    /// Snapshots rebuilt from legacy levels during this run
    pub synced: Vec<SyncEntry>,
    /// Per-skill triples the drift pass ran on
    pub subjects: Vec<SubjectState>,
    pub drift: DriftReport,
    pub events: Vec<LedgerEvent>,
    pub events_written: usize,
}

impl RunReport {
    fn new(options: &RunOptions, started_at: DateTime<Utc>) -> Self {
        Self {
            actor_id: options.actor_id.clone(),
            dry_run: options.dry_run,
            sync_requested: options.sync_skill_progress,
            outcome: Outcome::NothingToDo,
            started_at,
            aggregate_before: None,
            aggregate_after: None,
            alignment: AlignmentReport::default(),
            synced: Vec::new(),
            subjects: Vec::new(),
            drift: DriftReport::default(),
            events: Vec::new(),
            events_written: 0,
        }
    }

    /// Net change the planned events make to the ledger
    pub fn planned_delta(&self) -> i64 {
        self.events.iter().map(|e| e.amount).sum()
    }

    fn finish(mut self, outcome: Outcome) -> Self {
        self.outcome = outcome;
        self
    }
}

/// Drives one reconciliation run against a store
pub struct Executor<'a, S: ReconcileStore + ?Sized> {
    store: &'a S,
    options: &'a RunOptions,
}

impl<'a, S: ReconcileStore + ?Sized> Executor<'a, S> {
    pub fn new(store: &'a S, options: &'a RunOptions) -> Self {
        Self { store, options }
    }

    pub fn run(&self) -> Result<RunReport, ReconcileError> {
        self.options.validate()?;

        let actor_id = self.options.actor_id.as_str();
        let started_at = Utc::now();
        let mut report = RunReport::new(self.options, started_at);

        info!(actor_id, dry_run = self.options.dry_run, "Starting dark XP reconciliation");

        report.aggregate_before = self.store.fetch_aggregate(actor_id)?;
        let mut views = load_views(self.store, actor_id)?;

        report.alignment = plan_alignment(&views.subjects());
        for mismatch in &report.alignment.mismatches {
            debug!(
                subject_id = mismatch.subject_id.as_str(),
                legacy_level = mismatch.legacy_level,
                snapshot_level = mismatch.snapshot.level,
                "Legacy level behind snapshot, keeping snapshot"
            );
        }

        if !report.alignment.needs_sync.is_empty() {
            if !self.options.sync_skill_progress {
                warn!(
                    count = report.alignment.needs_sync.len(),
                    "Snapshots behind legacy levels; sync not requested"
                );
                report.subjects = views.subjects();
                return Ok(report.finish(Outcome::SyncRequired));
            }

            let rows = report.alignment.sync_rows();
            info!(count = rows.len(), "Rebuilding snapshots from legacy levels");
            self.store.upsert_snapshots(actor_id, &rows)?;
            report.synced = report.alignment.needs_sync.clone();

            views = load_views(self.store, actor_id)?;
        }

        report.subjects = views.subjects();
        report.drift = detect_drift(&views);

        if report.drift.subjects_checked == 0 {
            info!(actor_id, "No skill_progress rows, nothing to do");
            return Ok(report.finish(Outcome::NothingToDo));
        }
        if report.drift.is_consistent() {
            info!(actor_id, "Ledger already matches snapshots");
            return Ok(report.finish(Outcome::AlreadyConsistent));
        }

        let generator = EventGenerator::new(actor_id, started_at);
        report.events = generator.build_all(&report.drift.diffs)?;
        info!(
            diffs = report.drift.diffs.len(),
            events = report.events.len(),
            total_delta = report.drift.total_delta(),
            "Planned ledger backfill"
        );

        if self.options.dry_run {
            return Ok(report.finish(Outcome::DryRun));
        }

        self.store.append_events(&report.events)?;
        report.events_written = report.events.len();
        info!(events = report.events_written, "Inserted dark_xp_events");

        report.aggregate_after = self.store.fetch_aggregate(actor_id)?;
        Ok(report.finish(Outcome::Applied))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use darkxp_common::{MemoryStore, SkillSnapshot};

    #[test]
    fn test_invalid_options_touch_no_store() {
        let store = MemoryStore::new().with_snapshot("u1", "s1", SkillSnapshot::new(3, 0));
        let options = RunOptions::new("u1").dry_run().with_sync();

        let err = Executor::new(&store, &options).run().unwrap_err();
        assert!(matches!(err, ReconcileError::Usage(_)));
        assert_eq!(store.write_calls(), 0);
    }

    #[test]
    fn test_outcome_names() {
        assert_eq!(Outcome::AlreadyConsistent.as_str(), "already_consistent");
        assert_eq!(
            serde_json::to_value(Outcome::SyncRequired).unwrap(),
            serde_json::json!("sync_required")
        );
    }
}
