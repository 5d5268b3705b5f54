//! Reconciliation planner
//!
//! Classifies how the legacy level, the snapshot and the ledger disagree for
//! each skill of an actor. Two passes:
//!
//! 1. Alignment: legacy level vs snapshot level, decided by [`align`].
//! 2. Drift: snapshot-derived expected total vs ledger sum.
//!
//! Nothing here performs I/O; the executor feeds in loaded views.

use serde::Serialize;

use crate::codec::{decode, encode, SkillSnapshot};
use crate::model::{LoadedViews, SnapshotRow, SubjectState};

/// Outcome of the precedence policy for one skill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alignment {
    /// Nothing to report
    Aligned,
    /// Legacy level is ahead; the snapshot is stale and may be rebuilt from it
    NeedsSync { legacy_level: i64 },
    /// Legacy level is behind; the snapshot stays authoritative
    SnapshotAhead { legacy_level: i64, snapshot_level: u32 },
}

/// Precedence policy between the legacy level and the snapshot.
///
/// The legacy level wins only when it is strictly ahead of the snapshot level,
/// or when there is no snapshot at all and the legacy level is above 1.
/// Prestige is not consulted.
pub fn align(legacy_level: Option<i64>, snapshot: Option<SkillSnapshot>) -> Alignment {
    let Some(legacy_level) = legacy_level else {
        return Alignment::Aligned;
    };

    match snapshot {
        None if legacy_level > 1 => Alignment::NeedsSync { legacy_level },
        None => Alignment::Aligned,
        Some(snap) => {
            let snapshot_level = snap.level as i64;
            if legacy_level > snapshot_level {
                Alignment::NeedsSync { legacy_level }
            } else if legacy_level < snapshot_level {
                Alignment::SnapshotAhead {
                    legacy_level,
                    snapshot_level: snap.level,
                }
            } else {
                Alignment::Aligned
            }
        }
    }
}

/// Snapshot that must be rebuilt from the legacy level
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncEntry {
    pub subject_id: String,
    pub legacy_level: i64,
    pub current: Option<SkillSnapshot>,
    pub target: SkillSnapshot,
}

/// Legacy level behind the snapshot (reported, never applied)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MismatchEntry {
    pub subject_id: String,
    pub legacy_level: i64,
    pub snapshot: SkillSnapshot,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlignmentReport {
    pub needs_sync: Vec<SyncEntry>,
    pub mismatches: Vec<MismatchEntry>,
}

impl AlignmentReport {
    /// Rows to upsert when the operator allows the sync
    pub fn sync_rows(&self) -> Vec<SnapshotRow> {
        self.needs_sync
            .iter()
            .map(|entry| SnapshotRow::new(&entry.subject_id, entry.target))
            .collect()
    }
}

/// Snapshot a legacy level maps onto: `decode(level - 1)`
pub fn snapshot_for_legacy(legacy_level: i64) -> SkillSnapshot {
    decode((legacy_level.max(1) - 1) as u64)
}

pub fn plan_alignment(subjects: &[SubjectState]) -> AlignmentReport {
    let mut report = AlignmentReport::default();

    for subject in subjects {
        match align(subject.legacy_level, subject.snapshot) {
            Alignment::Aligned => {}
            Alignment::NeedsSync { legacy_level } => report.needs_sync.push(SyncEntry {
                subject_id: subject.subject_id.clone(),
                legacy_level,
                current: subject.snapshot,
                target: snapshot_for_legacy(legacy_level),
            }),
            Alignment::SnapshotAhead { legacy_level, .. } => {
                if let Some(snapshot) = subject.snapshot {
                    report.mismatches.push(MismatchEntry {
                        subject_id: subject.subject_id.clone(),
                        legacy_level,
                        snapshot,
                    });
                }
            }
        }
    }

    report
}

/// Non-zero difference between the snapshot and the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerDiff {
    pub subject_id: String,
    pub snapshot: SkillSnapshot,
    pub current_total: i64,
    pub expected_total: i64,
    pub delta: i64,
}

/// Ledger rows for a skill that has no snapshot to reconcile against
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanLedger {
    pub subject_id: String,
    pub ledger_total: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    /// Skills with a snapshot
    pub subjects_checked: usize,
    pub diffs: Vec<LedgerDiff>,
    pub orphans: Vec<OrphanLedger>,
    /// Sum of every ledger row for the actor
    pub current_overall: i64,
    /// Sum of every snapshot-derived total
    pub expected_overall: i64,
}

impl DriftReport {
    pub fn is_consistent(&self) -> bool {
        self.diffs.is_empty()
    }

    pub fn total_delta(&self) -> i64 {
        self.expected_overall - self.current_overall
    }
}

pub fn detect_drift(views: &LoadedViews) -> DriftReport {
    let mut report = DriftReport {
        current_overall: views.overall_ledger_total(),
        ..DriftReport::default()
    };

    for subject in views.subjects() {
        let Some(snapshot) = subject.snapshot else {
            if subject.ledger_rows > 0 && subject.ledger_total != 0 {
                report.orphans.push(OrphanLedger {
                    subject_id: subject.subject_id,
                    ledger_total: subject.ledger_total,
                });
            }
            continue;
        };

        report.subjects_checked += 1;
        let expected_total = encode(snapshot) as i64;
        report.expected_overall += expected_total;

        let delta = expected_total - subject.ledger_total;
        if delta != 0 {
            report.diffs.push(LedgerDiff {
                subject_id: subject.subject_id,
                snapshot,
                current_total: subject.ledger_total,
                expected_total,
                delta,
            });
        }
    }

    report
}
