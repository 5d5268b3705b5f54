//! Rows read from the store and events written back to it.
//!
//! Field names follow the engine's vocabulary; serde renames map them onto the
//! hosted tables (`skills`, `skill_progress`, `dark_xp_events`, `user_progress`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::codec::SkillSnapshot;

/// Legacy scalar level stored on the skill itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyLevelRow {
    #[serde(rename = "id")]
    pub subject_id: String,
    /// Null in older rows; treated as level 1
    #[serde(rename = "level", default)]
    pub legacy_level: Option<i64>,
}

impl LegacyLevelRow {
    pub fn new(subject_id: &str, legacy_level: i64) -> Self {
        Self {
            subject_id: subject_id.to_string(),
            legacy_level: Some(legacy_level),
        }
    }

    pub fn level(&self) -> i64 {
        self.legacy_level.unwrap_or(1).max(1)
    }
}

/// Snapshot row as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRow {
    #[serde(rename = "skill_id")]
    pub subject_id: String,
    #[serde(default = "default_level")]
    pub level: i64,
    #[serde(default)]
    pub prestige: i64,
}

fn default_level() -> i64 {
    1
}

impl SnapshotRow {
    pub fn new(subject_id: &str, snapshot: SkillSnapshot) -> Self {
        Self {
            subject_id: subject_id.to_string(),
            level: snapshot.level as i64,
            prestige: snapshot.prestige as i64,
        }
    }

    pub fn snapshot(&self) -> SkillSnapshot {
        SkillSnapshot::from_raw(self.level, self.prestige)
    }
}

/// One ledger row, reduced to what the engine sums
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    #[serde(rename = "skill_id")]
    pub subject_id: String,
    pub amount: i64,
}

/// Unit ledger event produced by the backfill step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    #[serde(rename = "user_id")]
    pub actor_id: String,
    #[serde(rename = "skill_id")]
    pub subject_id: String,
    /// Always +1 or -1
    pub amount: i64,
    /// Level implied right after this event is applied
    #[serde(rename = "new_skill_level")]
    pub resulting_level: u32,
    #[serde(rename = "created_at")]
    pub timestamp: DateTime<Utc>,
}

/// Externally maintained per-actor running total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    #[serde(rename = "total_dark_xp")]
    pub total: i64,
    #[serde(rename = "current_level")]
    pub inferred_level: i64,
}

/// Everything the engine knows about one skill
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectState {
    pub subject_id: String,
    pub legacy_level: Option<i64>,
    pub snapshot: Option<SkillSnapshot>,
    pub ledger_total: i64,
    pub ledger_rows: usize,
}

/// The three views loaded for one actor
#[derive(Debug, Clone, Default)]
pub struct LoadedViews {
    pub legacy: Vec<LegacyLevelRow>,
    pub snapshots: Vec<SnapshotRow>,
    pub ledger: Vec<LedgerRow>,
}

impl LoadedViews {
    /// Ledger sum of every row, snapshot or not
    pub fn overall_ledger_total(&self) -> i64 {
        self.ledger.iter().map(|row| row.amount).sum()
    }

    /// Merge the three views into per-subject triples, ordered by subject id
    pub fn subjects(&self) -> Vec<SubjectState> {
        let mut by_id: BTreeMap<&str, SubjectState> = BTreeMap::new();

        let blank = |id: &str| -> SubjectState {
            SubjectState {
                subject_id: id.to_string(),
                legacy_level: None,
                snapshot: None,
                ledger_total: 0,
                ledger_rows: 0,
            }
        };

        for row in &self.legacy {
            by_id
                .entry(row.subject_id.as_str())
                .or_insert_with(|| blank(&row.subject_id))
                .legacy_level = Some(row.level());
        }
        for row in &self.snapshots {
            by_id
                .entry(row.subject_id.as_str())
                .or_insert_with(|| blank(&row.subject_id))
                .snapshot = Some(row.snapshot());
        }
        for row in &self.ledger {
            let state = by_id
                .entry(row.subject_id.as_str())
                .or_insert_with(|| blank(&row.subject_id));
            state.ledger_total += row.amount;
            state.ledger_rows += 1;
        }

        by_id.into_values().collect()
    }
}
