//! Backfill event generation
//!
//! Expands a (current, expected) ledger total pair for one skill into unit
//! events. Each event records the level it produces, so the ledger doubles as
//! an audit trail of every step.

use chrono::{DateTime, Utc};

use crate::codec::{decode_signed, LEVEL_CEILING_MARKER, MAX_LEVEL};
use crate::error::{ReconcileError, Result};
use crate::model::LedgerEvent;
use crate::planner::LedgerDiff;

/// Upper bound on events for one skill in one run (10,000 prestige tiers)
pub const MAX_EVENTS_PER_SKILL: u64 = 1_000_000;

/// Builds unit ledger events for one actor
#[derive(Debug, Clone)]
pub struct EventGenerator {
    actor_id: String,
    timestamp: DateTime<Utc>,
}

impl EventGenerator {
    /// All events built by one generator share `timestamp`
    pub fn new(actor_id: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            actor_id: actor_id.to_string(),
            timestamp,
        }
    }

    /// Events that move `subject_id` from `current_total` to `expected_total`.
    ///
    /// Fails without returning any event when a step would need a negative
    /// total, or when the gap exceeds [`MAX_EVENTS_PER_SKILL`].
    pub fn build_events(
        &self,
        subject_id: &str,
        current_total: i64,
        expected_total: i64,
    ) -> Result<Vec<LedgerEvent>> {
        let delta = expected_total - current_total;
        if delta == 0 {
            return Ok(Vec::new());
        }

        if delta.unsigned_abs() > MAX_EVENTS_PER_SKILL {
            return Err(ReconcileError::ImplausibleDelta {
                subject_id: subject_id.to_string(),
                delta,
                limit: MAX_EVENTS_PER_SKILL,
            });
        }

        let mut events = Vec::new();
        let mut running = current_total;

        if delta > 0 {
            for _ in 0..delta {
                let snapshot = decode_signed(subject_id, running)?;
                // Level 100 records 101 instead of rolling into the next prestige tier.
                let resulting_level = if snapshot.level == MAX_LEVEL {
                    LEVEL_CEILING_MARKER
                } else {
                    snapshot.level + 1
                };
                events.push(self.event(subject_id, 1, resulting_level));
                running += 1;
            }
        } else {
            for _ in 0..delta.unsigned_abs() {
                let next = running - 1;
                if next < 0 {
                    return Err(ReconcileError::NegativeLedger {
                        subject_id: subject_id.to_string(),
                        total: next,
                    });
                }
                let snapshot = decode_signed(subject_id, next)?;
                events.push(self.event(subject_id, -1, snapshot.level));
                running = next;
            }
        }

        Ok(events)
    }

    /// Events for every diff, concatenated in diff order. Any failure aborts
    /// the whole batch.
    pub fn build_all(&self, diffs: &[LedgerDiff]) -> Result<Vec<LedgerEvent>> {
        let mut events = Vec::new();
        for diff in diffs {
            events.extend(self.build_events(
                &diff.subject_id,
                diff.current_total,
                diff.expected_total,
            )?);
        }
        Ok(events)
    }

    fn event(&self, subject_id: &str, amount: i64, resulting_level: u32) -> LedgerEvent {
        LedgerEvent {
            actor_id: self.actor_id.clone(),
            subject_id: subject_id.to_string(),
            amount,
            resulting_level,
            timestamp: self.timestamp,
        }
    }
}
