//! Level codec
//!
//! Maps a non-negative "total increment count" onto a (level, prestige) pair
//! and back. Every prestige tier spans 100 levels:
//!
//! - total 0   -> level 1, prestige 0
//! - total 99  -> level 100, prestige 0
//! - total 100 -> level 1, prestige 1
//!
//! `encode(decode(n)) == n` holds for every `n`, and `decode(encode(s)) == s`
//! for every snapshot with `1 <= level <= 100`.

use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, Result};

/// Number of levels in one prestige tier
pub const LEVELS_PER_PRESTIGE: u64 = 100;

/// Highest level inside a tier
pub const MAX_LEVEL: u32 = 100;

/// Level recorded by a forward event that starts at `MAX_LEVEL`
pub const LEVEL_CEILING_MARKER: u32 = 101;

/// Authoritative level/prestige pair for one skill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SkillSnapshot {
    pub level: u32,
    pub prestige: u32,
}

impl SkillSnapshot {
    pub fn new(level: u32, prestige: u32) -> Self {
        Self {
            level: level.max(1),
            prestige,
        }
    }

    /// Build a snapshot from stored values, clamping malformed data to the floor
    /// bounds (level >= 1, prestige >= 0).
    pub fn from_raw(level: i64, prestige: i64) -> Self {
        let level = level.clamp(1, u32::MAX as i64) as u32;
        let prestige = prestige.clamp(0, u32::MAX as i64) as u32;
        Self { level, prestige }
    }

    /// Total increment count this snapshot stands for
    pub fn total(&self) -> u64 {
        encode(*self)
    }
}

impl Default for SkillSnapshot {
    fn default() -> Self {
        Self {
            level: 1,
            prestige: 0,
        }
    }
}

impl std::fmt::Display for SkillSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{} P{}", self.level, self.prestige)
    }
}

/// Total increment count -> snapshot
pub fn decode(total: u64) -> SkillSnapshot {
    SkillSnapshot {
        level: (total % LEVELS_PER_PRESTIGE) as u32 + 1,
        prestige: (total / LEVELS_PER_PRESTIGE) as u32,
    }
}

/// Snapshot -> total increment count
pub fn encode(snapshot: SkillSnapshot) -> u64 {
    let level = snapshot.level.max(1) as u64;
    snapshot.prestige as u64 * LEVELS_PER_PRESTIGE + (level - 1)
}

/// Decode a ledger total, which may be negative in damaged data.
///
/// There is no snapshot for a negative increment count.
pub fn decode_signed(subject_id: &str, total: i64) -> Result<SkillSnapshot> {
    if total < 0 {
        return Err(ReconcileError::NegativeLedger {
            subject_id: subject_id.to_string(),
            total,
        });
    }
    Ok(decode(total as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_tier_boundaries() {
        assert_eq!(decode(0), SkillSnapshot::new(1, 0));
        assert_eq!(decode(99), SkillSnapshot::new(100, 0));
        assert_eq!(decode(100), SkillSnapshot::new(1, 1));
        assert_eq!(decode(250), SkillSnapshot::new(51, 2));
    }

    #[test]
    fn test_encode_matches_formula() {
        assert_eq!(encode(SkillSnapshot::new(5, 0)), 4);
        assert_eq!(encode(SkillSnapshot::new(1, 3)), 300);
        assert_eq!(encode(SkillSnapshot::new(100, 1)), 199);
    }

    #[test]
    fn test_from_raw_clamps_malformed_values() {
        assert_eq!(SkillSnapshot::from_raw(0, -4), SkillSnapshot::new(1, 0));
        assert_eq!(SkillSnapshot::from_raw(-10, 2), SkillSnapshot::new(1, 2));
        assert_eq!(encode(SkillSnapshot::from_raw(-3, -3)), 0);
    }

    #[test]
    fn test_decode_signed_rejects_negative() {
        assert!(decode_signed("skill-a", -1).is_err());
        assert_eq!(decode_signed("skill-a", 4).unwrap(), SkillSnapshot::new(5, 0));
    }

    #[test]
    fn test_roundtrip_first_tiers() {
        for n in 0..1_000u64 {
            assert_eq!(encode(decode(n)), n);
        }
        for prestige in 0..5 {
            for level in 1..=MAX_LEVEL {
                let snap = SkillSnapshot::new(level, prestige);
                assert_eq!(decode(encode(snap)), snap);
            }
        }
    }
}
