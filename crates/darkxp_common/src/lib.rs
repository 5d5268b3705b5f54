//! Shared types and logic for dark-XP ledger reconciliation.
//!
//! A skill's progress lives in three places: the legacy `level` on the skill
//! row, the level/prestige snapshot, and the append-only dark-XP ledger. This
//! crate holds the codec between totals and snapshots, the planner that finds
//! disagreements, the generator that turns them into unit ledger events, and
//! the store interfaces the command-line tool drives.

pub mod codec;
pub mod config;
pub mod error;
pub mod generator;
pub mod model;
pub mod planner;
pub mod store;

pub use codec::{decode, encode, SkillSnapshot};
pub use config::{ColorMode, ReconcileConfig, StoreConfig};
pub use error::{ReconcileError, Result};
pub use generator::EventGenerator;
pub use model::{AggregateSnapshot, LedgerEvent, LedgerRow, LegacyLevelRow, LoadedViews, SnapshotRow, SubjectState};
pub use planner::{align, Alignment, AlignmentReport, DriftReport, LedgerDiff};
pub use store::{MemoryStore, PostgrestStore, ReconcileStore};
