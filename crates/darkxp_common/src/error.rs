//! Error types for the reconciliation engine.

use thiserror::Error;

/// Exit code for success (including "nothing to do")
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code for errors without a more specific mapping
pub const EXIT_GENERAL_ERROR: i32 = 1;

/// Exit code for bad arguments or flag combinations
pub const EXIT_USAGE: i32 = 64;

/// Exit code when stored data cannot be reconciled (negative ledger, absurd delta)
pub const EXIT_NEGATIVE_LEDGER: i32 = 65;

/// Exit code when a store read fails
pub const EXIT_STORE_UNAVAILABLE: i32 = 69;

/// Exit code when a store write fails
pub const EXIT_STORE_WRITE: i32 = 70;

/// Exit code for missing or invalid configuration
pub const EXIT_CONFIG: i32 = 78;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to fetch {source_name}: {message}")]
    StoreFetch {
        source_name: &'static str,
        message: String,
    },

    #[error("Failed to write {target}: {message}")]
    StoreWrite {
        target: &'static str,
        message: String,
    },

    #[error("Attempting to roll back below zero dark XP for skill {subject_id} (total {total})")]
    NegativeLedger { subject_id: String, total: i64 },

    #[error("Refusing to write {delta} dark XP events for skill {subject_id} (limit {limit}); check its skill_progress row")]
    ImplausibleDelta {
        subject_id: String,
        delta: i64,
        limit: u64,
    },
}

impl ReconcileError {
    pub fn fetch(source_name: &'static str, message: impl Into<String>) -> Self {
        ReconcileError::StoreFetch {
            source_name,
            message: message.into(),
        }
    }

    pub fn write(target: &'static str, message: impl Into<String>) -> Self {
        ReconcileError::StoreWrite {
            target,
            message: message.into(),
        }
    }

    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            ReconcileError::Usage(_) => EXIT_USAGE,
            ReconcileError::Config(_) => EXIT_CONFIG,
            ReconcileError::StoreFetch { .. } => EXIT_STORE_UNAVAILABLE,
            ReconcileError::StoreWrite { .. } => EXIT_STORE_WRITE,
            ReconcileError::NegativeLedger { .. } | ReconcileError::ImplausibleDelta { .. } => {
                EXIT_NEGATIVE_LEDGER
            }
        }
    }

    /// Short machine-readable tag, used by the run journal
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileError::Usage(_) => "usage",
            ReconcileError::Config(_) => "config",
            ReconcileError::StoreFetch { .. } => "store_fetch",
            ReconcileError::StoreWrite { .. } => "store_write",
            ReconcileError::NegativeLedger { .. } => "negative_ledger",
            ReconcileError::ImplausibleDelta { .. } => "implausible_delta",
        }
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            ReconcileError::Usage("x".to_string()),
            ReconcileError::Config("x".to_string()),
            ReconcileError::fetch("skills", "down"),
            ReconcileError::write("dark_xp_events", "down"),
            ReconcileError::NegativeLedger {
                subject_id: "s".to_string(),
                total: -1,
            },
        ];
        let mut codes: Vec<i32> = errors.iter().map(|e| e.exit_code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
        assert!(!codes.contains(&EXIT_SUCCESS));
    }

    #[test]
    fn test_implausible_delta_is_a_data_error() {
        let err = ReconcileError::ImplausibleDelta {
            subject_id: "s".to_string(),
            delta: 5_000_000,
            limit: 1_000_000,
        };
        assert_eq!(err.exit_code(), EXIT_NEGATIVE_LEDGER);
        assert_eq!(err.kind(), "implausible_delta");
    }

    #[test]
    fn test_fetch_error_carries_cause() {
        let err = ReconcileError::fetch("skill_progress", "HTTP 503");
        assert_eq!(err.to_string(), "Failed to fetch skill_progress: HTTP 503");
        assert_eq!(err.kind(), "store_fetch");
    }
}
