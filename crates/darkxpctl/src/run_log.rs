//! Run journal for darkxpctl invocations
//!
//! One JSON line per run, appended to a file chosen by this fallback chain:
//!
//! 1. `$DARKXP_LOG_FILE` (explicit override)
//! 2. `$XDG_STATE_HOME/darkxp/runs.jsonl`
//! 3. `~/.local/state/darkxp/runs.jsonl`

use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use darkxp_common::error::EXIT_GENERAL_ERROR;
use darkxp_common::ReconcileError;

use crate::executor::RunReport;

pub const LOG_FILE_ENV: &str = "DARKXP_LOG_FILE";

/// Journal entry for one run
#[derive(Debug, Serialize, Deserialize)]
pub struct RunLogEntry {
    /// RFC 3339 timestamp
    pub ts: String,

    /// Run ID (UUID)
    pub run_id: String,

    pub actor_id: String,

    pub dry_run: bool,

    pub sync_requested: bool,

    /// Outcome name, absent when the run failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,

    pub events_planned: usize,

    pub events_written: usize,

    pub snapshots_synced: usize,

    pub exit_code: i32,

    pub duration_ms: u64,

    pub ok: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl RunLogEntry {
    /// Entry for a run that finished with a report
    pub fn from_report(run_id: &str, report: &RunReport, exit_code: i32, duration_ms: u64) -> Self {
        Self {
            ts: chrono::Utc::now().to_rfc3339(),
            run_id: run_id.to_string(),
            actor_id: report.actor_id.clone(),
            dry_run: report.dry_run,
            sync_requested: report.sync_requested,
            outcome: Some(report.outcome.as_str().to_string()),
            events_planned: report.events.len(),
            events_written: report.events_written,
            snapshots_synced: report.synced.len(),
            exit_code,
            duration_ms,
            ok: exit_code == 0,
            error: None,
        }
    }

    /// Entry for a run that aborted
    pub fn from_error(
        run_id: &str,
        actor_id: &str,
        dry_run: bool,
        sync_requested: bool,
        err: &ReconcileError,
        duration_ms: u64,
    ) -> Self {
        Self {
            ts: chrono::Utc::now().to_rfc3339(),
            run_id: run_id.to_string(),
            actor_id: actor_id.to_string(),
            dry_run,
            sync_requested,
            outcome: None,
            events_planned: 0,
            events_written: 0,
            snapshots_synced: 0,
            exit_code: err.exit_code(),
            duration_ms,
            ok: false,
            error: Some(ErrorDetails {
                code: err.kind().to_string(),
                message: err.to_string(),
            }),
        }
    }

    /// Entry for a failure outside the reconciler's own error type
    pub fn from_general_error(
        run_id: &str,
        actor_id: &str,
        dry_run: bool,
        sync_requested: bool,
        message: &str,
        duration_ms: u64,
    ) -> Self {
        Self {
            ts: chrono::Utc::now().to_rfc3339(),
            run_id: run_id.to_string(),
            actor_id: actor_id.to_string(),
            dry_run,
            sync_requested,
            outcome: None,
            events_planned: 0,
            events_written: 0,
            snapshots_synced: 0,
            exit_code: EXIT_GENERAL_ERROR,
            duration_ms,
            ok: false,
            error: Some(ErrorDetails {
                code: "general".to_string(),
                message: message.to_string(),
            }),
        }
    }

    /// Resolve the journal path; `lookup` reads environment variables
    pub fn discover_log_path<F>(lookup: F) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(LOG_FILE_ENV).filter(|p| !p.is_empty()) {
            return Some(PathBuf::from(path));
        }

        if let Some(xdg_state) = lookup("XDG_STATE_HOME").filter(|p| !p.is_empty()) {
            return Some(PathBuf::from(xdg_state).join("darkxp").join("runs.jsonl"));
        }

        lookup("HOME")
            .filter(|p| !p.is_empty())
            .map(|home| PathBuf::from(home).join(".local/state/darkxp/runs.jsonl"))
    }

    /// Append to the discovered journal path
    pub fn write(&self) -> std::io::Result<()> {
        match Self::discover_log_path(|name| std::env::var(name).ok()) {
            Some(path) => self.write_to(&path),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no journal path (set DARKXP_LOG_FILE or HOME)",
            )),
        }
    }

    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }

    pub fn generate_run_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_log_path_priority() {
        let path = RunLogEntry::discover_log_path(env(&[
            ("DARKXP_LOG_FILE", "/tmp/explicit.jsonl"),
            ("XDG_STATE_HOME", "/state"),
            ("HOME", "/home/op"),
        ]));
        assert_eq!(path, Some(PathBuf::from("/tmp/explicit.jsonl")));

        let path = RunLogEntry::discover_log_path(env(&[("XDG_STATE_HOME", "/state"), ("HOME", "/home/op")]));
        assert_eq!(path, Some(PathBuf::from("/state/darkxp/runs.jsonl")));

        let path = RunLogEntry::discover_log_path(env(&[("HOME", "/home/op")]));
        assert_eq!(path, Some(PathBuf::from("/home/op/.local/state/darkxp/runs.jsonl")));

        assert_eq!(RunLogEntry::discover_log_path(env(&[])), None);
    }

    #[test]
    fn test_general_error_entry_is_not_tagged_as_config() {
        let entry = RunLogEntry::from_general_error("run-2", "user-1", true, false, "broken pipe", 3);
        assert_eq!(entry.exit_code, EXIT_GENERAL_ERROR);
        let error = entry.error.unwrap();
        assert_eq!(error.code, "general");
        assert_eq!(error.message, "broken pipe");
    }

    #[test]
    fn test_error_entry_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("runs.jsonl");

        let err = ReconcileError::fetch("skills", "connection refused");
        let entry = RunLogEntry::from_error("run-1", "user-1", false, false, &err, 12);
        entry.write_to(&path).unwrap();
        entry.write_to(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: RunLogEntry = serde_json::from_str(lines[0]).unwrap();
        assert!(!parsed.ok);
        assert_eq!(parsed.exit_code, err.exit_code());
        assert!(parsed.outcome.is_none());
        assert_eq!(parsed.error.unwrap().code, err.kind());
    }
}
