//! Report rendering - ASCII-only terminal output
//!
//! Builds the operator-facing text for a run. Rendering returns a `String` so
//! `main` decides where it goes; colors are optional.

use owo_colors::OwoColorize;
use std::fmt::Write;

use darkxp_common::planner::{LedgerDiff, MismatchEntry, SyncEntry};
use darkxp_common::{AggregateSnapshot, LedgerEvent, SubjectState};

use crate::executor::{Outcome, RunReport};

/// Thin separator between report sections
pub const THIN_SEPARATOR: &str = "----------------------------------------------------------------";

/// Applies colors only when enabled
#[derive(Debug, Clone, Copy)]
pub struct Painter {
    color: bool,
}

impl Painter {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn ok(&self, text: &str) -> String {
        if self.color {
            text.bright_green().to_string()
        } else {
            text.to_string()
        }
    }

    fn warn(&self, text: &str) -> String {
        if self.color {
            text.yellow().to_string()
        } else {
            text.to_string()
        }
    }

    fn error(&self, text: &str) -> String {
        if self.color {
            text.bright_red().to_string()
        } else {
            text.to_string()
        }
    }

    fn dim(&self, text: &str) -> String {
        if self.color {
            text.dimmed().to_string()
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        if self.color {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }
}

/// Fixed-width table with a header row
fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let line = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&line(headers.to_vec()));
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    out.push('\n');
    for row in rows {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
        out.push('\n');
    }
    out
}

pub fn diff_table(diffs: &[LedgerDiff]) -> String {
    let rows: Vec<Vec<String>> = diffs
        .iter()
        .map(|d| {
            vec![
                d.subject_id.clone(),
                d.snapshot.level.to_string(),
                d.snapshot.prestige.to_string(),
                d.current_total.to_string(),
                d.expected_total.to_string(),
                format!("{:+}", d.delta),
            ]
        })
        .collect();
    table(
        &["skill_id", "level", "prestige", "current_total", "expected_total", "delta"],
        &rows,
    )
}

fn sync_table(entries: &[SyncEntry]) -> String {
    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|e| {
            vec![
                e.subject_id.clone(),
                e.legacy_level.to_string(),
                e.current
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "(none)".to_string()),
                e.target.to_string(),
            ]
        })
        .collect();
    table(&["skill_id", "legacy_level", "snapshot", "new_snapshot"], &rows)
}

fn mismatch_lines(entries: &[MismatchEntry]) -> String {
    let mut out = String::new();
    for e in entries {
        let _ = writeln!(
            out,
            "  * {} legacy level {} is behind snapshot {} (snapshot kept)",
            e.subject_id, e.legacy_level, e.snapshot
        );
    }
    out
}

fn subject_table(subjects: &[SubjectState]) -> String {
    let rows: Vec<Vec<String>> = subjects
        .iter()
        .map(|s| {
            vec![
                s.subject_id.clone(),
                s.legacy_level
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                s.snapshot
                    .map(|snap| snap.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                s.snapshot
                    .map(|snap| snap.total().to_string())
                    .unwrap_or_else(|| "-".to_string()),
                s.ledger_total.to_string(),
                s.ledger_rows.to_string(),
            ]
        })
        .collect();
    table(
        &["skill_id", "legacy", "snapshot", "expected", "ledger_total", "ledger_rows"],
        &rows,
    )
}

fn event_lines(events: &[LedgerEvent]) -> String {
    let mut out = String::new();
    for (i, e) in events.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {:>5}. {} {:+} -> level {}",
            i + 1,
            e.subject_id,
            e.amount,
            e.resulting_level
        );
    }
    out
}

fn aggregate_line(label: &str, aggregate: Option<&AggregateSnapshot>) -> String {
    match aggregate {
        Some(a) => format!("user_progress {}: total_dark_xp {}, level {}", label, a.total, a.inferred_level),
        None => format!("user_progress {}: (no row)", label),
    }
}

/// Render a finished run for the terminal
pub fn render(report: &RunReport, verbose: bool, painter: Painter) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{}",
        painter.bold(&format!(
            "Backfilling dark XP for user {}{}",
            report.actor_id,
            if report.dry_run { " (dry run)" } else { "" }
        ))
    );
    out.push('\n');

    if verbose && !report.subjects.is_empty() {
        out.push_str("[SKILLS]\n");
        out.push_str(&subject_table(&report.subjects));
        out.push('\n');
    }

    if !report.alignment.mismatches.is_empty() {
        let _ = writeln!(out, "{}", painter.dim("[NOTE] Legacy levels behind their snapshots:"));
        out.push_str(&painter.dim(&mismatch_lines(&report.alignment.mismatches)));
        out.push('\n');
    }

    if !report.synced.is_empty() {
        let _ = writeln!(
            out,
            "{}",
            painter.ok(&format!(
                "[SYNCED] Rebuilt {} skill_progress snapshot(s) from legacy levels:",
                report.synced.len()
            ))
        );
        out.push_str(&sync_table(&report.synced));
        out.push('\n');
    }

    if !report.drift.orphans.is_empty() {
        let _ = writeln!(out, "{}", painter.warn("[NOTE] Ledger rows for skills without a snapshot (left as is):"));
        for orphan in &report.drift.orphans {
            let _ = writeln!(out, "  * {} ledger total {}", orphan.subject_id, orphan.ledger_total);
        }
        out.push('\n');
    }

    match report.outcome {
        Outcome::NothingToDo => {
            let _ = writeln!(out, "No skill_progress rows found for this user. Nothing to do.");
        }
        Outcome::SyncRequired => {
            let _ = writeln!(
                out,
                "{}",
                painter.warn(&format!(
                    "[WARNING] {} skill_progress snapshot(s) are behind the legacy skill level:",
                    report.alignment.needs_sync.len()
                ))
            );
            out.push_str(&sync_table(&report.alignment.needs_sync));
            out.push('\n');
            let _ = writeln!(
                out,
                "Re-run with --sync-skill-progress to rebuild these snapshots before backfilling. No changes were made."
            );
        }
        Outcome::AlreadyConsistent => {
            let _ = writeln!(out, "{}", painter.ok("Dark XP already matches skill progress. Nothing to do."));
        }
        Outcome::DryRun | Outcome::Applied => {
            out.push_str(&diff_table(&report.drift.diffs));
            out.push('\n');

            let verb = if report.outcome == Outcome::DryRun {
                "Will insert"
            } else {
                "Inserted"
            };
            let _ = writeln!(
                out,
                "{} {} dark_xp_events (total delta: {:+}).",
                verb,
                report.events.len(),
                report.drift.total_delta()
            );

            if verbose {
                out.push('\n');
                out.push_str("[EVENTS]\n");
                out.push_str(&event_lines(&report.events));
            }
        }
    }

    match report.outcome {
        Outcome::DryRun => {
            out.push('\n');
            let _ = writeln!(out, "{}", aggregate_line("now", report.aggregate_before.as_ref()));
            if let Some(before) = report.aggregate_before {
                let _ = writeln!(
                    out,
                    "user_progress projected: total_dark_xp {}",
                    before.total + report.planned_delta()
                );
            }
            out.push('\n');
            let _ = writeln!(out, "{}", painter.ok("Dry run complete. No changes were made."));
        }
        Outcome::Applied => {
            out.push('\n');
            let _ = writeln!(out, "{}", aggregate_line("before", report.aggregate_before.as_ref()));
            let _ = writeln!(out, "{}", aggregate_line("after", report.aggregate_after.as_ref()));
            out.push('\n');
            let _ = writeln!(
                out,
                "{}",
                painter.ok("Insertion complete. dark_xp_events trigger keeps user_progress in step.")
            );
        }
        _ => {}
    }

    let _ = writeln!(out, "{}", painter.dim(THIN_SEPARATOR));
    out
}

/// Render a fatal error (ASCII-only)
pub fn render_error(message: &str, painter: Painter) -> String {
    format!("[ERROR] {}", painter.error(message))
}
