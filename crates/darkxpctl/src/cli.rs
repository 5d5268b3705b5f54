//! CLI - Command-line argument parsing
//!
//! Keeps argument parsing separate from execution. Parsed flags are turned
//! into a [`RunOptions`] that the executor receives explicitly.

use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;

use darkxp_common::ReconcileError;

/// Dark XP ledger reconciler
#[derive(Parser, Debug)]
#[command(name = "darkxpctl")]
#[command(about = "Reconcile dark XP ledger events with skill progress snapshots", long_about = None)]
#[command(version = env!("DARKXP_VERSION"))]
pub struct Cli {
    /// User id that owns the skills to reconcile
    #[arg(value_name = "ACTOR_ID")]
    pub actor_id: Option<String>,

    /// Compute and print the plan without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Print every skill and every planned event
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Rebuild stale skill_progress snapshots from the legacy skill level
    #[arg(long)]
    pub sync_skill_progress: bool,

    /// Emit the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// Config file (defaults to ~/.config/darkxp/config.toml)
    #[arg(long, env = "DARKXP_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Dotenv file with store credentials (defaults to .env.local)
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,
}

/// Settings for one reconciliation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOptions {
    pub actor_id: String,
    pub dry_run: bool,
    pub verbose: bool,
    pub sync_skill_progress: bool,
}

impl RunOptions {
    pub fn new(actor_id: &str) -> Self {
        Self {
            actor_id: actor_id.to_string(),
            dry_run: false,
            verbose: false,
            sync_skill_progress: false,
        }
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn with_sync(mut self) -> Self {
        self.sync_skill_progress = true;
        self
    }

    /// Reject bad arguments before any store is touched
    pub fn validate(&self) -> Result<(), ReconcileError> {
        if self.actor_id.trim().is_empty() {
            return Err(ReconcileError::Usage(
                "missing user id. Usage: darkxpctl <ACTOR_ID> [--dry-run] [--verbose] [--sync-skill-progress]"
                    .to_string(),
            ));
        }
        if self.sync_skill_progress && self.dry_run {
            return Err(ReconcileError::Usage(
                "--sync-skill-progress writes skill_progress and cannot be combined with --dry-run. \
                 Run --dry-run alone to preview, then re-run with --sync-skill-progress to apply. \
                 No changes were made."
                    .to_string(),
            ));
        }
        Ok(())
    }
}

impl TryFrom<&Cli> for RunOptions {
    type Error = ReconcileError;

    fn try_from(cli: &Cli) -> Result<Self, Self::Error> {
        let options = RunOptions {
            actor_id: cli.actor_id.as_deref().unwrap_or_default().trim().to_string(),
            dry_run: cli.dry_run,
            verbose: cli.verbose,
            sync_skill_progress: cli.sync_skill_progress,
        };
        options.validate()?;
        Ok(options)
    }
}
