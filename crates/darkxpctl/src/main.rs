//! darkxpctl - dark XP ledger reconciler
//!
//! Reconciles one user's dark_xp_events ledger against their skill_progress
//! snapshots, optionally rebuilding stale snapshots from legacy skill levels.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use darkxp_common::error::{EXIT_GENERAL_ERROR, EXIT_SUCCESS};
use darkxp_common::{ColorMode, PostgrestStore, ReconcileConfig, ReconcileError};
use darkxpctl::{render, render_error, Cli, Executor, Painter, RunLogEntry, RunOptions, RunReport};

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn use_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal(),
    }
}

fn run(cli: &Cli, options: &RunOptions, color: &mut bool) -> Result<RunReport> {
    let config = ReconcileConfig::resolve(cli.config.as_deref(), cli.env_file.as_deref())
        .context("Loading configuration")?;
    *color = use_color(config.report.color);

    let store = PostgrestStore::new(&config.store).context("Connecting to the store")?;
    let report = Executor::new(&store, options).run()?;
    Ok(report)
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<ReconcileError>()
        .map(ReconcileError::exit_code)
        .unwrap_or(EXIT_GENERAL_ERROR)
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let started = Instant::now();
    let run_id = RunLogEntry::generate_run_id();
    let mut color = use_color(ColorMode::Auto);

    let result = RunOptions::try_from(&cli)
        .map_err(anyhow::Error::from)
        .and_then(|options| run(&cli, &options, &mut color));
    let duration_ms = started.elapsed().as_millis() as u64;

    let (exit_code, entry) = match result {
        Ok(report) => {
            if cli.json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        let message = format!("Failed to encode report: {}", e);
                        eprintln!("{}", render_error(&message, Painter::new(color)));
                    }
                }
            } else {
                print!("{}", render(&report, cli.verbose, Painter::new(color)));
            }
            let entry = RunLogEntry::from_report(&run_id, &report, EXIT_SUCCESS, duration_ms);
            (EXIT_SUCCESS, entry)
        }
        Err(err) => {
            eprintln!("{}", render_error(&format!("{:#}", err), Painter::new(color)));
            if cli.verbose {
                eprintln!("{:?}", err);
            }

            let actor_id = cli.actor_id.as_deref().unwrap_or_default();
            let entry = match err.downcast_ref::<ReconcileError>() {
                Some(reconcile_err) => RunLogEntry::from_error(
                    &run_id,
                    actor_id,
                    cli.dry_run,
                    cli.sync_skill_progress,
                    reconcile_err,
                    duration_ms,
                ),
                None => RunLogEntry::from_general_error(
                    &run_id,
                    actor_id,
                    cli.dry_run,
                    cli.sync_skill_progress,
                    &format!("{:#}", err),
                    duration_ms,
                ),
            };
            (exit_code_for(&err), entry)
        }
    };

    if let Err(e) = entry.write() {
        tracing::warn!("Could not append to run journal: {}", e);
    }

    std::process::exit(exit_code);
}
