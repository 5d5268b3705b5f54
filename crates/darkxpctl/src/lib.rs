//! darkxpctl library - exposes the run pipeline for integration tests

pub mod cli;
pub mod executor;
pub mod report;
pub mod run_log;

pub use cli::{Cli, RunOptions};
pub use executor::{Executor, Outcome, RunReport};
pub use report::{render, render_error, Painter};
pub use run_log::RunLogEntry;
