//! sweep — run parametrized job sweeps and collect their results.
//!
//! A case is described by a TOML file (`sweep.toml` by default): an
//! ordered list of parameters, a script of commands with capture rules,
//! file maps for staging and collection, and store settings. The `run`
//! subcommand expands the parameter space and drives every instance
//! through staging, execution and collection on a worker pool; `status`
//! and `summary` inspect the result store afterwards.
//!
//! ```bash
//! # Run a case on four workers
//! sweep --config case/sweep.toml run -j 4
//!
//! # Re-run everything from scratch
//! sweep --config case/sweep.toml run --force
//!
//! # Inspect recorded outcomes
//! sweep --config case/sweep.toml status
//! sweep --config case/sweep.toml summary
//! ```

mod cli;
mod commands;
mod config;
mod error;
mod prelude;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};
use crate::prelude::*;

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            jobs,
            force,
            keep_workdirs,
        } => commands::handle_run(&cli.config, jobs, force, keep_workdirs),
        Commands::Status => commands::handle_status(&cli.config),
        Commands::Summary => commands::handle_summary(&cli.config),
    }
}
