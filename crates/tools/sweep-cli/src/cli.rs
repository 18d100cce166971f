use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sweep")]
#[command(about = "Run parametrized job sweeps and collect their results")]
pub struct Cli {
    /// Path to the case configuration file
    #[arg(short, long, default_value = "sweep.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run every instance of the case
    Run {
        /// Number of worker threads
        #[arg(short = 'j', long, default_value_t = 1)]
        jobs: usize,

        /// Re-run instances that already completed
        #[arg(long)]
        force: bool,

        /// Keep instance working directories for inspection
        #[arg(long)]
        keep_workdirs: bool,
    },

    /// Show the recorded outcome of each instance
    Status,

    /// Tabulate recorded parameters and captured fields
    Summary,
}
