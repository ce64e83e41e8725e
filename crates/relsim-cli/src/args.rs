use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "relsim")]
#[command(about = "Monte Carlo ensemble simulator for relational dialogue dynamics", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to a relsim.toml config file layered over the built-in defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an ensemble of dialogue timelines for one agent pair and print the
    /// aggregated report.
    Run {
        /// JSON file describing agent A's shadow profile.
        #[arg(long)]
        profile_a: PathBuf,
        /// JSON file describing agent B's shadow profile.
        #[arg(long)]
        profile_b: PathBuf,
        /// Identifier for the pair; defaults to "<agent_a>-<agent_b>".
        #[arg(long)]
        pair_id: Option<String>,
        /// Overrides `n_simulations` from the config file.
        #[arg(long)]
        n_simulations: Option<usize>,
        /// Overrides `base_seed` from the config file.
        #[arg(long)]
        seed: Option<u64>,
        /// Writes the full `Distribution` as JSON to this path.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Re-render a previously saved `Distribution` JSON file without
    /// re-running the ensemble.
    Report {
        #[arg(long)]
        input: PathBuf,
    },
}
