use anyhow::{Context, Result};
use is_terminal::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::args::{Cli, Commands};
use crate::handlers;

pub async fn run(cli: Cli) -> Result<()> {
    let filter = if cli.verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().without_time())
        .try_init();

    let run_config = relsim_runtime::RunConfig::load_layered(cli.config.as_deref()).context("loading relsim.toml")?;
    let colorize = std::io::stdout().is_terminal();

    match cli.command {
        Commands::Run { profile_a, profile_b, pair_id, n_simulations, seed, out } => {
            handlers::run::handle(run_config, profile_a, profile_b, pair_id, n_simulations, seed, out, colorize).await
        }
        Commands::Report { input } => handlers::report::handle(input, colorize),
    }
}
