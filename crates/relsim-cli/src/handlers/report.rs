use std::path::PathBuf;

use anyhow::{Context, Result};
use relsim_types::Distribution;

use super::output::print_report;

pub fn handle(input: PathBuf, colorize: bool) -> Result<()> {
    let contents = std::fs::read_to_string(&input).with_context(|| format!("reading {}", input.display()))?;
    let distribution: Distribution = serde_json::from_str(&contents).with_context(|| format!("parsing {}", input.display()))?;
    print_report(&distribution, colorize);
    Ok(())
}
