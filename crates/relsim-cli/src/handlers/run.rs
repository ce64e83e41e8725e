use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use relsim_sdk::EnsembleRunBuilder;
use relsim_runtime::RunConfig;
use relsim_types::{AttachmentStyle, ShadowProfile};
use serde::Deserialize;

use super::output::print_report;

/// Mirrors `ShadowProfile`'s field shape so a profile file can be deserialized
/// and then run through the same validation as `ShadowProfile::new`.
#[derive(Deserialize)]
struct RawProfile {
    agent_id: String,
    values: BTreeMap<String, f64>,
    attachment_style: AttachmentStyle,
    fear_architecture: Vec<String>,
    linguistic_signature: Vec<String>,
    entropy_tolerance: f64,
    communication_style: String,
}

fn load_profile(path: &Path) -> Result<ShadowProfile> {
    let contents = std::fs::read_to_string(path).with_context(|| format!("reading profile {}", path.display()))?;
    let raw: RawProfile = serde_json::from_str(&contents).with_context(|| format!("parsing profile {}", path.display()))?;
    ShadowProfile::new(
        raw.agent_id,
        raw.values,
        raw.attachment_style,
        raw.fear_architecture,
        raw.linguistic_signature,
        raw.entropy_tolerance,
        raw.communication_style,
    )
    .map_err(|e| anyhow::anyhow!("invalid profile {}: {}", path.display(), e))
}

#[allow(clippy::too_many_arguments)]
pub async fn handle(
    mut config: RunConfig,
    profile_a_path: PathBuf,
    profile_b_path: PathBuf,
    pair_id: Option<String>,
    n_simulations: Option<usize>,
    seed: Option<u64>,
    out: Option<PathBuf>,
    colorize: bool,
) -> Result<()> {
    let profile_a = load_profile(&profile_a_path)?;
    let profile_b = load_profile(&profile_b_path)?;
    let pair_id = pair_id.unwrap_or_else(|| format!("{}-{}", profile_a.agent_id, profile_b.agent_id));

    if let Some(n) = n_simulations {
        config.n_simulations = n;
    }
    if let Some(seed) = seed {
        config.base_seed = seed;
    }

    let distribution = EnsembleRunBuilder::new(pair_id, profile_a, profile_b).config(config).run().await?;

    if let Some(out) = out {
        let json = serde_json::to_string_pretty(&distribution).context("serializing distribution")?;
        std::fs::write(&out, json).with_context(|| format!("writing {}", out.display()))?;
    }

    print_report(&distribution, colorize);
    Ok(())
}
