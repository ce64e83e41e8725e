use std::path::Path;

use relsim_engine::{DetectorConfig, DialogueEngineConfig, ScorerConfig, ToMConfig};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Ensemble-level tunables, loaded from `relsim.toml` and overridden by CLI
/// flags (SPEC_FULL.md §2a, §10). Every field has a default so a bare
/// `RunConfig::default()` runs a sane ensemble out of the box.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub n_simulations: usize,
    pub max_concurrency: usize,
    pub base_seed: u64,
    pub max_turns: u32,
    /// `crisisTurn=uniformInt(crisisRange)` is sampled once per timeline from
    /// this range (SPEC_FULL.md §4.6, §4.7 external interface).
    pub crisis_turn_range: (u32, u32),
    /// Severities (forced or stratified) are clamped to this range before
    /// reaching the engine (SPEC_FULL.md §4.6, §4.7 external interface).
    pub severity_range: (f64, f64),
    pub homeostasis_resilience_threshold: f64,
    pub turns_to_judge_resolution: u32,
    pub recursion_depth: u8,
    pub update_confidence: f64,
    pub collapse_threshold: f64,
    pub convergence_window: usize,
    pub min_phrase_freq: u32,
    pub withdrawal_window: usize,
    /// Turns of history the collapse detector's incoherence scorer considers
    /// (SPEC_FULL.md §2a, §4.4).
    pub history_window: usize,
    /// Spreads forced crisis severities evenly across an ensemble instead of
    /// leaving every timeline to the event generator's own sampler
    /// (SPEC_FULL.md §4.6).
    pub stratify_severity: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            n_simulations: 200,
            max_concurrency: 16,
            base_seed: 0,
            max_turns: 40,
            crisis_turn_range: (4, 20),
            severity_range: (0.05, 0.98),
            homeostasis_resilience_threshold: 0.55,
            turns_to_judge_resolution: 6,
            recursion_depth: 2,
            update_confidence: 0.7,
            collapse_threshold: 0.65,
            convergence_window: 20,
            min_phrase_freq: 2,
            withdrawal_window: 10,
            history_window: 15,
            stratify_severity: true,
        }
    }
}

impl RunConfig {
    /// Reads a `relsim.toml`-shaped file and layers it over the defaults.
    /// Missing fields fall back to `Default`; a missing file is not an
    /// error — callers get the defaults.
    pub fn load_layered(path: Option<&Path>) -> anyhow::Result<RunConfig> {
        let Some(path) = path else { return Ok(RunConfig::default()) };
        if !path.exists() {
            return Ok(RunConfig::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: RunConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_simulations == 0 {
            return Err(Error::EmptyEnsemble);
        }
        if self.max_concurrency == 0 {
            return Err(Error::InvalidConfig("max_concurrency must be >= 1".to_string()));
        }
        if self.recursion_depth != 2 && self.recursion_depth != 3 {
            return Err(Error::InvalidConfig(format!("recursion_depth must be 2 or 3, got {}", self.recursion_depth)));
        }
        if self.crisis_turn_range.0 > self.crisis_turn_range.1 {
            return Err(Error::InvalidConfig("crisis_turn_range must have lo <= hi".to_string()));
        }
        if self.severity_range.0 > self.severity_range.1 {
            return Err(Error::InvalidConfig("severity_range must have lo <= hi".to_string()));
        }
        Ok(())
    }

    /// Builds the per-timeline engine config. `crisis_turn` is sampled by the
    /// caller (the orchestrator or SDK builder), one fixed value per timeline,
    /// via [`crate::orchestrator::sample_crisis_turns`] — the engine itself
    /// never samples it (SPEC_FULL.md §4.6).
    pub fn dialogue_engine_config(&self, forced_severity: Option<f64>, crisis_turn: u32) -> DialogueEngineConfig {
        DialogueEngineConfig {
            max_turns: self.max_turns,
            crisis_turn,
            homeostasis_resilience_threshold: self.homeostasis_resilience_threshold,
            turns_to_judge_resolution: self.turns_to_judge_resolution,
            forced_severity,
            tom: ToMConfig { recursion_depth: self.recursion_depth, update_confidence: self.update_confidence, collapse_threshold: self.collapse_threshold },
            scorer: ScorerConfig { window: self.convergence_window, min_phrase_freq: self.min_phrase_freq, withdrawal_window: self.withdrawal_window },
            detector: DetectorConfig { history_window: self.history_window },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        RunConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_empty_ensemble() {
        let config = RunConfig { n_simulations: 0, ..RunConfig::default() };
        assert!(matches!(config.validate(), Err(Error::EmptyEnsemble)));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = RunConfig::load_layered(Some(Path::new("/nonexistent/relsim.toml"))).unwrap();
        assert_eq!(config.n_simulations, RunConfig::default().n_simulations);
    }
}
