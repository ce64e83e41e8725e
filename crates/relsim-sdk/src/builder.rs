use std::sync::Arc;

use relsim_providers::{LanguageModel, MockLanguageModel, ProgressSink, TextEmbedder, TracingProgressSink};
use relsim_runtime::{new_cancel_token, sample_crisis_turns, CancelToken, MonteCarloOrchestrator, RunConfig};
use relsim_types::{Distribution, ShadowProfile};

use crate::dialogue::Dialogue;

/// Fluent facade over [`MonteCarloOrchestrator`] for hosts that just want a
/// finished [`Distribution`] without wiring up the orchestrator themselves
/// (SPEC_FULL.md §10). Falls back to deterministic local providers
/// (`MockLanguageModel`, `TracingProgressSink`) when a host doesn't supply
/// its own.
pub struct EnsembleRunBuilder {
    pair_id: String,
    profile_a: ShadowProfile,
    profile_b: ShadowProfile,
    config: RunConfig,
    llm: Option<Arc<dyn LanguageModel>>,
    embedder: Option<Arc<dyn TextEmbedder>>,
    progress: Option<Arc<dyn ProgressSink>>,
    cancel: Option<CancelToken>,
}

impl EnsembleRunBuilder {
    pub fn new(pair_id: impl Into<String>, profile_a: ShadowProfile, profile_b: ShadowProfile) -> Self {
        Self {
            pair_id: pair_id.into(),
            profile_a,
            profile_b,
            config: RunConfig::default(),
            llm: None,
            embedder: None,
            progress: None,
            cancel: None,
        }
    }

    pub fn config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    pub fn language_model(mut self, llm: Arc<dyn LanguageModel>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn TextEmbedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn progress_sink(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Runs the full ensemble to completion and returns the aggregated
    /// distribution.
    pub async fn run(self) -> relsim_runtime::Result<Distribution> {
        let llm = self.llm.unwrap_or_else(|| Arc::new(MockLanguageModel::new()) as Arc<dyn LanguageModel>);
        let progress = self.progress.unwrap_or_else(|| Arc::new(TracingProgressSink::default()) as Arc<dyn ProgressSink>);
        let cancel = self.cancel.unwrap_or_else(new_cancel_token);
        MonteCarloOrchestrator::new()
            .run_ensemble(self.pair_id, self.profile_a, self.profile_b, self.config, llm, self.embedder, progress, cancel)
            .await
    }

    /// Builds a single interactive [`Dialogue`] instead of a full ensemble,
    /// for hosts that want per-timeline control over crisis decisions.
    pub fn build_dialogue(self, seed: u64) -> relsim_types::Result<Dialogue> {
        let crisis_turn = sample_crisis_turns(1, seed, self.config.crisis_turn_range)[0];
        let engine_config = self.config.dialogue_engine_config(None, crisis_turn);
        Dialogue::new(self.pair_id, self.profile_a, self.profile_b, engine_config, seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_produces_a_distribution_with_default_providers() {
        let profile_a = relsim_testing::secure_profile("a");
        let profile_b = relsim_testing::anxious_profile("b");
        let config = RunConfig { n_simulations: 2, max_turns: 6, crisis_turn_range: (1, 2), max_concurrency: 2, ..RunConfig::default() };
        let distribution = EnsembleRunBuilder::new("a-b", profile_a, profile_b).config(config).run().await.unwrap();
        assert_eq!(distribution.timelines.len(), 2);
    }

    #[test]
    fn build_dialogue_constructs_without_error() {
        let profile_a = relsim_testing::secure_profile("a");
        let profile_b = relsim_testing::avoidant_profile("b");
        let dialogue = EnsembleRunBuilder::new("a-b", profile_a, profile_b).build_dialogue(7);
        assert!(dialogue.is_ok());
    }
}
