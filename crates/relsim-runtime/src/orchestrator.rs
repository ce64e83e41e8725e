use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution as RandDistribution, Pareto};
use relsim_engine::{CrisisDecision, DialogueEngine, DialogueEngineConfig, StepOutcome};
use relsim_providers::{progress_channel, LanguageModel, ProgressPayload, ProgressSink, ProgressStatus, TextEmbedder};
use relsim_types::{Distribution, RunStatus, ShadowProfile, TimelineResult};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::RunConfig;
use crate::error::Result;

/// Cooperative cancellation flag shared across an ensemble run. Checked
/// between timelines, never mid-timeline — a running timeline always
/// finishes (SPEC_FULL.md §5, §7).
pub type CancelToken = Arc<AtomicBool>;

pub fn new_cancel_token() -> CancelToken {
    Arc::new(AtomicBool::new(false))
}

/// Samples one fixed `crisisTurn` per timeline from `range` (inclusive),
/// independent of the per-timeline `base_seed + i` used for dialogue RNG so
/// reseeding the ensemble doesn't also reshuffle crisis timing
/// (SPEC_FULL.md §4.6).
pub fn sample_crisis_turns(n: usize, base_seed: u64, range: (u32, u32)) -> Vec<u32> {
    let mut rng = StdRng::seed_from_u64(base_seed ^ 0xC515_0000_0000_0001);
    let (lo, hi) = range;
    (0..n).map(|_| rng.gen_range(lo..=lo.max(hi))).collect()
}

/// Drives an ensemble of independent timelines to completion with bounded
/// concurrency (SPEC_FULL.md §4.6, §5). Crisis previews are auto-resolved
/// with [`CrisisDecision::auto`] — interactive host control over crisis
/// decisions lives one layer up, in `relsim-sdk`.
#[derive(Default)]
pub struct MonteCarloOrchestrator;

impl MonteCarloOrchestrator {
    pub fn new() -> Self {
        Self
    }

    /// Samples severities from the spec's Pareto(1.5) curve — same shape
    /// `EventGenerator::sample_severity` uses — clamped to `severity_range`
    /// and sorted so the ensemble spans it evenly (needed for
    /// `Distribution::p20_homeostasis`/`p80_homeostasis`).
    fn stratified_severities(n: usize, base_seed: u64, severity_range: (f64, f64)) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(base_seed ^ 0x5EED_0000_0000_0001);
        let pareto = Pareto::new(1.0, 1.5).expect("valid pareto params");
        let (lo, hi) = severity_range;
        let mut severities: Vec<f64> = (0..n).map(|_| ((pareto.sample(&mut rng) - 1.0) / 4.0).clamp(lo, hi)).collect();
        severities.sort_by(|a, b| a.partial_cmp(b).unwrap());
        severities
    }

    pub async fn run_ensemble(
        &self,
        pair_id: impl Into<String>,
        profile_a: ShadowProfile,
        profile_b: ShadowProfile,
        config: RunConfig,
        llm: Arc<dyn LanguageModel>,
        embedder: Option<Arc<dyn TextEmbedder>>,
        progress: Arc<dyn ProgressSink>,
        cancel: CancelToken,
    ) -> Result<Distribution> {
        config.validate()?;
        let pair_id = pair_id.into();

        let severities: Vec<Option<f64>> = if config.stratify_severity {
            Self::stratified_severities(config.n_simulations, config.base_seed, config.severity_range).into_iter().map(Some).collect()
        } else {
            vec![None; config.n_simulations]
        };
        let crisis_turns = sample_crisis_turns(config.n_simulations, config.base_seed, config.crisis_turn_range);

        let semaphore = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        let completed = Arc::new(AtomicUsize::new(0));
        let total = config.n_simulations;
        let mut tasks: JoinSet<TimelineResult> = JoinSet::new();

        for (i, severity) in severities.into_iter().enumerate() {
            if cancel.load(Ordering::SeqCst) {
                break;
            }
            let seed = config.base_seed.wrapping_add(i as u64);
            let engine_config = config.dialogue_engine_config(severity, crisis_turns[i]);
            let profile_a = profile_a.clone();
            let profile_b = profile_b.clone();
            let pair_id_clone = pair_id.clone();
            let llm = Arc::clone(&llm);
            let embedder = embedder.clone();
            let semaphore = Arc::clone(&semaphore);
            let progress = Arc::clone(&progress);
            let completed = Arc::clone(&completed);
            let cancel = Arc::clone(&cancel);

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore is never closed");
                if cancel.load(Ordering::SeqCst) {
                    return TimelineResult::failed_placeholder(seed, pair_id_clone);
                }
                let result = run_one_timeline(pair_id_clone.clone(), profile_a, profile_b, engine_config, seed, llm.as_ref(), embedder.as_deref()).await;
                let n = completed.fetch_add(1, Ordering::SeqCst) + 1;
                progress
                    .publish(&progress_channel(&pair_id_clone), &ProgressPayload { pair_id: pair_id_clone, completed: n, total, status: ProgressStatus::Running })
                    .await;
                result
            });
        }

        let mut timelines = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => timelines.push(result),
                Err(_join_error) => timelines.push(TimelineResult::failed_placeholder(0, pair_id.clone())),
            }
        }

        let status = if cancel.load(Ordering::SeqCst) && timelines.len() < total { RunStatus::Cancelled } else { RunStatus::Completed };
        progress
            .publish(&progress_channel(&pair_id), &ProgressPayload { pair_id: pair_id.clone(), completed: timelines.len(), total, status: ProgressStatus::Completed })
            .await;

        Ok(Distribution { pair_id, n_simulations: total, timelines, status })
    }
}

/// One isolated timeline: a construction failure or panic here never takes
/// down the ensemble — it degrades to a zero-severity placeholder instead
/// (SPEC_FULL.md §7).
async fn run_one_timeline(
    pair_id: String,
    profile_a: ShadowProfile,
    profile_b: ShadowProfile,
    engine_config: DialogueEngineConfig,
    seed: u64,
    llm: &dyn LanguageModel,
    embedder: Option<&dyn TextEmbedder>,
) -> TimelineResult {
    let mut engine = match DialogueEngine::new(pair_id.clone(), profile_a.clone(), profile_b.clone(), engine_config, seed) {
        Ok(engine) => engine,
        Err(_) => return TimelineResult::failed_placeholder(seed, pair_id),
    };
    loop {
        match engine.advance_until_crisis_preview(llm, embedder).await {
            StepOutcome::Suspended(_event) => {
                engine.resume(CrisisDecision::auto(&profile_a, &profile_b));
            }
            StepOutcome::Finished(result) => return *result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stratified_severities_span_the_range_and_are_sorted() {
        let severities = MonteCarloOrchestrator::stratified_severities(50, 7, (0.05, 0.98));
        assert_eq!(severities.len(), 50);
        for w in severities.windows(2) {
            assert!(w[0] <= w[1]);
        }
        assert!(severities.iter().all(|s| (0.05..=0.98).contains(s)));
    }

    #[test]
    fn sample_crisis_turns_stays_within_range() {
        let turns = sample_crisis_turns(50, 7, (4, 20));
        assert_eq!(turns.len(), 50);
        assert!(turns.iter().all(|t| (4..=20).contains(t)));
    }

    #[tokio::test]
    async fn run_ensemble_produces_one_timeline_per_simulation() {
        let orchestrator = MonteCarloOrchestrator::new();
        let profile_a = relsim_testing::secure_profile("a");
        let profile_b = relsim_testing::secure_profile("b");
        let config = RunConfig { n_simulations: 3, max_turns: 6, crisis_turn_range: (1, 2), max_concurrency: 2, ..RunConfig::default() };
        let llm = Arc::new(relsim_providers::MockLanguageModel::new());
        let progress = Arc::new(relsim_providers::TracingProgressSink::default());
        let cancel = new_cancel_token();
        let distribution = orchestrator.run_ensemble("a-b", profile_a, profile_b, config, llm, None, progress, cancel).await.unwrap();
        assert_eq!(distribution.timelines.len(), 3);
    }
}
