use relsim_engine::{CrisisDecision, DialogueEngine, DialogueEngineConfig, StepOutcome};
use relsim_providers::{LanguageModel, TextEmbedder};
use relsim_types::{BlackSwanEvent, ShadowProfile, TimelineResult};

/// Interactive two-phase wrapper over `DialogueEngine` for hosts that want
/// to inspect, or override, each crisis decision rather than letting an
/// ensemble run auto-resolve it with [`CrisisDecision::auto`] (SPEC_FULL.md
/// §10).
pub struct Dialogue {
    engine: DialogueEngine,
    finished: Option<TimelineResult>,
}

impl Dialogue {
    pub fn new(
        pair_id: impl Into<String>,
        profile_a: ShadowProfile,
        profile_b: ShadowProfile,
        config: DialogueEngineConfig,
        seed: u64,
    ) -> relsim_types::Result<Self> {
        Ok(Self { engine: DialogueEngine::new(pair_id, profile_a, profile_b, config, seed)?, finished: None })
    }

    /// Advances the dialogue until a crisis is about to be committed or the
    /// timeline ends. `Some` means the host must call `resume` before
    /// calling this again; `None` means the timeline is over and `finish`
    /// will return immediately.
    pub async fn preview_crisis(&mut self, llm: &dyn LanguageModel, embedder: Option<&dyn TextEmbedder>) -> Option<BlackSwanEvent> {
        if self.finished.is_some() {
            return None;
        }
        match self.engine.advance_until_crisis_preview(llm, embedder).await {
            StepOutcome::Suspended(event) => Some(*event),
            StepOutcome::Finished(result) => {
                self.finished = Some(*result);
                None
            }
        }
    }

    /// Commits the host's reaction to the crisis most recently returned by
    /// `preview_crisis`.
    pub fn resume(&mut self, decision: CrisisDecision) {
        self.engine.resume(decision);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }

    /// Runs the dialogue to completion, auto-resolving any remaining crisis
    /// previews with [`CrisisDecision::auto`].
    pub async fn finish(
        &mut self,
        llm: &dyn LanguageModel,
        embedder: Option<&dyn TextEmbedder>,
        profile_a: &ShadowProfile,
        profile_b: &ShadowProfile,
    ) -> TimelineResult {
        if let Some(result) = self.finished.take() {
            return result;
        }
        loop {
            match self.engine.advance_until_crisis_preview(llm, embedder).await {
                StepOutcome::Suspended(_) => self.engine.resume(CrisisDecision::auto(profile_a, profile_b)),
                StepOutcome::Finished(result) => return *result,
            }
        }
    }
}
