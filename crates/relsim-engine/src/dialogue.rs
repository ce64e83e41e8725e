use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use relsim_providers::{LanguageModel, TextEmbedder};
use relsim_types::{
    AttachmentStyle, BeliefState, BlackSwanEvent, CrisisEpisode, DialogueState, Role, ShadowProfile, TimelineResult, Turn,
};

use crate::collapse::{CollapseDetector, DetectorConfig};
use crate::events::{EventGenerator, EventGeneratorConfig};
use crate::scorer::{LinguisticScorer, ScorerConfig};
use crate::tom::{ToMConfig, ToMTracker};

/// The eight nodes of the per-turn dialogue graph (SPEC_FULL.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogueNode {
    /// Forms the speaker's hidden thought, then produces their utterance.
    GenerateUtterance,
    ScoreConvergence,
    AssessCollapse,
    EvaluateCrisis,
    InjectCrisis,
    AwaitResolution,
    CheckHomeostasis,
    End,
}

/// The routing decision a node hands back; purely descriptive, `route`
/// consumes it alongside node-specific context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Continue,
    CheckCollapse,
    InjectCrisis,
    End,
}

#[derive(Debug, Clone, Copy)]
struct RouteContext {
    turn_number: u32,
    max_turns: u32,
    crisis_active: bool,
    /// `turnNumber == crisisTurn`, the one fixed injection point sampled for
    /// this timeline before it started (SPEC_FULL.md §4.5, §4.6).
    crisis_due: bool,
    risk_critical: bool,
    homeostasis_reached: bool,
    /// Whether the utterance just scored was agent B's — the point at which
    /// `turnNumber` just advanced and a full exchange just closed. Collapse
    /// assessment runs only once per exchange, not once per utterance.
    exchange_just_completed: bool,
}

/// Pure transition function over the dialogue graph. Holds no state itself —
/// every decision is read out of `ctx`, so the conditional routing is
/// testable without a live engine.
fn route(node: DialogueNode, ctx: &RouteContext) -> (DialogueNode, Transition) {
    match node {
        DialogueNode::GenerateUtterance => (DialogueNode::ScoreConvergence, Transition::Continue),
        DialogueNode::ScoreConvergence => {
            if ctx.risk_critical || ctx.turn_number >= ctx.max_turns {
                (DialogueNode::End, Transition::End)
            } else if ctx.exchange_just_completed && ctx.turn_number > 0 && ctx.turn_number % 3 == 0 {
                (DialogueNode::AssessCollapse, Transition::CheckCollapse)
            } else {
                route_past_collapse(ctx)
            }
        }
        DialogueNode::AssessCollapse => {
            if ctx.risk_critical || ctx.turn_number >= ctx.max_turns {
                (DialogueNode::End, Transition::End)
            } else {
                route_past_collapse(ctx)
            }
        }
        DialogueNode::EvaluateCrisis => (DialogueNode::InjectCrisis, Transition::InjectCrisis),
        DialogueNode::InjectCrisis => (DialogueNode::AwaitResolution, Transition::Continue),
        DialogueNode::AwaitResolution => (DialogueNode::CheckHomeostasis, Transition::Continue),
        DialogueNode::CheckHomeostasis => {
            if ctx.homeostasis_reached || ctx.turn_number >= ctx.max_turns {
                (DialogueNode::End, Transition::End)
            } else {
                (DialogueNode::GenerateUtterance, Transition::Continue)
            }
        }
        DialogueNode::End => (DialogueNode::End, Transition::End),
    }
}

fn route_past_collapse(ctx: &RouteContext) -> (DialogueNode, Transition) {
    if !ctx.crisis_active && ctx.crisis_due {
        (DialogueNode::EvaluateCrisis, Transition::InjectCrisis)
    } else {
        (DialogueNode::CheckHomeostasis, Transition::Continue)
    }
}

/// Whether any turn names a shared future ("we", "us", "our", "together",
/// "let's") — homeostasis requires this marker somewhere in the last five
/// spoken turns (SPEC_FULL.md §4.5), same word-matching style as
/// `EventGenerator::identity_statements`.
fn contains_future_orientation_marker(turns: &[String]) -> bool {
    const MARKERS: [&str; 5] = ["we", "us", "our", "together", "let's"];
    turns.iter().any(|t| {
        let lower = t.to_lowercase();
        MARKERS.iter().any(|m| lower.split_whitespace().any(|w| w.trim_matches(|c: char| !c.is_alphanumeric()) == *m))
    })
}

/// Returned by `advance_until_crisis_preview`: either the timeline suspended
/// right before a crisis is committed, or it ran to completion.
#[derive(Debug)]
pub enum StepOutcome {
    Suspended(Box<BlackSwanEvent>),
    Finished(Box<TimelineResult>),
}

/// The host's answer to a suspended crisis preview — how each agent reacts in
/// the turn immediately following injection.
#[derive(Debug, Clone)]
pub struct CrisisDecision {
    pub agent_a_reaction: String,
    pub agent_b_reaction: String,
}

impl CrisisDecision {
    /// A heuristic default reaction keyed on attachment style, used when the
    /// host has no opinion and just wants the timeline to keep moving.
    pub fn auto(profile_a: &ShadowProfile, profile_b: &ShadowProfile) -> Self {
        Self {
            agent_a_reaction: Self::reaction_for(profile_a.attachment_style),
            agent_b_reaction: Self::reaction_for(profile_b.attachment_style),
        }
    }

    fn reaction_for(style: AttachmentStyle) -> String {
        match style {
            AttachmentStyle::Secure => "names the fear directly and asks what the other needs".to_string(),
            AttachmentStyle::Anxious => "seeks immediate reassurance".to_string(),
            AttachmentStyle::Avoidant => "withdraws and minimizes the stakes".to_string(),
            AttachmentStyle::Fearful => "oscillates between reaching out and pulling back".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DialogueEngineConfig {
    pub max_turns: u32,
    /// `crisisTurn`, the single fixed turn a crisis is due on this timeline —
    /// sampled once per timeline by the orchestrator (or SDK builder) from
    /// `RunConfig::crisis_turn_range`, not by the engine itself
    /// (SPEC_FULL.md §4.6).
    pub crisis_turn: u32,
    pub homeostasis_resilience_threshold: f64,
    pub turns_to_judge_resolution: u32,
    /// When set, overrides the event generator's own severity sampling for
    /// this timeline — how `MonteCarloOrchestrator` spreads severity across
    /// an ensemble (SPEC_FULL.md §4.6), distinct from `EventGenerator`'s
    /// internal Pareto sampler used when this is left unset.
    pub forced_severity: Option<f64>,
    pub tom: ToMConfig,
    pub scorer: ScorerConfig,
    pub detector: DetectorConfig,
}

impl Default for DialogueEngineConfig {
    fn default() -> Self {
        Self {
            max_turns: 40,
            crisis_turn: 8,
            homeostasis_resilience_threshold: 0.55,
            turns_to_judge_resolution: 6,
            forced_severity: None,
            tom: ToMConfig::default(),
            scorer: ScorerConfig::default(),
            detector: DetectorConfig::default(),
        }
    }
}

/// Drives one simulated relationship through the dialogue graph. One engine
/// per timeline; never shared across concurrent timelines (SPEC_FULL.md
/// §4.5, §5).
pub struct DialogueEngine {
    node: DialogueNode,
    state: DialogueState,
    profile_a: ShadowProfile,
    profile_b: ShadowProfile,
    scorer: LinguisticScorer,
    tom: ToMTracker,
    detector: CollapseDetector,
    event_gen: EventGenerator,
    config: DialogueEngineConfig,
    seed: u64,
    rng: StdRng,
    pending_event: Option<BlackSwanEvent>,
    crisis_episodes: Vec<CrisisEpisode>,
    pre_crisis_snapshot: Vec<String>,
    last_elasticity: f64,
}

impl DialogueEngine {
    pub fn new(
        pair_id: impl Into<String>,
        profile_a: ShadowProfile,
        profile_b: ShadowProfile,
        config: DialogueEngineConfig,
        seed: u64,
    ) -> relsim_types::Result<Self> {
        let tom = ToMTracker::new(config.tom.clone())?;
        let belief_a = BeliefState::new(profile_a.clone());
        let belief_b = BeliefState::new(profile_b.clone());
        let state = DialogueState::new(pair_id, belief_a, belief_b);
        Ok(Self {
            node: DialogueNode::GenerateUtterance,
            state,
            profile_a,
            profile_b,
            scorer: LinguisticScorer::new(config.scorer.clone()),
            tom,
            detector: CollapseDetector::new(config.detector.clone()),
            event_gen: EventGenerator::new(EventGeneratorConfig::default()),
            config,
            seed,
            rng: StdRng::seed_from_u64(seed),
            pending_event: None,
            crisis_episodes: Vec::new(),
            pre_crisis_snapshot: Vec::new(),
            last_elasticity: 0.0,
        })
    }

    fn active_agent(&self) -> (&ShadowProfile, &ShadowProfile, Role) {
        if self.state.spoken_turns().count() % 2 == 0 {
            (&self.profile_a, &self.profile_b, Role::AgentA)
        } else {
            (&self.profile_b, &self.profile_a, Role::AgentB)
        }
    }

    async fn run_generate_utterance(&mut self, llm: &dyn LanguageModel) {
        let (speaker, listener, role) = self.active_agent();
        let speaker_id = speaker.agent_id.clone();
        let listener_id = listener.agent_id.clone();
        let communication_style = speaker.communication_style.clone();
        let last_from_listener = self.state.last_utterance_by(&listener_id);
        let history = self.state.history.clone();

        let thought = {
            let belief_state = if role == Role::AgentA { &mut self.state.belief_state_a } else { &mut self.state.belief_state_b };
            self.tom.hidden_thought(belief_state, &listener_id, &last_from_listener, &history, llm).await
        };

        let prompt = format!(
            "You are {}, speaking in a {} style. Your private strategy this turn is '{}'. Respond to: \"{}\". Write one or two sentences of dialogue only, no JSON.",
            speaker_id, communication_style, thought.strategy, last_from_listener
        );
        let content = match llm.invoke(&prompt).await {
            Ok(response) => response.content,
            Err(_) => "...".to_string(),
        };

        self.scorer.ingest_turn(&speaker_id, &content);
        self.state.history.push(Turn { role, agent_id: speaker_id, content, timestamp: chrono::Utc::now() });
        // turnNumber counts full A+B exchanges, so only B's utterance advances it.
        if role == Role::AgentB {
            self.state.turn_number += 1;
        }
        self.state.belief_state_a.turn_number = self.state.turn_number;
        self.state.belief_state_b.turn_number = self.state.turn_number;
    }

    async fn run_score_convergence(&mut self, embedder: Option<&dyn TextEmbedder>) {
        let record = self
            .scorer
            .compute_convergence(
                &self.profile_a.agent_id,
                &self.profile_a.linguistic_signature,
                &self.profile_b.agent_id,
                &self.profile_b.linguistic_signature,
                embedder,
            )
            .await;
        self.state.resilience_score = 0.85 * self.state.resilience_score + 0.15 * record.resilience_delta;
        self.state.convergence_log.push(record);
    }

    async fn run_assess_collapse(&mut self, llm: &dyn LanguageModel) {
        let divergence = self
            .state
            .belief_state_a
            .models
            .get(&self.profile_b.agent_id)
            .map(|m| m.divergence)
            .unwrap_or(0.0)
            .max(self.state.belief_state_b.models.get(&self.profile_a.agent_id).map(|m| m.divergence).unwrap_or(0.0));

        let withdrawal_a = self.scorer.detect_withdrawal(&self.profile_a.agent_id);
        let withdrawal_b = self.scorer.detect_withdrawal(&self.profile_b.agent_id);
        let withdrawal_score = match (withdrawal_a, withdrawal_b) {
            (true, true) => 1.0,
            (true, false) | (false, true) => 0.5,
            (false, false) => 0.0,
        };

        let turns: Vec<String> = self.state.history.iter().map(|t| t.content.clone()).collect();

        let assessment = self.detector.assess(self.state.turn_number, divergence, withdrawal_score, &turns, llm).await;
        self.state.collapse_assessments.push(assessment);
    }

    fn route_context(&self) -> RouteContext {
        let risk_critical = self
            .state
            .collapse_assessments
            .last()
            .map(|a| a.risk_level == relsim_types::CollapseRiskLevel::Critical)
            .unwrap_or(false);
        let crisis_due = self.state.turn_number == self.config.crisis_turn && self.state.active_crisis.is_none();
        let exchange_just_completed = self.state.history.last().map(|t| t.role == Role::AgentB).unwrap_or(false);
        RouteContext {
            turn_number: self.state.turn_number,
            max_turns: self.config.max_turns,
            crisis_active: self.state.active_crisis.is_some(),
            crisis_due,
            risk_critical,
            homeostasis_reached: self.state.homeostasis_reached,
            exchange_just_completed,
        }
    }

    async fn run_evaluate_crisis(&mut self, llm: &dyn LanguageModel) -> BlackSwanEvent {
        let event = self
            .event_gen
            .generate_black_swan(
                &self.profile_a,
                &self.profile_b,
                self.config.forced_severity,
                Some(self.state.turn_number as u64 ^ self.rng.gen::<u64>()),
                llm,
            )
            .await;
        self.pre_crisis_snapshot = self.state.history.iter().rev().take(10).map(|t| t.content.clone()).collect();
        self.pending_event = Some(event.clone());
        event
    }

    fn commit_crisis(&mut self, event: BlackSwanEvent, decision: CrisisDecision) {
        self.state.history.push(Turn {
            role: Role::System,
            agent_id: String::new(),
            content: format!("{} {}", event.narrative_description, event.decision_point),
            timestamp: chrono::Utc::now(),
        });
        self.scorer.ingest_turn(&self.profile_a.agent_id, &decision.agent_a_reaction);
        self.scorer.ingest_turn(&self.profile_b.agent_id, &decision.agent_b_reaction);
        self.state.history.push(Turn {
            role: Role::AgentA,
            agent_id: self.profile_a.agent_id.clone(),
            content: decision.agent_a_reaction,
            timestamp: chrono::Utc::now(),
        });
        self.state.history.push(Turn {
            role: Role::AgentB,
            agent_id: self.profile_b.agent_id.clone(),
            content: decision.agent_b_reaction,
            timestamp: chrono::Utc::now(),
        });
        self.state.crisis_injected_at = Some(self.state.turn_number);
        self.state.active_crisis = Some(event.clone());
        self.crisis_episodes.push(CrisisEpisode {
            episode_id: CrisisEpisode::new_id(),
            event,
            pre_crisis_transcript: std::mem::take(&mut self.pre_crisis_snapshot),
            post_crisis_transcript: Vec::new(),
            narrative_elasticity_score: 0.0,
            reached_homeostasis: false,
            turns_to_resolution: None,
            collapse_detected_at_turn: None,
            final_divergence: 0.0,
        });
    }

    /// Homeostasis requires no CRITICAL assessment in the last five, a
    /// stable-or-accelerating convergence trend, a future-orientation marker
    /// in the last five spoken turns, and `turnNumber >= 8` — plus, only
    /// while a crisis is active, the resilience-vs-threshold clause below
    /// (SPEC_FULL.md §4.5).
    async fn run_check_homeostasis(&mut self, embedder: Option<&dyn TextEmbedder>) {
        if self.state.turn_number < 8 {
            return;
        }
        let no_recent_critical = self
            .state
            .collapse_assessments
            .iter()
            .rev()
            .take(5)
            .all(|a| a.risk_level != relsim_types::CollapseRiskLevel::Critical);
        let trend_ok = self
            .state
            .convergence_log
            .last()
            .map(|r| matches!(r.trend, relsim_types::Trend::Stable | relsim_types::Trend::Accelerating))
            .unwrap_or(false);
        let recent_turns: Vec<String> = self.state.spoken_turns().rev().take(5).map(|t| t.content.clone()).collect();
        let future_oriented = contains_future_orientation_marker(&recent_turns);
        let base = no_recent_critical && trend_ok && future_oriented;

        let Some(event) = self.state.active_crisis.clone() else {
            self.state.homeostasis_reached = base;
            return;
        };
        let Some(injected_at) = self.state.crisis_injected_at else { return };
        let turns_since = self.state.turn_number.saturating_sub(injected_at);
        if turns_since < self.config.turns_to_judge_resolution {
            return;
        }
        let post_turns: Vec<String> = self.state.history.iter().rev().take(10).map(|t| t.content.clone()).collect();
        let elastic_ok = if let Some(embedder) = embedder {
            let elasticity = self.event_gen.measure_elasticity(&self.pre_crisis_snapshot, &post_turns, embedder).await;
            self.last_elasticity = elasticity;
            if let Some(episode) = self.crisis_episodes.last_mut() {
                episode.post_crisis_transcript = post_turns;
                episode.narrative_elasticity_score = elasticity;
            }
            elasticity >= event.elasticity_threshold
        } else {
            self.state.resilience_score >= self.config.homeostasis_resilience_threshold
        };

        let reached = base && elastic_ok;
        self.state.homeostasis_reached = reached;
        if reached {
            if let Some(episode) = self.crisis_episodes.last_mut() {
                episode.reached_homeostasis = true;
                episode.turns_to_resolution = Some(turns_since);
            }
        }
    }

    /// Runs the graph until either a crisis is about to be committed
    /// (`Suspended`) or the timeline ends (`Finished`). The host must call
    /// `resume` after a `Suspended` result before calling this again.
    pub async fn advance_until_crisis_preview(&mut self, llm: &dyn LanguageModel, embedder: Option<&dyn TextEmbedder>) -> StepOutcome {
        loop {
            match self.node {
                DialogueNode::GenerateUtterance => self.run_generate_utterance(llm).await,
                DialogueNode::ScoreConvergence => self.run_score_convergence(embedder).await,
                DialogueNode::AssessCollapse => self.run_assess_collapse(llm).await,
                DialogueNode::EvaluateCrisis => {
                    let event = self.run_evaluate_crisis(llm).await;
                    self.node = DialogueNode::InjectCrisis;
                    return StepOutcome::Suspended(Box::new(event));
                }
                DialogueNode::InjectCrisis => unreachable!("resume() must commit the crisis before advancing past it"),
                DialogueNode::AwaitResolution => {}
                DialogueNode::CheckHomeostasis => self.run_check_homeostasis(embedder).await,
                DialogueNode::End => return StepOutcome::Finished(Box::new(self.finalize())),
            }
            let ctx = self.route_context();
            let (next, _transition) = route(self.node, &ctx);
            self.node = next;
        }
    }

    /// Commits the host's reaction to a previously suspended crisis preview
    /// and resumes the graph. Panics if called without a pending suspension.
    pub fn resume(&mut self, decision: CrisisDecision) {
        let event = self.pending_event.take().expect("resume() called with no pending crisis");
        self.commit_crisis(event, decision);
    }

    /// `1 - avgRecentRisk`, bumped by 0.3 times the latest resilience delta
    /// and clamped to [0, 1] (SPEC_FULL.md §4.5) — computed fresh at the end
    /// of the timeline, distinct from `state.resilience_score`'s running EMA.
    fn compute_final_resilience_score(&self) -> f64 {
        let history = &self.state.collapse_assessments;
        let avg_recent_risk = if history.is_empty() {
            0.0
        } else {
            let take = history.len().min(5);
            history[history.len() - take..].iter().map(|a| a.composite).sum::<f64>() / take as f64
        };
        let latest_delta = self.state.convergence_log.last().map(|r| r.resilience_delta).unwrap_or(0.0);
        (1.0 - avg_recent_risk + 0.3 * latest_delta).clamp(0.0, 1.0)
    }

    fn finalize(&self) -> TimelineResult {
        let belief_collapse_events =
            self.state.collapse_assessments.iter().filter(|a| a.risk_level == relsim_types::CollapseRiskLevel::Critical).count() as u32;
        let antifragile = self.state.homeostasis_reached && self.state.collapse_assessments.iter().any(|a| a.post_traumatic_growth);
        let linguistic_convergence_final = self.state.convergence_log.last().map(|r| r.resilience_delta).unwrap_or(0.0);
        let (crisis_severity, crisis_axis) = match &self.state.active_crisis {
            Some(event) => (event.severity, Some(event.target_vulnerability_axis.clone())),
            None => (0.0, None),
        };

        TimelineResult {
            timeline_id: uuid::Uuid::new_v4().to_string(),
            seed: self.seed,
            pair_id: self.state.pair_id.clone(),
            crisis_severity,
            crisis_axis,
            reached_homeostasis: self.state.homeostasis_reached,
            narrative_elasticity: self.last_elasticity,
            final_resilience_score: self.compute_final_resilience_score(),
            antifragile,
            turns_total: self.state.turn_number,
            belief_collapse_events,
            linguistic_convergence_final,
            full_transcript: self.state.history.clone(),
            belief_state_snapshots: vec![self.state.belief_state_a.clone(), self.state.belief_state_b.clone()],
        }
    }

    pub fn crisis_episodes(&self) -> &[CrisisEpisode] {
        &self.crisis_episodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(turn: u32, max: u32) -> RouteContext {
        RouteContext {
            turn_number: turn,
            max_turns: max,
            crisis_active: false,
            crisis_due: false,
            risk_critical: false,
            homeostasis_reached: false,
            exchange_just_completed: true,
        }
    }

    #[test]
    fn route_ends_on_critical_risk_regardless_of_turn() {
        let mut c = ctx(2, 40);
        c.risk_critical = true;
        let (next, transition) = route(DialogueNode::ScoreConvergence, &c);
        assert_eq!(next, DialogueNode::End);
        assert_eq!(transition, Transition::End);
    }

    #[test]
    fn route_loops_back_when_not_done() {
        let c = ctx(5, 40);
        let (next, _) = route(DialogueNode::CheckHomeostasis, &c);
        assert_eq!(next, DialogueNode::GenerateUtterance);
    }

    #[test]
    fn route_injects_crisis_when_due_and_inactive() {
        let mut c = ctx(5, 40);
        c.crisis_due = true;
        let (next, transition) = route(DialogueNode::ScoreConvergence, &c);
        assert_eq!(next, DialogueNode::EvaluateCrisis);
        assert_eq!(transition, Transition::InjectCrisis);
    }

    #[test]
    fn route_never_reinjects_while_crisis_active() {
        let mut c = ctx(5, 40);
        c.crisis_active = true;
        c.crisis_due = true;
        let (next, _) = route(DialogueNode::ScoreConvergence, &c);
        assert_eq!(next, DialogueNode::CheckHomeostasis);
    }

    #[test]
    fn route_checks_collapse_only_every_third_completed_exchange() {
        let c = ctx(3, 40);
        let (next, transition) = route(DialogueNode::ScoreConvergence, &c);
        assert_eq!(next, DialogueNode::AssessCollapse);
        assert_eq!(transition, Transition::CheckCollapse);

        let mut mid_exchange = ctx(3, 40);
        mid_exchange.exchange_just_completed = false;
        let (next, _) = route(DialogueNode::ScoreConvergence, &mid_exchange);
        assert_eq!(next, DialogueNode::CheckHomeostasis);

        let off_cadence = ctx(4, 40);
        let (next, _) = route(DialogueNode::ScoreConvergence, &off_cadence);
        assert_eq!(next, DialogueNode::CheckHomeostasis);

        let turn_zero = ctx(0, 40);
        let (next, _) = route(DialogueNode::ScoreConvergence, &turn_zero);
        assert_eq!(next, DialogueNode::CheckHomeostasis);
    }
}
