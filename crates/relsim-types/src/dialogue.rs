use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collapse::Assessment;
use crate::convergence::ConvergenceRecord;
use crate::epistemic::BeliefState;
use crate::event::BlackSwanEvent;

/// Who spoke a given turn. `System` marks synthetic crisis-injection turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    AgentA,
    AgentB,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    /// The speaking agent's id when `role` is `AgentA`/`AgentB`; empty for `System`.
    pub agent_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Per-timeline working memory threaded through every `DialogueEngine` node
/// (SPEC_FULL.md §3, §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueState {
    pub pair_id: String,
    pub turn_number: u32,
    pub history: Vec<Turn>,
    pub belief_state_a: BeliefState,
    pub belief_state_b: BeliefState,
    pub active_crisis: Option<BlackSwanEvent>,
    pub crisis_injected_at: Option<u32>,
    pub collapse_assessments: Vec<Assessment>,
    pub convergence_log: Vec<ConvergenceRecord>,
    pub homeostasis_reached: bool,
    pub resilience_score: f64,
}

impl DialogueState {
    pub fn new(pair_id: impl Into<String>, belief_state_a: BeliefState, belief_state_b: BeliefState) -> Self {
        Self {
            pair_id: pair_id.into(),
            turn_number: 0,
            history: Vec::new(),
            belief_state_a,
            belief_state_b,
            active_crisis: None,
            crisis_injected_at: None,
            collapse_assessments: Vec::new(),
            convergence_log: Vec::new(),
            homeostasis_reached: false,
            resilience_score: 0.0,
        }
    }

    /// Most recent utterance by `agent_id`, or empty string before any turn.
    pub fn last_utterance_by(&self, agent_id: &str) -> String {
        self.history
            .iter()
            .rev()
            .find(|t| t.agent_id == agent_id)
            .map(|t| t.content.clone())
            .unwrap_or_default()
    }

    /// Non-system turns only, oldest first.
    pub fn spoken_turns(&self) -> impl Iterator<Item = &Turn> {
        self.history.iter().filter(|t| t.role != Role::System)
    }
}
