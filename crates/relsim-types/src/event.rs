use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Crisis category. `FamilyEmergency` and `HealthCrisis` are never produced by
/// the fixed axis→event-type mapping in SPEC_FULL.md §4.3 — they are carried
/// for forward compatibility with hand-constructed events only (§3a).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTaxonomy {
    FinancialCollapse,
    FamilyEmergency,
    CareerDisruption,
    HealthCrisis,
    Betrayal,
    ExternalThreat,
    ValuesConflict,
    Loss,
}

/// A high-impact stochastic crisis injected into a relational simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlackSwanEvent {
    pub event_id: String,
    pub event_type: EventTaxonomy,
    /// Shadow vector dimension this event targets.
    pub target_vulnerability_axis: String,
    /// Pareto-distributed severity, in [0.0, 1.0].
    pub severity: f64,
    /// LLM-generated crisis scenario.
    pub narrative_description: String,
    /// Immediate choice agents must navigate.
    pub decision_point: String,
    /// Predicted shadow delta per agent id.
    pub expected_collapse_vector: BTreeMap<String, f64>,
    /// Below this score, the pair is in Belief Collapse territory.
    pub elasticity_threshold: f64,
    pub created_at: DateTime<Utc>,
}

impl BlackSwanEvent {
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }
}

/// Full record of a crisis injection and its outcome, the unit
/// `compute_coc_voc` folds over (SPEC_FULL.md §3a, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrisisEpisode {
    pub episode_id: String,
    pub event: BlackSwanEvent,
    pub pre_crisis_transcript: Vec<String>,
    pub post_crisis_transcript: Vec<String>,
    pub narrative_elasticity_score: f64,
    pub reached_homeostasis: bool,
    pub turns_to_resolution: Option<u32>,
    pub collapse_detected_at_turn: Option<u32>,
    pub final_divergence: f64,
}

impl CrisisEpisode {
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn is_unresolved(&self) -> bool {
        self.turns_to_resolution.is_none() && !self.reached_homeostasis
    }
}
