use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::shadow::ShadowProfile;

/// A's beliefs about B's inner world, and beyond.
///
/// `l1` is A's current belief about B's values; `l2` is A's belief about the
/// persona B sees A performing; `l3` is the optional fourth-order projection
/// used only when the tracker's recursion depth is 3 (SPEC_FULL.md §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpistemicModel {
    pub owner_id: String,
    pub target_id: String,
    pub l1: ShadowProfile,
    pub l2: ShadowProfile,
    pub l3: Option<ShadowProfile>,
    pub confidence: f64,
    /// Last computed Jensen-Shannon divergence between `l1.values` and `l2.values`.
    pub divergence: f64,
    pub last_updated: DateTime<Utc>,
    pub update_count: u64,
}

impl EpistemicModel {
    pub fn new(owner_id: impl Into<String>, target_id: impl Into<String>, l1: ShadowProfile, l2: ShadowProfile) -> Result<Self> {
        let owner_id = owner_id.into();
        let target_id = target_id.into();
        if owner_id == target_id {
            return Err(Error::SameAgentIds(owner_id));
        }
        Ok(Self {
            owner_id,
            target_id,
            l1,
            l2,
            l3: None,
            confidence: 0.3,
            divergence: 0.0,
            last_updated: Utc::now(),
            update_count: 0,
        })
    }
}

/// One immutable entry in an agent's hidden-thought log. Never exposed in
/// dialogue text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThoughtRecord {
    pub turn_number: u32,
    pub other_id: String,
    pub inner_monologue: String,
    pub strategy: String,
    pub epistemic_divergence: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Full snapshot of one agent's cognitive state at a moment in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeliefState {
    pub agent_id: String,
    pub shadow: ShadowProfile,
    /// Keyed by target agent id.
    pub models: BTreeMap<String, EpistemicModel>,
    pub thought_log: Vec<ThoughtRecord>,
    pub turn_number: u32,
}

impl BeliefState {
    pub fn new(shadow: ShadowProfile) -> Self {
        Self {
            agent_id: shadow.agent_id.clone(),
            shadow,
            models: BTreeMap::new(),
            thought_log: Vec::new(),
            turn_number: 0,
        }
    }

    /// Validates the invariant that every model's owner/key match this state
    /// (SPEC_FULL.md §3).
    pub fn validate(&self) -> Result<()> {
        if self.shadow.agent_id != self.agent_id {
            return Err(Error::InconsistentBeliefState(format!(
                "shadow.agent_id ({}) must match agent_id ({})",
                self.shadow.agent_id, self.agent_id
            )));
        }
        for (target_id, model) in &self.models {
            if &model.owner_id != &self.agent_id {
                return Err(Error::InconsistentBeliefState(format!(
                    "models['{}'].owner_id ({}) must match agent_id ({})",
                    target_id, model.owner_id, self.agent_id
                )));
            }
            if &model.target_id != target_id {
                return Err(Error::InconsistentBeliefState(format!(
                    "models key '{}' does not match model.target_id ({})",
                    target_id, model.target_id
                )));
            }
        }
        Ok(())
    }
}
