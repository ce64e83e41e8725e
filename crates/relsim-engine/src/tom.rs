use std::collections::BTreeMap;

use chrono::Utc;
use relsim_core::json::strip_fences_and_parse;
use relsim_core::math::{clamp01, jensen_shannon_divergence};
use relsim_providers::LanguageModel;
use relsim_types::{
    AttachmentStyle, BeliefState, EpistemicModel, Error, Result, ShadowProfile, ThoughtRecord, ToMRiskLevel, Turn,
    SHADOW_VALUE_KEYS,
};

const DELTA_CLAMP: f64 = 0.3;
const HISTORY_WINDOW: usize = 20;
const STRATEGIES: [&str; 6] = ["validate", "disclose", "probe", "deflect", "reanchor", "mirror"];

#[derive(Debug, Clone)]
pub struct ToMConfig {
    /// 2 (L1/L2 only) or 3 (adds the L3 fourth-order projection).
    pub recursion_depth: u8,
    /// Weight applied to the inferred delta in the Bayesian update.
    pub update_confidence: f64,
    /// Divergence above which risk is classified HIGH rather than MODERATE.
    pub collapse_threshold: f64,
}

impl Default for ToMConfig {
    fn default() -> Self {
        Self { recursion_depth: 2, update_confidence: 0.7, collapse_threshold: 0.65 }
    }
}

/// Maintains one agent's recursive epistemic state about another
/// (SPEC_FULL.md §4.2). Stateless itself — operates on the caller's
/// `BeliefState`, matching every other per-timeline component in this
/// workspace.
#[derive(Debug)]
pub struct ToMTracker {
    config: ToMConfig,
}

impl ToMTracker {
    pub fn new(config: ToMConfig) -> Result<Self> {
        if config.recursion_depth != 2 && config.recursion_depth != 3 {
            return Err(Error::InvalidRecursionDepth(config.recursion_depth));
        }
        Ok(Self { config })
    }

    fn neutral_profile(agent_id: &str) -> ShadowProfile {
        let values: BTreeMap<String, f64> = SHADOW_VALUE_KEYS.iter().map(|k| (k.to_string(), 0.5)).collect();
        ShadowProfile::new(agent_id, values, AttachmentStyle::Secure, Vec::new(), Vec::new(), 0.5, "direct")
            .expect("neutral profile is always valid")
    }

    fn neutral_delta() -> BTreeMap<String, f64> {
        SHADOW_VALUE_KEYS.iter().map(|k| (k.to_string(), 0.0)).collect()
    }

    fn get_or_init<'a>(&self, state: &'a mut BeliefState, other_id: &str) -> &'a mut EpistemicModel {
        if !state.models.contains_key(other_id) {
            let model = EpistemicModel::new(
                state.agent_id.clone(),
                other_id.to_string(),
                Self::neutral_profile(other_id),
                Self::neutral_profile(&state.agent_id),
            )
            .expect("owner and target differ by construction");
            state.models.insert(other_id.to_string(), model);
        }
        state.models.get_mut(other_id).unwrap()
    }

    async fn infer_delta(&self, last_utterance: &str, llm: &dyn LanguageModel) -> BTreeMap<String, f64> {
        if last_utterance.is_empty() {
            return Self::neutral_delta();
        }
        let prompt = format!(
            "Infer the per-dimension value delta implied by this utterance. Return JSON with keys {:?}, each in [-0.3, 0.3].\n\nUtterance: {}",
            SHADOW_VALUE_KEYS, last_utterance
        );
        match llm.invoke(&prompt).await {
            Ok(response) => {
                let parsed: Option<serde_json::Value> = strip_fences_and_parse(&response.content);
                match parsed {
                    Some(value) => SHADOW_VALUE_KEYS
                        .iter()
                        .map(|k| (k.to_string(), value.get(*k).and_then(|v| v.as_f64()).unwrap_or(0.0).clamp(-DELTA_CLAMP, DELTA_CLAMP)))
                        .collect(),
                    None => Self::neutral_delta(),
                }
            }
            Err(_) => Self::neutral_delta(),
        }
    }

    async fn project(&self, owner_style: &str, history: &[Turn], llm: &dyn LanguageModel, prompt_label: &str) -> BTreeMap<String, f64> {
        let recent: Vec<String> = history
            .iter()
            .rev()
            .take(HISTORY_WINDOW)
            .map(|t| format!("{:?}: {}", t.role, t.content))
            .collect();
        let prompt = format!(
            "Given this {} communication style and recent history, project what values the other agent likely infers (l2 persona). Return JSON with keys {:?}, each in [0, 1].\n\nHistory:\n{}",
            prompt_label,
            SHADOW_VALUE_KEYS,
            recent.join("\n")
        );
        let _ = owner_style;
        match llm.invoke(&prompt).await {
            Ok(response) => {
                let parsed: Option<serde_json::Value> = strip_fences_and_parse(&response.content);
                match parsed {
                    Some(value) => SHADOW_VALUE_KEYS
                        .iter()
                        .map(|k| (k.to_string(), clamp01(value.get(*k).and_then(|v| v.as_f64()).unwrap_or(0.5))))
                        .collect(),
                    None => SHADOW_VALUE_KEYS.iter().map(|k| (k.to_string(), 0.5)).collect(),
                }
            }
            Err(_) => SHADOW_VALUE_KEYS.iter().map(|k| (k.to_string(), 0.5)).collect(),
        }
    }

    async fn verbalize(&self, other_id: &str, divergence: f64, llm: &dyn LanguageModel) -> (String, String) {
        let prompt = format!(
            "Write a one-sentence inner monologue about {} and a strategy recommendation. Current epistemic divergence: {:.3}. Return JSON {{\"inner_monologue\": str, \"strategy\": one of {:?}}}",
            other_id, divergence, STRATEGIES
        );
        match llm.invoke(&prompt).await {
            Ok(response) => {
                #[derive(serde::Deserialize)]
                struct Verbalized {
                    inner_monologue: String,
                    strategy: String,
                }
                match strip_fences_and_parse::<Verbalized>(&response.content) {
                    Some(v) if STRATEGIES.contains(&v.strategy.as_str()) => (v.inner_monologue, v.strategy),
                    _ => ("...".to_string(), "validate".to_string()),
                }
            }
            Err(_) => ("...".to_string(), "validate".to_string()),
        }
    }

    fn rebuild_with_values(profile: &ShadowProfile, values: BTreeMap<String, f64>) -> ShadowProfile {
        ShadowProfile::new(
            profile.agent_id.clone(),
            values,
            profile.attachment_style,
            profile.fear_architecture.clone(),
            profile.linguistic_signature.clone(),
            profile.entropy_tolerance,
            profile.communication_style.clone(),
        )
        .expect("rebuilt profile reuses a valid key set")
    }

    /// Must be called before the owning agent speaks (SPEC_FULL.md §4.2).
    pub async fn hidden_thought(
        &self,
        state: &mut BeliefState,
        other_id: &str,
        last_utterance: &str,
        history: &[Turn],
        llm: &dyn LanguageModel,
    ) -> ThoughtRecord {
        let owner_style = state.shadow.communication_style.clone();
        let delta = self.infer_delta(last_utterance, llm).await;

        let model = self.get_or_init(state, other_id);
        let confidence = self.config.update_confidence;
        let posterior: BTreeMap<String, f64> = model
            .l1
            .values
            .iter()
            .map(|(k, prior)| (k.clone(), clamp01(prior + confidence * delta.get(k).copied().unwrap_or(0.0))))
            .collect();
        model.l1 = Self::rebuild_with_values(&model.l1, posterior);

        let l2_values = self.project(&owner_style, history, llm, "l1").await;
        let model = self.get_or_init(state, other_id);
        model.l2 = Self::rebuild_with_values(&model.l2, l2_values);

        if self.config.recursion_depth >= 3 {
            let l3_values = self.project(&owner_style, history, llm, "l2").await;
            let model = self.get_or_init(state, other_id);
            let base = model.l3.clone().unwrap_or_else(|| model.l2.clone());
            model.l3 = Some(Self::rebuild_with_values(&base, l3_values));
        }

        let model = self.get_or_init(state, other_id);
        let divergence = jensen_shannon_divergence(&model.l1.values, &model.l2.values);
        model.divergence = divergence;
        model.confidence = (0.98 * model.confidence + 0.03 * (1.0 - divergence.min(1.0))).min(1.0);
        model.update_count += 1;
        model.last_updated = Utc::now();

        let (inner_monologue, strategy) = self.verbalize(other_id, divergence, llm).await;

        let record = ThoughtRecord {
            turn_number: state.turn_number,
            other_id: other_id.to_string(),
            inner_monologue,
            strategy,
            epistemic_divergence: divergence,
            recorded_at: Utc::now(),
        };
        state.thought_log.push(record.clone());
        record
    }

    pub fn belief_state(&self, state: &BeliefState) -> BeliefState {
        state.clone()
    }

    pub fn epistemic_gap_report(&self, state: &BeliefState, other_id: &str) -> Option<EpistemicGapReport> {
        let model = state.models.get(other_id)?;
        let l0_l1: BTreeMap<String, f64> = SHADOW_VALUE_KEYS
            .iter()
            .map(|k| (k.to_string(), (state.shadow.value(k) - model.l1.value(k)).abs()))
            .collect();
        let l1_l2: BTreeMap<String, f64> = SHADOW_VALUE_KEYS
            .iter()
            .map(|k| (k.to_string(), (model.l1.value(k) - model.l2.value(k)).abs()))
            .collect();
        let l0_l2: BTreeMap<String, f64> = SHADOW_VALUE_KEYS
            .iter()
            .map(|k| (k.to_string(), (state.shadow.value(k) - model.l2.value(k)).abs()))
            .collect();
        Some(EpistemicGapReport { l0_l1_gap: l0_l1, l1_l2_gap: l1_l2, l0_l2_gap: l0_l2, current_divergence: model.divergence })
    }
}

/// Per-dimension belief gaps and the current divergence reading, used for
/// human-readable debugging and the CLI report (SPEC_FULL.md §4.2).
#[derive(Debug, Clone)]
pub struct EpistemicGapReport {
    pub l0_l1_gap: BTreeMap<String, f64>,
    pub l1_l2_gap: BTreeMap<String, f64>,
    pub l0_l2_gap: BTreeMap<String, f64>,
    pub current_divergence: f64,
}

/// Risk classification on the raw-divergence scale (SPEC_FULL.md §4.2),
/// distinct from `CollapseDetector`'s composite-score scale.
pub fn classify_tom_risk(divergence: f64, collapse_threshold: f64) -> ToMRiskLevel {
    if divergence > 0.80 {
        ToMRiskLevel::Critical
    } else if divergence > collapse_threshold {
        ToMRiskLevel::High
    } else if divergence > 0.40 {
        ToMRiskLevel::Moderate
    } else {
        ToMRiskLevel::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relsim_providers::MockLanguageModel;
    use relsim_types::ShadowProfile;

    fn neutral_profile(id: &str) -> ShadowProfile {
        let values: BTreeMap<String, f64> = SHADOW_VALUE_KEYS.iter().map(|k| (k.to_string(), 0.5)).collect();
        ShadowProfile::new(id, values, AttachmentStyle::Secure, vec!["abandonment".into()], vec![], 0.5, "direct").unwrap()
    }

    #[test]
    fn rejects_invalid_recursion_depth() {
        let err = ToMTracker::new(ToMConfig { recursion_depth: 5, ..Default::default() }).unwrap_err();
        assert!(matches!(err, Error::InvalidRecursionDepth(5)));
    }

    #[tokio::test]
    async fn hidden_thought_initializes_neutral_model() {
        let tracker = ToMTracker::new(ToMConfig::default()).unwrap();
        let mut state = BeliefState::new(neutral_profile("a"));
        let llm = MockLanguageModel::new();
        let record = tracker.hidden_thought(&mut state, "b", "", &[], &llm).await;
        assert_eq!(record.other_id, "b");
        assert!(state.models.contains_key("b"));
        assert!(record.epistemic_divergence >= 0.0);
    }

    #[test]
    fn risk_classification_is_monotone() {
        let low = classify_tom_risk(0.1, 0.65);
        let moderate = classify_tom_risk(0.5, 0.65);
        let high = classify_tom_risk(0.7, 0.65);
        let critical = classify_tom_risk(0.9, 0.65);
        assert!(low < moderate && moderate < high && high < critical);
    }
}
