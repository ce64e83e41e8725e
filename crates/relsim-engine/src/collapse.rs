use relsim_core::json::strip_fences_and_parse;
use relsim_providers::LanguageModel;
use relsim_types::{
    Assessment, BeliefState, CocVoc, CollapseRiskLevel, CollapseSignal, CrisisEpisode, EstimatedCocVoc, InterventionType, SHADOW_VALUE_KEYS,
};

#[derive(serde::Deserialize)]
struct LlmScore {
    score: f64,
}

/// Classifies the weighted composite into [`CollapseRiskLevel`] (SPEC_FULL.md
/// §4.4). Distinct thresholds from `tom::classify_tom_risk`.
pub fn classify_collapse_risk(composite: f64) -> CollapseRiskLevel {
    if composite > 0.80 {
        CollapseRiskLevel::Critical
    } else if composite > 0.60 {
        CollapseRiskLevel::High
    } else if composite > 0.40 {
        CollapseRiskLevel::Moderate
    } else if composite > 0.20 {
        CollapseRiskLevel::Low
    } else {
        CollapseRiskLevel::Stable
    }
}

fn suggest_intervention(risk_level: CollapseRiskLevel, primary_driver: CollapseSignal) -> InterventionType {
    match (risk_level, primary_driver) {
        (CollapseRiskLevel::Critical, _) => InterventionType::Reanchor,
        (CollapseRiskLevel::High, CollapseSignal::DefensiveAttribution) => InterventionType::Deescalate,
        (CollapseRiskLevel::High, _) => InterventionType::Reframe,
        (CollapseRiskLevel::Moderate, CollapseSignal::LinguisticWithdrawal) => InterventionType::Validate,
        (CollapseRiskLevel::Moderate, _) => InterventionType::Reframe,
        _ => InterventionType::Validate,
    }
}

/// Mean absolute difference between what `a` believes `b` values (`a`'s L1
/// model of `b`) and what `b` actually values (`b`'s own shadow), averaged
/// with the same comparison in the other direction (SPEC_FULL.md §4.4).
fn epistemic_mismatch(a: &BeliefState, b: &BeliefState) -> f64 {
    let a_on_b = a.models.get(&b.agent_id).map(|model| {
        SHADOW_VALUE_KEYS.iter().map(|key| (model.l1.value(key) - b.shadow.value(key)).abs()).sum::<f64>() / SHADOW_VALUE_KEYS.len() as f64
    });
    let b_on_a = b.models.get(&a.agent_id).map(|model| {
        SHADOW_VALUE_KEYS.iter().map(|key| (model.l1.value(key) - a.shadow.value(key)).abs()).sum::<f64>() / SHADOW_VALUE_KEYS.len() as f64
    });
    match (a_on_b, b_on_a) {
        (Some(x), Some(y)) => (x + y) / 2.0,
        (Some(x), None) | (None, Some(x)) => x,
        (None, None) => 0.0,
    }
}

/// Folds a pair's crisis history into a single exponentially-decayed
/// Cost-of-Coordination / Value-of-Connection estimate (SPEC_FULL.md §4.4).
/// `CoC = 0.40*avgDivergence + 0.35*epistemicMismatch + 0.25*unresolvedLoad`,
/// `avgDivergence` and `unresolvedLoad` drawn from past episodes,
/// `epistemicMismatch` read live off the pair's current belief states.
/// Distinct from [`Assessment::estimated_coc_voc`], which is a cheap
/// per-turn approximation with no memory of past episodes.
pub fn compute_coc_voc(a: &BeliefState, b: &BeliefState, episodes: &[CrisisEpisode]) -> CocVoc {
    const LAMBDA: f64 = 0.1;
    let mismatch = epistemic_mismatch(a, b);
    if episodes.is_empty() {
        return CocVoc { cost_of_coordination: 0.35 * mismatch, value_of_connection: 0.5 };
    }

    let avg_divergence = episodes.iter().map(|e| e.final_divergence).sum::<f64>() / episodes.len() as f64;
    let unresolved_load = episodes.iter().filter(|e| e.is_unresolved()).count() as f64 / episodes.len() as f64;
    let coc = 0.40 * avg_divergence + 0.35 * mismatch + 0.25 * unresolved_load;

    let n = episodes.len();
    let mut voc = 0.0;
    let mut weight_total = 0.0;
    for (i, episode) in episodes.iter().enumerate() {
        let age = (n - 1 - i) as f64;
        let weight = (-LAMBDA * age).exp();
        let value_bonus = if episode.reached_homeostasis { 1.2 } else { 0.6 };
        voc += weight * episode.narrative_elasticity_score * value_bonus;
        weight_total += weight;
    }

    CocVoc { cost_of_coordination: coc.clamp(0.0, 1.0), value_of_connection: (voc / weight_total).clamp(0.0, 1.0) }
}

/// Tunable windows for the collapse detector (SPEC_FULL.md §2a, §4.4).
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Turns of history `score_incoherence` considers when judging narrative
    /// drift. Default 15 (SPEC_FULL.md §4.4).
    pub history_window: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self { history_window: 15 }
    }
}

/// Per-timeline collapse risk detector (SPEC_FULL.md §4.4). Tracks the
/// composite-score history needed to extrapolate `turns_until_collapse` and
/// to flag post-traumatic growth.
#[derive(Debug, Default)]
pub struct CollapseDetector {
    config: DetectorConfig,
    composite_history: Vec<f64>,
}

impl CollapseDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config, composite_history: Vec::new() }
    }

    fn last_n(turns: &[String], n: usize) -> &[String] {
        let start = turns.len().saturating_sub(n);
        &turns[start..]
    }

    async fn score_defensive(&self, recent_5: &[String], llm: &dyn LanguageModel) -> f64 {
        let transcript = recent_5.join(" / ");
        let prompt = format!("Rate defensive attribution over the last 5 turns from 0.0 to 1.0, JSON {{\"score\": float}}: {}", transcript);
        Self::score(&prompt, llm).await
    }

    async fn score_incoherence(&self, window: &[String], llm: &dyn LanguageModel) -> f64 {
        let transcript = window.join(" / ");
        let prompt = format!("Rate narrative incoherence across this exchange from 0.0 to 1.0, JSON {{\"score\": float}}: {}", transcript);
        Self::score(&prompt, llm).await
    }

    async fn score(prompt: &str, llm: &dyn LanguageModel) -> f64 {
        match llm.invoke(prompt).await {
            Ok(response) => strip_fences_and_parse::<LlmScore>(&response.content).map(|s| s.score.clamp(0.0, 1.0)).unwrap_or(0.0),
            Err(_) => 0.0,
        }
    }

    /// Ratio of mean message length (by word count) over the last 5 turns to
    /// the prior 10: `ratio >= 1.0` (replies holding steady or growing) scores
    /// 0.0, `ratio <= 0.2` (replies collapsing to a fifth of their prior
    /// length) scores 1.0, with linear interpolation between
    /// (SPEC_FULL.md §4.4, Open Question b — length-based, not time-based).
    fn response_latency_proxy(turns: &[String]) -> f64 {
        if turns.is_empty() {
            return 1.0;
        }
        let mean_len = |window: &[String]| -> f64 {
            if window.is_empty() {
                return 0.0;
            }
            window.iter().map(|t| t.split_whitespace().count() as f64).sum::<f64>() / window.len() as f64
        };
        let recent = Self::last_n(turns, 5);
        let prior_end = turns.len().saturating_sub(5);
        let prior_start = prior_end.saturating_sub(10);
        let prior = &turns[prior_start..prior_end];

        let recent_mean = mean_len(recent);
        let prior_mean = mean_len(prior);
        if prior_mean <= 0.0 {
            return if recent_mean <= 0.0 { 1.0 } else { 0.0 };
        }
        let ratio = recent_mean / prior_mean;
        if ratio >= 1.0 {
            0.0
        } else if ratio <= 0.2 {
            1.0
        } else {
            ((1.0 - ratio) / 0.8).clamp(0.0, 1.0)
        }
    }

    /// Extrapolates turns to a composite of 1.0 from the mean per-turn delta
    /// across the last five recorded composites (SPEC_FULL.md §4.4). `None`
    /// when there isn't enough history, or when risk isn't trending upward
    /// fast enough (`mean delta <= 0.01`) to extrapolate meaningfully.
    fn turns_until_collapse(&self) -> Option<u32> {
        if self.composite_history.len() < 5 {
            return None;
        }
        let recent = Self::last_n(&self.composite_history, 5);
        let deltas: Vec<f64> = recent.windows(2).map(|w| w[1] - w[0]).collect();
        let mean_delta = deltas.iter().sum::<f64>() / deltas.len() as f64;
        if mean_delta <= 0.01 {
            return None;
        }
        let current = *recent.last().unwrap();
        if current >= 1.0 {
            return Some(0);
        }
        Some(((1.0 - current) / mean_delta).ceil() as u32)
    }

    fn post_traumatic_growth(&self, composite: f64) -> bool {
        if self.composite_history.len() < 5 || composite >= 0.40 {
            return false;
        }
        self.composite_history[..self.composite_history.len() - 1].iter().rev().take(5).any(|c| *c > 0.60)
    }

    /// Runs the full five-signal assessment for one turn and records the
    /// composite for future `turns_until_collapse` extrapolation. `turns` is
    /// the full chronological transcript so far; each signal windows it to
    /// the span the spec calls for.
    pub async fn assess(
        &mut self,
        turn_number: u32,
        epistemic_divergence: f64,
        withdrawal_score: f64,
        turns: &[String],
        llm: &dyn LanguageModel,
    ) -> Assessment {
        let epistemic = (epistemic_divergence / std::f64::consts::LN_2).clamp(0.0, 1.0);
        let withdrawal = withdrawal_score.clamp(0.0, 1.0);
        let defensive = self.score_defensive(Self::last_n(turns, 5), llm).await;
        let incoherence = self.score_incoherence(Self::last_n(turns, self.config.history_window), llm).await;
        let latency_proxy = Self::response_latency_proxy(turns);

        let weighted: [(CollapseSignal, f64); 5] = [
            (CollapseSignal::EpistemicDivergence, epistemic),
            (CollapseSignal::LinguisticWithdrawal, withdrawal),
            (CollapseSignal::DefensiveAttribution, defensive),
            (CollapseSignal::NarrativeIncoherence, incoherence),
            (CollapseSignal::ResponseLatencyProxy, latency_proxy),
        ];
        let composite: f64 = weighted.iter().map(|(signal, value)| signal.weight() * value).sum();
        let primary_driver = weighted
            .iter()
            .max_by(|a, b| (a.0.weight() * a.1).partial_cmp(&(b.0.weight() * b.1)).unwrap())
            .map(|(signal, _)| *signal)
            .unwrap_or(CollapseSignal::EpistemicDivergence);

        let risk_level = classify_collapse_risk(composite);
        let post_traumatic_growth = self.post_traumatic_growth(composite);
        self.composite_history.push(composite);
        let turns_until_collapse = self.turns_until_collapse();
        let intervention_type = suggest_intervention(risk_level, primary_driver);

        let estimated_coc_voc = EstimatedCocVoc {
            estimated_coc: composite * 0.8,
            estimated_voc: ((1.0 - composite) * if post_traumatic_growth { 1.2 } else { 1.0 }).clamp(0.0, 1.0),
        };

        Assessment {
            turn_number,
            epistemic,
            withdrawal,
            defensive,
            incoherence,
            latency_proxy,
            composite,
            risk_level,
            primary_driver,
            turns_until_collapse,
            intervention_type,
            post_traumatic_growth,
            estimated_coc_voc,
        }
    }
}

#[cfg(test)]
mod tests {
    use relsim_types::{AttachmentStyle, ShadowProfile};

    use super::*;

    fn belief_state(agent_id: &str) -> BeliefState {
        let values = SHADOW_VALUE_KEYS.iter().map(|k| (k.to_string(), 0.5)).collect();
        let shadow = ShadowProfile::new(agent_id, values, AttachmentStyle::Secure, vec![], vec![], 0.5, "direct").unwrap();
        BeliefState::new(shadow)
    }

    #[test]
    fn risk_classification_matches_thresholds() {
        assert_eq!(classify_collapse_risk(0.9), CollapseRiskLevel::Critical);
        assert_eq!(classify_collapse_risk(0.7), CollapseRiskLevel::High);
        assert_eq!(classify_collapse_risk(0.5), CollapseRiskLevel::Moderate);
        assert_eq!(classify_collapse_risk(0.3), CollapseRiskLevel::Low);
        assert_eq!(classify_collapse_risk(0.1), CollapseRiskLevel::Stable);
    }

    #[test]
    fn coc_voc_is_zero_with_no_history() {
        let a = belief_state("a");
        let b = belief_state("b");
        let result = compute_coc_voc(&a, &b, &[]);
        assert_eq!(result.cost_of_coordination, 0.0);
        assert_eq!(result.value_of_connection, 0.5);
    }

    #[test]
    fn latency_proxy_flags_shrinking_replies() {
        let mut turns: Vec<String> = (0..10).map(|_| "a reasonably long turn with plenty of words in it".to_string()).collect();
        turns.extend((0..5).map(|_| "short".to_string()));
        assert!(CollapseDetector::response_latency_proxy(&turns) > 0.5);

        let steady: Vec<String> = (0..15).map(|_| "a reasonably long turn with plenty of words in it".to_string()).collect();
        assert_eq!(CollapseDetector::response_latency_proxy(&steady), 0.0);
    }

    #[tokio::test]
    async fn assess_records_history_for_extrapolation() {
        let llm = relsim_providers::MockLanguageModel;
        let mut detector = CollapseDetector::new(DetectorConfig::default());
        for i in 0..3 {
            detector.assess(i, 0.1, 0.0, &[], &llm).await;
        }
        assert_eq!(detector.composite_history.len(), 3);
    }
}
