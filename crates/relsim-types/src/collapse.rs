use serde::{Deserialize, Serialize};

/// Risk scale used by `ToMTracker`, keyed on raw epistemic divergence
/// (SPEC_FULL.md §4.2). Distinct from [`CollapseRiskLevel`], which is keyed on
/// the detector's weighted composite score — the two thresholds are not
/// interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToMRiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

/// Risk scale used by `CollapseDetector::assess`, keyed on the weighted
/// five-signal composite score (SPEC_FULL.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollapseRiskLevel {
    Stable,
    Low,
    Moderate,
    High,
    Critical,
}

/// A tagged variant, not a dynamically dispatched signal source — the five
/// members are fixed and their weights are a static table (SPEC_FULL.md §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollapseSignal {
    EpistemicDivergence,
    LinguisticWithdrawal,
    DefensiveAttribution,
    NarrativeIncoherence,
    ResponseLatencyProxy,
}

impl CollapseSignal {
    pub const ALL: [CollapseSignal; 5] = [
        CollapseSignal::EpistemicDivergence,
        CollapseSignal::LinguisticWithdrawal,
        CollapseSignal::DefensiveAttribution,
        CollapseSignal::NarrativeIncoherence,
        CollapseSignal::ResponseLatencyProxy,
    ];

    /// Fixed weight table; sums to 1.0 exactly (universal invariant 4).
    pub fn weight(self) -> f64 {
        match self {
            CollapseSignal::EpistemicDivergence => 0.30,
            CollapseSignal::LinguisticWithdrawal => 0.20,
            CollapseSignal::DefensiveAttribution => 0.25,
            CollapseSignal::NarrativeIncoherence => 0.15,
            CollapseSignal::ResponseLatencyProxy => 0.10,
        }
    }
}

/// Recommended intervention style, derived from the assessment's primary
/// driver and risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionType {
    Validate,
    Deescalate,
    Reframe,
    Reanchor,
}

/// A lightweight, assessment-local Cost-of-Coordination / Value-of-Connection
/// estimate, distinct from the full historical `compute_coc_voc`
/// (SPEC_FULL.md §4.4).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EstimatedCocVoc {
    pub estimated_coc: f64,
    pub estimated_voc: f64,
}

/// One `CollapseDetector::assess` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub turn_number: u32,
    pub epistemic: f64,
    pub withdrawal: f64,
    pub defensive: f64,
    pub incoherence: f64,
    pub latency_proxy: f64,
    pub composite: f64,
    pub risk_level: CollapseRiskLevel,
    pub primary_driver: CollapseSignal,
    pub turns_until_collapse: Option<u32>,
    pub intervention_type: InterventionType,
    pub post_traumatic_growth: bool,
    pub estimated_coc_voc: EstimatedCocVoc,
}

impl Assessment {
    pub fn signal(&self, signal: CollapseSignal) -> f64 {
        match signal {
            CollapseSignal::EpistemicDivergence => self.epistemic,
            CollapseSignal::LinguisticWithdrawal => self.withdrawal,
            CollapseSignal::DefensiveAttribution => self.defensive,
            CollapseSignal::NarrativeIncoherence => self.incoherence,
            CollapseSignal::ResponseLatencyProxy => self.latency_proxy,
        }
    }
}

/// Full historical Cost-of-Coordination / Value-of-Connection computation,
/// folded over a pair's `CrisisEpisode` history (SPEC_FULL.md §4.4).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CocVoc {
    pub cost_of_coordination: f64,
    pub value_of_connection: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_weights_sum_to_one() {
        let total: f64 = CollapseSignal::ALL.iter().map(|s| s.weight()).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}
