use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dialogue::Turn;
use crate::epistemic::BeliefState;

/// Outcome of one completed (or failed-placeholder) dialogue timeline. Field
/// names mirror the bit-stable persisted JSON shape from SPEC_FULL.md §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineResult {
    #[serde(rename = "timelineId")]
    pub timeline_id: String,
    pub seed: u64,
    #[serde(rename = "pairId")]
    pub pair_id: String,
    #[serde(rename = "crisisSeverity")]
    pub crisis_severity: f64,
    #[serde(rename = "crisisAxis")]
    pub crisis_axis: Option<String>,
    #[serde(rename = "reachedHomeostasis")]
    pub reached_homeostasis: bool,
    #[serde(rename = "narrativeElasticity")]
    pub narrative_elasticity: f64,
    #[serde(rename = "finalResilienceScore")]
    pub final_resilience_score: f64,
    pub antifragile: bool,
    #[serde(rename = "turnsTotal")]
    pub turns_total: u32,
    #[serde(rename = "beliefCollapseEvents")]
    pub belief_collapse_events: u32,
    #[serde(rename = "linguisticConvergenceFinal")]
    pub linguistic_convergence_final: f64,
    #[serde(rename = "fullTranscript")]
    pub full_transcript: Vec<Turn>,
    #[serde(rename = "beliefStateSnapshots")]
    pub belief_state_snapshots: Vec<BeliefState>,
}

impl TimelineResult {
    /// A placeholder used when a timeline fails mid-run (SPEC_FULL.md §4.5,
    /// §7) — zero severity, homeostasis never reached, so the ensemble as a
    /// whole never fails on one bad timeline.
    pub fn failed_placeholder(seed: u64, pair_id: impl Into<String>) -> Self {
        Self {
            timeline_id: uuid::Uuid::new_v4().to_string(),
            seed,
            pair_id: pair_id.into(),
            crisis_severity: 0.0,
            crisis_axis: None,
            reached_homeostasis: false,
            narrative_elasticity: 0.0,
            final_resilience_score: 0.0,
            antifragile: false,
            turns_total: 0,
            belief_collapse_events: 0,
            linguistic_convergence_final: 0.0,
            full_transcript: Vec::new(),
            belief_state_snapshots: Vec::new(),
        }
    }
}

/// Run status, surfaced instead of an error on cooperative cancellation
/// (SPEC_FULL.md §5, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Ensemble outcome: a pair id, the simulation count, and every timeline
/// result. Derived rates (homeostasis, antifragility, etc.) are computed
/// lazily by methods here rather than stored, matching the reference
/// implementation's `@computed_field` properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Distribution {
    pub pair_id: String,
    pub n_simulations: usize,
    pub timelines: Vec<TimelineResult>,
    pub status: RunStatus,
}

impl Distribution {
    pub fn homeostasis_rate(&self) -> Option<f64> {
        rate(&self.timelines, |t| t.reached_homeostasis)
    }

    pub fn antifragility_rate(&self) -> Option<f64> {
        rate(&self.timelines, |t| t.antifragile)
    }

    pub fn median_elasticity(&self) -> Option<f64> {
        if self.timelines.is_empty() {
            return None;
        }
        let mut values: Vec<f64> = self.timelines.iter().map(|t| t.narrative_elasticity).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        Some(median_of_sorted(&values))
    }

    /// Share of collapsed timelines (belief_collapse_events > 0) attributable
    /// to each crisis axis; sums to 1.0 within ±0.01 when any timeline
    /// collapsed (universal invariant 7).
    pub fn collapse_attribution(&self) -> BTreeMap<String, f64> {
        let collapsed: Vec<&TimelineResult> = self
            .timelines
            .iter()
            .filter(|t| t.belief_collapse_events > 0)
            .collect();
        if collapsed.is_empty() {
            return BTreeMap::new();
        }
        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        for t in &collapsed {
            let axis = t.crisis_axis.clone().unwrap_or_else(|| "unknown".to_string());
            *counts.entry(axis).or_insert(0) += 1;
        }
        let total = collapsed.len() as f64;
        counts.into_iter().map(|(axis, n)| (axis, n as f64 / total)).collect()
    }

    pub fn primary_collapse_vector(&self) -> Option<String> {
        self.collapse_attribution()
            .into_iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
            .map(|(axis, _)| axis)
    }

    pub fn p20_homeostasis(&self) -> Option<f64> {
        severity_quantile_homeostasis(&self.timelines, 0.20)
    }

    pub fn p80_homeostasis(&self) -> Option<f64> {
        severity_quantile_homeostasis(&self.timelines, 0.80)
    }
}

fn rate(timelines: &[TimelineResult], pred: impl Fn(&TimelineResult) -> bool) -> Option<f64> {
    if timelines.is_empty() {
        return None;
    }
    let hits = timelines.iter().filter(|t| pred(t)).count();
    Some(hits as f64 / timelines.len() as f64)
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Homeostasis rate among timelines whose severity falls in the quantile
/// bucket nearest `quantile` (p20/p80 split by severity, SPEC_FULL.md §3).
fn severity_quantile_homeostasis(timelines: &[TimelineResult], quantile: f64) -> Option<f64> {
    if timelines.is_empty() {
        return None;
    }
    let mut sorted: Vec<&TimelineResult> = timelines.iter().collect();
    sorted.sort_by(|a, b| a.crisis_severity.partial_cmp(&b.crisis_severity).unwrap());
    let idx = ((sorted.len() as f64 - 1.0) * quantile).round() as usize;
    let cutoff = sorted[idx].crisis_severity;
    let bucket: Vec<&&TimelineResult> = if quantile <= 0.5 {
        sorted.iter().filter(|t| t.crisis_severity <= cutoff).collect()
    } else {
        sorted.iter().filter(|t| t.crisis_severity >= cutoff).collect()
    };
    if bucket.is_empty() {
        return None;
    }
    let hits = bucket.iter().filter(|t| t.reached_homeostasis).count();
    Some(hits as f64 / bucket.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p20_at_least_p80_on_monotone_severity_homeostasis() {
        // Lower-severity timelines reach homeostasis more often than high-severity ones.
        let mut timelines = Vec::new();
        for i in 0..10u64 {
            let severity = i as f64 / 10.0;
            let mut t = TimelineResult::failed_placeholder(i, "pair");
            t.crisis_severity = severity;
            t.reached_homeostasis = severity < 0.5;
            timelines.push(t);
        }
        let dist = Distribution { pair_id: "pair".into(), n_simulations: 10, timelines, status: RunStatus::Completed };
        let p20 = dist.p20_homeostasis().unwrap();
        let p80 = dist.p80_homeostasis().unwrap();
        assert!(p20 >= p80, "p20 {} should be >= p80 {}", p20, p80);
    }

    #[test]
    fn collapse_attribution_sums_to_one() {
        let mut timelines = Vec::new();
        for (i, axis) in ["intimacy", "intimacy", "power"].into_iter().enumerate() {
            let mut t = TimelineResult::failed_placeholder(i as u64, "pair");
            t.belief_collapse_events = 1;
            t.crisis_axis = Some(axis.to_string());
            timelines.push(t);
        }
        let dist = Distribution { pair_id: "pair".into(), n_simulations: 3, timelines, status: RunStatus::Completed };
        let total: f64 = dist.collapse_attribution().values().sum();
        assert!((total - 1.0).abs() < 0.01);
    }
}
