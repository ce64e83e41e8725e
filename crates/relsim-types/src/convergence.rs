use serde::{Deserialize, Serialize};

/// Direction of change in linguistic alignment across recent history
/// (SPEC_FULL.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Accelerating,
    Stable,
    Diverging,
}

/// One `ComputeConvergence` result, tagged with the turn it was computed at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceRecord {
    pub turn_number: u32,
    pub a_absorbs_b: f64,
    pub b_absorbs_a: f64,
    pub semantic_alignment: f64,
    pub lexical_divergence: f64,
    pub code_switch_sync: f64,
    pub resilience_delta: f64,
    pub trend: Trend,
    pub top_borrowed: Vec<String>,
    pub alarm: bool,
}
