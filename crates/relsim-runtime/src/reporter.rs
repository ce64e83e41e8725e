use relsim_core::math::ci95_mean;
use relsim_core::math::ci95_proportion;
use relsim_types::{Distribution, TimelineResult};

/// 9-step shading ramp used for the severity/homeostasis sparkline
/// (SPEC_FULL.md §4.7). Index is `round(rate * (ramp.len() - 1))`; plain
/// text only, no ANSI — colorizing the output is the CLI's job.
const SPARKLINE_RAMP: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Renders a [`Distribution`] into a human-readable text report
/// (SPEC_FULL.md §4.7, §10). Produces plain text — any ANSI styling is
/// layered on by `relsim-cli`, never here.
#[derive(Debug, Default)]
pub struct Reporter;

impl Reporter {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, distribution: &Distribution) -> String {
        let mut report = format!(
            "Ensemble report for pair '{}' ({} simulations, status {:?})\n",
            distribution.pair_id, distribution.n_simulations, distribution.status
        );
        report.push_str(&Self::render_summary(distribution));
        report.push_str(&Self::render_quartiles(distribution));
        report.push_str(&Self::render_survival_curve(distribution));
        report.push_str(&Self::render_risk_scenarios(distribution));
        report.push_str(&Self::render_recommendation(distribution));
        report
    }

    fn render_summary(distribution: &Distribution) -> String {
        let mut out = String::new();
        match distribution.homeostasis_rate() {
            Some(rate) => {
                let (lo, hi) = ci95_proportion(rate, distribution.n_simulations);
                out.push_str(&format!("  Homeostasis rate: {:.1}% (95% CI {:.1}%-{:.1}%)\n", rate * 100.0, lo * 100.0, hi * 100.0));
            }
            None => out.push_str("  Homeostasis rate: n/a (empty ensemble)\n"),
        }
        if let Some(rate) = distribution.antifragility_rate() {
            out.push_str(&format!("  Antifragility rate: {:.1}%\n", rate * 100.0));
        }
        if let Some(elasticity) = distribution.median_elasticity() {
            out.push_str(&format!("  Median narrative elasticity: {:.3}\n", elasticity));
        }
        out
    }

    fn render_quartiles(distribution: &Distribution) -> String {
        let mut resilience: Vec<f64> = distribution.timelines.iter().map(|t| t.final_resilience_score).collect();
        if resilience.is_empty() {
            return String::new();
        }
        resilience.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let quantile = |p: f64| -> f64 {
            let idx = ((resilience.len() as f64 - 1.0) * p).round() as usize;
            resilience[idx]
        };
        let (lo, hi) = ci95_mean(&resilience);
        format!(
            "  Final resilience score quartiles: p25={:.3} p50={:.3} p75={:.3} (mean 95% CI {:.3}-{:.3})\n",
            quantile(0.25),
            quantile(0.50),
            quantile(0.75),
            lo,
            hi
        )
    }

    fn render_survival_curve(distribution: &Distribution) -> String {
        if distribution.timelines.is_empty() {
            return String::new();
        }
        const BUCKETS: usize = 10;
        let mut sorted: Vec<&TimelineResult> = distribution.timelines.iter().collect();
        sorted.sort_by(|a, b| a.crisis_severity.partial_cmp(&b.crisis_severity).unwrap());
        let chunk_size = sorted.len().div_ceil(BUCKETS).max(1);
        let sparkline: String = sorted
            .chunks(chunk_size)
            .map(|bucket| {
                let hits = bucket.iter().filter(|t| t.reached_homeostasis).count();
                Self::ramp_char(hits as f64 / bucket.len() as f64)
            })
            .collect();
        format!("  Homeostasis survival curve (low to high severity): {}\n", sparkline)
    }

    fn ramp_char(rate: f64) -> char {
        let idx = (rate.clamp(0.0, 1.0) * (SPARKLINE_RAMP.len() - 1) as f64).round() as usize;
        SPARKLINE_RAMP[idx]
    }

    fn render_risk_scenarios(distribution: &Distribution) -> String {
        let attribution = distribution.collapse_attribution();
        if attribution.is_empty() {
            return "  No belief collapses observed across the ensemble.\n".to_string();
        }
        let mut out = String::from("  Collapse attribution by crisis axis:\n");
        for (axis, share) in &attribution {
            out.push_str(&format!("    {:<14} {:.1}%\n", axis, share * 100.0));
        }
        out
    }

    fn render_recommendation(distribution: &Distribution) -> String {
        let Some(rate) = distribution.homeostasis_rate() else { return String::new() };
        let recommendation = if rate >= 0.7 {
            "This pairing tolerates the injected crisis well; no intervention indicated."
        } else if rate >= 0.4 {
            "Moderate risk: rehearsing de-escalation strategies before the primary vulnerability axis is stressed is worthwhile."
        } else {
            "High risk: this pairing is unlikely to reach homeostasis under the modeled crisis without active intervention."
        };
        format!("  Recommendation: {}\n", recommendation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relsim_types::RunStatus;

    #[test]
    fn empty_ensemble_renders_without_panicking() {
        let distribution = Distribution { pair_id: "p".into(), n_simulations: 0, timelines: vec![], status: RunStatus::Completed };
        let report = Reporter::new().render(&distribution);
        assert!(report.contains("n/a"));
    }

    #[test]
    fn report_includes_homeostasis_rate() {
        let mut t = TimelineResult::failed_placeholder(1, "p");
        t.reached_homeostasis = true;
        let distribution = Distribution { pair_id: "p".into(), n_simulations: 1, timelines: vec![t], status: RunStatus::Completed };
        let report = Reporter::new().render(&distribution);
        assert!(report.contains("100.0%"));
    }
}
