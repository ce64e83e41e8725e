use std::collections::BTreeMap;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Beta, Distribution as RandDistribution, Pareto};
use relsim_core::json::strip_fences_and_parse;
use relsim_core::math::cosine_similarity;
use relsim_providers::{LanguageModel, TextEmbedder};
use relsim_types::{BlackSwanEvent, EventTaxonomy, ShadowProfile};

/// Fixed fear→axis table (SPEC_FULL.md §4.3).
fn fear_axis(fear: &str) -> Option<&'static str> {
    Some(match fear {
        "abandonment" => "belonging",
        "failure" => "achievement",
        "engulfment" => "autonomy",
        "rejection" => "intimacy",
        "loss" => "security",
        "inadequacy" => "achievement",
        "betrayal" => "intimacy",
        "instability" => "stability",
        "powerlessness" => "power",
        "isolation" => "belonging",
        "irrelevance" => "power",
        "vulnerability" => "security",
        _ => return None,
    })
}

/// Fixed axis→event-type table (SPEC_FULL.md §4.3). `family_emergency` and
/// `health_crisis` are unreachable through this mapping (SPEC_FULL.md §3a).
fn axis_to_event_type(axis: &str) -> EventTaxonomy {
    match axis {
        "security" | "stability" => EventTaxonomy::FinancialCollapse,
        "intimacy" => EventTaxonomy::Betrayal,
        "belonging" => EventTaxonomy::Loss,
        "autonomy" | "achievement" => EventTaxonomy::CareerDisruption,
        "novelty" => EventTaxonomy::ValuesConflict,
        "power" => EventTaxonomy::ExternalThreat,
        _ => EventTaxonomy::ValuesConflict,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeveritySampler {
    Pareto,
    Uniform,
    Beta,
}

impl Default for SeveritySampler {
    fn default() -> Self {
        SeveritySampler::Pareto
    }
}

/// Result of `identify_vulnerability`: the returned `score` is not a
/// probability and can exceed 1.0 once amplifiers stack (SPEC_FULL.md §9,
/// Open Question c) — callers must not renormalize it.
#[derive(Debug, Clone)]
pub struct Vulnerability {
    pub axis: String,
    pub score: f64,
    pub explanation: String,
}

#[derive(Debug, Clone, Default)]
pub struct EventGeneratorConfig {
    pub severity_sampler: SeveritySamplerOrDefault,
}

#[derive(Debug, Clone, Copy)]
pub struct SeveritySamplerOrDefault(pub SeveritySampler);

impl Default for SeveritySamplerOrDefault {
    fn default() -> Self {
        SeveritySamplerOrDefault(SeveritySampler::Pareto)
    }
}

/// Stochastic crisis ("Black Swan") generator (SPEC_FULL.md §4.3). Instantiated
/// fresh per timeline; holds no mutable cross-call state beyond its config.
#[derive(Debug, Default)]
pub struct EventGenerator {
    config: EventGeneratorConfig,
}

impl EventGenerator {
    pub fn new(config: EventGeneratorConfig) -> Self {
        Self { config }
    }

    pub fn identify_vulnerability(&self, a: &ShadowProfile, b: &ShadowProfile) -> Vulnerability {
        let mut joint: BTreeMap<String, f64> = relsim_types::SHADOW_VALUE_KEYS
            .iter()
            .map(|k| (k.to_string(), a.value(k) * b.value(k)))
            .collect();

        let shared_fears: Vec<&String> = a.fear_architecture.iter().filter(|f| b.fear_architecture.contains(f)).collect();
        for fear in &shared_fears {
            if let Some(axis) = fear_axis(fear) {
                *joint.entry(axis.to_string()).or_insert(0.0) *= 1.4;
            }
        }

        use relsim_types::AttachmentStyle::*;
        match (a.attachment_style, b.attachment_style) {
            (Anxious, Anxious) => {
                for axis in ["intimacy", "belonging"] {
                    *joint.entry(axis.to_string()).or_insert(0.0) *= 1.3;
                }
            }
            (Avoidant, Avoidant) => {
                *joint.entry("autonomy".to_string()).or_insert(0.0) *= 1.3;
            }
            (Anxious, Avoidant) | (Avoidant, Anxious) => {
                *joint.entry("intimacy".to_string()).or_insert(0.0) *= 1.6;
            }
            _ => {}
        }

        let (axis, score) = joint
            .into_iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
            .unwrap_or(("belonging".to_string(), 0.0));

        let explanation = if let Some(fear) = shared_fears.first() {
            format!("shared fear of {} amplifies the {} axis", fear, axis)
        } else {
            format!("attachment dynamics amplify the {} axis", axis)
        };

        Vulnerability { axis, score, explanation }
    }

    fn sample_severity(&self, seed: Option<u64>, vulnerability_score: f64) -> f64 {
        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let raw = match self.config.severity_sampler.0 {
            SeveritySampler::Pareto => {
                let pareto = Pareto::new(1.0, 1.5).expect("valid pareto params");
                (pareto.sample(&mut rng) - 1.0) / 4.0
            }
            SeveritySampler::Uniform => rand::Rng::gen_range(&mut rng, 0.0..1.0),
            SeveritySampler::Beta => {
                let beta = Beta::new(2.0, 5.0).expect("valid beta params");
                beta.sample(&mut rng)
            }
        };
        (raw * vulnerability_score.min(1.5)).clamp(0.05, 0.98)
    }

    /// `seed` gives deterministic severity sampling for reproducible timelines
    /// (universal invariant 10); `severity_override` bypasses sampling
    /// entirely.
    pub async fn generate_black_swan(
        &self,
        a: &ShadowProfile,
        b: &ShadowProfile,
        severity_override: Option<f64>,
        seed: Option<u64>,
        llm: &dyn LanguageModel,
    ) -> BlackSwanEvent {
        let vulnerability = self.identify_vulnerability(a, b);
        let severity = severity_override.unwrap_or_else(|| self.sample_severity(seed, vulnerability.score));
        let event_type = axis_to_event_type(&vulnerability.axis);

        let (narrative, decision_point) = self.generate_narrative(a, b, &vulnerability, llm).await;

        let mut expected_collapse_vector = BTreeMap::new();
        for profile in [a, b] {
            let primary = severity * (1.0 - profile.entropy_tolerance) * profile.value(&vulnerability.axis) * 1.3;
            expected_collapse_vector.insert(profile.agent_id.clone(), primary);
        }
        // 30% spillover onto the other agent's expectation, per SPEC_FULL.md §4.3 step 5.
        if let (Some(va), Some(vb)) = (expected_collapse_vector.get(&a.agent_id).copied(), expected_collapse_vector.get(&b.agent_id).copied()) {
            expected_collapse_vector.insert(a.agent_id.clone(), va + 0.3 * vb);
            expected_collapse_vector.insert(b.agent_id.clone(), vb + 0.3 * va);
        }

        let avg_entropy = (a.entropy_tolerance + b.entropy_tolerance) / 2.0;
        let secure_count = [a, b].iter().filter(|p| p.attachment_style == relsim_types::AttachmentStyle::Secure).count() as f64;
        let elasticity_threshold = (0.4 - 0.1 * avg_entropy - 0.05 * secure_count).clamp(0.05, 0.95);

        BlackSwanEvent {
            event_id: BlackSwanEvent::new_id(),
            event_type,
            target_vulnerability_axis: vulnerability.axis,
            severity,
            narrative_description: narrative,
            decision_point,
            expected_collapse_vector,
            elasticity_threshold,
            created_at: Utc::now(),
        }
    }

    async fn generate_narrative(&self, a: &ShadowProfile, b: &ShadowProfile, vulnerability: &Vulnerability, llm: &dyn LanguageModel) -> (String, String) {
        let prompt = format!(
            "Write a 3-sentence crisis scenario targeting the {} axis ({}) for agents {} and {}. Return JSON {{\"narrative\": str, \"decision_point\": str, \"likely_a_reaction\": str, \"likely_b_reaction\": str}}",
            vulnerability.axis, vulnerability.explanation, a.agent_id, b.agent_id
        );
        #[derive(serde::Deserialize)]
        struct Narrative {
            narrative: String,
            decision_point: String,
        }
        match llm.invoke(&prompt).await {
            Ok(response) => match strip_fences_and_parse::<Narrative>(&response.content) {
                Some(n) if !n.narrative.trim().is_empty() && !n.decision_point.trim().is_empty() => (n.narrative, n.decision_point),
                _ => Self::fallback_narrative(&vulnerability.axis),
            },
            Err(_) => Self::fallback_narrative(&vulnerability.axis),
        }
    }

    fn fallback_narrative(axis: &str) -> (String, String) {
        (
            format!("An unforeseen strain surfaces around {}, testing the pair's footing.", axis),
            "Address it openly or let the tension sit unspoken.".to_string(),
        )
    }

    /// Cosine of embeddings of the "identity statements" — turns containing
    /// any of {we, us, our, together} — falling back to the last 5 turns of
    /// each side when no such statement exists (SPEC_FULL.md §4.3).
    pub async fn measure_elasticity(&self, pre_turns: &[String], post_turns: &[String], embedder: &dyn TextEmbedder) -> f64 {
        let pre_statements = Self::identity_statements(pre_turns);
        let post_statements = Self::identity_statements(post_turns);
        let pre_text = pre_statements.join(" ");
        let post_text = post_statements.join(" ");
        let (Ok(pre_vec), Ok(post_vec)) = (embedder.embed(&pre_text).await, embedder.embed(&post_text).await) else {
            return 0.0;
        };
        cosine_similarity(&pre_vec, &post_vec)
    }

    fn identity_statements(turns: &[String]) -> Vec<String> {
        const MARKERS: [&str; 5] = ["we", "us", "our", "together", "let's"];
        let statements: Vec<String> = turns
            .iter()
            .filter(|t| {
                let lower = t.to_lowercase();
                MARKERS.iter().any(|m| lower.split_whitespace().any(|w| w.trim_matches(|c: char| !c.is_alphanumeric()) == *m))
            })
            .cloned()
            .collect();
        if statements.is_empty() {
            turns.iter().rev().take(5).cloned().collect()
        } else {
            statements
        }
    }

    /// Aftershock severities: `primary.severity * 0.6 * 0.8^i`.
    pub async fn run_cascade(&self, primary: &BlackSwanEvent, a: &ShadowProfile, b: &ShadowProfile, n: u32, llm: &dyn LanguageModel) -> Vec<BlackSwanEvent> {
        let mut episodes = vec![primary.clone()];
        for i in 1..=n {
            let severity = primary.severity * 0.6 * 0.8f64.powi(i as i32);
            let mut aftershock = self.generate_black_swan(a, b, Some(severity), None, llm).await;
            aftershock.target_vulnerability_axis = primary.target_vulnerability_axis.clone();
            episodes.push(aftershock);
        }
        episodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relsim_types::AttachmentStyle;
    use std::collections::BTreeMap;

    fn profile(id: &str, attachment: AttachmentStyle, fears: Vec<&str>) -> ShadowProfile {
        let values: BTreeMap<String, f64> = relsim_types::SHADOW_VALUE_KEYS.iter().map(|k| (k.to_string(), 0.5)).collect();
        ShadowProfile::new(id, values, attachment, fears.into_iter().map(String::from).collect(), vec![], 0.5, "direct").unwrap()
    }

    #[test]
    fn s1_shared_fear_amplification() {
        let a = profile("a", AttachmentStyle::Secure, vec!["abandonment"]);
        let b = profile("b", AttachmentStyle::Secure, vec!["abandonment"]);
        let gen = EventGenerator::default();
        let v = gen.identify_vulnerability(&a, &b);
        assert_eq!(v.axis, "belonging");
        assert!((v.score - 0.35).abs() < 1e-9, "score was {}", v.score);
    }

    #[test]
    fn s2_anxious_avoidant_amplification() {
        let a = profile("a", AttachmentStyle::Anxious, vec![]);
        let b = profile("b", AttachmentStyle::Avoidant, vec![]);
        let gen = EventGenerator::default();
        let v = gen.identify_vulnerability(&a, &b);
        assert_eq!(v.axis, "intimacy");
        assert!((v.score - 0.40).abs() < 1e-9, "score was {}", v.score);
    }

    #[test]
    fn s3_severity_always_clamped() {
        let gen = EventGenerator::new(EventGeneratorConfig { severity_sampler: SeveritySamplerOrDefault(SeveritySampler::Pareto) });
        for seed in 0..200u64 {
            let severity = gen.sample_severity(Some(seed), 1.0);
            assert!((0.05..=0.98).contains(&severity), "severity {} out of range", severity);
        }
    }
}
