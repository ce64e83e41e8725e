use std::collections::{HashMap, HashSet};

use relsim_core::math::cosine_similarity;
use relsim_core::text::{bigrams, non_ascii_density, tokenize};
use relsim_providers::TextEmbedder;
use relsim_types::{ConvergenceRecord, Trend};

#[derive(Debug, Clone)]
pub struct ScorerConfig {
    pub window: usize,
    pub min_phrase_freq: u32,
    pub withdrawal_window: usize,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self { window: 20, min_phrase_freq: 2, withdrawal_window: 10 }
    }
}

#[derive(Debug, Default)]
struct AgentLinguisticState {
    turns: Vec<String>,
}

/// Per-pair linguistic convergence tracker (SPEC_FULL.md §4.1). Owns raw turn
/// history and phrase-frequency bookkeeping per agent; never shared across
/// timelines.
#[derive(Debug)]
pub struct LinguisticScorer {
    config: ScorerConfig,
    agents: HashMap<String, AgentLinguisticState>,
    resilience_history: Vec<f64>,
}

impl LinguisticScorer {
    pub fn new(config: ScorerConfig) -> Self {
        Self { config, agents: HashMap::new(), resilience_history: Vec::new() }
    }

    /// Tokenizes and appends raw text; pure bookkeeping, no embedding call.
    pub fn ingest_turn(&mut self, agent_id: &str, text: &str) {
        self.agents.entry(agent_id.to_string()).or_default().turns.push(text.to_string());
    }

    fn recent_turns<'a>(&'a self, agent_id: &str) -> &'a [String] {
        match self.agents.get(agent_id) {
            Some(state) => {
                let n = state.turns.len();
                let start = n.saturating_sub(self.config.window);
                &state.turns[start..]
            }
            None => &[],
        }
    }

    fn phrase_counts(turns: &[String]) -> HashMap<String, u32> {
        let mut counts = HashMap::new();
        for turn in turns {
            let tokens = tokenize(turn);
            for unigram in &tokens {
                *counts.entry(unigram.clone()).or_insert(0) += 1;
            }
            for bigram in bigrams(&tokens) {
                *counts.entry(bigram).or_insert(0) += 1;
            }
        }
        counts
    }

    fn vocabulary(turns: &[String]) -> HashSet<String> {
        turns.iter().flat_map(|t| tokenize(t)).collect()
    }

    /// Fraction of `other_signature`'s phrases (frequency >= `min_phrase_freq`
    /// within `observer_turns`) that the observer has picked up.
    fn absorption(observer_turns: &[String], other_signature: &[String], min_phrase_freq: u32) -> f64 {
        if other_signature.is_empty() {
            return 0.0;
        }
        let counts = Self::phrase_counts(observer_turns);
        let absorbed = other_signature.iter().filter(|phrase| counts.get(phrase.as_str()).copied().unwrap_or(0) >= min_phrase_freq).count();
        absorbed as f64 / other_signature.len() as f64
    }

    fn top_borrowed(a_turns: &[String], b_turns: &[String], sig_a: &[String], sig_b: &[String], min_phrase_freq: u32) -> Vec<String> {
        let counts_a = Self::phrase_counts(a_turns);
        let counts_b = Self::phrase_counts(b_turns);
        let mut borrowed: Vec<(String, u32)> = sig_b
            .iter()
            .filter_map(|p| counts_a.get(p).filter(|c| **c >= min_phrase_freq).map(|c| (p.clone(), *c)))
            .chain(sig_a.iter().filter_map(|p| counts_b.get(p).filter(|c| **c >= min_phrase_freq).map(|c| (p.clone(), *c))))
            .collect();
        borrowed.sort_by(|a, b| b.1.cmp(&a.1));
        borrowed.dedup_by(|a, b| a.0 == b.0);
        borrowed.into_iter().take(3).map(|(phrase, _)| phrase).collect()
    }

    async fn mean_embedding(turns: &[String], embedder: Option<&dyn TextEmbedder>) -> Option<Vec<f64>> {
        let embedder = embedder?;
        let mut sum: Vec<f64> = Vec::new();
        let mut n = 0usize;
        for turn in turns {
            let Ok(vector) = embedder.embed(turn).await else { return None };
            if sum.is_empty() {
                sum = vec![0.0; vector.len()];
            }
            if vector.len() != sum.len() {
                return None;
            }
            for (s, v) in sum.iter_mut().zip(&vector) {
                *s += v;
            }
            n += 1;
        }
        if n == 0 {
            return None;
        }
        Some(sum.into_iter().map(|v| v / n as f64).collect())
    }

    fn code_switch_rate(turns: &[String]) -> f64 {
        if turns.is_empty() {
            return 0.0;
        }
        let switching = turns.iter().filter(|t| non_ascii_density(t) > 0.30).count();
        switching as f64 / turns.len() as f64
    }

    /// Computes the convergence record for the current window, appending to
    /// the rolling resilience-delta history used for trend classification
    /// (SPEC_FULL.md §4.1).
    pub async fn compute_convergence(
        &mut self,
        agent_a: &str,
        signature_a: &[String],
        agent_b: &str,
        signature_b: &[String],
        embedder: Option<&dyn TextEmbedder>,
    ) -> ConvergenceRecord {
        let turns_a = self.recent_turns(agent_a).to_vec();
        let turns_b = self.recent_turns(agent_b).to_vec();

        let a_absorbs_b = Self::absorption(&turns_a, signature_b, self.config.min_phrase_freq);
        let b_absorbs_a = Self::absorption(&turns_b, signature_a, self.config.min_phrase_freq);

        let vocab_a = Self::vocabulary(&turns_a);
        let vocab_b = Self::vocabulary(&turns_b);
        let lexical_divergence = if vocab_a.is_empty() || vocab_b.is_empty() {
            1.0
        } else {
            let overlap = vocab_a.intersection(&vocab_b).count() as f64;
            1.0 - overlap / vocab_a.len().min(vocab_b.len()) as f64
        };

        let semantic_alignment = match (
            Self::mean_embedding(&turns_a, embedder).await,
            Self::mean_embedding(&turns_b, embedder).await,
        ) {
            (Some(mean_a), Some(mean_b)) => cosine_similarity(&mean_a, &mean_b),
            _ => 1.0 - lexical_divergence,
        };

        let rate_a = Self::code_switch_rate(&turns_a);
        let rate_b = Self::code_switch_rate(&turns_b);
        let code_switch_sync = 1.0 - (rate_a - rate_b).abs() / rate_a.max(rate_b).max(0.01);

        let resilience_delta = 0.30 * semantic_alignment
            + 0.20 * ((a_absorbs_b + b_absorbs_a) / 2.0)
            + 0.20 * code_switch_sync
            + 0.30 * (1.0 - lexical_divergence);

        self.resilience_history.push(resilience_delta);
        let trend = self.classify_trend();

        ConvergenceRecord {
            turn_number: 0,
            a_absorbs_b,
            b_absorbs_a,
            semantic_alignment,
            lexical_divergence,
            code_switch_sync,
            resilience_delta,
            trend,
            top_borrowed: Self::top_borrowed(&turns_a, &turns_b, signature_a, signature_b, self.config.min_phrase_freq),
            alarm: lexical_divergence > 0.7,
        }
    }

    fn classify_trend(&self) -> Trend {
        if self.resilience_history.len() < 6 {
            return Trend::Stable;
        }
        let n = self.resilience_history.len();
        let recent = &self.resilience_history[n - 3..];
        let prior = &self.resilience_history[n - 6..n - 3];
        let recent_mean = recent.iter().sum::<f64>() / 3.0;
        let prior_mean = prior.iter().sum::<f64>() / 3.0;
        let delta = recent_mean - prior_mean;
        if delta > 0.05 {
            Trend::Accelerating
        } else if delta < -0.05 {
            Trend::Diverging
        } else {
            Trend::Stable
        }
    }

    /// Requires at least `window` turns recorded for `agent_id`; returns
    /// false otherwise (SPEC_FULL.md §9, Open Question a).
    pub fn detect_withdrawal(&self, agent_id: &str) -> bool {
        let window = self.config.withdrawal_window;
        let Some(state) = self.agents.get(agent_id) else { return false };
        if state.turns.len() < window {
            return false;
        }
        let slice = &state.turns[state.turns.len() - window..];
        let half = window / 2;
        let earlier = &slice[..half];
        let recent = &slice[half..];

        let vocab_earlier = Self::vocabulary(earlier);
        let vocab_recent = Self::vocabulary(recent);
        let vocab_ratio = if vocab_earlier.is_empty() {
            1.0
        } else {
            vocab_recent.len() as f64 / vocab_earlier.len() as f64
        };

        let mean_len = |turns: &[String]| -> f64 {
            if turns.is_empty() {
                return 0.0;
            }
            turns.iter().map(|t| tokenize(t).len() as f64).sum::<f64>() / turns.len() as f64
        };
        let len_earlier = mean_len(earlier);
        let len_recent = mean_len(recent);
        let len_ratio = if len_earlier == 0.0 { 1.0 } else { len_recent / len_earlier };

        vocab_ratio < 0.6 || len_ratio < 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn withdrawal_requires_full_window() {
        let mut scorer = LinguisticScorer::new(ScorerConfig::default());
        for _ in 0..9 {
            scorer.ingest_turn("a", "a".repeat(100).as_str());
        }
        assert!(!scorer.detect_withdrawal("a"), "fewer than window turns must return false");
    }

    #[test]
    fn withdrawal_detected_on_length_drop() {
        let mut scorer = LinguisticScorer::new(ScorerConfig::default());
        for _ in 0..10 {
            scorer.ingest_turn("a", &"word ".repeat(100));
        }
        for _ in 0..5 {
            scorer.ingest_turn("a", "ok");
        }
        assert!(scorer.detect_withdrawal("a"));
    }

    #[tokio::test]
    async fn convergence_with_no_turns_is_maximally_divergent() {
        let mut scorer = LinguisticScorer::new(ScorerConfig::default());
        let record = scorer.compute_convergence("a", &[], "b", &[], None).await;
        assert_eq!(record.lexical_divergence, 1.0);
        assert!(record.alarm);
    }
}
