use std::collections::BTreeMap;

/// Epsilon used to smooth probability distributions before taking logs
/// (SPEC_FULL.md §9, numeric semantics).
const JSD_EPSILON: f64 = 1e-10;

pub fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// ε-smooths `values` then L1-normalizes over the union of `values`' keys with
/// `other_keys`, iterating in sorted key order for deterministic orientation.
fn smoothed_distribution(values: &BTreeMap<String, f64>, keys: &[String]) -> Vec<f64> {
    let raw: Vec<f64> = keys.iter().map(|k| values.get(k).copied().unwrap_or(0.0) + JSD_EPSILON).collect();
    let sum: f64 = raw.iter().sum();
    raw.into_iter().map(|v| v / sum).collect()
}

fn kl_divergence(p: &[f64], q: &[f64]) -> f64 {
    p.iter().zip(q).map(|(pi, qi)| if *pi <= 0.0 { 0.0 } else { pi * (pi / qi).ln() }).sum()
}

/// Jensen-Shannon divergence between two value maps, bounded [0, ln 2]
/// (SPEC_FULL.md §4.2). Symmetric and zero on identical inputs (universal
/// invariant 3). Despite some historical naming in the system this ports
/// from, this is JSD, not plain KL divergence.
pub fn jensen_shannon_divergence(p_values: &BTreeMap<String, f64>, q_values: &BTreeMap<String, f64>) -> f64 {
    let mut keys: Vec<String> = p_values.keys().chain(q_values.keys()).cloned().collect();
    keys.sort();
    keys.dedup();

    let p = smoothed_distribution(p_values, &keys);
    let q = smoothed_distribution(q_values, &keys);
    let m: Vec<f64> = p.iter().zip(&q).map(|(pi, qi)| (pi + qi) / 2.0).collect();

    0.5 * kl_divergence(&p, &m) + 0.5 * kl_divergence(&q, &m)
}

/// Cosine similarity between two equal-length vectors; 0.0 if either is
/// degenerate (all-zero or mismatched length).
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

pub fn median(sorted_values: &[f64]) -> f64 {
    let n = sorted_values.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted_values[n / 2]
    } else {
        (sorted_values[n / 2 - 1] + sorted_values[n / 2]) / 2.0
    }
}

/// Normal-approximation 95% confidence interval for a proportion, clamped to
/// [0, 1] (SPEC_FULL.md §4.6).
pub fn ci95_proportion(rate: f64, n: usize) -> (f64, f64) {
    if n == 0 {
        return (0.0, 0.0);
    }
    let stderr = (rate * (1.0 - rate) / n as f64).sqrt();
    let margin = 1.96 * stderr;
    ((rate - margin).clamp(0.0, 1.0), (rate + margin).clamp(0.0, 1.0))
}

/// Normal-approximation 95% confidence interval around a sample mean, using
/// the sample standard deviation (SPEC_FULL.md §4.6).
pub fn ci95_mean(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let m = mean(values);
    if n == 1 {
        return (m.clamp(0.0, 1.0), m.clamp(0.0, 1.0));
    }
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64;
    let stderr = (variance / n as f64).sqrt();
    let margin = 1.96 * stderr;
    ((m - margin).clamp(0.0, 1.0), (m + margin).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn jsd_is_zero_for_identical_distributions() {
        let p = map(&[("a", 0.5), ("b", 0.5)]);
        assert!(jensen_shannon_divergence(&p, &p).abs() < 1e-9);
    }

    #[test]
    fn jsd_is_symmetric() {
        let p = map(&[("a", 0.9), ("b", 0.1)]);
        let q = map(&[("a", 0.2), ("b", 0.8)]);
        let d_pq = jensen_shannon_divergence(&p, &q);
        let d_qp = jensen_shannon_divergence(&q, &p);
        assert!((d_pq - d_qp).abs() < 1e-6);
    }

    #[test]
    fn jsd_is_bounded_by_ln2() {
        let p = map(&[("a", 1.0), ("b", 0.0)]);
        let q = map(&[("a", 0.0), ("b", 1.0)]);
        let d = jensen_shannon_divergence(&p, &q);
        assert!(d >= 0.0 && d <= std::f64::consts::LN_2 + 1e-6);
    }
}
