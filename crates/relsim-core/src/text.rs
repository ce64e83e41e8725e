use std::collections::{HashMap, HashSet};

/// Lowercase word tokens of length >= 2, matching `\b\w+\b` semantics
/// (SPEC_FULL.md §4.1).
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| w.chars().count() >= 2)
        .map(|w| w.to_lowercase())
        .collect()
}

pub fn bigrams(tokens: &[String]) -> Vec<String> {
    tokens.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])).collect()
}

pub fn vocabulary(tokens: &[String]) -> HashSet<String> {
    tokens.iter().cloned().collect()
}

pub fn word_frequencies(tokens: &[String]) -> HashMap<String, u32> {
    let mut freq = HashMap::new();
    for token in tokens {
        *freq.entry(token.clone()).or_insert(0) += 1;
    }
    freq
}

/// Fraction of non-ASCII characters in `text`; 0.0 for empty strings.
pub fn non_ascii_density(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    let total = text.chars().count() as f64;
    let non_ascii = text.chars().filter(|c| !c.is_ascii()).count() as f64;
    non_ascii / total
}
