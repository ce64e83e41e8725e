//! Shared fixtures for exercising the relsim workspace without a live LLM or
//! embedding backend: canned shadow profiles spanning the three attachment
//! archetypes exercised in SPEC_FULL.md §8's scenarios, and a bundle of the
//! deterministic mock providers wired together.

use std::collections::BTreeMap;

use relsim_providers::{HashEmbedder, InMemoryResultStore, MockLanguageModel, TracingProgressSink};
use relsim_types::{AttachmentStyle, ShadowProfile, SHADOW_VALUE_KEYS};

pub fn uniform_values(v: f64) -> BTreeMap<String, f64> {
    SHADOW_VALUE_KEYS.iter().map(|k| (k.to_string(), v)).collect()
}

/// Secure/secure pairing: the baseline case with no shared fear amplification.
pub fn secure_profile(agent_id: &str) -> ShadowProfile {
    ShadowProfile::new(
        agent_id,
        uniform_values(0.5),
        AttachmentStyle::Secure,
        vec![],
        vec!["we".to_string(), "together".to_string()],
        0.6,
        "direct",
    )
    .expect("fixture profile is valid")
}

/// Anxious archetype, fearful of abandonment — pairs with [`avoidant_profile`]
/// to exercise the anxious/avoidant intimacy amplification.
pub fn anxious_profile(agent_id: &str) -> ShadowProfile {
    ShadowProfile::new(
        agent_id,
        uniform_values(0.6),
        AttachmentStyle::Anxious,
        vec!["abandonment".to_string()],
        vec!["please".to_string(), "are we okay".to_string()],
        0.3,
        "indirect",
    )
    .expect("fixture profile is valid")
}

/// Avoidant archetype, fearful of engulfment.
pub fn avoidant_profile(agent_id: &str) -> ShadowProfile {
    ShadowProfile::new(
        agent_id,
        uniform_values(0.4),
        AttachmentStyle::Avoidant,
        vec!["engulfment".to_string()],
        vec!["it's fine".to_string(), "i need space".to_string()],
        0.5,
        "direct",
    )
    .expect("fixture profile is valid")
}

/// A matched pair sharing a fear of abandonment, exercising the shared-fear
/// vulnerability amplifier.
pub fn shared_fear_pair(agent_a: &str, agent_b: &str) -> (ShadowProfile, ShadowProfile) {
    let a = ShadowProfile::new(
        agent_a,
        uniform_values(0.5),
        AttachmentStyle::Secure,
        vec!["abandonment".to_string()],
        vec![],
        0.5,
        "direct",
    )
    .expect("fixture profile is valid");
    let b = ShadowProfile::new(
        agent_b,
        uniform_values(0.5),
        AttachmentStyle::Secure,
        vec!["abandonment".to_string()],
        vec![],
        0.5,
        "direct",
    )
    .expect("fixture profile is valid");
    (a, b)
}

/// The four deterministic mock providers bundled together, matching what a
/// host would inject in production.
pub struct MockProviders {
    pub llm: MockLanguageModel,
    pub embedder: HashEmbedder,
    pub progress: TracingProgressSink,
    pub store: InMemoryResultStore,
}

impl Default for MockProviders {
    fn default() -> Self {
        Self {
            llm: MockLanguageModel::new(),
            embedder: HashEmbedder::default(),
            progress: TracingProgressSink::default(),
            store: InMemoryResultStore::new(),
        }
    }
}

impl MockProviders {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_construct_valid_profiles() {
        let (a, b) = shared_fear_pair("a", "b");
        assert_eq!(a.fear_architecture, b.fear_architecture);
        let _ = secure_profile("c");
        let _ = anxious_profile("d");
        let _ = avoidant_profile("e");
    }
}
