use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The eight fixed dimensions every `ShadowProfile.values` map must carry, in
/// sorted order so vector orientation is deterministic (SPEC_FULL.md §9,
/// numeric semantics).
pub const SHADOW_VALUE_KEYS: [&str; 8] = [
    "achievement",
    "autonomy",
    "belonging",
    "intimacy",
    "novelty",
    "power",
    "security",
    "stability",
];

const COMMUNICATION_STYLES: [&str; 4] = ["direct", "indirect", "aggressive", "passive"];

/// Attachment style of an agent's ground-truth latent state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentStyle {
    Secure,
    Anxious,
    Avoidant,
    Fearful,
}

impl AttachmentStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentStyle::Secure => "secure",
            AttachmentStyle::Anxious => "anxious",
            AttachmentStyle::Avoidant => "avoidant",
            AttachmentStyle::Fearful => "fearful",
        }
    }
}

/// An agent's ground-truth latent state (the "L0 shadow"). Never revealed in
/// dialogue text; immutable after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowProfile {
    pub agent_id: String,
    /// Keyed by the eight entries in [`SHADOW_VALUE_KEYS`], each in [0.0, 1.0].
    pub values: BTreeMap<String, f64>,
    pub attachment_style: AttachmentStyle,
    pub fear_architecture: Vec<String>,
    pub linguistic_signature: Vec<String>,
    pub entropy_tolerance: f64,
    pub communication_style: String,
}

impl ShadowProfile {
    pub fn new(
        agent_id: impl Into<String>,
        values: BTreeMap<String, f64>,
        attachment_style: AttachmentStyle,
        fear_architecture: Vec<String>,
        linguistic_signature: Vec<String>,
        entropy_tolerance: f64,
        communication_style: impl Into<String>,
    ) -> Result<Self> {
        let communication_style = communication_style.into();
        validate_values(&values)?;
        if !COMMUNICATION_STYLES.contains(&communication_style.as_str()) {
            return Err(Error::InvalidCommunicationStyle(communication_style));
        }
        Ok(Self {
            agent_id: agent_id.into(),
            values,
            attachment_style,
            fear_architecture,
            linguistic_signature,
            entropy_tolerance: entropy_tolerance.clamp(0.0, 1.0),
            communication_style,
        })
    }

    pub fn value(&self, key: &str) -> f64 {
        self.values.get(key).copied().unwrap_or(0.0)
    }
}

fn validate_values(values: &BTreeMap<String, f64>) -> Result<()> {
    let expected: std::collections::BTreeSet<&str> = SHADOW_VALUE_KEYS.iter().copied().collect();
    let actual: std::collections::BTreeSet<&str> = values.keys().map(String::as_str).collect();
    if expected != actual {
        let missing: Vec<String> = expected.difference(&actual).map(|s| s.to_string()).collect();
        let extra: Vec<String> = actual.difference(&expected).map(|s| s.to_string()).collect();
        return Err(Error::InvalidValueKeys { missing, extra });
    }
    let mut sum = 0.0;
    for (key, value) in values {
        if !(0.0..=1.0).contains(value) {
            return Err(Error::ValueOutOfRange { key: key.clone(), value: *value });
        }
        sum += value;
    }
    if sum > 8.0 {
        return Err(Error::ValueSumExceeded { sum });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neutral_values() -> BTreeMap<String, f64> {
        SHADOW_VALUE_KEYS.iter().map(|k| (k.to_string(), 0.5)).collect()
    }

    #[test]
    fn rejects_missing_key() {
        let mut values = neutral_values();
        values.remove("power");
        let err = ShadowProfile::new(
            "a",
            values,
            AttachmentStyle::Secure,
            vec!["abandonment".into()],
            vec![],
            0.5,
            "direct",
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidValueKeys { .. }));
    }

    #[test]
    fn rejects_sum_over_eight() {
        let values: BTreeMap<String, f64> = SHADOW_VALUE_KEYS.iter().map(|k| (k.to_string(), 1.0)).collect();
        let err = ShadowProfile::new(
            "a",
            values,
            AttachmentStyle::Secure,
            vec![],
            vec![],
            0.5,
            "direct",
        )
        .unwrap_err();
        assert!(matches!(err, Error::ValueSumExceeded { .. }));
    }

    #[test]
    fn rejects_bad_communication_style() {
        let err = ShadowProfile::new(
            "a",
            neutral_values(),
            AttachmentStyle::Secure,
            vec![],
            vec![],
            0.5,
            "sarcastic",
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidCommunicationStyle(_)));
    }

    #[test]
    fn accepts_valid_profile() {
        let profile = ShadowProfile::new(
            "a",
            neutral_values(),
            AttachmentStyle::Anxious,
            vec!["abandonment".into()],
            vec![],
            0.4,
            "indirect",
        )
        .unwrap();
        assert_eq!(profile.value("autonomy"), 0.5);
    }
}
