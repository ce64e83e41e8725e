use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::traits::{LanguageModel, LanguageModelResponse, ProgressPayload, ProgressSink, ResultStore, TextEmbedder};
use relsim_core::text::tokenize;

/// A deterministic, local `LanguageModel` for tests and the CLI
/// demonstrator. It never calls a network and is not one of the production
/// backends named out of scope in SPEC_FULL.md §1 — it exists purely so the
/// core is runnable without one.
///
/// Dispatches on a handful of prompt markers the reference prompt templates
/// always contain, and returns neutral structured JSON for each.
#[derive(Debug, Default)]
pub struct MockLanguageModel;

impl MockLanguageModel {
    pub fn new() -> Self {
        Self
    }

    fn respond(prompt: &str) -> String {
        if prompt.contains("likely_a_reaction") || prompt.contains("decision_point") {
            r#"{"narrative": "An unexpected strain tests the pair.", "decision_point": "Name the fear or let it fester.", "likely_a_reaction": "withdraws briefly", "likely_b_reaction": "seeks reassurance"}"#.to_string()
        } else if prompt.contains("defensive") {
            r#"{"score": 0.0}"#.to_string()
        } else if prompt.contains("incoheren") {
            r#"{"score": 0.0}"#.to_string()
        } else if prompt.contains("strategy") || prompt.contains("inner monologue") {
            r#"{"inner_monologue": "I should stay steady.", "strategy": "validate"}"#.to_string()
        } else if prompt.contains("infer") || prompt.contains("delta") {
            r#"{"autonomy": 0.0, "security": 0.0, "achievement": 0.0, "intimacy": 0.0, "novelty": 0.0, "stability": 0.0, "power": 0.0, "belonging": 0.0}"#.to_string()
        } else if prompt.contains("projects") || prompt.contains("l2") || prompt.contains("persona") {
            r#"{"autonomy": 0.5, "security": 0.5, "achievement": 0.5, "intimacy": 0.5, "novelty": 0.5, "stability": 0.5, "power": 0.5, "belonging": 0.5}"#.to_string()
        } else {
            "I hear you, and I want us to keep talking this through together.".to_string()
        }
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn invoke(&self, prompt: &str) -> Result<LanguageModelResponse> {
        Ok(LanguageModelResponse { content: Self::respond(prompt) })
    }
}

/// A deterministic, local `TextEmbedder` built from token shingles so
/// semantically similar text lands near itself without any model weights
/// (SPEC_FULL.md §6). Dimension is fixed at construction and stable across
/// calls.
#[derive(Debug)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension: dimension.max(1) }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(32)
    }
}

#[async_trait]
impl TextEmbedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        let mut vector = vec![0.0_f64; self.dimension];
        for token in tokenize(text) {
            let bucket = (fnv1a(&token) as usize) % self.dimension;
            vector[bucket] += 1.0;
        }
        let norm: f64 = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

fn fnv1a(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in s.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// A `ProgressSink` that logs via `tracing` instead of streaming anywhere.
#[derive(Debug, Default)]
pub struct TracingProgressSink;

#[async_trait]
impl ProgressSink for TracingProgressSink {
    async fn publish(&self, channel: &str, payload: &ProgressPayload) {
        tracing::info!(
            channel,
            pair_id = %payload.pair_id,
            completed = payload.completed,
            total = payload.total,
            status = ?payload.status,
            "progress"
        );
    }
}

/// An in-memory `ResultStore` for tests and the CLI demonstrator. TTLs are
/// accepted but not enforced — eviction is out of scope for a mock.
#[derive(Debug, Default)]
pub struct InMemoryResultStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn put(&self, key: &str, value: Vec<u8>, _ttl: Option<Duration>) -> Result<()> {
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }
}

/// Parses a canned delta/projection JSON object into the eight fixed value
/// keys, defaulting to neutral (0.0 for deltas, 0.5 for projections) on any
/// missing key. Shared by the mock and by `relsim-engine`'s real parsing path
/// tests.
pub fn parse_value_map(json: &serde_json::Value, default: f64) -> BTreeMap<String, f64> {
    relsim_types::SHADOW_VALUE_KEYS
        .iter()
        .map(|k| (k.to_string(), json.get(*k).and_then(|v| v.as_f64()).unwrap_or(default)))
        .collect()
}
