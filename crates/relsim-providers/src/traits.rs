use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// A single language-model response. The core parses JSON out of `content`
/// itself, tolerating markdown fences (SPEC_FULL.md §6, §9).
#[derive(Debug, Clone)]
pub struct LanguageModelResponse {
    pub content: String,
}

/// Text-generation capability injected into every component that needs
/// inference (`ToMTracker`, `EventGenerator`, `CollapseDetector`). Shared
/// across every timeline task, so implementations must be `Send + Sync`.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn invoke(&self, prompt: &str) -> Result<LanguageModelResponse>;
}

/// Text-embedding capability used by `LinguisticScorer::compute_convergence`
/// and `EventGenerator::measure_elasticity`. Dimension must be stable across
/// calls from one instance.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f64>>;
}

/// Run status published alongside a progress update (SPEC_FULL.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Queued,
    Running,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProgressPayload {
    pub pair_id: String,
    pub completed: usize,
    pub total: usize,
    pub status: ProgressStatus,
}

/// Streaming-update capability. Publishes are fire-and-forget: a failure to
/// publish must never block or fail the simulation path (SPEC_FULL.md §5).
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn publish(&self, channel: &str, payload: &ProgressPayload);
}

/// Final-persistence capability for a serialized `Distribution`.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;
}

/// Builds the standard progress channel name for a pair (SPEC_FULL.md §6).
pub fn progress_channel(pair_id: &str) -> String {
    format!("progress:{}", pair_id)
}
