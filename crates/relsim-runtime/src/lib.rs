//! Ensemble orchestration on top of `relsim-engine`: run configuration,
//! bounded-concurrency Monte Carlo orchestration, and distribution
//! reporting (SPEC_FULL.md §4.6, §4.7, §5).

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod reporter;

pub use config::RunConfig;
pub use error::{Error, Result};
pub use orchestrator::{new_cancel_token, sample_crisis_turns, CancelToken, MonteCarloOrchestrator};
pub use reporter::Reporter;
