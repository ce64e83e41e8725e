//! Public SDK surface for embedding relsim in a host application: a
//! builder for non-interactive ensemble runs and a two-phase `Dialogue`
//! type for hosts that want control over individual crisis decisions
//! (SPEC_FULL.md §10).

pub mod builder;
pub mod dialogue;

pub use builder::EnsembleRunBuilder;
pub use dialogue::Dialogue;

pub use relsim_engine::{CrisisDecision, DialogueEngineConfig};
pub use relsim_runtime::{new_cancel_token, CancelToken, RunConfig};
pub use relsim_types::{BlackSwanEvent, Distribution, ShadowProfile, TimelineResult};
