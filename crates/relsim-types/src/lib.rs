//! Core data model for the relational Monte Carlo simulation core: shadow
//! profiles, recursive epistemic belief state, dialogue working memory,
//! stochastic crisis events, and ensemble results. No algorithms live here —
//! see `relsim-engine` and `relsim-runtime`.

mod collapse;
mod convergence;
mod dialogue;
mod epistemic;
mod error;
mod event;
mod result;
mod shadow;

pub use collapse::{
    Assessment, CocVoc, CollapseRiskLevel, CollapseSignal, EstimatedCocVoc, InterventionType, ToMRiskLevel,
};
pub use convergence::{ConvergenceRecord, Trend};
pub use dialogue::{DialogueState, Role, Turn};
pub use epistemic::{BeliefState, EpistemicModel, ThoughtRecord};
pub use error::{Error, Result};
pub use event::{BlackSwanEvent, CrisisEpisode, EventTaxonomy};
pub use result::{Distribution, RunStatus, TimelineResult};
pub use shadow::{AttachmentStyle, ShadowProfile, SHADOW_VALUE_KEYS};
