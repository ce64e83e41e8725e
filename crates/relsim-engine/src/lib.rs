//! Per-timeline simulation components: the linguistic convergence scorer,
//! the recursive theory-of-mind tracker, the stochastic crisis generator,
//! the collapse risk detector, and the dialogue state machine that threads
//! them together into one simulated relationship (SPEC_FULL.md §4).

pub mod collapse;
pub mod dialogue;
pub mod events;
pub mod scorer;
pub mod tom;

pub use collapse::{classify_collapse_risk, compute_coc_voc, CollapseDetector, DetectorConfig};
pub use dialogue::{CrisisDecision, DialogueEngine, DialogueEngineConfig, DialogueNode, StepOutcome, Transition};
pub use events::{EventGenerator, EventGeneratorConfig, SeveritySampler, SeveritySamplerOrDefault, Vulnerability};
pub use scorer::{LinguisticScorer, ScorerConfig};
pub use tom::{classify_tom_risk, EpistemicGapReport, ToMConfig, ToMTracker};
