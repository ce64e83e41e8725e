//! The four capability traits the simulation core consumes —
//! `LanguageModel`, `TextEmbedder`, `ProgressSink`, `ResultStore` — plus
//! deterministic local implementations for tests and the CLI demonstrator.
//! None of the mock implementations here are the production backends named
//! out of scope in SPEC_FULL.md §1.

mod error;
mod mock;
mod traits;

pub use error::{Error, Result};
pub use mock::{parse_value_map, HashEmbedder, InMemoryResultStore, MockLanguageModel, TracingProgressSink};
pub use traits::{
    progress_channel, LanguageModel, LanguageModelResponse, ProgressPayload, ProgressSink, ProgressStatus, ResultStore,
    TextEmbedder,
};
