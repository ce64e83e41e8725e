//! Pure numeric and text helpers shared by every `relsim-engine` component:
//! clamping, Jensen-Shannon divergence, tokenization, and JSON-fence-tolerant
//! parsing for LLM output. No component state or I/O lives here.

pub mod json;
pub mod math;
pub mod text;
