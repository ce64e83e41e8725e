use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// The language model returned content that could not be used at all
    /// (e.g. the transport itself failed). Callers substitute a neutral
    /// default rather than propagate this past the call site (SPEC_FULL.md §7).
    Invocation(String),
    /// An embedder produced a vector of a different dimension than a prior
    /// call — violates the stable-dimension contract of SPEC_FULL.md §6.
    DimensionMismatch { expected: usize, actual: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Invocation(msg) => write!(f, "language model invocation failed: {}", msg),
            Error::DimensionMismatch { expected, actual } => {
                write!(f, "embedder dimension changed: expected {}, got {}", expected, actual)
            }
        }
    }
}

impl std::error::Error for Error {}
