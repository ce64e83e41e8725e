/// Fatal orchestrator-level failures. Per-timeline failures never surface
/// here — they become a `TimelineResult::failed_placeholder` instead
/// (SPEC_FULL.md §7).
#[derive(Debug)]
pub enum Error {
    EmptyEnsemble,
    InvalidConfig(String),
    Engine(relsim_types::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::EmptyEnsemble => write!(f, "ensemble run requested with n_simulations = 0"),
            Error::InvalidConfig(reason) => write!(f, "invalid run configuration: {}", reason),
            Error::Engine(e) => write!(f, "dialogue engine construction failed: {}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<relsim_types::Error> for Error {
    fn from(e: relsim_types::Error) -> Self {
        Error::Engine(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
