use std::fmt;

/// Result type for relsim-types operations
pub type Result<T> = std::result::Result<T, Error>;

/// Input violations caught at construction time (see SPEC_FULL.md §7).
#[derive(Debug)]
pub enum Error {
    /// A ShadowProfile's `values` map did not carry exactly the eight fixed keys.
    InvalidValueKeys { missing: Vec<String>, extra: Vec<String> },
    /// A value was outside [0.0, 1.0].
    ValueOutOfRange { key: String, value: f64 },
    /// `values` summed above the 8.0 ceiling.
    ValueSumExceeded { sum: f64 },
    /// `communication_style` was not one of the four allowed strings.
    InvalidCommunicationStyle(String),
    /// `owner_id` and `target_id` of an EpistemicModel were equal.
    SameAgentIds(String),
    /// A BeliefState's nested EpistemicModel keying was inconsistent.
    InconsistentBeliefState(String),
    /// Recursion depth was not one of the supported values (2 or 3).
    InvalidRecursionDepth(u8),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidValueKeys { missing, extra } => {
                write!(f, "values must contain exactly the eight fixed keys")?;
                if !missing.is_empty() {
                    write!(f, "; missing: {:?}", missing)?;
                }
                if !extra.is_empty() {
                    write!(f, "; extra: {:?}", extra)?;
                }
                Ok(())
            }
            Error::ValueOutOfRange { key, value } => {
                write!(f, "values['{}'] = {} must be between 0.0 and 1.0", key, value)
            }
            Error::ValueSumExceeded { sum } => {
                write!(f, "values sum {:.2} exceeds maximum of 8.0", sum)
            }
            Error::InvalidCommunicationStyle(v) => {
                write!(f, "communication_style must be one of direct, indirect, aggressive, passive, got '{}'", v)
            }
            Error::SameAgentIds(id) => {
                write!(f, "owner_id and target_id must differ, both were '{}'", id)
            }
            Error::InconsistentBeliefState(msg) => write!(f, "inconsistent belief state: {}", msg),
            Error::InvalidRecursionDepth(d) => write!(f, "unsupported recursion depth: {}", d),
        }
    }
}

impl std::error::Error for Error {}
