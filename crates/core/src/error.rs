use thiserror::Error;

/// Coarse classification shared by every error in the tutoring core.
///
/// Callers use this to decide how to react without matching on each
/// component's error enum:
///
/// - `Validation`: rejected before any state mutation or network call.
/// - `RemoteService`: an external service failed; session state is unchanged.
/// - `InvalidState`: the operation does not apply to the current state;
///   re-query and retry.
/// - `AuthExpired`: the bearer credential must be renewed by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    RemoteService,
    InvalidState,
    AuthExpired,
}

/// Input rejected before touching session state.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("input text cannot be empty")]
    EmptyInput,

    #[error("unknown teaching mode: {0}")]
    InvalidMode(String),

    #[error("option index {index} is out of range for {len} options")]
    InvalidOption { index: usize, len: usize },

    #[error("a quiz needs at least two options, got {0}")]
    TooFewOptions(usize),

    #[error("correct index {index} is out of range for {len} options")]
    CorrectIndexOutOfRange { index: usize, len: usize },

    #[error("quiz question cannot be empty")]
    EmptyQuestion,

    #[error("difficulty delta must be finite, got {0}")]
    NonFiniteDelta(f64),

    #[error("success rate must be in [0, 1], got {0}")]
    InvalidSuccessRate(f64),

    #[error("unknown message id {0}")]
    UnknownMessage(u64),
}

impl ValidationError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}
