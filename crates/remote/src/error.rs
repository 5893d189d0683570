use thiserror::Error;

use tutor_core::ErrorKind;

/// Failures talking to the emotion, dialogue or persistence services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RemoteError {
    #[error("credentials rejected by remote service (status {0})")]
    AuthExpired(reqwest::StatusCode),
    #[error("remote resource not found: {0}")]
    NotFound(String),
    #[error("remote request failed with status {0}")]
    Status(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("could not decode remote response: {0}")]
    Decode(String),
    #[error("remote service unavailable: {0}")]
    Unavailable(String),
    #[error("invalid remote base url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl RemoteError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthExpired(_) => ErrorKind::AuthExpired,
            _ => ErrorKind::RemoteService,
        }
    }

    #[must_use]
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthExpired(_))
    }
}
