//! Shared error types for the services crate.

use thiserror::Error;

use remote::RemoteError;
use tutor_core::model::{AttemptError, BookmarkError, QuizId, SessionStateError, TopicId};
use tutor_core::{ErrorKind, ValidationError};

/// Errors emitted by `DialogueController`.
///
/// Remote failures other than expired credentials are absorbed into an error
/// message in the transcript and never reach the caller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DialogueError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl DialogueError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(e) => e.kind(),
            Self::Remote(e) => e.kind(),
        }
    }
}

/// Errors emitted by `QuizLifecycleManager`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizError {
    #[error("no quiz is active")]
    NoActiveQuiz,
    #[error("quiz {0} is already being presented")]
    AlreadyPresented(QuizId),
    #[error("quiz {0} can only be retried after it is answered or timed out")]
    RetryNotAllowed(QuizId),
    #[error(transparent)]
    Attempt(#[from] AttemptError),
}

impl QuizError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Attempt(e) => e.kind(),
            _ => ErrorKind::InvalidState,
        }
    }
}

/// Errors emitted by `SessionStateController`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionControlError {
    #[error(transparent)]
    State(#[from] SessionStateError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl SessionControlError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::State(e) => e.kind(),
            Self::Validation(e) => e.kind(),
            Self::Remote(e) => e.kind(),
        }
    }
}

/// Errors emitted by `SpacedRepetitionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReviewError {
    #[error("topic {0} has not been completed yet")]
    UnknownTopic(TopicId),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl ReviewError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownTopic(_) => ErrorKind::Validation,
            Self::Remote(e) => e.kind(),
        }
    }
}

/// Errors surfaced by `TutorSession`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TutorError {
    #[error(transparent)]
    Dialogue(#[from] DialogueError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Control(#[from] SessionControlError),
    #[error(transparent)]
    Review(#[from] ReviewError),
    #[error(transparent)]
    Bookmark(#[from] BookmarkError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl TutorError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Dialogue(e) => e.kind(),
            Self::Quiz(e) => e.kind(),
            Self::Control(e) => e.kind(),
            Self::Review(e) => e.kind(),
            Self::Bookmark(e) => e.kind(),
            Self::Validation(e) => e.kind(),
            Self::Remote(e) => e.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutor_core::model::PauseId;

    #[test]
    fn kinds_follow_the_taxonomy() {
        let stale = SessionControlError::from(SessionStateError::InvalidPauseId {
            provided: PauseId::new(3),
        });
        assert_eq!(stale.kind(), ErrorKind::InvalidState);

        let empty = TutorError::from(DialogueError::from(ValidationError::EmptyInput));
        assert_eq!(empty.kind(), ErrorKind::Validation);

        let twice = TutorError::from(QuizError::from(AttemptError::AlreadyAnswered));
        assert_eq!(twice.kind(), ErrorKind::InvalidState);

        let offline = TutorError::from(RemoteError::Unavailable("down".into()));
        assert_eq!(offline.kind(), ErrorKind::RemoteService);
    }
}
