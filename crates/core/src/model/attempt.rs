use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{ErrorKind, ValidationError};
use crate::model::ids::{AttemptId, QuizId};
use crate::model::quiz::Quiz;

/// Default countdown for a freshly presented quiz.
pub const DEFAULT_QUIZ_SECONDS: u32 = 60;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("quiz attempt is not being presented")]
    NotPresented,
    #[error("quiz attempt already answered")]
    AlreadyAnswered,
    #[error("attempt belongs to quiz {expected}, got quiz {provided}")]
    QuizMismatch { expected: QuizId, provided: QuizId },
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl AttemptError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            _ => ErrorKind::InvalidState,
        }
    }
}

/// Lifecycle phase of one attempt. `Answered` and `TimedOut` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum QuizPhase {
    Presented,
    Answered { selected: usize, correct: bool },
    TimedOut,
}

/// Result of advancing the countdown by one second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tick {
    /// Still presented with time left.
    Running(QuizAttempt),
    /// The countdown reached zero on this tick.
    Expired(QuizAttempt),
    /// The attempt was already terminal; nothing changed.
    Idle(QuizAttempt),
}

/// State of a single attempt at a quiz.
///
/// Every transition returns a new value; the attempt itself is never
/// mutated in place. Retrying a quiz means starting a new attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuizAttempt {
    id: AttemptId,
    quiz_id: QuizId,
    phase: QuizPhase,
    time_remaining_secs: u32,
    hint_index: usize,
    hint_count: usize,
    started_at: DateTime<Utc>,
}

impl QuizAttempt {
    #[must_use]
    pub fn start(quiz: &Quiz, duration_secs: u32, started_at: DateTime<Utc>) -> Self {
        Self {
            id: AttemptId::new_v4(),
            quiz_id: quiz.id(),
            phase: QuizPhase::Presented,
            time_remaining_secs: duration_secs,
            hint_index: 0,
            hint_count: quiz.hints().len(),
            started_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> AttemptId {
        self.id
    }

    #[must_use]
    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    #[must_use]
    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    #[must_use]
    pub fn is_presented(&self) -> bool {
        matches!(self.phase, QuizPhase::Presented)
    }

    /// True once the attempt is terminal, whether answered or timed out.
    #[must_use]
    pub fn answered(&self) -> bool {
        !self.is_presented()
    }

    #[must_use]
    pub fn selected_index(&self) -> Option<usize> {
        match self.phase {
            QuizPhase::Answered { selected, .. } => Some(selected),
            _ => None,
        }
    }

    #[must_use]
    pub fn time_remaining_secs(&self) -> u32 {
        self.time_remaining_secs
    }

    #[must_use]
    pub fn hint_index(&self) -> usize {
        self.hint_index
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Advance to the next hint. Stays put on the last hint or when not presented.
    #[must_use]
    pub fn reveal_next_hint(self) -> Self {
        if !self.is_presented() || self.hint_index + 1 >= self.hint_count {
            return self;
        }
        Self {
            hint_index: self.hint_index + 1,
            ..self
        }
    }

    /// Grade `selected` against `quiz` and move to `Answered`.
    ///
    /// # Errors
    ///
    /// - `AlreadyAnswered` if the attempt is terminal
    /// - `QuizMismatch` if `quiz` is not the quiz this attempt was started for
    /// - `Validation` if `selected` is not a valid option index
    pub fn answer(self, quiz: &Quiz, selected: usize) -> Result<(Self, bool), AttemptError> {
        if !self.is_presented() {
            return Err(AttemptError::AlreadyAnswered);
        }
        if quiz.id() != self.quiz_id {
            return Err(AttemptError::QuizMismatch {
                expected: self.quiz_id,
                provided: quiz.id(),
            });
        }
        let correct = quiz.grade(selected)?;
        Ok((
            Self {
                phase: QuizPhase::Answered { selected, correct },
                ..self
            },
            correct,
        ))
    }

    #[must_use]
    pub fn tick(self) -> Tick {
        if !self.is_presented() {
            return Tick::Idle(self);
        }
        let remaining = self.time_remaining_secs.saturating_sub(1);
        if remaining == 0 {
            Tick::Expired(Self {
                time_remaining_secs: 0,
                phase: QuizPhase::TimedOut,
                ..self
            })
        } else {
            Tick::Running(Self {
                time_remaining_secs: remaining,
                ..self
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{QuizDraft, QuizOrigin};
    use crate::time::fixed_now;

    fn quiz(hints: usize) -> Quiz {
        QuizDraft {
            question: "2 + 2?".into(),
            options: vec!["3".into(), "4".into()],
            correct_index: 1,
            explanation: "Arithmetic.".into(),
            hints: (0..hints).map(|i| format!("hint {i}")).collect(),
            ..QuizDraft::default()
        }
        .validate(QuizId::new(5), QuizOrigin::Remote)
        .unwrap()
    }

    #[test]
    fn hint_index_never_passes_last_hint() {
        let q = quiz(2);
        let mut attempt = QuizAttempt::start(&q, 60, fixed_now());
        for _ in 0..4 {
            attempt = attempt.reveal_next_hint();
        }
        assert_eq!(attempt.hint_index(), 1);
    }

    #[test]
    fn hints_are_noop_without_hints() {
        let q = quiz(0);
        let attempt = QuizAttempt::start(&q, 60, fixed_now()).reveal_next_hint();
        assert_eq!(attempt.hint_index(), 0);
    }

    #[test]
    fn answering_twice_fails() {
        let q = quiz(0);
        let attempt = QuizAttempt::start(&q, 60, fixed_now());
        let (answered, correct) = attempt.answer(&q, 1).unwrap();
        assert!(correct);
        assert_eq!(answered.selected_index(), Some(1));
        let err = answered.answer(&q, 0).unwrap_err();
        assert_eq!(err, AttemptError::AlreadyAnswered);
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn invalid_option_is_a_validation_error() {
        let q = quiz(0);
        let attempt = QuizAttempt::start(&q, 60, fixed_now());
        let err = attempt.answer(&q, 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn countdown_expires_on_last_second() {
        let q = quiz(0);
        let mut attempt = QuizAttempt::start(&q, 3, fixed_now());
        for expected in [2, 1] {
            match attempt.tick() {
                Tick::Running(next) => {
                    assert_eq!(next.time_remaining_secs(), expected);
                    attempt = next;
                }
                other => panic!("unexpected tick {other:?}"),
            }
        }
        let Tick::Expired(done) = attempt.tick() else {
            panic!("expected expiry");
        };
        assert_eq!(done.phase(), QuizPhase::TimedOut);
        assert!(matches!(done.tick(), Tick::Idle(_)));
        assert_eq!(done.answer(&q, 1).unwrap_err(), AttemptError::AlreadyAnswered);
    }

    #[test]
    fn hints_freeze_after_answer() {
        let q = quiz(3);
        let (answered, _) = QuizAttempt::start(&q, 60, fixed_now()).answer(&q, 0).unwrap();
        assert_eq!(answered.reveal_next_hint().hint_index(), 0);
    }
}
