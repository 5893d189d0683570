use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::model::ids::QuizId;

//
// ─── QUIZ ──────────────────────────────────────────────────────────────────────
//

/// Where a quiz came from. Only remote quizzes have server-side feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizOrigin {
    Remote,
    Synthesized,
}

/// A validated multiple-choice question.
///
/// `correct_index` always points into `options` and there are at least two
/// options; both are checked in [`Quiz::new`], also when deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "QuizFields")]
pub struct Quiz {
    id: QuizId,
    question: String,
    options: Vec<String>,
    correct_index: usize,
    explanation: String,
    difficulty: Option<String>,
    topic: Option<String>,
    hints: Vec<String>,
    origin: QuizOrigin,
}

#[derive(Deserialize)]
struct QuizFields {
    id: QuizId,
    question: String,
    options: Vec<String>,
    correct_index: usize,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    difficulty: Option<String>,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    hints: Vec<String>,
    origin: QuizOrigin,
}

impl TryFrom<QuizFields> for Quiz {
    type Error = ValidationError;

    fn try_from(fields: QuizFields) -> Result<Self, Self::Error> {
        let draft = QuizDraft {
            question: fields.question,
            options: fields.options,
            correct_index: fields.correct_index,
            explanation: fields.explanation,
            difficulty: fields.difficulty,
            topic: fields.topic,
            hints: fields.hints,
        };
        Quiz::new(fields.id, draft, fields.origin)
    }
}

/// Unvalidated quiz fields, as received from a service or a policy table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuizDraft {
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    pub explanation: String,
    pub difficulty: Option<String>,
    pub topic: Option<String>,
    pub hints: Vec<String>,
}

impl QuizDraft {
    /// # Errors
    ///
    /// Returns `ValidationError` if the question is blank, there are fewer than
    /// two options, or `correct_index` is out of range.
    pub fn validate(self, id: QuizId, origin: QuizOrigin) -> Result<Quiz, ValidationError> {
        Quiz::new(id, self, origin)
    }
}

impl Quiz {
    /// # Errors
    ///
    /// Returns `ValidationError` if the draft violates the quiz invariants.
    pub fn new(id: QuizId, draft: QuizDraft, origin: QuizOrigin) -> Result<Self, ValidationError> {
        if draft.question.trim().is_empty() {
            return Err(ValidationError::EmptyQuestion);
        }
        if draft.options.len() < 2 {
            return Err(ValidationError::TooFewOptions(draft.options.len()));
        }
        if draft.correct_index >= draft.options.len() {
            return Err(ValidationError::CorrectIndexOutOfRange {
                index: draft.correct_index,
                len: draft.options.len(),
            });
        }
        Ok(Self {
            id,
            question: draft.question,
            options: draft.options,
            correct_index: draft.correct_index,
            explanation: draft.explanation,
            difficulty: draft.difficulty,
            topic: draft.topic,
            hints: draft.hints,
            origin,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuizId {
        self.id
    }

    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_index(&self) -> usize {
        self.correct_index
    }

    #[must_use]
    pub fn correct_option(&self) -> &str {
        self.options
            .get(self.correct_index)
            .map_or("", String::as_str)
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    #[must_use]
    pub fn difficulty(&self) -> Option<&str> {
        self.difficulty.as_deref()
    }

    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    #[must_use]
    pub fn hints(&self) -> &[String] {
        &self.hints
    }

    #[must_use]
    pub fn origin(&self) -> QuizOrigin {
        self.origin
    }

    /// Grade a selection.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidOption` if `selected` is not an option index.
    pub fn grade(&self, selected: usize) -> Result<bool, ValidationError> {
        if selected >= self.options.len() {
            return Err(ValidationError::InvalidOption {
                index: selected,
                len: self.options.len(),
            });
        }
        Ok(selected == self.correct_index)
    }
}

//
// ─── SCORE ─────────────────────────────────────────────────────────────────────
//

/// Session-scoped quiz tally. `correct <= total` holds by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuizScore {
    correct: u32,
    total: u32,
}

impl QuizScore {
    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Count one graded quiz. Timeouts are recorded as incorrect.
    pub fn record(&mut self, correct: bool) {
        self.total = self.total.saturating_add(1);
        if correct {
            self.correct = self.correct.saturating_add(1);
        }
    }

    /// Fraction of correct answers, `0.0` before any quiz was graded.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.correct) / f64::from(self.total)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> QuizDraft {
        QuizDraft {
            question: "Which structure is LIFO?".into(),
            options: vec!["Queue".into(), "Stack".into(), "Heap".into()],
            correct_index: 1,
            explanation: "A stack pops the most recent push.".into(),
            hints: vec!["Think of plates.".into(), "Last in...".into()],
            ..QuizDraft::default()
        }
    }

    #[test]
    fn rejects_out_of_range_correct_index() {
        let mut d = draft();
        d.correct_index = 3;
        let err = d.validate(QuizId::new(1), QuizOrigin::Remote).unwrap_err();
        assert_eq!(err, ValidationError::CorrectIndexOutOfRange { index: 3, len: 3 });
    }

    #[test]
    fn rejects_single_option() {
        let mut d = draft();
        d.options.truncate(1);
        d.correct_index = 0;
        assert!(matches!(
            d.validate(QuizId::new(1), QuizOrigin::Remote),
            Err(ValidationError::TooFewOptions(1))
        ));
    }

    #[test]
    fn grade_checks_range_and_equality() {
        let quiz = draft().validate(QuizId::new(1), QuizOrigin::Remote).unwrap();
        assert!(quiz.grade(1).unwrap());
        assert!(!quiz.grade(0).unwrap());
        assert!(matches!(quiz.grade(9), Err(ValidationError::InvalidOption { .. })));
        assert_eq!(quiz.correct_option(), "Stack");
    }

    #[test]
    fn deserializing_revalidates_the_quiz() {
        let quiz = draft().validate(QuizId::new(7), QuizOrigin::Remote).unwrap();
        let json = serde_json::to_string(&quiz).unwrap();
        let back: Quiz = serde_json::from_str(&json).unwrap();
        assert_eq!(back, quiz);

        let broken = r#"{"id": 1, "question": "Pick one", "options": ["only"],
            "correct_index": 4, "origin": "remote"}"#;
        assert!(serde_json::from_str::<Quiz>(broken).is_err());

        let out_of_range = r#"{"id": 1, "question": "Pick one", "options": ["a", "b"],
            "correct_index": 4, "origin": "remote"}"#;
        let err = serde_json::from_str::<Quiz>(out_of_range).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn accuracy_is_zero_without_quizzes() {
        let mut score = QuizScore::default();
        assert_eq!(score.accuracy(), 0.0);
        score.record(true);
        score.record(false);
        assert_eq!(score.correct(), 1);
        assert_eq!(score.total(), 2);
        assert!((score.accuracy() - 0.5).abs() < f64::EPSILON);
    }
}
