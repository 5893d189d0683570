//! Canned tutor copy for replies that never reach the generation service.

use crate::model::{EmotionCategory, Quiz, SentimentReading};

pub const ESCALATION_REPLY: &str = "It looks like this is getting tricky. Let's step back to an \
     easier topic, like Arrays. Would you prefer a simple example or a visual explanation?";

pub const SIMPLIFICATION_REPLY: &str = "No problem! Let's slow down and try a simpler \
     explanation. Arrays are ordered lists of items, for example arr = [1, 2, 3]. Want a \
     visual next, or a few more code samples?";

pub const ERROR_REPLY: &str = "Sorry, I ran into a problem. Please try again.";

pub const TIMEOUT_PREFIX: &str = "Time's up! Here's the correct answer.";

/// Sentiment attached to a correct-answer message.
pub const CORRECT_SENTIMENT: f64 = 0.5;

/// Sentiment attached to an incorrect or timed-out answer message.
pub const INCORRECT_SENTIMENT: f64 = -0.2;

/// Feedback line chosen by outcome and the learner's last observed emotion.
#[must_use]
pub fn quiz_feedback(correct: bool, emotion: EmotionCategory) -> &'static str {
    match (correct, emotion) {
        (true, EmotionCategory::Positive) => "Excellent! That confidence is paying off!",
        (true, EmotionCategory::Negative) => {
            "Great job! Hopefully that win lifts your mood a little!"
        }
        (true, EmotionCategory::Neutral) => "Correct! Well done!",
        (false, EmotionCategory::Positive) => {
            "Not this time, but that positive attitude will carry you through!"
        }
        (false, EmotionCategory::Negative) => {
            "It's okay to get it wrong. Let's work through it together!"
        }
        (false, EmotionCategory::Neutral) => "Not quite, but that's how we learn!",
    }
}

/// Sentiment stamped on a quiz-result message.
#[must_use]
pub fn result_sentiment(correct: bool) -> SentimentReading {
    if correct {
        SentimentReading::new(CORRECT_SENTIMENT, EmotionCategory::Positive)
    } else {
        SentimentReading::new(INCORRECT_SENTIMENT, EmotionCategory::Neutral)
    }
}

/// Full text of an answer message. Incorrect answers always show the
/// correct option and explanation; server feedback is appended when present.
#[must_use]
pub fn answer_message(
    quiz: &Quiz,
    correct: bool,
    emotion: EmotionCategory,
    server_feedback: Option<&str>,
) -> String {
    let mut text = quiz_feedback(correct, emotion).to_string();
    match server_feedback.map(str::trim).filter(|s| !s.is_empty()) {
        Some(feedback) => {
            text.push_str("\n\n");
            text.push_str(feedback);
        }
        None => {
            if !correct {
                text.push_str(&format!(
                    "\n\nThe correct answer is: {}",
                    quiz.correct_option()
                ));
            }
            push_explanation(&mut text, quiz);
        }
    }
    text
}

/// Text of the message surfaced when the countdown runs out.
#[must_use]
pub fn timeout_message(quiz: &Quiz) -> String {
    let mut text = format!(
        "{TIMEOUT_PREFIX}\n\nThe correct answer is: {}",
        quiz.correct_option()
    );
    push_explanation(&mut text, quiz);
    text
}

fn push_explanation(text: &mut String, quiz: &Quiz) {
    let explanation = quiz.explanation().trim();
    if !explanation.is_empty() {
        text.push_str("\n\n");
        text.push_str(explanation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{QuizDraft, QuizId, QuizOrigin};

    fn quiz() -> Quiz {
        QuizDraft {
            question: "2 + 2?".into(),
            options: vec!["3".into(), "4".into()],
            correct_index: 1,
            explanation: "Basic addition.".into(),
            ..QuizDraft::default()
        }
        .validate(QuizId::new(1), QuizOrigin::Synthesized)
        .unwrap()
    }

    #[test]
    fn six_distinct_variants() {
        let mut seen = std::collections::HashSet::new();
        for correct in [true, false] {
            for emotion in [
                EmotionCategory::Positive,
                EmotionCategory::Neutral,
                EmotionCategory::Negative,
            ] {
                seen.insert(quiz_feedback(correct, emotion));
            }
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn incorrect_answer_reveals_correct_option() {
        let text = answer_message(&quiz(), false, EmotionCategory::Neutral, None);
        assert!(text.starts_with("Not quite"));
        assert!(text.contains("The correct answer is: 4"));
        assert!(text.ends_with("Basic addition."));
    }

    #[test]
    fn server_feedback_replaces_local_explanation() {
        let text = answer_message(&quiz(), true, EmotionCategory::Positive, Some("Nice work."));
        assert_eq!(text, "Excellent! That confidence is paying off!\n\nNice work.");

        let blank = answer_message(&quiz(), true, EmotionCategory::Neutral, Some("  "));
        assert_eq!(blank, "Correct! Well done!\n\nBasic addition.");
    }

    #[test]
    fn timeout_copy_names_the_answer() {
        let text = timeout_message(&quiz());
        assert!(text.starts_with(TIMEOUT_PREFIX));
        assert!(text.contains("4"));
    }

    #[test]
    fn result_sentiment_by_outcome() {
        assert_eq!(result_sentiment(true).category(), EmotionCategory::Positive);
        assert_eq!(result_sentiment(false).score(), INCORRECT_SENTIMENT);
    }
}
