use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{MessageId, QuizId};

//
// ─── SENDER & EMOTION ──────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Tutor,
}

/// Categorical emotion attached to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionCategory {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl EmotionCategory {
    /// Scores within this distance of zero are neutral.
    pub const NEUTRAL_BAND: f64 = 0.05;

    /// Derive a category from a scalar sentiment score.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score > Self::NEUTRAL_BAND {
            Self::Positive
        } else if score < -Self::NEUTRAL_BAND {
            Self::Negative
        } else {
            Self::Neutral
        }
    }

    /// Lenient parse for labels coming off the wire. Unknown labels are neutral.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "positive" => Self::Positive,
            "negative" => Self::Negative,
            _ => Self::Neutral,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }
}

/// A sentiment score clamped to `[-1, 1]` together with its category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentReading {
    score: f64,
    category: EmotionCategory,
}

impl SentimentReading {
    /// Non-finite scores are treated as neutral zero.
    #[must_use]
    pub fn new(score: f64, category: EmotionCategory) -> Self {
        let score = if score.is_finite() {
            score.clamp(-1.0, 1.0)
        } else {
            0.0
        };
        Self { score, category }
    }

    #[must_use]
    pub fn from_score(score: f64) -> Self {
        Self::new(score, EmotionCategory::from_score(score))
    }

    #[must_use]
    pub fn neutral() -> Self {
        Self::new(0.0, EmotionCategory::Neutral)
    }

    #[must_use]
    pub fn score(&self) -> f64 {
        self.score
    }

    #[must_use]
    pub fn category(&self) -> EmotionCategory {
        self.category
    }
}

//
// ─── MESSAGE ───────────────────────────────────────────────────────────────────
//

/// One entry in a session transcript.
///
/// Messages are immutable once appended. The only exception is the sentiment
/// slot of a user message, which starts empty and may be filled exactly once
/// when the emotion service answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    sender: Sender,
    text: String,
    sentiment: Option<SentimentReading>,
    quiz: Option<QuizId>,
    timestamp: DateTime<Utc>,
}

impl Message {
    #[must_use]
    pub fn user(id: MessageId, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            sender: Sender::User,
            text: text.into(),
            sentiment: None,
            quiz: None,
            timestamp,
        }
    }

    #[must_use]
    pub fn tutor(
        id: MessageId,
        text: impl Into<String>,
        sentiment: Option<SentimentReading>,
        quiz: Option<QuizId>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            sender: Sender::Tutor,
            text: text.into(),
            sentiment,
            quiz,
            timestamp,
        }
    }

    #[must_use]
    pub fn id(&self) -> MessageId {
        self.id
    }

    #[must_use]
    pub fn sender(&self) -> Sender {
        self.sender
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn sentiment(&self) -> Option<SentimentReading> {
        self.sentiment
    }

    #[must_use]
    pub fn emotion(&self) -> Option<EmotionCategory> {
        self.sentiment.map(|s| s.category())
    }

    #[must_use]
    pub fn quiz(&self) -> Option<QuizId> {
        self.quiz
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Fill the sentiment slot if it is still empty.
    ///
    /// Returns `false` and leaves the message untouched when a reading is
    /// already present.
    pub fn attach_sentiment(&mut self, reading: SentimentReading) -> bool {
        if self.sentiment.is_some() {
            return false;
        }
        self.sentiment = Some(reading);
        true
    }
}

/// Mean sentiment over the messages that carry one; `0.0` when none do.
#[must_use]
pub fn average_sentiment(messages: &[Message]) -> f64 {
    let (sum, count) = messages
        .iter()
        .filter_map(Message::sentiment)
        .fold((0.0_f64, 0_u32), |(sum, count), s| (sum + s.score(), count + 1));
    if count == 0 {
        0.0
    } else {
        sum / f64::from(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn category_from_score_uses_neutral_band() {
        assert_eq!(EmotionCategory::from_score(0.3), EmotionCategory::Positive);
        assert_eq!(EmotionCategory::from_score(-0.3), EmotionCategory::Negative);
        assert_eq!(EmotionCategory::from_score(0.01), EmotionCategory::Neutral);
    }

    #[test]
    fn unknown_labels_are_neutral() {
        assert_eq!(EmotionCategory::from_label("POSITIVE"), EmotionCategory::Positive);
        assert_eq!(EmotionCategory::from_label("anxious"), EmotionCategory::Neutral);
    }

    #[test]
    fn reading_clamps_score() {
        assert_eq!(SentimentReading::from_score(3.0).score(), 1.0);
        assert_eq!(SentimentReading::from_score(f64::NAN).score(), 0.0);
    }

    #[test]
    fn sentiment_can_only_be_attached_once() {
        let mut msg = Message::user(MessageId::new(0), "hello", fixed_now());
        assert!(msg.attach_sentiment(SentimentReading::from_score(0.4)));
        assert!(!msg.attach_sentiment(SentimentReading::from_score(-0.9)));
        assert_eq!(msg.sentiment().unwrap().score(), 0.4);
    }

    #[test]
    fn average_ignores_messages_without_sentiment() {
        let now = fixed_now();
        let msgs = vec![
            Message::user(MessageId::new(0), "a", now),
            Message::tutor(MessageId::new(1), "b", Some(SentimentReading::from_score(0.5)), None, now),
            Message::tutor(MessageId::new(2), "c", Some(SentimentReading::from_score(-0.1)), None, now),
        ];
        assert!((average_sentiment(&msgs) - 0.2).abs() < 1e-9);
        assert_eq!(average_sentiment(&msgs[..1]), 0.0);
        assert_eq!(average_sentiment(&[]), 0.0);
    }
}
