use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::model::ids::TopicId;
use crate::time::days_until;

//
// ─── DIFFICULTY LEVEL ──────────────────────────────────────────────────────────
//

/// Per-topic difficulty on a 1–5 scale. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub struct DifficultyLevel(u8);

impl DifficultyLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;
    pub const DEFAULT: DifficultyLevel = DifficultyLevel(3);

    #[must_use]
    pub fn new(level: i64) -> Self {
        let clamped = level.clamp(i64::from(Self::MIN), i64::from(Self::MAX));
        // clamped to 1..=5, always fits
        Self(u8::try_from(clamped).unwrap_or(Self::MAX))
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn adjusted(self, delta: i32) -> Self {
        Self::new(i64::from(self.0) + i64::from(delta))
    }
}

impl From<i64> for DifficultyLevel {
    fn from(level: i64) -> Self {
        Self::new(level)
    }
}

impl From<DifficultyLevel> for u8 {
    fn from(level: DifficultyLevel) -> Self {
        level.0
    }
}

impl Default for DifficultyLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

//
// ─── PRIORITY BUCKET ───────────────────────────────────────────────────────────
//

/// Display grouping derived from days until the next review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityBucket {
    DueNow,
    DueSoon,
    DueThisWeek,
    Upcoming,
}

impl PriorityBucket {
    #[must_use]
    pub fn from_days(days_until_review: i64) -> Self {
        match days_until_review {
            i64::MIN..=0 => Self::DueNow,
            1 => Self::DueSoon,
            2..=3 => Self::DueThisWeek,
            _ => Self::Upcoming,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::DueNow => "due now",
            Self::DueSoon => "due soon",
            Self::DueThisWeek => "due this week",
            Self::Upcoming => "upcoming",
        }
    }
}

//
// ─── TOPIC ─────────────────────────────────────────────────────────────────────
//

/// Spaced-repetition record for one topic.
///
/// Created the first time a topic is completed and rescheduled on every
/// review; never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TopicFields")]
pub struct SpacedRepetitionTopic {
    topic_id: TopicId,
    title: String,
    next_review_at: DateTime<Utc>,
    review_count: u32,
    success_rate: f64,
    difficulty_level: DifficultyLevel,
}

#[derive(Deserialize)]
struct TopicFields {
    topic_id: TopicId,
    title: String,
    next_review_at: DateTime<Utc>,
    review_count: u32,
    success_rate: f64,
    difficulty_level: DifficultyLevel,
}

impl TryFrom<TopicFields> for SpacedRepetitionTopic {
    type Error = ValidationError;

    fn try_from(fields: TopicFields) -> Result<Self, Self::Error> {
        Self::from_persisted(
            fields.topic_id,
            fields.title,
            fields.next_review_at,
            fields.review_count,
            fields.success_rate,
            fields.difficulty_level,
        )
    }
}

impl SpacedRepetitionTopic {
    /// A freshly completed topic with no reviews yet.
    #[must_use]
    pub fn new(topic_id: TopicId, title: impl Into<String>, next_review_at: DateTime<Utc>) -> Self {
        Self {
            topic_id,
            title: title.into(),
            next_review_at,
            review_count: 0,
            success_rate: 0.0,
            difficulty_level: DifficultyLevel::DEFAULT,
        }
    }

    /// Rehydrate a topic from persisted fields.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidSuccessRate` if the rate is outside `[0, 1]`.
    pub fn from_persisted(
        topic_id: TopicId,
        title: impl Into<String>,
        next_review_at: DateTime<Utc>,
        review_count: u32,
        success_rate: f64,
        difficulty_level: DifficultyLevel,
    ) -> Result<Self, ValidationError> {
        if !(0.0..=1.0).contains(&success_rate) {
            return Err(ValidationError::InvalidSuccessRate(success_rate));
        }
        Ok(Self {
            topic_id,
            title: title.into(),
            next_review_at,
            review_count,
            success_rate,
            difficulty_level,
        })
    }

    #[must_use]
    pub fn topic_id(&self) -> TopicId {
        self.topic_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn next_review_at(&self) -> DateTime<Utc> {
        self.next_review_at
    }

    #[must_use]
    pub fn review_count(&self) -> u32 {
        self.review_count
    }

    #[must_use]
    pub fn success_rate(&self) -> f64 {
        self.success_rate
    }

    #[must_use]
    pub fn difficulty_level(&self) -> DifficultyLevel {
        self.difficulty_level
    }

    #[must_use]
    pub fn days_until_review(&self, now: DateTime<Utc>) -> i64 {
        days_until(self.next_review_at, now)
    }

    #[must_use]
    pub fn bucket(&self, now: DateTime<Utc>) -> PriorityBucket {
        PriorityBucket::from_days(self.days_until_review(now))
    }

    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_at <= now
    }

    /// Record one review outcome and set the next review time.
    ///
    /// The success rate is a running proportion over all reviews.
    #[must_use]
    pub fn reviewed(&self, success: bool, next_review_at: DateTime<Utc>) -> Self {
        let previous = f64::from(self.review_count);
        let review_count = self.review_count.saturating_add(1);
        let hit = if success { 1.0 } else { 0.0 };
        let success_rate = ((self.success_rate * previous + hit) / f64::from(review_count)).clamp(0.0, 1.0);
        Self {
            review_count,
            success_rate,
            next_review_at,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_difficulty_delta(&self, delta: i32) -> Self {
        Self {
            difficulty_level: self.difficulty_level.adjusted(delta),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    #[test]
    fn buckets_follow_days_until_review() {
        assert_eq!(PriorityBucket::from_days(-4), PriorityBucket::DueNow);
        assert_eq!(PriorityBucket::from_days(0), PriorityBucket::DueNow);
        assert_eq!(PriorityBucket::from_days(1), PriorityBucket::DueSoon);
        assert_eq!(PriorityBucket::from_days(2), PriorityBucket::DueThisWeek);
        assert_eq!(PriorityBucket::from_days(3), PriorityBucket::DueThisWeek);
        assert_eq!(PriorityBucket::from_days(4), PriorityBucket::Upcoming);
    }

    #[test]
    fn difficulty_level_clamps() {
        assert_eq!(DifficultyLevel::new(9).value(), 5);
        assert_eq!(DifficultyLevel::new(-2).value(), 1);
        assert_eq!(DifficultyLevel::new(4).adjusted(3).value(), 5);
        assert_eq!(DifficultyLevel::new(2).adjusted(-4).value(), 1);
    }

    #[test]
    fn success_rate_is_running_proportion() {
        let now = fixed_now();
        let topic = SpacedRepetitionTopic::new(TopicId::new(1), "Arrays", now);
        let t = topic.reviewed(true, now).reviewed(false, now).reviewed(true, now);
        assert_eq!(t.review_count(), 3);
        assert!((t.success_rate() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn first_successful_review_is_full_rate() {
        let now = fixed_now();
        let topic = SpacedRepetitionTopic::new(TopicId::new(1), "Arrays", now);
        let t = topic.reviewed(true, now + Duration::days(2));
        assert_eq!(t.review_count(), 1);
        assert_eq!(t.success_rate(), 1.0);
        assert_eq!(t.days_until_review(now), 2);
        assert_eq!(t.bucket(now), PriorityBucket::DueThisWeek);
    }

    #[test]
    fn deserializing_goes_through_validation() {
        let level: DifficultyLevel = serde_json::from_str("9").unwrap();
        assert_eq!(level.value(), 5);

        let topic = SpacedRepetitionTopic::new(TopicId::new(4), "Heaps", fixed_now());
        let mut json = serde_json::to_value(&topic).unwrap();
        assert_eq!(json["difficulty_level"], serde_json::json!(3));
        assert_eq!(
            serde_json::from_value::<SpacedRepetitionTopic>(json.clone()).unwrap(),
            topic
        );

        json["success_rate"] = serde_json::json!(2.5);
        assert!(serde_json::from_value::<SpacedRepetitionTopic>(json).is_err());
    }

    #[test]
    fn from_persisted_rejects_bad_rate() {
        let err = SpacedRepetitionTopic::from_persisted(
            TopicId::new(1),
            "x",
            fixed_now(),
            1,
            1.5,
            DifficultyLevel::DEFAULT,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidSuccessRate(_)));
    }
}
