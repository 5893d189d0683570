use std::fmt;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::model::{SpacedRepetitionTopic, TopicId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("interval growth base must be finite and >= 1, got {provided}")]
    InvalidBase { provided: f64 },
    #[error("maximum interval must be at least 1 day")]
    InvalidMaxDays,
}

//
// ─── INTERVAL STRATEGY ─────────────────────────────────────────────────────────
//

/// Decides how far out the next review goes.
///
/// `review_count` is the count *including* the review being recorded.
/// Implementations must be non-decreasing in `review_count` for successful
/// reviews. The scheduler never lets a failure land later than a success
/// with the same count would.
pub trait IntervalStrategy: Send + Sync {
    fn interval_days(&self, review_count: u32, success: bool) -> u32;
}

/// `base^review_count` days on success, capped, and a fixed short interval
/// after a failure.
///
/// # Examples
///
/// ```
/// # use tutor_core::scheduler::{ExponentialInterval, IntervalStrategy};
/// let doubling = ExponentialInterval::doubling();
/// assert_eq!(doubling.interval_days(1, true), 2);
/// assert_eq!(doubling.interval_days(3, true), 8);
/// assert_eq!(doubling.interval_days(3, false), 1);
/// assert_eq!(doubling.interval_days(20, true), 365);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialInterval {
    base: f64,
    max_days: u32,
    failure_days: u32,
}

impl ExponentialInterval {
    /// # Errors
    ///
    /// - `InvalidBase` if `base` is below 1 or not finite
    /// - `InvalidMaxDays` if `max_days` is zero
    pub fn new(base: f64, max_days: u32, failure_days: u32) -> Result<Self, SchedulerError> {
        if !base.is_finite() || base < 1.0 {
            return Err(SchedulerError::InvalidBase { provided: base });
        }
        if max_days == 0 {
            return Err(SchedulerError::InvalidMaxDays);
        }
        Ok(Self {
            base,
            max_days,
            failure_days: failure_days.min(max_days),
        })
    }

    /// Doubling intervals capped at a year, one day after a failure.
    #[must_use]
    pub fn doubling() -> Self {
        Self {
            base: 2.0,
            max_days: 365,
            failure_days: 1,
        }
    }
}

impl Default for ExponentialInterval {
    fn default() -> Self {
        Self::doubling()
    }
}

impl IntervalStrategy for ExponentialInterval {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn interval_days(&self, review_count: u32, success: bool) -> u32 {
        if !success {
            return self.failure_days;
        }
        let exponent = i32::try_from(review_count).unwrap_or(i32::MAX);
        let days = self.base.powi(exponent).min(f64::from(self.max_days));
        // bounded by max_days above
        days.round() as u32
    }
}

//
// ─── SCHEDULER ─────────────────────────────────────────────────────────────────
//

/// Applies review outcomes to topics using a pluggable interval strategy.
pub struct ReviewScheduler {
    strategy: Box<dyn IntervalStrategy>,
    first_review_days: u32,
}

impl fmt::Debug for ReviewScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviewScheduler")
            .field("first_review_days", &self.first_review_days)
            .finish_non_exhaustive()
    }
}

impl Default for ReviewScheduler {
    fn default() -> Self {
        Self::new(ExponentialInterval::doubling())
    }
}

impl ReviewScheduler {
    #[must_use]
    pub fn new(strategy: impl IntervalStrategy + 'static) -> Self {
        Self {
            strategy: Box::new(strategy),
            first_review_days: 1,
        }
    }

    /// Days between first completing a topic and its first review.
    #[must_use]
    pub fn with_first_review_days(mut self, days: u32) -> Self {
        self.first_review_days = days;
        self
    }

    /// Record for a topic that was just completed for the first time.
    #[must_use]
    pub fn first_completion(
        &self,
        topic_id: TopicId,
        title: impl Into<String>,
        completed_at: DateTime<Utc>,
    ) -> SpacedRepetitionTopic {
        let next = completed_at + Duration::days(i64::from(self.first_review_days));
        SpacedRepetitionTopic::new(topic_id, title, next)
    }

    /// Interval in days for the review being recorded.
    #[must_use]
    pub fn interval_days(&self, review_count: u32, success: bool) -> u32 {
        let on_success = self.strategy.interval_days(review_count, true);
        if success {
            on_success
        } else {
            self.strategy.interval_days(review_count, false).min(on_success)
        }
    }

    /// Apply one review outcome and return the rescheduled topic.
    #[must_use]
    pub fn apply_review(
        &self,
        topic: &SpacedRepetitionTopic,
        success: bool,
        reviewed_at: DateTime<Utc>,
    ) -> SpacedRepetitionTopic {
        let review_count = topic.review_count().saturating_add(1);
        let days = self.interval_days(review_count, success);
        topic.reviewed(success, reviewed_at + Duration::days(i64::from(days)))
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    struct Backwards;

    impl IntervalStrategy for Backwards {
        fn interval_days(&self, _review_count: u32, success: bool) -> u32 {
            if success { 2 } else { 30 }
        }
    }

    fn topic() -> SpacedRepetitionTopic {
        SpacedRepetitionTopic::new(TopicId::new(1), "Arrays", fixed_now())
    }

    #[test]
    fn success_pushes_further_than_failure() {
        let s = ReviewScheduler::default();
        let now = fixed_now();
        let ok = s.apply_review(&topic(), true, now);
        let fail = s.apply_review(&topic(), false, now);

        assert_eq!(ok.review_count(), 1);
        assert_eq!(ok.success_rate(), 1.0);
        assert_eq!(fail.review_count(), 1);
        assert_eq!(fail.success_rate(), 0.0);
        assert!(ok.next_review_at() > fail.next_review_at());
    }

    #[test]
    fn doubling_is_monotonic_in_review_count() {
        let s = ReviewScheduler::default();
        let mut previous = 0;
        for count in 1..=12 {
            let days = s.interval_days(count, true);
            assert!(days >= previous);
            previous = days;
        }
        assert_eq!(previous, 365);
    }

    #[test]
    fn failure_never_lands_after_success() {
        let s = ReviewScheduler::new(Backwards);
        assert_eq!(s.interval_days(3, false), 2);
    }

    #[test]
    fn first_completion_is_due_next_day() {
        let s = ReviewScheduler::default();
        let t = s.first_completion(TopicId::new(4), "Graphs", fixed_now());
        assert_eq!(t.review_count(), 0);
        assert_eq!(t.days_until_review(fixed_now()), 1);
    }

    #[test]
    fn exponential_rejects_invalid_parameters() {
        assert!(matches!(
            ExponentialInterval::new(0.5, 10, 1),
            Err(SchedulerError::InvalidBase { .. })
        ));
        assert!(matches!(
            ExponentialInterval::new(2.0, 0, 1),
            Err(SchedulerError::InvalidMaxDays)
        ));
        let custom = ExponentialInterval::new(3.0, 30, 5).unwrap();
        assert_eq!(custom.interval_days(2, true), 9);
        assert_eq!(custom.interval_days(4, true), 30);
        assert_eq!(custom.interval_days(4, false), 5);
    }
}
