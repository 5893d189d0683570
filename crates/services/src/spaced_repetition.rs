use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use remote::PersistenceService;
use tutor_core::Clock;
use tutor_core::model::{PriorityBucket, SpacedRepetitionTopic, TopicId};
use tutor_core::scheduler::ReviewScheduler;

use crate::error::ReviewError;
use crate::events::{EventBus, TutorEvent};

/// Review schedule of the learner's completed topics.
///
/// Runs on the calling request; there is no background scheduling.
pub struct SpacedRepetitionService {
    topics: Mutex<BTreeMap<TopicId, SpacedRepetitionTopic>>,
    persistence: Arc<dyn PersistenceService>,
    scheduler: ReviewScheduler,
    clock: Clock,
    events: EventBus,
}

impl SpacedRepetitionService {
    #[must_use]
    pub fn new(
        persistence: Arc<dyn PersistenceService>,
        scheduler: ReviewScheduler,
        clock: Clock,
        events: EventBus,
    ) -> Self {
        Self {
            topics: Mutex::new(BTreeMap::new()),
            persistence,
            scheduler,
            clock,
            events,
        }
    }

    /// Merge persisted topics into the local schedule. Returns how many
    /// topics were loaded.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::Remote` and keeps the local schedule on failure.
    pub async fn refresh(&self) -> Result<usize, ReviewError> {
        let mut topics = self.topics.lock().await;
        let loaded = self.persistence.spaced_repetition_topics().await?;
        let count = loaded.len();
        for topic in loaded {
            topics.insert(topic.topic_id(), topic);
        }
        debug!(count, "spaced repetition topics loaded");
        Ok(count)
    }

    /// Start scheduling a topic the first time it is completed. Completing
    /// a known topic returns its existing record unchanged.
    pub async fn complete_topic(
        &self,
        topic_id: TopicId,
        title: impl Into<String>,
    ) -> SpacedRepetitionTopic {
        let mut topics = self.topics.lock().await;
        topics
            .entry(topic_id)
            .or_insert_with(|| {
                info!(topic_id = topic_id.value(), "topic completed");
                self.scheduler
                    .first_completion(topic_id, title, self.clock.now())
            })
            .clone()
    }

    /// Record a review outcome. The new schedule is committed only after the
    /// persistence service acknowledges it. Unknown topics are created.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::Remote` and leaves the schedule unchanged if the
    /// review is not acknowledged.
    pub async fn mark_reviewed(
        &self,
        topic_id: TopicId,
        success: bool,
    ) -> Result<SpacedRepetitionTopic, ReviewError> {
        let mut topics = self.topics.lock().await;
        let now = self.clock.now();
        let current = topics.get(&topic_id).cloned().unwrap_or_else(|| {
            self.scheduler
                .first_completion(topic_id, format!("Topic {topic_id}"), now)
        });
        let reviewed = self.scheduler.apply_review(&current, success, now);
        self.persistence.record_review(topic_id, success).await?;
        topics.insert(topic_id, reviewed.clone());
        info!(
            topic_id = topic_id.value(),
            success,
            review_count = reviewed.review_count(),
            next_review_at = %reviewed.next_review_at(),
            "topic reviewed"
        );
        self.events.emit(TutorEvent::TopicReviewed(reviewed.clone()));
        Ok(reviewed)
    }

    /// Nudge a topic's 1–5 difficulty. Does not affect scheduling.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::UnknownTopic` if the topic is not scheduled.
    pub async fn adjust_difficulty(
        &self,
        topic_id: TopicId,
        delta: i32,
    ) -> Result<SpacedRepetitionTopic, ReviewError> {
        let mut topics = self.topics.lock().await;
        let topic = topics
            .get_mut(&topic_id)
            .ok_or(ReviewError::UnknownTopic(topic_id))?;
        *topic = topic.with_difficulty_delta(delta);
        Ok(topic.clone())
    }

    pub async fn get(&self, topic_id: TopicId) -> Option<SpacedRepetitionTopic> {
        self.topics.lock().await.get(&topic_id).cloned()
    }

    pub async fn topics(&self) -> Vec<SpacedRepetitionTopic> {
        self.topics.lock().await.values().cloned().collect()
    }

    pub async fn days_until_review(&self, topic_id: TopicId, now: DateTime<Utc>) -> Option<i64> {
        self.get(topic_id).await.map(|t| t.days_until_review(now))
    }

    /// Topics due at `now`, most overdue first.
    pub async fn due_topics(&self, now: DateTime<Utc>) -> Vec<SpacedRepetitionTopic> {
        let mut due: Vec<_> = self
            .topics
            .lock()
            .await
            .values()
            .filter(|t| t.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(SpacedRepetitionTopic::next_review_at);
        due
    }

    /// All topics grouped by display bucket, soonest first within a bucket.
    pub async fn bucketed(
        &self,
        now: DateTime<Utc>,
    ) -> BTreeMap<PriorityBucket, Vec<SpacedRepetitionTopic>> {
        let mut buckets: BTreeMap<PriorityBucket, Vec<SpacedRepetitionTopic>> = BTreeMap::new();
        for topic in self.topics.lock().await.values() {
            buckets.entry(topic.bucket(now)).or_default().push(topic.clone());
        }
        for topics in buckets.values_mut() {
            topics.sort_by_key(SpacedRepetitionTopic::next_review_at);
        }
        buckets
    }
}
