use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::info;

use remote::{PersistenceService, Remote};
use tutor_core::model::{
    Bookmark, BookmarkId, Message, MessageId, NewBookmark, PauseId, QuizScore, SentimentReading,
    SessionState, SpacedRepetitionTopic, TeachingMode, TopicId,
};
use tutor_core::policy::{KeywordQuizzes, QuizPolicy};
use tutor_core::scheduler::ReviewScheduler;
use tutor_core::{Clock, ValidationError};

use crate::config::TutorConfig;
use crate::dialogue::{DialogueController, DialogueParts, TurnOutcome};
use crate::error::TutorError;
use crate::events::{EventBus, TutorEvent};
use crate::quiz::{AnswerOutcome, QuizLifecycleManager, QuizSnapshot};
use crate::session_state::{DifficultyFeedback, SessionStateController};
use crate::spaced_repetition::SpacedRepetitionService;
use crate::transcript::Transcript;

/// Point-in-time overview of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub message_count: usize,
    pub quiz_score: u32,
    pub total_quizzes: u32,
    pub accuracy: f64,
    pub average_sentiment: f64,
    pub confused_count: u32,
    pub topic: String,
    pub state: SessionState,
}

/// Builds a `TutorSession`; every part except the remote has a default.
pub struct TutorSessionBuilder {
    remote: Remote,
    config: TutorConfig,
    clock: Clock,
    policy: Arc<dyn QuizPolicy>,
    scheduler: ReviewScheduler,
}

impl TutorSessionBuilder {
    #[must_use]
    pub fn config(mut self, config: TutorConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn quiz_policy(mut self, policy: impl QuizPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    #[must_use]
    pub fn scheduler(mut self, scheduler: ReviewScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    #[must_use]
    pub fn build(self) -> TutorSession {
        let Self {
            remote,
            config,
            clock,
            policy,
            scheduler,
        } = self;

        let events = EventBus::new(config.event_capacity);
        let transcript = Transcript::new(events.clone());
        let state = Arc::new(SessionStateController::new(
            Arc::clone(&remote.persistence),
            events.clone(),
        ));
        let nudges = DifficultyFeedback::new(Arc::clone(&state), config.difficulty_step);

        let quizzes = QuizLifecycleManager::new(
            transcript.clone(),
            events.clone(),
            Arc::clone(&remote.dialogue),
            clock,
            config.quiz_duration_secs,
        )
        .with_difficulty_feedback(nudges.clone());

        let dialogue = DialogueController::new(
            DialogueParts {
                transcript: transcript.clone(),
                events: events.clone(),
                emotion: Arc::clone(&remote.emotion),
                dialogue: Arc::clone(&remote.dialogue),
                quizzes: quizzes.clone(),
                policy,
                clock,
            },
            config.confusion_threshold,
            config.default_topic.clone(),
            config.fallback_topic.clone(),
        )
        .with_difficulty_feedback(nudges);

        let reviews = SpacedRepetitionService::new(
            Arc::clone(&remote.persistence),
            scheduler,
            clock,
            events.clone(),
        );

        if let Some(greeting) = config.greeting.as_deref() {
            transcript.append_tutor(greeting, Some(SentimentReading::neutral()), None, clock.now());
        }

        TutorSession {
            config,
            clock,
            events,
            transcript,
            dialogue,
            quizzes,
            state,
            reviews,
            persistence: remote.persistence,
        }
    }
}

/// One learner's tutoring session: conversation, quizzes, pause/mode/
/// difficulty state and review schedule, all serialized per component.
///
/// Must be used inside a Tokio runtime; quiz countdowns are spawned tasks.
pub struct TutorSession {
    config: TutorConfig,
    clock: Clock,
    events: EventBus,
    transcript: Transcript,
    dialogue: DialogueController,
    quizzes: QuizLifecycleManager,
    state: Arc<SessionStateController>,
    reviews: SpacedRepetitionService,
    persistence: Arc<dyn PersistenceService>,
}

impl TutorSession {
    #[must_use]
    pub fn builder(remote: Remote) -> TutorSessionBuilder {
        TutorSessionBuilder {
            remote,
            config: TutorConfig::default(),
            clock: Clock::default(),
            policy: Arc::new(KeywordQuizzes),
            scheduler: ReviewScheduler::default(),
        }
    }

    #[must_use]
    pub fn new(remote: Remote, config: TutorConfig) -> Self {
        Self::builder(remote).config(config).build()
    }

    #[must_use]
    pub fn config(&self) -> &TutorConfig {
        &self.config
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TutorEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.transcript.snapshot()
    }

    #[must_use]
    pub fn dialogue(&self) -> &DialogueController {
        &self.dialogue
    }

    #[must_use]
    pub fn quizzes(&self) -> &QuizLifecycleManager {
        &self.quizzes
    }

    #[must_use]
    pub fn state(&self) -> &SessionStateController {
        &self.state
    }

    #[must_use]
    pub fn reviews(&self) -> &SpacedRepetitionService {
        &self.reviews
    }

    //
    // ─── CONVERSATION ──────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// See [`DialogueController::submit_turn`].
    pub async fn submit_turn(&self, text: &str) -> Result<TurnOutcome, TutorError> {
        Ok(self.dialogue.submit_turn(text).await?)
    }

    pub async fn set_topic(&self, topic: impl Into<String>) {
        self.dialogue.set_topic(topic).await;
    }

    //
    // ─── QUIZZES ───────────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// See [`QuizLifecycleManager::answer`].
    pub async fn answer_quiz(&self, selected: usize) -> Result<AnswerOutcome, TutorError> {
        Ok(self.quizzes.answer(selected).await?)
    }

    pub async fn reveal_hint(&self) -> Option<QuizSnapshot> {
        self.quizzes.reveal_next_hint().await?;
        self.quizzes.current().await
    }

    pub async fn dismiss_quiz(&self) {
        self.quizzes.dismiss().await;
    }

    /// # Errors
    ///
    /// See [`QuizLifecycleManager::retry`].
    pub async fn retry_quiz(&self) -> Result<QuizSnapshot, TutorError> {
        self.quizzes.retry().await?;
        self.quizzes
            .current()
            .await
            .ok_or_else(|| crate::error::QuizError::NoActiveQuiz.into())
    }

    pub async fn current_quiz(&self) -> Option<QuizSnapshot> {
        self.quizzes.current().await
    }

    //
    // ─── SESSION STATE ─────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// See [`SessionStateController::refresh`].
    pub async fn refresh_state(&self) -> Result<SessionState, TutorError> {
        Ok(self.state.refresh().await?)
    }

    /// # Errors
    ///
    /// See [`SessionStateController::pause`].
    pub async fn pause(&self, reason: Option<String>) -> Result<PauseId, TutorError> {
        Ok(self.state.pause(reason).await?)
    }

    /// # Errors
    ///
    /// See [`SessionStateController::resume`].
    pub async fn resume(&self, pause_id: PauseId) -> Result<(), TutorError> {
        Ok(self.state.resume(pause_id).await?)
    }

    /// # Errors
    ///
    /// See [`SessionStateController::set_difficulty`].
    pub async fn set_difficulty(&self, delta: f64) -> Result<f64, TutorError> {
        Ok(self.state.set_difficulty(delta).await?.value())
    }

    /// # Errors
    ///
    /// See [`SessionStateController::set_mode`].
    pub async fn set_mode(&self, mode: &str) -> Result<TeachingMode, TutorError> {
        Ok(self.state.set_mode(mode).await?)
    }

    //
    // ─── SPACED REPETITION ─────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// See [`SpacedRepetitionService::refresh`].
    pub async fn refresh_topics(&self) -> Result<usize, TutorError> {
        Ok(self.reviews.refresh().await?)
    }

    pub async fn complete_topic(
        &self,
        topic_id: TopicId,
        title: impl Into<String>,
    ) -> SpacedRepetitionTopic {
        self.reviews.complete_topic(topic_id, title).await
    }

    /// # Errors
    ///
    /// See [`SpacedRepetitionService::mark_reviewed`].
    pub async fn mark_reviewed(
        &self,
        topic_id: TopicId,
        success: bool,
    ) -> Result<SpacedRepetitionTopic, TutorError> {
        Ok(self.reviews.mark_reviewed(topic_id, success).await?)
    }

    pub async fn due_topics(&self) -> Vec<SpacedRepetitionTopic> {
        self.reviews.due_topics(self.clock.now()).await
    }

    //
    // ─── BOOKMARKS ─────────────────────────────────────────────────────────
    //

    /// Bookmark a transcript message. The message text becomes the
    /// description.
    ///
    /// # Errors
    ///
    /// - `Validation(UnknownMessage)` if the message is not in this session
    /// - `Bookmark(EmptyTitle)` for a blank title
    /// - `Remote` if the bookmark is not stored
    pub async fn bookmark_message(
        &self,
        message_id: MessageId,
        title: &str,
        tags: Vec<String>,
    ) -> Result<Bookmark, TutorError> {
        let message = self
            .transcript
            .get(message_id)
            .ok_or(ValidationError::UnknownMessage(message_id.value()))?;
        let draft = NewBookmark::new(title, message.text(), tags, Some(message_id))?;
        let bookmark = self.persistence.create_bookmark(&draft).await?;
        info!(bookmark_id = bookmark.id.value(), message_id = message_id.value(), "message bookmarked");
        Ok(bookmark)
    }

    /// # Errors
    ///
    /// Returns `Remote` if the bookmarks cannot be loaded.
    pub async fn list_bookmarks(&self) -> Result<Vec<Bookmark>, TutorError> {
        Ok(self.persistence.list_bookmarks().await?)
    }

    /// # Errors
    ///
    /// Returns `Remote` if the bookmark cannot be deleted.
    pub async fn delete_bookmark(&self, id: BookmarkId) -> Result<(), TutorError> {
        Ok(self.persistence.delete_bookmark(id).await?)
    }

    //
    // ─── SUMMARY ───────────────────────────────────────────────────────────
    //

    pub async fn summary(&self) -> SessionSummary {
        let score: QuizScore = self.quizzes.score().await;
        SessionSummary {
            message_count: self.transcript.len(),
            quiz_score: score.correct(),
            total_quizzes: score.total(),
            accuracy: score.accuracy(),
            average_sentiment: self.transcript.average_sentiment(),
            confused_count: self.dialogue.confused_count().await,
            topic: self.dialogue.topic().await,
            state: self.state.snapshot().await,
        }
    }
}

impl Drop for TutorSession {
    fn drop(&mut self) {
        self.quizzes.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remote::InMemoryBackend;
    use tutor_core::feedback;
    use tutor_core::model::Sender;
    use tutor_core::time::fixed_clock;

    fn session(config: TutorConfig) -> (TutorSession, InMemoryBackend) {
        let backend = InMemoryBackend::new().with_clock(fixed_clock());
        let session = TutorSession::builder(Remote::from_backend(backend.clone()))
            .config(config)
            .clock(fixed_clock())
            .build();
        (session, backend)
    }

    #[tokio::test]
    async fn greeting_opens_the_transcript() {
        let (session, _) = session(TutorConfig::default().with_greeting("Welcome!"));
        let messages = session.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender(), Sender::Tutor);
        assert_eq!(messages[0].sentiment().unwrap().score(), 0.0);
    }

    #[tokio::test]
    async fn empty_summary_has_zero_accuracy() {
        let (session, _) = session(TutorConfig::default());
        let summary = session.summary().await;
        assert_eq!(summary.message_count, 0);
        assert_eq!(summary.total_quizzes, 0);
        assert_eq!(summary.accuracy, 0.0);
        assert_eq!(summary.average_sentiment, 0.0);
        assert_eq!(summary.topic, "DSA");
    }

    #[tokio::test]
    async fn bookmarks_reference_transcript_messages() {
        let (session, backend) = session(TutorConfig::default().with_greeting("Hi there"));
        let greeting = session.messages()[0].id();

        let bookmark = session
            .bookmark_message(greeting, "First hello", vec!["intro".into()])
            .await
            .unwrap();
        assert_eq!(bookmark.message_id, Some(greeting));
        assert_eq!(bookmark.description, "Hi there");
        assert_eq!(backend.stored_bookmarks().len(), 1);

        let unknown = session
            .bookmark_message(MessageId::new(404), "Nope", Vec::new())
            .await
            .unwrap_err();
        assert_eq!(unknown.kind(), tutor_core::ErrorKind::Validation);

        let blank = session
            .bookmark_message(greeting, "  ", Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(blank, TutorError::Bookmark(_)));

        session.delete_bookmark(bookmark.id).await.unwrap();
        assert!(session.list_bookmarks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn canned_escalation_copy_is_used() {
        let (session, _) = session(TutorConfig::default());
        for _ in 0..3 {
            session.submit_turn("I'm stuck").await.unwrap();
        }
        let last = session.messages().pop().unwrap();
        assert_eq!(last.text(), feedback::ESCALATION_REPLY);
    }
}
