use std::sync::Arc;

use async_trait::async_trait;

use tutor_core::ValidationError;
use tutor_core::model::{
    Bookmark, BookmarkId, Difficulty, NewBookmark, PauseId, Quiz, QuizDraft, QuizId, QuizOrigin,
    SentimentReading, SessionState, SpacedRepetitionTopic, TeachingMode, TopicId,
};

use crate::error::RemoteError;

//
// ─── DIALOGUE TYPES ────────────────────────────────────────────────────────────
//

/// One learner turn sent to the generation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPrompt {
    pub message: String,
    pub topic: String,
}

/// A quiz as proposed by the generation service, not yet validated.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteQuiz {
    pub id: QuizId,
    pub draft: QuizDraft,
}

impl RemoteQuiz {
    /// # Errors
    ///
    /// Returns `ValidationError` if the proposed quiz is malformed.
    pub fn into_quiz(self) -> Result<Quiz, ValidationError> {
        self.draft.validate(self.id, QuizOrigin::Remote)
    }
}

/// Generated tutor reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub text: String,
    pub sentiment: SentimentReading,
    pub quiz: Option<RemoteQuiz>,
    pub should_generate_quiz: bool,
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Scores the sentiment of learner text.
#[async_trait]
pub trait EmotionService: Send + Sync {
    /// # Errors
    ///
    /// Returns `RemoteError` if the service cannot be reached or answers badly.
    async fn analyze(&self, text: &str) -> Result<SentimentReading, RemoteError>;
}

/// Generates tutor replies and grades remote quizzes.
#[async_trait]
pub trait DialogueService: Send + Sync {
    /// # Errors
    ///
    /// Returns `RemoteError` if generation fails.
    async fn generate(&self, prompt: &ChatPrompt) -> Result<ChatReply, RemoteError>;

    /// Server-side feedback for an answered quiz.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if the service cannot produce feedback.
    async fn quiz_feedback(&self, quiz_id: QuizId, selected: usize)
    -> Result<String, RemoteError>;
}

/// Durable per-user session settings, review schedule and bookmarks.
#[async_trait]
pub trait PersistenceService: Send + Sync {
    /// # Errors
    ///
    /// Returns `RemoteError` if the state cannot be loaded or decoded.
    async fn session_state(&self) -> Result<SessionState, RemoteError>;

    /// Record a pause and return its identifier.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if the pause is not acknowledged.
    async fn pause_session(&self, reason: Option<&str>) -> Result<PauseId, RemoteError>;

    /// # Errors
    ///
    /// Returns `RemoteError::NotFound` for an unknown pause, or other remote errors.
    async fn resume_session(&self, pause_id: PauseId) -> Result<(), RemoteError>;

    /// # Errors
    ///
    /// Returns `RemoteError` if the update is not acknowledged.
    async fn update_difficulty(&self, difficulty: Difficulty) -> Result<(), RemoteError>;

    /// # Errors
    ///
    /// Returns `RemoteError` if the update is not acknowledged.
    async fn update_mode(&self, mode: TeachingMode) -> Result<(), RemoteError>;

    /// # Errors
    ///
    /// Returns `RemoteError` if the topics cannot be loaded or decoded.
    async fn spaced_repetition_topics(&self) -> Result<Vec<SpacedRepetitionTopic>, RemoteError>;

    /// # Errors
    ///
    /// Returns `RemoteError` if the review is not acknowledged.
    async fn record_review(&self, topic_id: TopicId, success: bool) -> Result<(), RemoteError>;

    /// # Errors
    ///
    /// Returns `RemoteError` if the bookmark is not stored.
    async fn create_bookmark(&self, bookmark: &NewBookmark) -> Result<Bookmark, RemoteError>;

    /// Newest first.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if the bookmarks cannot be loaded or decoded.
    async fn list_bookmarks(&self) -> Result<Vec<Bookmark>, RemoteError>;

    /// # Errors
    ///
    /// Returns `RemoteError::NotFound` for an unknown bookmark, or other remote errors.
    async fn delete_bookmark(&self, id: BookmarkId) -> Result<(), RemoteError>;
}

/// The three collaborators behind trait objects, so a session can run against
/// HTTP or the in-memory backend.
#[derive(Clone)]
pub struct Remote {
    pub emotion: Arc<dyn EmotionService>,
    pub dialogue: Arc<dyn DialogueService>,
    pub persistence: Arc<dyn PersistenceService>,
}

impl Remote {
    /// Use one backend value for all three services.
    #[must_use]
    pub fn from_backend<B>(backend: B) -> Self
    where
        B: EmotionService + DialogueService + PersistenceService + 'static,
    {
        let backend = Arc::new(backend);
        let emotion: Arc<dyn EmotionService> = backend.clone();
        let dialogue: Arc<dyn DialogueService> = backend.clone();
        let persistence: Arc<dyn PersistenceService> = backend;
        Self {
            emotion,
            dialogue,
            persistence,
        }
    }
}
