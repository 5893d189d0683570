use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use reqwest::StatusCode;

use tutor_core::Clock;
use tutor_core::model::{
    Bookmark, BookmarkId, Difficulty, EmotionCategory, NewBookmark, Pause, PauseId, QuizId,
    SentimentReading, SessionState, SpacedRepetitionTopic, TeachingMode, TopicId,
};
use tutor_core::scheduler::ReviewScheduler;

use crate::contracts::{
    ChatPrompt, ChatReply, DialogueService, EmotionService, PersistenceService, RemoteQuiz,
};
use crate::error::RemoteError;

/// Remote operations, used to script failures and inspect traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Sentiment,
    Chat,
    QuizFeedback,
    SessionState,
    Pause,
    Resume,
    UpdateDifficulty,
    UpdateMode,
    Topics,
    Review,
    CreateBookmark,
    ListBookmarks,
    DeleteBookmark,
}

/// How a scripted endpoint fails until recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Unavailable,
    AuthExpired,
}

impl Failure {
    fn to_error(self, endpoint: Endpoint) -> RemoteError {
        match self {
            Self::Unavailable => RemoteError::Unavailable(format!("{endpoint:?} is offline")),
            Self::AuthExpired => RemoteError::AuthExpired(StatusCode::UNAUTHORIZED),
        }
    }
}

/// Most recent calls kept by [`InMemoryBackend::calls`]. Per-endpoint counts
/// are kept for the whole lifetime.
pub const CALL_LOG_CAPACITY: usize = 256;

#[derive(Default)]
struct MemoryState {
    calls: VecDeque<Endpoint>,
    call_counts: HashMap<Endpoint, usize>,
    failures: HashMap<Endpoint, Failure>,
    replies: VecDeque<ChatReply>,
    sentiment: f64,
    feedback: HashMap<QuizId, String>,
    session: SessionState,
    next_pause_id: u64,
    topics: BTreeMap<TopicId, SpacedRepetitionTopic>,
    bookmarks: Vec<Bookmark>,
    next_bookmark_id: u64,
}

/// Scripted in-process stand-in for the tutoring backend, for tests and
/// prototyping. Clones share state.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<MemoryState>>,
    clock: Clock,
    scheduler: Arc<ReviewScheduler>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, RemoteError> {
        self.state
            .lock()
            .map_err(|e| RemoteError::Unavailable(e.to_string()))
    }

    /// Record the call and apply any scripted failure.
    fn enter(&self, endpoint: Endpoint) -> Result<MutexGuard<'_, MemoryState>, RemoteError> {
        let mut guard = self.lock()?;
        if guard.calls.len() == CALL_LOG_CAPACITY {
            guard.calls.pop_front();
        }
        guard.calls.push_back(endpoint);
        *guard.call_counts.entry(endpoint).or_default() += 1;
        if let Some(failure) = guard.failures.get(&endpoint).copied() {
            return Err(failure.to_error(endpoint));
        }
        Ok(guard)
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MemoryState) -> T) -> T {
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut guard)
    }

    //
    // ─── SCRIPTING ─────────────────────────────────────────────────────────
    //

    /// Queue a reply for the next `generate` call.
    pub fn push_reply(&self, reply: ChatReply) {
        self.with_state(|s| s.replies.push_back(reply));
    }

    /// Queue a plain neutral reply with no quiz.
    pub fn push_text_reply(&self, text: impl Into<String>) {
        self.push_reply(ChatReply {
            text: text.into(),
            sentiment: SentimentReading::neutral(),
            quiz: None,
            should_generate_quiz: false,
        });
    }

    /// Queue a reply carrying a quiz the server wants presented.
    pub fn push_quiz_reply(&self, text: impl Into<String>, quiz: RemoteQuiz) {
        self.push_reply(ChatReply {
            text: text.into(),
            sentiment: SentimentReading::new(0.2, EmotionCategory::Positive),
            quiz: Some(quiz),
            should_generate_quiz: true,
        });
    }

    /// Score returned by every sentiment call from now on.
    pub fn set_sentiment(&self, score: f64) {
        self.with_state(|s| s.sentiment = score);
    }

    pub fn set_quiz_feedback(&self, quiz_id: QuizId, feedback: impl Into<String>) {
        let feedback = feedback.into();
        self.with_state(|s| s.feedback.insert(quiz_id, feedback));
    }

    pub fn fail(&self, endpoint: Endpoint, failure: Failure) {
        self.with_state(|s| s.failures.insert(endpoint, failure));
    }

    pub fn recover(&self, endpoint: Endpoint) {
        self.with_state(|s| s.failures.remove(&endpoint));
    }

    pub fn recover_all(&self) {
        self.with_state(|s| s.failures.clear());
    }

    pub fn seed_topic(&self, topic: SpacedRepetitionTopic) {
        self.with_state(|s| s.topics.insert(topic.topic_id(), topic));
    }

    pub fn seed_session_state(&self, state: SessionState) {
        self.with_state(|s| s.session = state);
    }

    //
    // ─── INSPECTION ────────────────────────────────────────────────────────
    //

    /// The most recent calls, oldest first, up to [`CALL_LOG_CAPACITY`].
    #[must_use]
    pub fn calls(&self) -> Vec<Endpoint> {
        self.with_state(|s| s.calls.iter().copied().collect())
    }

    #[must_use]
    pub fn call_count(&self, endpoint: Endpoint) -> usize {
        self.with_state(|s| s.call_counts.get(&endpoint).copied().unwrap_or(0))
    }

    #[must_use]
    pub fn session_state_snapshot(&self) -> SessionState {
        self.with_state(|s| s.session.clone())
    }

    #[must_use]
    pub fn topic(&self, id: TopicId) -> Option<SpacedRepetitionTopic> {
        self.with_state(|s| s.topics.get(&id).cloned())
    }

    #[must_use]
    pub fn stored_bookmarks(&self) -> Vec<Bookmark> {
        self.with_state(|s| s.bookmarks.clone())
    }
}

#[async_trait]
impl EmotionService for InMemoryBackend {
    async fn analyze(&self, _text: &str) -> Result<SentimentReading, RemoteError> {
        let state = self.enter(Endpoint::Sentiment)?;
        Ok(SentimentReading::from_score(state.sentiment))
    }
}

#[async_trait]
impl DialogueService for InMemoryBackend {
    async fn generate(&self, prompt: &ChatPrompt) -> Result<ChatReply, RemoteError> {
        let mut state = self.enter(Endpoint::Chat)?;
        Ok(state.replies.pop_front().unwrap_or_else(|| ChatReply {
            text: format!("Let's keep going with {}.", prompt.topic),
            sentiment: SentimentReading::neutral(),
            quiz: None,
            should_generate_quiz: false,
        }))
    }

    async fn quiz_feedback(
        &self,
        quiz_id: QuizId,
        _selected: usize,
    ) -> Result<String, RemoteError> {
        let state = self.enter(Endpoint::QuizFeedback)?;
        state
            .feedback
            .get(&quiz_id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("feedback for {quiz_id}")))
    }
}

#[async_trait]
impl PersistenceService for InMemoryBackend {
    async fn session_state(&self) -> Result<SessionState, RemoteError> {
        let state = self.enter(Endpoint::SessionState)?;
        Ok(state.session.clone())
    }

    async fn pause_session(&self, reason: Option<&str>) -> Result<PauseId, RemoteError> {
        let mut state = self.enter(Endpoint::Pause)?;
        state.next_pause_id += 1;
        let id = PauseId::new(state.next_pause_id);
        // the server records every pause without checking for an open one
        let pause = Pause {
            id,
            reason: reason.map(str::to_string),
        };
        state.session = SessionState::new(
            Some(pause),
            state.session.mode(),
            state.session.difficulty(),
        );
        Ok(id)
    }

    async fn resume_session(&self, pause_id: PauseId) -> Result<(), RemoteError> {
        let mut state = self.enter(Endpoint::Resume)?;
        if pause_id.value() == 0 || pause_id.value() > state.next_pause_id {
            return Err(RemoteError::NotFound(format!("pause {pause_id}")));
        }
        if let Ok(resumed) = state.session.resumed(pause_id) {
            state.session = resumed;
        }
        Ok(())
    }

    async fn update_difficulty(&self, difficulty: Difficulty) -> Result<(), RemoteError> {
        let mut state = self.enter(Endpoint::UpdateDifficulty)?;
        state.session = state.session.with_difficulty(difficulty);
        Ok(())
    }

    async fn update_mode(&self, mode: TeachingMode) -> Result<(), RemoteError> {
        let mut state = self.enter(Endpoint::UpdateMode)?;
        state.session = state.session.with_mode(mode);
        Ok(())
    }

    async fn spaced_repetition_topics(&self) -> Result<Vec<SpacedRepetitionTopic>, RemoteError> {
        let state = self.enter(Endpoint::Topics)?;
        Ok(state.topics.values().cloned().collect())
    }

    async fn record_review(&self, topic_id: TopicId, success: bool) -> Result<(), RemoteError> {
        let mut state = self.enter(Endpoint::Review)?;
        let now = self.clock.now();
        let current = state.topics.get(&topic_id).cloned().unwrap_or_else(|| {
            self.scheduler
                .first_completion(topic_id, format!("Topic {topic_id}"), now)
        });
        let reviewed = self.scheduler.apply_review(&current, success, now);
        state.topics.insert(topic_id, reviewed);
        Ok(())
    }

    async fn create_bookmark(&self, bookmark: &NewBookmark) -> Result<Bookmark, RemoteError> {
        let mut state = self.enter(Endpoint::CreateBookmark)?;
        state.next_bookmark_id += 1;
        let created = bookmark
            .clone()
            .assign_id(BookmarkId::new(state.next_bookmark_id), self.clock.now());
        state.bookmarks.push(created.clone());
        Ok(created)
    }

    async fn list_bookmarks(&self) -> Result<Vec<Bookmark>, RemoteError> {
        let state = self.enter(Endpoint::ListBookmarks)?;
        let mut bookmarks = state.bookmarks.clone();
        bookmarks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(bookmarks)
    }

    async fn delete_bookmark(&self, id: BookmarkId) -> Result<(), RemoteError> {
        let mut state = self.enter(Endpoint::DeleteBookmark)?;
        let before = state.bookmarks.len();
        state.bookmarks.retain(|b| b.id != id);
        if state.bookmarks.len() == before {
            return Err(RemoteError::NotFound(format!("bookmark {id}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutor_core::time::{fixed_clock, fixed_now};

    #[tokio::test]
    async fn scripted_failure_is_recorded_and_recoverable() {
        let backend = InMemoryBackend::new();
        backend.fail(Endpoint::Sentiment, Failure::Unavailable);

        let err = backend.analyze("hello").await.unwrap_err();
        assert!(matches!(err, RemoteError::Unavailable(_)));

        backend.recover(Endpoint::Sentiment);
        backend.set_sentiment(0.8);
        let reading = backend.analyze("hello").await.unwrap();
        assert_eq!(reading.category(), EmotionCategory::Positive);
        assert_eq!(backend.call_count(Endpoint::Sentiment), 2);
    }

    #[tokio::test]
    async fn call_log_is_bounded_but_counts_are_exact() {
        let backend = InMemoryBackend::new();
        for _ in 0..CALL_LOG_CAPACITY + 10 {
            backend.analyze("hi").await.unwrap();
        }
        backend.session_state().await.unwrap();

        let calls = backend.calls();
        assert_eq!(calls.len(), CALL_LOG_CAPACITY);
        assert_eq!(calls.last(), Some(&Endpoint::SessionState));
        assert_eq!(backend.call_count(Endpoint::Sentiment), CALL_LOG_CAPACITY + 10);
        assert_eq!(backend.call_count(Endpoint::SessionState), 1);
        assert_eq!(backend.call_count(Endpoint::Chat), 0);
    }

    #[tokio::test]
    async fn replies_are_served_in_order_then_echo_topic() {
        let backend = InMemoryBackend::new();
        backend.push_text_reply("first");
        let prompt = ChatPrompt {
            message: "hi".into(),
            topic: "Graphs".into(),
        };
        assert_eq!(backend.generate(&prompt).await.unwrap().text, "first");
        assert!(backend.generate(&prompt).await.unwrap().text.contains("Graphs"));
    }

    #[tokio::test]
    async fn pause_and_resume_track_ids() {
        let backend = InMemoryBackend::new();
        let id = backend.pause_session(Some("tea")).await.unwrap();
        assert_eq!(backend.session_state_snapshot().pause_id(), Some(id));

        let stale = PauseId::new(id.value() + 5);
        assert!(matches!(
            backend.resume_session(stale).await,
            Err(RemoteError::NotFound(_))
        ));
        backend.resume_session(id).await.unwrap();
        assert!(!backend.session_state_snapshot().is_paused());
    }

    #[tokio::test]
    async fn review_creates_unknown_topics() {
        let backend = InMemoryBackend::new().with_clock(fixed_clock());
        backend.record_review(TopicId::new(5), true).await.unwrap();

        let topic = backend.topic(TopicId::new(5)).unwrap();
        assert_eq!(topic.review_count(), 1);
        assert_eq!(topic.days_until_review(fixed_now()), 2);
    }

    #[tokio::test]
    async fn bookmarks_list_newest_first_and_delete() {
        let backend = InMemoryBackend::new().with_clock(fixed_clock());
        let first = backend
            .create_bookmark(&NewBookmark::new("one", "", Vec::new(), None).unwrap())
            .await
            .unwrap();
        let second = backend
            .create_bookmark(&NewBookmark::new("two", "", Vec::new(), None).unwrap())
            .await
            .unwrap();

        let listed = backend.list_bookmarks().await.unwrap();
        assert_eq!(listed[0].id, second.id);

        backend.delete_bookmark(first.id).await.unwrap();
        assert!(matches!(
            backend.delete_bookmark(first.id).await,
            Err(RemoteError::NotFound(_))
        ));
        assert_eq!(backend.stored_bookmarks().len(), 1);
    }
}
