//! Wire shapes of the remote API and their mapping into domain types.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use tutor_core::model::{
    Bookmark, BookmarkId, Difficulty, DifficultyLevel, EmotionCategory, MessageId, NewBookmark,
    Pause, PauseId, QuizDraft, QuizId, SentimentReading, SessionState, SpacedRepetitionTopic,
    TeachingMode, TopicId,
};

use crate::contracts::{ChatPrompt, ChatReply, RemoteQuiz};
use crate::error::RemoteError;

/// Parse a server timestamp. Naive timestamps are taken as UTC.
///
/// # Errors
///
/// Returns `RemoteError::Decode` if the value is neither RFC 3339 nor a naive
/// ISO 8601 datetime.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RemoteError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|e| RemoteError::Decode(format!("timestamp {raw:?}: {e}")))
}

//
// ─── SENTIMENT ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize)]
pub struct SentimentRequest<'a> {
    pub message: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct SentimentRecord {
    pub sentiment: f64,
}

impl SentimentRecord {
    #[must_use]
    pub fn into_reading(self) -> SentimentReading {
        SentimentReading::from_score(self.sentiment)
    }
}

//
// ─── CHAT ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub message: &'a str,
    pub topic: &'a str,
}

impl<'a> From<&'a ChatPrompt> for ChatRequest<'a> {
    fn from(prompt: &'a ChatPrompt) -> Self {
        Self {
            message: &prompt.message,
            topic: &prompt.topic,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuizRecord {
    pub id: u64,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub hints: Vec<String>,
}

impl QuizRecord {
    #[must_use]
    pub fn into_remote_quiz(self) -> RemoteQuiz {
        RemoteQuiz {
            id: QuizId::new(self.id),
            draft: QuizDraft {
                question: self.question,
                options: self.options,
                correct_index: self.correct_answer,
                explanation: self.explanation,
                difficulty: self.difficulty,
                topic: self.topic,
                hints: self.hints,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatReplyRecord {
    pub response: String,
    #[serde(default)]
    pub sentiment_score: f64,
    #[serde(default)]
    pub emotion_category: Option<String>,
    #[serde(default)]
    pub quiz: Option<QuizRecord>,
    #[serde(default)]
    pub should_generate_quiz: bool,
}

impl ChatReplyRecord {
    /// The category label wins over the score when the server sends one.
    #[must_use]
    pub fn into_reply(self) -> ChatReply {
        let category = self
            .emotion_category
            .as_deref()
            .map_or_else(|| EmotionCategory::from_score(self.sentiment_score), EmotionCategory::from_label);
        ChatReply {
            text: self.response,
            sentiment: SentimentReading::new(self.sentiment_score, category),
            quiz: self.quiz.map(QuizRecord::into_remote_quiz),
            should_generate_quiz: self.should_generate_quiz,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuizAnswerRequest {
    pub quiz_id: u64,
    pub selected_option: usize,
}

#[derive(Debug, Deserialize)]
pub struct QuizFeedbackRecord {
    pub feedback: String,
}

//
// ─── SESSION STATE ─────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStateRecord {
    #[serde(default)]
    pub is_paused: bool,
    #[serde(default)]
    pub pause_reason: Option<String>,
    #[serde(default)]
    pub pause_id: Option<u64>,
    #[serde(default)]
    pub current_mode: Option<String>,
    #[serde(default)]
    pub current_difficulty: Option<f64>,
}

impl SessionStateRecord {
    /// Missing mode and difficulty fall back to the defaults.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Decode` for an unknown mode, or a paused state
    /// without a pause id.
    pub fn into_state(self) -> Result<SessionState, RemoteError> {
        let pause = match (self.is_paused, self.pause_id) {
            (false, _) => None,
            (true, Some(id)) => Some(Pause {
                id: PauseId::new(id),
                reason: self.pause_reason.filter(|r| !r.is_empty()),
            }),
            (true, None) => {
                return Err(RemoteError::Decode("paused state without pauseId".into()));
            }
        };
        let mode = match self.current_mode.as_deref() {
            Some(raw) => raw
                .parse::<TeachingMode>()
                .map_err(|e| RemoteError::Decode(e.to_string()))?,
            None => TeachingMode::default(),
        };
        let difficulty = self
            .current_difficulty
            .map_or(Difficulty::default(), Difficulty::new);
        Ok(SessionState::new(pause, mode, difficulty))
    }
}

#[derive(Debug, Serialize)]
pub struct PauseRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct PauseRecord {
    pub pause_id: u64,
}

#[derive(Debug, Serialize)]
pub struct DifficultyRequest {
    pub difficulty: f64,
}

#[derive(Debug, Serialize)]
pub struct ModeRequest {
    pub mode: &'static str,
}

//
// ─── SPACED REPETITION ─────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Deserialize)]
pub struct TopicRecord {
    pub topic_id: u64,
    pub topic_title: String,
    pub next_review: String,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub success_rate: f64,
    #[serde(default = "default_difficulty_level")]
    pub difficulty_level: i64,
}

fn default_difficulty_level() -> i64 {
    i64::from(DifficultyLevel::DEFAULT.value())
}

impl TopicRecord {
    /// # Errors
    ///
    /// Returns `RemoteError::Decode` for a bad timestamp or success rate.
    pub fn into_topic(self) -> Result<SpacedRepetitionTopic, RemoteError> {
        let next_review_at = parse_timestamp(&self.next_review)?;
        SpacedRepetitionTopic::from_persisted(
            TopicId::new(self.topic_id),
            self.topic_title,
            next_review_at,
            self.review_count,
            self.success_rate,
            DifficultyLevel::new(self.difficulty_level),
        )
        .map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct TopicListRecord {
    #[serde(default)]
    pub topics: Vec<TopicRecord>,
}

//
// ─── BOOKMARKS ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize)]
pub struct BookmarkRequest<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub tags: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<u64>,
}

impl<'a> From<&'a NewBookmark> for BookmarkRequest<'a> {
    fn from(bookmark: &'a NewBookmark) -> Self {
        Self {
            title: bookmark.title(),
            description: bookmark.description(),
            tags: bookmark.tags(),
            message_id: bookmark.message_id().map(|id| id.value()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookmarkRecord {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub message_id: Option<u64>,
    pub created_at: String,
}

impl BookmarkRecord {
    /// # Errors
    ///
    /// Returns `RemoteError::Decode` for a bad timestamp.
    pub fn into_bookmark(self) -> Result<Bookmark, RemoteError> {
        Ok(Bookmark {
            id: BookmarkId::new(self.id),
            title: self.title,
            description: self.description.unwrap_or_default(),
            tags: self.tags.into_iter().filter(|t| !t.is_empty()).collect(),
            message_id: self.message_id.map(MessageId::new),
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct BookmarkListRecord {
    #[serde(default)]
    pub bookmarks: Vec<BookmarkRecord>,
}
