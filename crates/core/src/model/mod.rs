mod attempt;
mod bookmark;
mod ids;
mod message;
mod quiz;
mod session_state;
mod topic;

pub use ids::{AttemptId, BookmarkId, MessageId, ParseIdError, PauseId, QuizId, TopicId};

pub use attempt::{AttemptError, DEFAULT_QUIZ_SECONDS, QuizAttempt, QuizPhase, Tick};
pub use bookmark::{Bookmark, BookmarkError, NewBookmark};
pub use message::{EmotionCategory, Message, Sender, SentimentReading, average_sentiment};
pub use quiz::{Quiz, QuizDraft, QuizOrigin, QuizScore};
pub use session_state::{
    Difficulty, Pause, SessionState, SessionStateError, TeachingMode,
};
pub use topic::{DifficultyLevel, PriorityBucket, SpacedRepetitionTopic};
