#![forbid(unsafe_code)]

pub mod config;
pub mod dialogue;
pub mod error;
pub mod events;
pub mod quiz;
pub mod session;
pub mod session_state;
pub mod spaced_repetition;
pub mod transcript;

pub use tutor_core::Clock;

pub use config::TutorConfig;
pub use dialogue::{DialogueController, DialogueParts, TurnOutcome};
pub use error::{DialogueError, QuizError, ReviewError, SessionControlError, TutorError};
pub use events::{EventBus, TutorEvent};
pub use quiz::{AnswerOutcome, QuizLifecycleManager, QuizSnapshot};
pub use session::{SessionSummary, TutorSession, TutorSessionBuilder};
pub use session_state::{DifficultyFeedback, SessionStateController};
pub use spaced_repetition::SpacedRepetitionService;
pub use transcript::Transcript;
