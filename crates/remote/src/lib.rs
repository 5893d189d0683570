//! Contracts for the emotion, dialogue and persistence services, with an
//! HTTP adapter and an in-memory backend.

pub mod contracts;
pub mod error;
pub mod http;
pub mod memory;
pub mod records;

pub use contracts::{
    ChatPrompt, ChatReply, DialogueService, EmotionService, PersistenceService, Remote,
    RemoteQuiz,
};
pub use error::RemoteError;
pub use http::{HttpBackend, RemoteConfig};
pub use memory::{Endpoint, Failure, InMemoryBackend};
