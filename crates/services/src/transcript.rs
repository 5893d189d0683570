use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use tutor_core::model::{
    EmotionCategory, Message, MessageId, QuizId, SentimentReading, average_sentiment,
};

use crate::events::{EventBus, TutorEvent};

#[derive(Default)]
struct Log {
    messages: Vec<Message>,
    next_id: u64,
}

/// Append-only message history of one session. Clones share the history.
///
/// Every append is announced as `TutorEvent::MessageAppended`.
#[derive(Clone)]
pub struct Transcript {
    log: Arc<Mutex<Log>>,
    events: EventBus,
}

impl Transcript {
    #[must_use]
    pub fn new(events: EventBus) -> Self {
        Self {
            log: Arc::new(Mutex::new(Log::default())),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Log> {
        // appends are single pushes, so a poisoned log is still consistent
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, build: impl FnOnce(MessageId) -> Message) -> Message {
        let message = {
            let mut log = self.lock();
            log.next_id += 1;
            let message = build(MessageId::new(log.next_id));
            log.messages.push(message.clone());
            message
        };
        self.events.emit(TutorEvent::MessageAppended(message.clone()));
        message
    }

    /// Learner message, sentiment still unset.
    pub fn append_user(&self, text: impl Into<String>, at: DateTime<Utc>) -> Message {
        let text = text.into();
        self.push(|id| Message::user(id, text, at))
    }

    pub fn append_tutor(
        &self,
        text: impl Into<String>,
        sentiment: Option<SentimentReading>,
        quiz: Option<QuizId>,
        at: DateTime<Utc>,
    ) -> Message {
        let text = text.into();
        self.push(|id| Message::tutor(id, text, sentiment, quiz, at))
    }

    /// Fill the sentiment slot of a message. Returns false if the message is
    /// unknown or already carries a sentiment.
    pub fn attach_sentiment(&self, id: MessageId, reading: SentimentReading) -> bool {
        let mut log = self.lock();
        log.messages
            .iter_mut()
            .find(|m| m.id() == id)
            .is_some_and(|m| m.attach_sentiment(reading))
    }

    #[must_use]
    pub fn get(&self, id: MessageId) -> Option<Message> {
        self.lock().messages.iter().find(|m| m.id() == id).cloned()
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.lock().messages.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Emotion of the most recent message; neutral when it has none.
    #[must_use]
    pub fn last_emotion(&self) -> EmotionCategory {
        self.lock()
            .messages
            .last()
            .and_then(Message::emotion)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn average_sentiment(&self) -> f64 {
        average_sentiment(&self.lock().messages)
    }
}
