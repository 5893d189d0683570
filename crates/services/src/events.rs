use tokio::sync::broadcast;

use tutor_core::model::{
    AttemptId, Difficulty, Message, PauseId, QuizId, SpacedRepetitionTopic, TeachingMode,
};

/// Everything observable that happens in a session.
#[derive(Debug, Clone, PartialEq)]
pub enum TutorEvent {
    MessageAppended(Message),
    QuizPresented {
        quiz_id: QuizId,
        attempt_id: AttemptId,
        time_remaining_secs: u32,
    },
    QuizTick {
        attempt_id: AttemptId,
        remaining: u32,
    },
    QuizAnswered {
        quiz_id: QuizId,
        attempt_id: AttemptId,
        selected: usize,
        correct: bool,
    },
    QuizTimedOut {
        quiz_id: QuizId,
        attempt_id: AttemptId,
    },
    QuizDismissed {
        quiz_id: QuizId,
    },
    HintRevealed {
        attempt_id: AttemptId,
        hint_index: usize,
    },
    Escalated {
        topic: String,
    },
    SessionPaused {
        pause_id: PauseId,
    },
    SessionResumed {
        pause_id: PauseId,
    },
    DifficultyChanged(Difficulty),
    ModeChanged(TeachingMode),
    TopicReviewed(SpacedRepetitionTopic),
}

/// Fan-out channel for `TutorEvent`s. Clones share the channel.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<TutorEvent>,
}

impl EventBus {
    /// A capacity of zero is treated as one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TutorEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: TutorEvent) {
        // no subscribers is fine
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_without_subscribers_is_silent() {
        let bus = EventBus::new(0);
        bus.emit(TutorEvent::Escalated {
            topic: "Arrays".into(),
        });

        let mut rx = bus.subscribe();
        bus.emit(TutorEvent::QuizDismissed {
            quiz_id: QuizId::new(2),
        });
        assert_eq!(
            rx.recv().await.unwrap(),
            TutorEvent::QuizDismissed {
                quiz_id: QuizId::new(2)
            }
        );
    }
}
