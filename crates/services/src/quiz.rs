use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, info, warn};

use remote::DialogueService;
use tutor_core::Clock;
use tutor_core::feedback;
use tutor_core::model::{
    AttemptId, Message, Quiz, QuizAttempt, QuizId, QuizOrigin, QuizScore, Tick,
};

use crate::error::QuizError;
use crate::events::{EventBus, TutorEvent};
use crate::session_state::DifficultyFeedback;
use crate::transcript::Transcript;

const TICK: Duration = Duration::from_secs(1);

struct ActiveQuiz {
    quiz: Quiz,
    attempt: QuizAttempt,
    countdown: Option<JoinHandle<()>>,
}

impl ActiveQuiz {
    fn stop_countdown(&mut self) {
        if let Some(handle) = self.countdown.take() {
            handle.abort();
        }
    }
}

#[derive(Default)]
struct QuizSlot {
    current: Option<ActiveQuiz>,
    score: QuizScore,
}

/// Read-only view of the active quiz.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizSnapshot {
    pub quiz: Quiz,
    pub attempt: QuizAttempt,
}

impl QuizSnapshot {
    /// Hint at the current index, if the quiz has hints.
    #[must_use]
    pub fn current_hint(&self) -> Option<&str> {
        self.quiz
            .hints()
            .get(self.attempt.hint_index())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerOutcome {
    pub attempt: QuizAttempt,
    pub correct: bool,
    pub message: Message,
    pub score: QuizScore,
}

/// Presents at most one quiz at a time, runs its countdown, grades answers
/// and keeps the session score. Clones share the same quiz slot.
#[derive(Clone)]
pub struct QuizLifecycleManager {
    slot: Arc<Mutex<QuizSlot>>,
    transcript: Transcript,
    events: EventBus,
    dialogue: Arc<dyn DialogueService>,
    clock: Clock,
    duration_secs: u32,
    feedback: Option<DifficultyFeedback>,
}

impl QuizLifecycleManager {
    #[must_use]
    pub fn new(
        transcript: Transcript,
        events: EventBus,
        dialogue: Arc<dyn DialogueService>,
        clock: Clock,
        duration_secs: u32,
    ) -> Self {
        Self {
            slot: Arc::new(Mutex::new(QuizSlot::default())),
            transcript,
            events,
            dialogue,
            clock,
            duration_secs,
            feedback: None,
        }
    }

    #[must_use]
    pub fn with_difficulty_feedback(mut self, feedback: DifficultyFeedback) -> Self {
        self.feedback = Some(feedback);
        self
    }

    pub async fn current(&self) -> Option<QuizSnapshot> {
        self.slot.lock().await.current.as_ref().map(|active| QuizSnapshot {
            quiz: active.quiz.clone(),
            attempt: active.attempt,
        })
    }

    pub async fn score(&self) -> QuizScore {
        self.slot.lock().await.score
    }

    /// Start a new attempt at `quiz` with a fresh countdown.
    ///
    /// A finished attempt still on screen is replaced.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::AlreadyPresented` if another attempt is still running.
    pub async fn present(&self, quiz: Quiz) -> Result<QuizAttempt, QuizError> {
        let mut slot = self.slot.lock().await;
        if let Some(active) = slot.current.as_mut() {
            if active.attempt.is_presented() {
                return Err(QuizError::AlreadyPresented(active.attempt.quiz_id()));
            }
            active.stop_countdown();
        }
        let attempt = QuizAttempt::start(&quiz, self.duration_secs, self.clock.now());
        let countdown = self.spawn_countdown(attempt.id());
        slot.current = Some(ActiveQuiz {
            quiz,
            attempt,
            countdown: Some(countdown),
        });
        self.announce(&attempt);
        Ok(attempt)
    }

    /// Begin another attempt at the current quiz after it finished.
    ///
    /// # Errors
    ///
    /// - `NoActiveQuiz` if nothing is on screen
    /// - `RetryNotAllowed` while the current attempt is still running
    pub async fn retry(&self) -> Result<QuizAttempt, QuizError> {
        let mut slot = self.slot.lock().await;
        let active = slot.current.as_mut().ok_or(QuizError::NoActiveQuiz)?;
        if active.attempt.is_presented() {
            return Err(QuizError::RetryNotAllowed(active.attempt.quiz_id()));
        }
        active.stop_countdown();
        let attempt = QuizAttempt::start(&active.quiz, self.duration_secs, self.clock.now());
        active.attempt = attempt;
        active.countdown = Some(self.spawn_countdown(attempt.id()));
        info!(quiz_id = attempt.quiz_id().value(), attempt_id = %attempt.id(), "quiz retried");
        self.announce(&attempt);
        Ok(attempt)
    }

    /// Move to the next hint. Returns the active attempt, unchanged when
    /// already on the last hint or not presented.
    pub async fn reveal_next_hint(&self) -> Option<QuizAttempt> {
        let mut slot = self.slot.lock().await;
        let active = slot.current.as_mut()?;
        let next = active.attempt.reveal_next_hint();
        if next.hint_index() != active.attempt.hint_index() {
            active.attempt = next;
            self.events.emit(TutorEvent::HintRevealed {
                attempt_id: next.id(),
                hint_index: next.hint_index(),
            });
        }
        Some(active.attempt)
    }

    /// Grade the current attempt and post feedback to the transcript.
    ///
    /// The grade is committed and the countdown stopped before any remote
    /// call. Remote feedback is only requested for service-generated quizzes;
    /// if it fails the local explanation is used instead.
    ///
    /// # Errors
    ///
    /// - `NoActiveQuiz` if nothing is on screen
    /// - `Attempt(AlreadyAnswered)` if the attempt finished already
    /// - `Attempt(Validation)` if `selected` is out of range
    pub async fn answer(&self, selected: usize) -> Result<AnswerOutcome, QuizError> {
        let mut slot = self.slot.lock().await;
        let active = slot.current.as_mut().ok_or(QuizError::NoActiveQuiz)?;
        let (attempt, correct) = active.attempt.answer(&active.quiz, selected)?;
        active.attempt = attempt;
        active.stop_countdown();
        let quiz = active.quiz.clone();
        slot.score.record(correct);
        let score = slot.score;

        info!(
            quiz_id = quiz.id().value(),
            attempt_id = %attempt.id(),
            correct,
            "quiz answered"
        );
        self.events.emit(TutorEvent::QuizAnswered {
            quiz_id: quiz.id(),
            attempt_id: attempt.id(),
            selected,
            correct,
        });

        let emotion = self.transcript.last_emotion();
        let server_feedback = match quiz.origin() {
            QuizOrigin::Remote => match self.dialogue.quiz_feedback(quiz.id(), selected).await {
                Ok(text) => Some(text),
                Err(error) => {
                    warn!(%error, quiz_id = quiz.id().value(), "quiz feedback unavailable");
                    None
                }
            },
            QuizOrigin::Synthesized => None,
        };
        let message = self.transcript.append_tutor(
            feedback::answer_message(&quiz, correct, emotion, server_feedback.as_deref()),
            Some(feedback::result_sentiment(correct)),
            None,
            self.clock.now(),
        );
        drop(slot);

        if let Some(feedback) = &self.feedback {
            feedback.apply(correct).await;
        }

        Ok(AnswerOutcome {
            attempt,
            correct,
            message,
            score,
        })
    }

    /// Close the current quiz from any state and stop its countdown.
    /// Returns the dismissed quiz id, if there was one.
    pub async fn dismiss(&self) -> Option<QuizId> {
        let mut slot = self.slot.lock().await;
        let mut active = slot.current.take()?;
        active.stop_countdown();
        let quiz_id = active.quiz.id();
        debug!(quiz_id = quiz_id.value(), "quiz dismissed");
        self.events.emit(TutorEvent::QuizDismissed { quiz_id });
        Some(quiz_id)
    }

    /// Stop any running countdown without waiting. Used when the owning
    /// session goes away.
    pub fn shutdown(&self) {
        if let Ok(mut slot) = self.slot.try_lock() {
            if let Some(active) = slot.current.as_mut() {
                active.stop_countdown();
            }
            return;
        }
        // a tick holds the slot right now; finish the job once it lets go
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let manager = self.clone();
            runtime.spawn(async move {
                if let Some(active) = manager.slot.lock().await.current.as_mut() {
                    active.stop_countdown();
                }
            });
        }
    }

    fn announce(&self, attempt: &QuizAttempt) {
        self.events.emit(TutorEvent::QuizPresented {
            quiz_id: attempt.quiz_id(),
            attempt_id: attempt.id(),
            time_remaining_secs: attempt.time_remaining_secs(),
        });
    }

    /// One tick per second for `attempt_id`. The task exits as soon as the
    /// slot holds a different attempt or the attempt is no longer presented,
    /// so a late tick can never time out an answered or dismissed quiz.
    fn spawn_countdown(&self, attempt_id: AttemptId) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + TICK, TICK);
            loop {
                ticker.tick().await;
                match manager.tick(attempt_id).await {
                    Some(Tick::Running(_)) => {}
                    Some(Tick::Expired(_)) => {
                        if let Some(feedback) = &manager.feedback {
                            feedback.apply(false).await;
                        }
                        return;
                    }
                    Some(Tick::Idle(_)) | None => return,
                }
            }
        })
    }

    async fn tick(&self, attempt_id: AttemptId) -> Option<Tick> {
        let mut slot = self.slot.lock().await;
        let active = slot.current.as_mut()?;
        if active.attempt.id() != attempt_id {
            return None;
        }
        let tick = active.attempt.tick();
        match tick {
            Tick::Running(next) => {
                active.attempt = next;
                self.events.emit(TutorEvent::QuizTick {
                    attempt_id,
                    remaining: next.time_remaining_secs(),
                });
            }
            Tick::Expired(next) => {
                active.attempt = next;
                // this task is the countdown; dropping the handle detaches it
                active.countdown = None;
                let quiz = active.quiz.clone();
                slot.score.record(false);
                info!(quiz_id = quiz.id().value(), attempt_id = %attempt_id, "quiz timed out");
                self.transcript.append_tutor(
                    feedback::timeout_message(&quiz),
                    Some(feedback::result_sentiment(false)),
                    None,
                    self.clock.now(),
                );
                self.events.emit(TutorEvent::QuizTimedOut {
                    quiz_id: quiz.id(),
                    attempt_id,
                });
            }
            Tick::Idle(_) => {}
        }
        Some(tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remote::{Endpoint, Failure, InMemoryBackend};
    use tutor_core::model::{QuizDraft, QuizPhase, SentimentReading};
    use tutor_core::time::fixed_clock;

    fn quiz(id: u64, origin: QuizOrigin) -> Quiz {
        QuizDraft {
            question: "Which index is first?".into(),
            options: vec!["0".into(), "1".into()],
            correct_index: 0,
            explanation: "Arrays are zero-based.".into(),
            hints: vec!["Think C.".into(), "Not one.".into()],
            ..QuizDraft::default()
        }
        .validate(QuizId::new(id), origin)
        .unwrap()
    }

    fn manager() -> (QuizLifecycleManager, Transcript, InMemoryBackend) {
        let backend = InMemoryBackend::new();
        let events = EventBus::new(128);
        let transcript = Transcript::new(events.clone());
        let manager = QuizLifecycleManager::new(
            transcript.clone(),
            events,
            Arc::new(backend.clone()),
            fixed_clock(),
            60,
        );
        (manager, transcript, backend)
    }

    #[tokio::test(start_paused = true)]
    async fn second_present_while_running_fails() {
        let (manager, _, _) = manager();
        manager.present(quiz(1, QuizOrigin::Synthesized)).await.unwrap();
        let err = manager
            .present(quiz(2, QuizOrigin::Synthesized))
            .await
            .unwrap_err();
        assert!(matches!(err, QuizError::AlreadyPresented(id) if id == QuizId::new(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn hints_stop_at_last_index() {
        let (manager, _, _) = manager();
        manager.present(quiz(1, QuizOrigin::Synthesized)).await.unwrap();
        for _ in 0..4 {
            manager.reveal_next_hint().await;
        }
        let current = manager.current().await.unwrap();
        assert_eq!(current.attempt.hint_index(), 1);
        assert_eq!(current.current_hint(), Some("Not one."));
    }

    async fn answer_after_negative_turn(selected: usize) -> AnswerOutcome {
        let (manager, transcript, _) = manager();
        manager.present(quiz(1, QuizOrigin::Synthesized)).await.unwrap();
        let user = transcript.append_user("this is hopeless", fixed_clock().now());
        assert!(transcript.attach_sentiment(user.id(), SentimentReading::from_score(-0.6)));
        manager.answer(selected).await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn feedback_copy_follows_last_emotion() {
        let right = answer_after_negative_turn(0).await;
        assert!(right.correct);
        assert!(
            right
                .message
                .text()
                .starts_with("Great job! Hopefully that win lifts your mood a little!")
        );

        let wrong = answer_after_negative_turn(1).await;
        assert!(!wrong.correct);
        assert!(
            wrong
                .message
                .text()
                .starts_with("It's okay to get it wrong. Let's work through it together!")
        );
        assert!(wrong.message.text().contains("The correct answer is: 0"));
    }

    #[tokio::test(start_paused = true)]
    async fn answer_scores_once() {
        let (manager, transcript, _) = manager();
        manager.present(quiz(1, QuizOrigin::Synthesized)).await.unwrap();

        let outcome = manager.answer(0).await.unwrap();
        assert!(outcome.correct);
        assert_eq!(outcome.score.correct(), 1);
        assert_eq!(outcome.score.total(), 1);
        assert!(outcome.message.text().starts_with("Correct!"));

        let err = manager.answer(1).await.unwrap_err();
        assert!(matches!(err, QuizError::Attempt(_)));
        assert_eq!(manager.score().await.total(), 1);
        assert_eq!(transcript.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_range_answer_is_a_validation_error() {
        let (manager, _, _) = manager();
        manager.present(quiz(1, QuizOrigin::Synthesized)).await.unwrap();
        let err = manager.answer(7).await.unwrap_err();
        assert_eq!(err.kind(), tutor_core::ErrorKind::Validation);
        assert!(manager.current().await.unwrap().attempt.is_presented());
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_expires_into_timed_out() {
        let (manager, transcript, _) = manager();
        manager.present(quiz(1, QuizOrigin::Synthesized)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30_500)).await;
        let halfway = manager.current().await.unwrap().attempt;
        assert!(halfway.is_presented());
        assert_eq!(halfway.time_remaining_secs(), 30);

        tokio::time::sleep(Duration::from_secs(30)).await;
        let done = manager.current().await.unwrap().attempt;
        assert_eq!(done.phase(), QuizPhase::TimedOut);
        assert_eq!(manager.score().await.total(), 1);
        assert_eq!(manager.score().await.correct(), 0);
        let last = transcript.snapshot().pop().unwrap();
        assert!(last.text().starts_with(feedback::TIMEOUT_PREFIX));
    }

    #[tokio::test(start_paused = true)]
    async fn dismiss_stops_the_countdown() {
        let (manager, transcript, _) = manager();
        manager.present(quiz(1, QuizOrigin::Synthesized)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(manager.dismiss().await, Some(QuizId::new(1)));
        tokio::time::sleep(Duration::from_secs(120)).await;
        tokio::task::yield_now().await;

        assert!(manager.current().await.is_none());
        assert_eq!(manager.score().await.total(), 0);
        assert!(transcript.is_empty());
        assert_eq!(manager.dismiss().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_starts_a_fresh_attempt() {
        let (manager, _, _) = manager();
        let first = manager.present(quiz(1, QuizOrigin::Synthesized)).await.unwrap();
        assert!(matches!(
            manager.retry().await,
            Err(QuizError::RetryNotAllowed(_))
        ));

        manager.answer(1).await.unwrap();
        let second = manager.retry().await.unwrap();
        assert_ne!(first.id(), second.id());
        assert!(second.is_presented());
        assert_eq!(second.hint_index(), 0);
        assert_eq!(second.time_remaining_secs(), 60);

        manager.answer(0).await.unwrap();
        let score = manager.score().await;
        assert_eq!((score.correct(), score.total()), (1, 2));
    }

    #[tokio::test(start_paused = true)]
    async fn remote_quiz_uses_server_feedback_or_falls_back() {
        let (manager, _, backend) = manager();
        backend.set_quiz_feedback(QuizId::new(5), "Zero-based indexing, nice.");
        manager.present(quiz(5, QuizOrigin::Remote)).await.unwrap();
        let outcome = manager.answer(0).await.unwrap();
        assert!(outcome.message.text().ends_with("Zero-based indexing, nice."));

        backend.fail(Endpoint::QuizFeedback, Failure::Unavailable);
        manager.present(quiz(6, QuizOrigin::Remote)).await.unwrap();
        let outcome = manager.answer(1).await.unwrap();
        assert!(!outcome.correct);
        assert!(outcome.message.text().contains("Arrays are zero-based."));
        assert_eq!(manager.score().await.total(), 2);
    }
}
