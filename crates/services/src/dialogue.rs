use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use remote::{ChatPrompt, ChatReply, DialogueService, EmotionService, RemoteError};
use tutor_core::feedback;
use tutor_core::model::{Message, Quiz, QuizId, QuizOrigin, SentimentReading};
use tutor_core::policy::QuizPolicy;
use tutor_core::{Clock, ConfusionTracker, TurnBranch, ValidationError};

use crate::error::{DialogueError, QuizError};
use crate::events::{EventBus, TutorEvent};
use crate::quiz::QuizLifecycleManager;
use crate::session_state::DifficultyFeedback;
use crate::transcript::Transcript;

/// Locally synthesized quizzes are numbered from here so they never collide
/// with ids assigned by the generation service.
const SYNTHESIZED_QUIZ_ID_BASE: u64 = 1 << 48;

/// What one learner turn produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub branch: TurnBranch,
    pub reply: Message,
    pub quiz: Option<Quiz>,
    /// False when the quiz could not be shown because another is running.
    pub quiz_presented: bool,
    /// True when a remote call failed and `reply` is the error notice.
    pub failed: bool,
}

struct Conversation {
    tracker: ConfusionTracker,
    topic: String,
}

/// Runs learner turns: classify, reply, and hand any quiz to the quiz
/// manager. One turn at a time.
pub struct DialogueController {
    conversation: Mutex<Conversation>,
    transcript: Transcript,
    events: EventBus,
    emotion: Arc<dyn EmotionService>,
    dialogue: Arc<dyn DialogueService>,
    quizzes: QuizLifecycleManager,
    policy: Arc<dyn QuizPolicy>,
    clock: Clock,
    fallback_topic: String,
    next_synthesized_id: AtomicU64,
    feedback: Option<DifficultyFeedback>,
}

/// Collaborators of a `DialogueController`.
pub struct DialogueParts {
    pub transcript: Transcript,
    pub events: EventBus,
    pub emotion: Arc<dyn EmotionService>,
    pub dialogue: Arc<dyn DialogueService>,
    pub quizzes: QuizLifecycleManager,
    pub policy: Arc<dyn QuizPolicy>,
    pub clock: Clock,
}

impl DialogueController {
    #[must_use]
    pub fn new(
        parts: DialogueParts,
        confusion_threshold: u32,
        topic: impl Into<String>,
        fallback_topic: impl Into<String>,
    ) -> Self {
        Self {
            conversation: Mutex::new(Conversation {
                tracker: ConfusionTracker::new(confusion_threshold),
                topic: topic.into(),
            }),
            transcript: parts.transcript,
            events: parts.events,
            emotion: parts.emotion,
            dialogue: parts.dialogue,
            quizzes: parts.quizzes,
            policy: parts.policy,
            clock: parts.clock,
            fallback_topic: fallback_topic.into(),
            next_synthesized_id: AtomicU64::new(SYNTHESIZED_QUIZ_ID_BASE),
            feedback: None,
        }
    }

    #[must_use]
    pub fn with_difficulty_feedback(mut self, feedback: DifficultyFeedback) -> Self {
        self.feedback = Some(feedback);
        self
    }

    pub async fn topic(&self) -> String {
        self.conversation.lock().await.topic.clone()
    }

    pub async fn set_topic(&self, topic: impl Into<String>) {
        let topic = topic.into();
        debug!(%topic, "topic changed");
        self.conversation.lock().await.topic = topic;
    }

    pub async fn confused_count(&self) -> u32 {
        self.conversation.lock().await.tracker.count()
    }

    /// Process one learner turn.
    ///
    /// Confused turns get a canned reply without touching the network.
    /// Remote failures are turned into an error message in the transcript.
    ///
    /// # Errors
    ///
    /// - `Validation(EmptyInput)` for blank text, before anything is recorded
    /// - `Remote(AuthExpired)` after the error message has been appended
    #[instrument(skip_all)]
    pub async fn submit_turn(&self, text: &str) -> Result<TurnOutcome, DialogueError> {
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyInput.into());
        }
        let mut conversation = self.conversation.lock().await;
        let user = self.transcript.append_user(text, self.clock.now());
        let signal = conversation.tracker.observe(text);
        debug!(branch = ?signal.branch, confused = conversation.tracker.count(), "turn classified");

        match signal.branch {
            TurnBranch::Escalate => {
                conversation.topic.clone_from(&self.fallback_topic);
                info!(topic = %conversation.topic, "escalating to easier topic");
                self.events.emit(TutorEvent::Escalated {
                    topic: conversation.topic.clone(),
                });
                let reply = self.canned(feedback::ESCALATION_REPLY);
                drop(conversation);
                if let Some(feedback) = &self.feedback {
                    feedback.apply(false).await;
                }
                Ok(Self::outcome(TurnBranch::Escalate, reply))
            }
            TurnBranch::Simplify => Ok(Self::outcome(
                TurnBranch::Simplify,
                self.canned(feedback::SIMPLIFICATION_REPLY),
            )),
            TurnBranch::Normal => {
                let prompt = ChatPrompt {
                    message: text.to_string(),
                    topic: conversation.topic.clone(),
                };
                let (sentiment, reply) =
                    tokio::join!(self.emotion.analyze(text), self.dialogue.generate(&prompt));
                match (sentiment, reply) {
                    (Ok(sentiment), Ok(reply)) => {
                        Ok(self.answer_turn(&user, sentiment, reply).await)
                    }
                    (Err(error), _) | (_, Err(error)) => self.fail_turn(error),
                }
            }
        }
    }

    fn canned(&self, text: &str) -> Message {
        self.transcript
            .append_tutor(text, None, None, self.clock.now())
    }

    fn outcome(branch: TurnBranch, reply: Message) -> TurnOutcome {
        TurnOutcome {
            branch,
            reply,
            quiz: None,
            quiz_presented: false,
            failed: false,
        }
    }

    async fn answer_turn(
        &self,
        user: &Message,
        sentiment: SentimentReading,
        reply: ChatReply,
    ) -> TurnOutcome {
        self.transcript.attach_sentiment(user.id(), sentiment);
        let quiz_running = self
            .quizzes
            .current()
            .await
            .is_some_and(|current| current.attempt.is_presented());
        let quiz = self.resolve_quiz(&reply, !quiz_running);

        let quiz_presented = match &quiz {
            Some(quiz) => match self.quizzes.present(quiz.clone()).await {
                Ok(_) => true,
                Err(QuizError::AlreadyPresented(active)) => {
                    warn!(
                        quiz_id = quiz.id().value(),
                        active = active.value(),
                        "quiz not presented, another is running"
                    );
                    false
                }
                Err(error) => {
                    warn!(%error, "quiz not presented");
                    false
                }
            },
            None => false,
        };

        // only reference a quiz the learner can actually answer
        let message = self.transcript.append_tutor(
            reply.text,
            Some(reply.sentiment),
            quiz.as_ref().filter(|_| quiz_presented).map(Quiz::id),
            self.clock.now(),
        );

        TurnOutcome {
            branch: TurnBranch::Normal,
            reply: message,
            quiz,
            quiz_presented,
            failed: false,
        }
    }

    /// A service quiz wins when the service asks for one; otherwise the
    /// policy may synthesize one from the reply text, unless `synthesize`
    /// is false because a quiz is already on screen.
    fn resolve_quiz(&self, reply: &ChatReply, synthesize: bool) -> Option<Quiz> {
        if reply.should_generate_quiz {
            if let Some(remote) = reply.quiz.clone() {
                return match remote.into_quiz() {
                    Ok(quiz) => Some(quiz),
                    Err(error) => {
                        warn!(%error, "dropping malformed quiz from generation service");
                        None
                    }
                };
            }
        }
        if !synthesize {
            return None;
        }
        let draft = self.policy.synthesize(&reply.text)?;
        let id = QuizId::new(self.next_synthesized_id.fetch_add(1, Ordering::Relaxed));
        match draft.validate(id, QuizOrigin::Synthesized) {
            Ok(quiz) => Some(quiz),
            Err(error) => {
                warn!(%error, "quiz policy produced an invalid quiz");
                None
            }
        }
    }

    fn fail_turn(&self, error: RemoteError) -> Result<TurnOutcome, DialogueError> {
        warn!(%error, "turn failed");
        let reply = self.canned(feedback::ERROR_REPLY);
        if error.is_auth_expired() {
            return Err(error.into());
        }
        Ok(TurnOutcome {
            failed: true,
            ..Self::outcome(TurnBranch::Normal, reply)
        })
    }
}
