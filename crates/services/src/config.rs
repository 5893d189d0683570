use std::env;
use std::str::FromStr;

use tracing::warn;

use tutor_core::confusion::DEFAULT_CONFUSION_THRESHOLD;
use tutor_core::model::DEFAULT_QUIZ_SECONDS;

pub const DEFAULT_TOPIC: &str = "DSA";
pub const FALLBACK_TOPIC: &str = "Arrays";
pub const DEFAULT_DIFFICULTY_STEP: f64 = 0.1;
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Per-session tuning knobs.
#[derive(Clone, Debug, PartialEq)]
pub struct TutorConfig {
    pub quiz_duration_secs: u32,
    pub confusion_threshold: u32,
    pub default_topic: String,
    /// Topic switched to on escalation.
    pub fallback_topic: String,
    /// Difficulty nudge applied after graded quizzes and escalations.
    pub difficulty_step: f64,
    /// Opening tutor message, if any.
    pub greeting: Option<String>,
    pub event_capacity: usize,
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            quiz_duration_secs: DEFAULT_QUIZ_SECONDS,
            confusion_threshold: DEFAULT_CONFUSION_THRESHOLD,
            default_topic: DEFAULT_TOPIC.to_string(),
            fallback_topic: FALLBACK_TOPIC.to_string(),
            difficulty_step: DEFAULT_DIFFICULTY_STEP,
            greeting: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl TutorConfig {
    /// Defaults overridden by `TUTOR_QUIZ_SECONDS`, `TUTOR_DEFAULT_TOPIC`,
    /// `TUTOR_DIFFICULTY_STEP` and `TUTOR_GREETING`. Unparseable values are
    /// logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = parse_var::<u32>("TUTOR_QUIZ_SECONDS") {
            config.quiz_duration_secs = secs;
        }
        if let Some(topic) = non_empty_var("TUTOR_DEFAULT_TOPIC") {
            config.default_topic = topic;
        }
        if let Some(step) = parse_var::<f64>("TUTOR_DIFFICULTY_STEP") {
            if step.is_finite() && (0.0..=1.0).contains(&step) {
                config.difficulty_step = step;
            } else {
                warn!(step, "ignoring TUTOR_DIFFICULTY_STEP outside [0, 1]");
            }
        }
        config.greeting = non_empty_var("TUTOR_GREETING");
        config
    }

    #[must_use]
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = Some(greeting.into());
        self
    }

    #[must_use]
    pub fn with_default_topic(mut self, topic: impl Into<String>) -> Self {
        self.default_topic = topic.into();
        self
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

fn parse_var<T: FromStr>(key: &str) -> Option<T> {
    let raw = non_empty_var(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable environment variable");
            None
        }
    }
}
