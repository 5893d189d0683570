use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{ErrorKind, ValidationError};
use crate::model::ids::PauseId;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("session is already paused")]
    AlreadyPaused,
    #[error("session is not paused")]
    NotPaused,
    #[error("pause id {provided} does not match the active pause")]
    InvalidPauseId { provided: PauseId },
}

impl SessionStateError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidState
    }
}

//
// ─── TEACHING MODE ─────────────────────────────────────────────────────────────
//

/// How explanations are presented to the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeachingMode {
    Visual,
    #[default]
    Text,
    Analogy,
}

impl TeachingMode {
    pub const ALL: [TeachingMode; 3] = [Self::Visual, Self::Text, Self::Analogy];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Visual => "visual",
            Self::Text => "text",
            Self::Analogy => "analogy",
        }
    }
}

impl fmt::Display for TeachingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TeachingMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "visual" => Ok(Self::Visual),
            "text" => Ok(Self::Text),
            "analogy" => Ok(Self::Analogy),
            _ => Err(ValidationError::InvalidMode(s.to_string())),
        }
    }
}

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

/// Session difficulty, always within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Difficulty(f64);

impl Difficulty {
    pub const DEFAULT: Difficulty = Difficulty(0.5);

    /// Clamp into `[0, 1]`. Non-finite input falls back to the default.
    #[must_use]
    pub fn new(value: f64) -> Self {
        if value.is_finite() {
            Self(value.clamp(0.0, 1.0))
        } else {
            Self::DEFAULT
        }
    }

    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Add `delta` and saturate at the bounds.
    #[must_use]
    pub fn adjusted(self, delta: f64) -> Self {
        Self::new(self.0 + delta)
    }
}

impl From<f64> for Difficulty {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<Difficulty> for f64 {
    fn from(difficulty: Difficulty) -> Self {
        difficulty.0
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::DEFAULT
    }
}

//
// ─── SESSION STATE ─────────────────────────────────────────────────────────────
//

/// Active pause, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pause {
    pub id: PauseId,
    pub reason: Option<String>,
}

/// Pause status, teaching mode and difficulty of one learning session.
///
/// Transitions return a new value and never mutate in place; the session
/// state controller decides when a new value is committed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionState {
    pause: Option<Pause>,
    mode: TeachingMode,
    difficulty: Difficulty,
}

impl SessionState {
    #[must_use]
    pub fn new(pause: Option<Pause>, mode: TeachingMode, difficulty: Difficulty) -> Self {
        Self {
            pause,
            mode,
            difficulty,
        }
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.pause.is_some()
    }

    #[must_use]
    pub fn pause_id(&self) -> Option<PauseId> {
        self.pause.as_ref().map(|p| p.id)
    }

    #[must_use]
    pub fn pause_reason(&self) -> Option<&str> {
        self.pause.as_ref().and_then(|p| p.reason.as_deref())
    }

    #[must_use]
    pub fn mode(&self) -> TeachingMode {
        self.mode
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Check that a pause may start, without committing anything.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyPaused` if a pause is active.
    pub fn ensure_can_pause(&self) -> Result<(), SessionStateError> {
        if self.is_paused() {
            Err(SessionStateError::AlreadyPaused)
        } else {
            Ok(())
        }
    }

    /// # Errors
    ///
    /// Returns `AlreadyPaused` if a pause is active.
    pub fn paused(&self, id: PauseId, reason: Option<String>) -> Result<Self, SessionStateError> {
        self.ensure_can_pause()?;
        Ok(Self {
            pause: Some(Pause { id, reason }),
            ..self.clone()
        })
    }

    /// Check that `id` identifies the active pause.
    ///
    /// # Errors
    ///
    /// Returns `NotPaused` or `InvalidPauseId`.
    pub fn ensure_can_resume(&self, id: PauseId) -> Result<(), SessionStateError> {
        match &self.pause {
            None => Err(SessionStateError::NotPaused),
            Some(p) if p.id != id => Err(SessionStateError::InvalidPauseId { provided: id }),
            Some(_) => Ok(()),
        }
    }

    /// # Errors
    ///
    /// Returns `NotPaused` or `InvalidPauseId`.
    pub fn resumed(&self, id: PauseId) -> Result<Self, SessionStateError> {
        self.ensure_can_resume(id)?;
        Ok(Self {
            pause: None,
            ..self.clone()
        })
    }

    #[must_use]
    pub fn with_difficulty(&self, difficulty: Difficulty) -> Self {
        Self {
            difficulty,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_mode(&self, mode: TeachingMode) -> Self {
        Self {
            mode,
            ..self.clone()
        }
    }
}
