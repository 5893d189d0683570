use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use remote::PersistenceService;
use tutor_core::ValidationError;
use tutor_core::model::{Difficulty, PauseId, SessionState, TeachingMode};

use crate::error::SessionControlError;
use crate::events::{EventBus, TutorEvent};

/// Pause status, teaching mode and difficulty, committed only after the
/// persistence service acknowledges each change.
///
/// One operation runs at a time; the lock is held across the remote call so
/// concurrent difficulty deltas are applied one after the other.
pub struct SessionStateController {
    state: Mutex<SessionState>,
    persistence: Arc<dyn PersistenceService>,
    events: EventBus,
}

impl SessionStateController {
    #[must_use]
    pub fn new(persistence: Arc<dyn PersistenceService>, events: EventBus) -> Self {
        Self {
            state: Mutex::new(SessionState::default()),
            persistence,
            events,
        }
    }

    pub async fn snapshot(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    /// Replace local state with the persisted one.
    ///
    /// # Errors
    ///
    /// Returns `SessionControlError::Remote` and keeps the local state if the
    /// load fails.
    pub async fn refresh(&self) -> Result<SessionState, SessionControlError> {
        let mut state = self.state.lock().await;
        let loaded = self.persistence.session_state().await?;
        debug!(paused = loaded.is_paused(), mode = %loaded.mode(), "session state loaded");
        *state = loaded.clone();
        Ok(loaded)
    }

    /// # Errors
    ///
    /// - `AlreadyPaused` if a pause is active
    /// - `Remote` if the pause is not acknowledged
    pub async fn pause(&self, reason: Option<String>) -> Result<PauseId, SessionControlError> {
        let mut state = self.state.lock().await;
        state.ensure_can_pause()?;
        let pause_id = self.persistence.pause_session(reason.as_deref()).await?;
        *state = state.paused(pause_id, reason)?;
        info!(pause_id = pause_id.value(), "session paused");
        self.events.emit(TutorEvent::SessionPaused { pause_id });
        Ok(pause_id)
    }

    /// # Errors
    ///
    /// - `NotPaused` or `InvalidPauseId` if `pause_id` is not the active pause
    /// - `Remote` if the resume is not acknowledged
    pub async fn resume(&self, pause_id: PauseId) -> Result<(), SessionControlError> {
        let mut state = self.state.lock().await;
        state.ensure_can_resume(pause_id)?;
        self.persistence.resume_session(pause_id).await?;
        *state = state.resumed(pause_id)?;
        info!(pause_id = pause_id.value(), "session resumed");
        self.events.emit(TutorEvent::SessionResumed { pause_id });
        Ok(())
    }

    /// Add `delta` to the difficulty, saturating at the bounds.
    ///
    /// # Errors
    ///
    /// - `Validation` if `delta` is not finite
    /// - `Remote` if the update is not acknowledged
    pub async fn set_difficulty(&self, delta: f64) -> Result<Difficulty, SessionControlError> {
        if !delta.is_finite() {
            return Err(ValidationError::NonFiniteDelta(delta).into());
        }
        let mut state = self.state.lock().await;
        let next = state.difficulty().adjusted(delta);
        self.persistence.update_difficulty(next).await?;
        *state = state.with_difficulty(next);
        debug!(delta, difficulty = next.value(), "difficulty updated");
        self.events.emit(TutorEvent::DifficultyChanged(next));
        Ok(next)
    }

    /// Parse and apply a teaching mode by name.
    ///
    /// # Errors
    ///
    /// - `Validation` for a name outside `visual`, `text`, `analogy`
    /// - `Remote` if the update is not acknowledged
    pub async fn set_mode(&self, mode: &str) -> Result<TeachingMode, SessionControlError> {
        let mode: TeachingMode = mode.parse()?;
        self.set_teaching_mode(mode).await?;
        Ok(mode)
    }

    /// # Errors
    ///
    /// Returns `Remote` if the update is not acknowledged.
    pub async fn set_teaching_mode(&self, mode: TeachingMode) -> Result<(), SessionControlError> {
        let mut state = self.state.lock().await;
        self.persistence.update_mode(mode).await?;
        *state = state.with_mode(mode);
        debug!(mode = %mode, "teaching mode updated");
        self.events.emit(TutorEvent::ModeChanged(mode));
        Ok(())
    }
}

/// Best-effort difficulty nudges after graded quizzes and escalations.
#[derive(Clone)]
pub struct DifficultyFeedback {
    state: Arc<SessionStateController>,
    step: f64,
}

impl DifficultyFeedback {
    #[must_use]
    pub fn new(state: Arc<SessionStateController>, step: f64) -> Self {
        Self { state, step }
    }

    /// Raise difficulty on success, lower it otherwise. Failures are logged.
    pub async fn apply(&self, success: bool) {
        if self.step == 0.0 {
            return;
        }
        let delta = if success { self.step } else { -self.step };
        if let Err(error) = self.state.set_difficulty(delta).await {
            warn!(%error, delta, "difficulty nudge failed");
        }
    }
}
