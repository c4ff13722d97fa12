//! Step-sequenced session control
//!
//! Each simulator serializes its run into numbered steps. A step action is
//! accepted only when the session has reached the step's minimum requirement and
//! no other action is in flight; the `processing` flag is the sole
//! mutual-exclusion mechanism, since there is exactly one caller by
//! construction. Steps only move forward; the single way back is `reset()`.

use crate::error::{Result, SimError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Terminal state of a challenge run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalChallenge {
    pub completed: bool,
    pub success: bool,
    pub message: String,
}

/// Serializable view of a session, for host rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationSession {
    pub current_step: u32,
    pub processing: bool,
    pub challenge: TerminalChallenge,
}

/// Owns the session state and the host's completion callback.
pub struct SessionController {
    session: SimulationSession,
    on_complete: Option<Box<dyn FnMut()>>,
    callback_fired: bool,
}

impl SessionController {
    pub fn new() -> Self {
        Self {
            session: SimulationSession {
                current_step: 1,
                processing: false,
                challenge: TerminalChallenge::default(),
            },
            on_complete: None,
            callback_fired: false,
        }
    }

    /// Register the host callback invoked once per completed run.
    pub fn set_on_complete(&mut self, callback: Box<dyn FnMut()>) {
        self.on_complete = Some(callback);
    }

    pub fn current_step(&self) -> u32 {
        self.session.current_step
    }

    pub fn is_processing(&self) -> bool {
        self.session.processing
    }

    pub fn challenge(&self) -> &TerminalChallenge {
        &self.session.challenge
    }

    /// Snapshot for host rendering.
    pub fn session(&self) -> &SimulationSession {
        &self.session
    }

    /// Gate a step action: rejects re-entrant invocation and actions whose step
    /// has not been reached, then marks the session busy.
    pub fn begin(&mut self, min_step: u32) -> Result<()> {
        if self.session.processing {
            return Err(SimError::SessionBusy);
        }
        if self.session.current_step < min_step {
            return Err(SimError::StepNotReached {
                required: min_step,
                current: self.session.current_step,
            });
        }
        self.session.processing = true;
        Ok(())
    }

    /// Finish a successful step action and advance.
    pub fn finish(&mut self, advance_to: u32) {
        self.session.processing = false;
        self.advance(advance_to);
    }

    /// Finish a failed step action without advancing, so the host can retry.
    pub fn abort(&mut self) {
        self.session.processing = false;
    }

    /// Forward-only step movement; going back is only possible through `reset`.
    pub fn advance(&mut self, to_step: u32) {
        if to_step > self.session.current_step {
            debug!(from = self.session.current_step, to = to_step, "step advanced");
            self.session.current_step = to_step;
        }
    }

    /// Mark the run complete and fire the host callback, at most once per run.
    pub fn complete(&mut self, success: bool, message: impl Into<String>) {
        self.session.challenge = TerminalChallenge {
            completed: true,
            success,
            message: message.into(),
        };
        if !self.callback_fired {
            self.callback_fired = true;
            if let Some(callback) = self.on_complete.as_mut() {
                callback();
            }
        }
    }

    /// Back to step 1 with a cleared terminal state. The completion callback is
    /// re-armed: a full re-run may fire it again.
    pub fn reset(&mut self) {
        self.session = SimulationSession {
            current_step: 1,
            processing: false,
            challenge: TerminalChallenge::default(),
        };
        self.callback_fired = false;
        debug!("session reset");
    }
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new()
    }
}
