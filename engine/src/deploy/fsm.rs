//! Finite State Machine for deployment and pipeline run status

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;

/// Status shared by deployments and pipeline runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Created, nothing executed yet
    #[default]
    Pending,

    /// Steps are executing
    Running,

    /// Every step succeeded
    Success,

    /// A step failed, or the run was cancelled
    Failed,
}

impl RunStatus {
    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status event
#[derive(Debug, Clone)]
pub enum StatusEvent {
    /// First step is about to run
    Start,

    /// All steps completed
    Succeed,

    /// A step failed
    Fail(String),
}

/// Status FSM
///
/// Status only moves forward: `pending -> running -> {success, failed}`.
/// A failed run may still be started from pending directly into failed when
/// it never got to execute (e.g. a CI trigger that was rejected).
#[derive(Debug, Clone, Default)]
pub struct StatusFsm {
    status: RunStatus,
    error: Option<String>,
}

impl StatusFsm {
    /// Create a new FSM in pending state
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the FSM for a persisted record
    pub fn resume(status: RunStatus, error: Option<String>) -> Self {
        Self { status, error }
    }

    /// Get current status
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition status
    pub fn process(&mut self, event: StatusEvent) -> Result<RunStatus, EngineError> {
        let next = match (self.status, &event) {
            (RunStatus::Pending, StatusEvent::Start) => RunStatus::Running,
            (RunStatus::Pending, StatusEvent::Fail(err)) | (RunStatus::Running, StatusEvent::Fail(err)) => {
                self.error = Some(err.clone());
                RunStatus::Failed
            }
            (RunStatus::Running, StatusEvent::Succeed) => RunStatus::Success,

            (status, event) => {
                return Err(EngineError::InvalidTransition(format!(
                    "{} -> {:?}",
                    status, event
                )));
            }
        };

        self.status = next;
        Ok(next)
    }
}
