//! Deployment models

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::deploy::fsm::{RunStatus, StatusEvent, StatusFsm};
use crate::errors::EngineError;

/// What started a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TriggeredBy {
    #[default]
    Manual,
    Webhook,
    Scheduled,
    Pipeline,
    Rollback,
}

/// A deployment record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    /// Unique deployment ID
    pub id: String,

    /// Project this deployment belongs to
    pub project_id: String,

    /// Current status
    #[serde(default)]
    pub status: RunStatus,

    /// What started it
    #[serde(default)]
    pub triggered_by: TriggeredBy,

    /// Deployed commit
    #[serde(default)]
    pub commit_hash: Option<String>,

    /// Deployed commit message
    #[serde(default)]
    pub commit_message: Option<String>,

    /// Deployed branch
    pub branch: String,

    /// Environment variables at deploy time
    #[serde(default)]
    pub environment_snapshot: Option<BTreeMap<String, String>>,

    /// Deployment this one rolled back to
    #[serde(default)]
    pub rollback_deployment_id: Option<String>,

    /// User that started the deployment
    #[serde(default)]
    pub deployed_by: Option<String>,

    /// Wall-clock duration
    #[serde(default)]
    pub duration_seconds: Option<i64>,

    /// Record creation time
    pub created_at: DateTime<Utc>,

    /// Execution start time
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,

    /// Terminal transition time
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    /// First failure message
    #[serde(default)]
    pub error: Option<String>,
}

impl Deployment {
    /// Create a pending deployment
    pub fn new(project_id: impl Into<String>, branch: impl Into<String>, triggered_by: TriggeredBy) -> Self {
        Self {
            id: crate::utils::generate_uuid(),
            project_id: project_id.into(),
            status: RunStatus::Pending,
            triggered_by,
            commit_hash: None,
            commit_message: None,
            branch: branch.into(),
            environment_snapshot: None,
            rollback_deployment_id: None,
            deployed_by: None,
            duration_seconds: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// Move to running and stamp `started_at`
    pub fn start(&mut self) -> Result<(), EngineError> {
        self.apply(StatusEvent::Start)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Move to success and compute the duration
    pub fn succeed(&mut self) -> Result<(), EngineError> {
        self.apply(StatusEvent::Succeed)?;
        let completed_at = Utc::now();
        self.completed_at = Some(completed_at);
        self.duration_seconds = self
            .started_at
            .map(|started| (completed_at - started).num_seconds().max(0));
        Ok(())
    }

    /// Move to failed.
    ///
    /// On an already failed record only `error`/`completed_at` are back-filled.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), EngineError> {
        let error = error.into();
        if self.status == RunStatus::Failed {
            if self.error.is_none() {
                self.error = Some(error);
            }
            if self.completed_at.is_none() {
                self.completed_at = Some(Utc::now());
            }
            return Ok(());
        }

        self.apply(StatusEvent::Fail(error.clone()))?;
        self.error = Some(error);
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    fn apply(&mut self, event: StatusEvent) -> Result<(), EngineError> {
        let mut fsm = StatusFsm::resume(self.status, self.error.clone());
        self.status = fsm.process(event)?;
        Ok(())
    }
}

/// Annotated rollback candidate (view, not stored)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackPoint {
    pub id: String,
    pub commit_hash: Option<String>,
    pub commit_message: Option<String>,
    pub deployed_at: DateTime<Utc>,
    pub deployed_by: Option<String>,
    pub can_rollback: bool,
}
