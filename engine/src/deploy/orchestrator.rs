//! Container orchestration collaborator

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::models::project::Project;

/// Outcome of a container redeploy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeployOutcome {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl RedeployOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// One container as reported by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub name: String,
    pub status: String,
}

impl ContainerStatus {
    pub fn new(name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: status.into(),
        }
    }

    /// `running` (compose state) or `Up ...` (docker ps status)
    pub fn is_running(&self) -> bool {
        let status = self.status.trim();
        status.eq_ignore_ascii_case("running") || status.starts_with("Up")
    }
}

/// Rebuilds and inspects a project's containers
#[async_trait]
pub trait ContainerOrchestrator: Send + Sync {
    /// Rebuild and restart the project's containers
    async fn redeploy(&self, project: &Project) -> RedeployOutcome;

    /// Current containers of the project
    async fn container_statuses(&self, project: &Project) -> Result<Vec<ContainerStatus>, EngineError>;
}
