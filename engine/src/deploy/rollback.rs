//! Rollback saga
//!
//! Reverts a project to a previously successful deployment in seven fixed
//! steps. Steps run one at a time against the project's server and the first
//! failing step ends the saga; nothing is undone automatically, the failure
//! is recorded on a new `rollback` deployment instead.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::cancel::CancellationToken;
use crate::deploy::env::{render_env_file, write_env_command};
use crate::deploy::fsm::RunStatus;
use crate::deploy::orchestrator::ContainerOrchestrator;
use crate::errors::EngineError;
use crate::models::deployment::{Deployment, TriggeredBy};
use crate::models::host::HostDescriptor;
use crate::models::project::Project;
use crate::notify::{NotificationEvent, Notifier};
use crate::remote::builder::shell_quote;
use crate::remote::RemoteShell;
use crate::storage::settings::Settings;
use crate::storage::store::Store;
use crate::utils::short_hash;

/// Saga steps in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaStep {
    Backup,
    Checkpoint,
    GitPrepare,
    Checkout,
    RestoreEnvironment,
    Redeploy,
    HealthCheck,
}

impl SagaStep {
    pub const ALL: [SagaStep; 7] = [
        SagaStep::Backup,
        SagaStep::Checkpoint,
        SagaStep::GitPrepare,
        SagaStep::Checkout,
        SagaStep::RestoreEnvironment,
        SagaStep::Redeploy,
        SagaStep::HealthCheck,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SagaStep::Backup => "backup",
            SagaStep::Checkpoint => "checkpoint",
            SagaStep::GitPrepare => "git fetch",
            SagaStep::Checkout => "checkout",
            SagaStep::RestoreEnvironment => "environment restore",
            SagaStep::Redeploy => "container redeploy",
            SagaStep::HealthCheck => "health check",
        }
    }

    fn failure_prefix(&self) -> &'static str {
        match self {
            SagaStep::Backup => "Failed to backup current state",
            SagaStep::Checkpoint => "Failed to create git stash",
            SagaStep::GitPrepare => "Failed to fetch latest changes",
            SagaStep::Checkout => "Failed to checkout target commit",
            SagaStep::RestoreEnvironment => "Failed to restore environment",
            SagaStep::Redeploy => "Failed to rebuild Docker containers",
            SagaStep::HealthCheck => "Health check failed",
        }
    }
}

impl fmt::Display for SagaStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a saga that got as far as running commands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackOutcome {
    pub success: bool,

    /// The `rollback` deployment recording this saga
    pub deployment: Deployment,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub error: Option<String>,
}

/// Everything one saga needs, resolved before the first command
struct SagaContext<'a> {
    project: &'a Project,
    target: &'a Deployment,
    host: HostDescriptor,
    commit_hash: String,
    branch: String,
    project_path: String,
    backup_dir: String,
}

/// Runs rollbacks for any project
pub struct RollbackSaga {
    store: Arc<dyn Store>,
    shell: RemoteShell,
    orchestrator: Arc<dyn ContainerOrchestrator>,
    notifier: Arc<dyn Notifier>,
    settings: Settings,
}

impl RollbackSaga {
    pub fn new(
        store: Arc<dyn Store>,
        shell: RemoteShell,
        orchestrator: Arc<dyn ContainerOrchestrator>,
        notifier: Arc<dyn Notifier>,
        settings: Settings,
    ) -> Self {
        Self {
            store,
            shell,
            orchestrator,
            notifier,
            settings,
        }
    }

    /// Roll the target deployment's project back to it.
    ///
    /// Returns `Err` only for precondition and persistence failures; a failing
    /// step is reported as an unsuccessful [`RollbackOutcome`].
    pub async fn rollback(
        &self,
        target_deployment_id: &str,
        deployed_by: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<RollbackOutcome, EngineError> {
        let target = self
            .store
            .get_deployment(target_deployment_id)
            .await?
            .ok_or_else(|| EngineError::Precondition("Deployment not found".to_string()))?;

        let project = self
            .store
            .get_project(&target.project_id)
            .await?
            .ok_or_else(|| EngineError::Precondition("Project not found".to_string()))?;

        self.rollback_to(&project, &target, deployed_by, cancel).await
    }

    /// Roll `project` back to `target`
    pub async fn rollback_to(
        &self,
        project: &Project,
        target: &Deployment,
        deployed_by: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<RollbackOutcome, EngineError> {
        let ctx = self.prepare(project, target)?;

        let mut deployment = Deployment::new(&project.id, &ctx.branch, TriggeredBy::Rollback);
        deployment.commit_hash = Some(ctx.commit_hash.clone());
        deployment.commit_message = Some(format!(
            "Rollback to: {}",
            target.commit_message.as_deref().unwrap_or(ctx.commit_hash.as_str())
        ));
        deployment.environment_snapshot = target.environment_snapshot.clone();
        deployment.rollback_deployment_id = Some(target.id.clone());
        deployment.deployed_by = deployed_by;
        deployment.start()?;
        self.store.create_deployment(&deployment).await?;

        let short = short_hash(&ctx.commit_hash).to_string();
        info!(
            project = %project.slug,
            deployment = %deployment.id,
            target = %target.id,
            "Starting rollback to {}",
            short
        );
        self.notifier
            .emit(NotificationEvent::info(format!("Starting rollback to {}", short)))
            .await;

        let failure = self.run_steps(&ctx, cancel).await.err();

        match failure {
            None => {
                deployment.succeed()?;
                self.store.update_deployment(&deployment).await?;
                info!(project = %project.slug, "Rolled back to {}", short);
                self.notifier
                    .emit(NotificationEvent::success(format!(
                        "Successfully rolled back to {}",
                        short
                    )))
                    .await;

                Ok(RollbackOutcome {
                    success: true,
                    deployment,
                    message: Some("Rollback completed successfully".to_string()),
                    error: None,
                })
            }
            Some(message) => {
                deployment.fail(message.clone())?;
                self.store.update_deployment(&deployment).await?;
                error!(project = %project.slug, "Rollback failed: {}", message);
                self.notifier
                    .emit(NotificationEvent::error(format!("Rollback failed: {}", message)))
                    .await;

                Ok(RollbackOutcome {
                    success: false,
                    deployment,
                    message: None,
                    error: Some(message),
                })
            }
        }
    }

    fn prepare<'a>(&self, project: &'a Project, target: &'a Deployment) -> Result<SagaContext<'a>, EngineError> {
        if target.project_id != project.id {
            return Err(EngineError::Precondition("Project not found".to_string()));
        }

        let server = project.server.as_ref().ok_or_else(|| {
            EngineError::Precondition(format!("Project {} has no server", project.slug))
        })?;

        if target.status != RunStatus::Success {
            return Err(EngineError::Precondition(
                "Can only rollback to successful deployments".to_string(),
            ));
        }

        let commit_hash = target
            .commit_hash
            .clone()
            .ok_or_else(|| EngineError::Precondition("Target deployment has no commit hash".to_string()))?;
        if !is_commit_hash(&commit_hash) {
            return Err(EngineError::Precondition(format!(
                "Invalid commit hash: {:?}",
                commit_hash
            )));
        }

        let branch = if target.branch.trim().is_empty() {
            project.branch.clone()
        } else {
            target.branch.clone()
        };
        if branch.is_empty() || branch.starts_with('-') {
            return Err(EngineError::Precondition(format!("Invalid branch: {:?}", branch)));
        }

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        Ok(SagaContext {
            project,
            target,
            host: server.host_descriptor(),
            commit_hash,
            branch,
            project_path: self.settings.paths.project_path(&project.slug),
            backup_dir: format!("{}/{}", self.settings.paths.backup_path(&project.slug), timestamp),
        })
    }

    async fn run_steps(&self, ctx: &SagaContext<'_>, cancel: &CancellationToken) -> Result<(), String> {
        for step in SagaStep::ALL {
            if cancel.is_cancelled() {
                warn!(project = %ctx.project.slug, "Rollback cancelled before {}", step);
                return Err(format!("Cancelled before {}", step));
            }

            info!(project = %ctx.project.slug, step = step.name(), "Running rollback step");
            self.run_step(step, ctx)
                .await
                .map_err(|e| format!("{}: {}", step.failure_prefix(), e))?;
        }
        Ok(())
    }

    async fn run_step(&self, step: SagaStep, ctx: &SagaContext<'_>) -> Result<(), String> {
        let path = shell_quote(&ctx.project_path);
        match step {
            SagaStep::Backup => {
                let backup_dir = shell_quote(&ctx.backup_dir);
                let env_file = shell_quote(&format!("{}/.env", ctx.project_path));
                self.shell_step(
                    ctx,
                    &format!(
                        "mkdir -p {dir} && if [ -f {env} ]; then cp {env} {dir}/.env; fi",
                        dir = backup_dir,
                        env = env_file
                    ),
                )
                .await
            }
            SagaStep::Checkpoint => {
                let label = shell_quote(&format!(
                    "Backup before rollback to {}",
                    short_hash(&ctx.commit_hash)
                ));
                self.shell_step(ctx, &format!("cd {} && git stash push -m {}", path, label))
                    .await
            }
            SagaStep::GitPrepare => {
                self.shell_step(
                    ctx,
                    &format!(
                        "git config --global --add safe.directory {path} && cd {path} && git fetch origin {branch}",
                        path = path,
                        branch = shell_quote(&ctx.branch)
                    ),
                )
                .await
            }
            SagaStep::Checkout => {
                self.shell_step(
                    ctx,
                    &format!(
                        "cd {} && git checkout {} && git reset --hard {}",
                        path,
                        shell_quote(&ctx.branch),
                        shell_quote(&ctx.commit_hash)
                    ),
                )
                .await
            }
            SagaStep::RestoreEnvironment => {
                let snapshot = match &ctx.target.environment_snapshot {
                    Some(snapshot) if !snapshot.is_empty() => snapshot,
                    _ => {
                        info!(project = %ctx.project.slug, "No environment snapshot, skipping restore");
                        return Ok(());
                    }
                };
                let contents = render_env_file(snapshot).map_err(|e| e.to_string())?;
                self.shell_step(ctx, &write_env_command(&ctx.project_path, &contents))
                    .await
            }
            SagaStep::Redeploy => {
                let outcome = self.orchestrator.redeploy(ctx.project).await;
                if outcome.success {
                    Ok(())
                } else {
                    Err(outcome.error.unwrap_or_else(|| "unknown error".to_string()))
                }
            }
            SagaStep::HealthCheck => {
                let statuses = self
                    .orchestrator
                    .container_statuses(ctx.project)
                    .await
                    .map_err(|e| e.to_string())?;
                if statuses.iter().any(|c| c.is_running()) {
                    Ok(())
                } else {
                    Err("no running containers".to_string())
                }
            }
        }
    }

    async fn shell_step(&self, ctx: &SagaContext<'_>, body: &str) -> Result<(), String> {
        let result = self
            .shell
            .run(&ctx.host, body, self.settings.timeouts.git())
            .await;
        if result.succeeded() {
            Ok(())
        } else {
            if let Some(kind) = result.failure_kind() {
                warn!(project = %ctx.project.slug, kind = %kind, "Rollback step failed");
            }
            Err(result.error_message())
        }
    }
}

/// Hex object name, abbreviated or full
fn is_commit_hash(value: &str) -> bool {
    (4..=64).contains(&value.len()) && value.chars().all(|c| c.is_ascii_hexdigit())
}
