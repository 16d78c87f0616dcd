//! Pipeline stage runner

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::cancel::CancellationToken;
use crate::errors::EngineError;
use crate::models::host::HostDescriptor;
use crate::models::pipeline::{Pipeline, PipelineDefinition, PipelineRun, Stage, Step, StepExecution};
use crate::models::project::Project;
use crate::pipeline::trigger::CiTrigger;
use crate::remote::builder::shell_quote;
use crate::remote::RemoteShell;
use crate::storage::settings::Settings;
use crate::storage::store::Store;

/// Executes pipeline runs.
///
/// Custom pipelines run step by step on the project's server, stopping at the
/// first failing step. Every other provider is only triggered. Either way the
/// run record is written exactly twice: once when it starts running and once
/// with its outcome.
pub struct PipelineRunner {
    store: Arc<dyn Store>,
    shell: RemoteShell,
    trigger: Arc<dyn CiTrigger>,
    settings: Settings,
}

impl PipelineRunner {
    pub fn new(
        store: Arc<dyn Store>,
        shell: RemoteShell,
        trigger: Arc<dyn CiTrigger>,
        settings: Settings,
    ) -> Self {
        Self {
            store,
            shell,
            trigger,
            settings,
        }
    }

    /// Load the pipeline and its project, then run it
    pub async fn run(
        &self,
        pipeline_id: &str,
        trigger: &str,
        cancel: &CancellationToken,
    ) -> Result<PipelineRun, EngineError> {
        let pipeline = self
            .store
            .get_pipeline(pipeline_id)
            .await?
            .ok_or_else(|| EngineError::Precondition("Pipeline not found".to_string()))?;
        let project = self
            .store
            .get_project(&pipeline.project_id)
            .await?
            .ok_or_else(|| EngineError::Precondition("Project not found".to_string()))?;

        self.run_pipeline(&project, &pipeline, trigger, cancel).await
    }

    /// Run `pipeline` for `project`.
    ///
    /// `Err` means nothing was executed or persisted, or a record write failed.
    /// Step failures come back as a `failed` run.
    pub async fn run_pipeline(
        &self,
        project: &Project,
        pipeline: &Pipeline,
        trigger: &str,
        cancel: &CancellationToken,
    ) -> Result<PipelineRun, EngineError> {
        match pipeline.definition()? {
            PipelineDefinition::Custom(stages) => {
                let host = project
                    .server
                    .as_ref()
                    .map(|server| server.host_descriptor())
                    .ok_or_else(|| {
                        EngineError::Precondition(format!("Project {} has no server", project.slug))
                    })?;
                self.run_custom(project, pipeline, &host, &stages, trigger, cancel)
                    .await
            }
            PipelineDefinition::External { .. } => self.run_external(project, pipeline, trigger).await,
        }
    }

    async fn run_custom(
        &self,
        project: &Project,
        pipeline: &Pipeline,
        host: &HostDescriptor,
        stages: &[Stage],
        trigger: &str,
        cancel: &CancellationToken,
    ) -> Result<PipelineRun, EngineError> {
        let workdir = self.settings.paths.pipeline_path(&project.slug);

        let mut run = PipelineRun::new(&pipeline.id, trigger);
        run.branch = Some(project.branch.clone());
        run.start()?;
        self.store.create_pipeline_run(&run).await?;

        // reaches the store with the terminal write
        run.commit_hash = self.resolve_commit(host, &workdir).await;

        info!(
            pipeline = %pipeline.id,
            run = %run.id,
            stages = stages.len(),
            "Starting custom pipeline"
        );

        match self.execute_stages(host, &workdir, stages, &mut run, cancel).await {
            Ok(()) => {
                run.succeed()?;
                info!(run = %run.id, steps = run.steps.len(), "Pipeline run succeeded");
            }
            Err(message) => {
                error!(run = %run.id, "Pipeline run failed: {}", message);
                run.fail(message)?;
            }
        }

        self.store.update_pipeline_run(&run).await?;
        Ok(run)
    }

    /// `git rev-parse HEAD` in the workspace; failure leaves the hash unset
    async fn resolve_commit(&self, host: &HostDescriptor, workdir: &str) -> Option<String> {
        let command = format!("cd {} && git rev-parse HEAD", shell_quote(workdir));
        let result = self
            .shell
            .run(host, &command, self.settings.timeouts.status_check())
            .await;

        let hash = result.stdout.trim();
        if result.succeeded() && !hash.is_empty() {
            Some(hash.to_string())
        } else {
            debug!("Could not resolve commit hash: {}", result.error_message());
            None
        }
    }

    async fn execute_stages(
        &self,
        host: &HostDescriptor,
        workdir: &str,
        stages: &[Stage],
        run: &mut PipelineRun,
        cancel: &CancellationToken,
    ) -> Result<(), String> {
        for stage in stages {
            debug!(stage = %stage.name, "Running stage");
            for step in &stage.steps {
                if step.command.trim().is_empty() {
                    debug!(step = %step.name, "Skipping empty step");
                    continue;
                }
                if cancel.is_cancelled() {
                    warn!(run = %run.id, "Pipeline run cancelled before {}", step.name);
                    return Err(format!("Cancelled before {}", step.name));
                }

                let (execution, failure) = self.execute_step(host, workdir, stage, step).await;
                run.steps.push(execution);

                if let Some(detail) = failure {
                    return Err(format!("Step failed: {} - {}", step.name, detail));
                }
            }
        }
        Ok(())
    }

    async fn execute_step(
        &self,
        host: &HostDescriptor,
        workdir: &str,
        stage: &Stage,
        step: &Step,
    ) -> (StepExecution, Option<String>) {
        info!(stage = %stage.name, step = %step.name, "Running step");
        let started = Instant::now();
        let command = format!("cd {} && {}", shell_quote(workdir), step.command);
        let result = self
            .shell
            .run(host, &command, self.settings.timeouts.pipeline_step())
            .await;

        let failure = (!result.succeeded()).then(|| result.error_message());

        let execution = StepExecution {
            stage: stage.name.clone(),
            step: step.name.clone(),
            command: step.command.clone(),
            exit_code: result.exit_code,
            stdout: result.stdout,
            stderr: result.stderr,
            raised_error: result.raised_error,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        (execution, failure)
    }

    async fn run_external(
        &self,
        project: &Project,
        pipeline: &Pipeline,
        trigger: &str,
    ) -> Result<PipelineRun, EngineError> {
        let mut run = PipelineRun::new(&pipeline.id, trigger);
        run.branch = Some(project.branch.clone());
        run.start()?;
        self.store.create_pipeline_run(&run).await?;

        match self.trigger.trigger(project, pipeline, &run).await {
            Ok(response) => {
                info!(
                    run = %run.id,
                    provider = %pipeline.provider,
                    external_id = ?response.external_id,
                    "External pipeline triggered"
                );
                run.external_id = response.external_id;
                run.external_url = response.external_url;
            }
            Err(e) => {
                error!(run = %run.id, provider = %pipeline.provider, "Trigger failed: {}", e);
                run.fail(e.to_string())?;
            }
        }

        self.store.update_pipeline_run(&run).await?;
        Ok(run)
    }
}
