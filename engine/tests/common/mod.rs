//! Shared fakes for integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use devflow_engine::deploy::fsm::RunStatus;
use devflow_engine::deploy::orchestrator::{ContainerOrchestrator, ContainerStatus, RedeployOutcome};
use devflow_engine::errors::EngineError;
use devflow_engine::models::deployment::{Deployment, TriggeredBy};
use devflow_engine::models::pipeline::{Pipeline, PipelineRun};
use devflow_engine::models::project::{Project, Server};
use devflow_engine::notify::{NotificationEvent, Notifier};
use devflow_engine::pipeline::trigger::{CiTrigger, TriggerResponse};
use devflow_engine::remote::builder::CommandBuilder;
use devflow_engine::remote::executor::CommandRunner;
use devflow_engine::remote::result::CommandResult;
use devflow_engine::remote::RemoteShell;
use devflow_engine::storage::settings::Settings;

/// Command runner answering from substring rules and recording every command
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<(String, CommandResult)>>,
    commands: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer commands containing `needle` with `result`; first rule wins
    pub fn respond(&self, needle: &str, result: CommandResult) {
        self.rules
            .lock()
            .unwrap()
            .push((needle.to_string(), result));
    }

    /// Fail commands containing `needle` with exit 1 and `stderr`
    pub fn fail_on(&self, needle: &str, stderr: &str) {
        self.respond(needle, CommandResult::completed(1, "", stderr));
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn ran(&self, needle: &str) -> bool {
        self.commands().iter().any(|c| c.contains(needle))
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &str, _timeout: Duration) -> CommandResult {
        self.commands.lock().unwrap().push(command.to_string());
        self.rules
            .lock()
            .unwrap()
            .iter()
            .find(|(needle, _)| command.contains(needle.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_else(|| CommandResult::ok(""))
    }
}

/// Orchestrator with canned answers
pub struct FakeOrchestrator {
    pub redeploy: RedeployOutcome,
    pub statuses: Result<Vec<ContainerStatus>, String>,
    pub calls: Mutex<Vec<&'static str>>,
}

impl FakeOrchestrator {
    pub fn healthy() -> Arc<Self> {
        Self::with(
            RedeployOutcome::ok(),
            Ok(vec![ContainerStatus::new("shop-web-1", "running")]),
        )
    }

    pub fn with(redeploy: RedeployOutcome, statuses: Result<Vec<ContainerStatus>, String>) -> Arc<Self> {
        Arc::new(Self {
            redeploy,
            statuses,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerOrchestrator for FakeOrchestrator {
    async fn redeploy(&self, _project: &Project) -> RedeployOutcome {
        self.calls.lock().unwrap().push("redeploy");
        self.redeploy.clone()
    }

    async fn container_statuses(&self, _project: &Project) -> Result<Vec<ContainerStatus>, EngineError> {
        self.calls.lock().unwrap().push("container_statuses");
        self.statuses.clone().map_err(EngineError::Collaborator)
    }
}

/// Notifier keeping every event
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<NotificationEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn emit(&self, event: NotificationEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// CI trigger with a canned answer
pub struct FakeTrigger {
    pub response: Result<TriggerResponse, String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeTrigger {
    pub fn answering(response: Result<TriggerResponse, String>) -> Arc<Self> {
        Arc::new(Self {
            response,
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl CiTrigger for FakeTrigger {
    async fn trigger(
        &self,
        _project: &Project,
        pipeline: &Pipeline,
        run: &PipelineRun,
    ) -> Result<TriggerResponse, EngineError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}:{}", pipeline.id, run.id));
        self.response.clone().map_err(EngineError::Trigger)
    }
}

pub fn settings() -> Settings {
    Settings::default()
}

pub fn shell(runner: Arc<ScriptedRunner>) -> RemoteShell {
    RemoteShell::new(CommandBuilder::new(&settings().ssh), runner)
}

/// Project on a loopback server, so commands reach the runner unwrapped
pub fn project() -> Project {
    Project {
        id: "proj-1".to_string(),
        slug: "shop".to_string(),
        name: "Shop".to_string(),
        branch: "main".to_string(),
        repository_url: Some("https://github.com/acme/shop.git".to_string()),
        server: Some(Server {
            address: "127.0.0.1".to_string(),
            port: 22,
            username: "deploy".to_string(),
            ssh_key: None,
            ssh_password: None,
        }),
    }
}

/// A successful manual deployment of `proj-1`
pub fn deployment(id: &str, minute: u32, commit_hash: Option<&str>) -> Deployment {
    let mut deployment = Deployment::new("proj-1", "main", TriggeredBy::Manual);
    deployment.id = id.to_string();
    deployment.status = RunStatus::Success;
    deployment.commit_hash = commit_hash.map(str::to_string);
    deployment.commit_message = Some(format!("Deploy {}", id));
    deployment.created_at = Utc.with_ymd_and_hms(2025, 3, 1, 12, minute, 0).unwrap();
    deployment.completed_at = Some(deployment.created_at);
    deployment
}

pub fn snapshot(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
