//! Pipeline stage runner tests

mod common;

use std::sync::Arc;

use serde_json::json;

use common::{project, settings, shell, FakeTrigger, ScriptedRunner};
use devflow_engine::cancel::CancellationToken;
use devflow_engine::deploy::fsm::RunStatus;
use devflow_engine::errors::EngineError;
use devflow_engine::models::pipeline::{Pipeline, Provider};
use devflow_engine::pipeline::runner::PipelineRunner;
use devflow_engine::pipeline::trigger::TriggerResponse;
use devflow_engine::remote::result::CommandResult;
use devflow_engine::storage::store::{MemoryStore, Store};

fn pipeline(provider: Provider, configuration: serde_json::Value) -> Pipeline {
    Pipeline {
        id: "pl-1".to_string(),
        project_id: "proj-1".to_string(),
        name: "ci".to_string(),
        provider,
        configuration,
    }
}

fn custom(stages: serde_json::Value) -> Pipeline {
    pipeline(Provider::Custom, json!({ "stages": stages }))
}

struct Harness {
    store: Arc<MemoryStore>,
    runner: Arc<ScriptedRunner>,
    trigger: Arc<FakeTrigger>,
    pipelines: PipelineRunner,
}

async fn harness(trigger: Arc<FakeTrigger>) -> Harness {
    let store = Arc::new(MemoryStore::new());
    store.save_project(&project()).await.unwrap();

    let runner = ScriptedRunner::new();
    let pipelines = PipelineRunner::new(store.clone(), shell(runner.clone()), trigger.clone(), settings());

    Harness {
        store,
        runner,
        trigger,
        pipelines,
    }
}

async fn default_harness() -> Harness {
    harness(FakeTrigger::answering(Ok(TriggerResponse::default()))).await
}

#[tokio::test]
async fn test_all_steps_succeed() {
    let h = default_harness().await;
    h.runner.respond("git rev-parse HEAD", CommandResult::ok("0a1b2c3d4e5f\n"));

    let run = h
        .pipelines
        .run_pipeline(
            &project(),
            &custom(json!([["npm run build"], ["npm test"]])),
            "manual",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Success);
    assert!(run.completed_at.is_some());
    assert!(run.error.is_none());
    assert_eq!(run.commit_hash.as_deref(), Some("0a1b2c3d4e5f"));
    assert_eq!(run.branch.as_deref(), Some("main"));

    let steps: Vec<_> = run.steps.iter().map(|s| s.command.as_str()).collect();
    assert_eq!(steps, vec!["npm run build", "npm test"]);
    assert_eq!(run.steps[0].stage, "stage-1");
    assert_eq!(run.steps[1].stage, "stage-2");

    let commands = h.runner.commands();
    assert_eq!(commands[0], "cd '/opt/devflow/projects/shop' && git rev-parse HEAD");
    assert_eq!(commands[1], "cd '/opt/devflow/projects/shop' && npm run build");
    assert_eq!(commands[2], "cd '/opt/devflow/projects/shop' && npm test");
}

#[tokio::test]
async fn test_run_is_persisted_before_commit_resolution() {
    let h = default_harness().await;
    h.runner.respond("git rev-parse HEAD", CommandResult::ok("0a1b2c3d4e5f\n"));

    let run = h
        .pipelines
        .run_pipeline(&project(), &custom(json!([["make"]])), "manual", &CancellationToken::new())
        .await
        .unwrap();

    let writes = h.store.pipeline_run_writes(&run.id).await;
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0].status, RunStatus::Running);
    assert!(writes[0].commit_hash.is_none());
    assert_eq!(writes[1].commit_hash.as_deref(), Some("0a1b2c3d4e5f"));
}

#[tokio::test]
async fn test_fail_fast() {
    let h = default_harness().await;
    h.runner.fail_on("s2", "boom");

    let run = h
        .pipelines
        .run_pipeline(
            &project(),
            &custom(json!([["echo s1"], ["echo s2"], ["echo s3"]])),
            "manual",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.error.as_deref(), Some("Step failed: echo s2 - boom"));
    assert!(run.completed_at.is_some());

    let executed: Vec<_> = run.steps.iter().map(|s| s.command.as_str()).collect();
    assert_eq!(executed, vec!["echo s1", "echo s2"]);
    assert_eq!(run.steps[1].exit_code, 1);
    assert!(!h.runner.ran("echo s3"));
}

#[tokio::test]
async fn test_fail_fast_within_a_stage() {
    let h = default_harness().await;
    h.runner.fail_on("npm test", "1 failing");

    let run = h
        .pipelines
        .run_pipeline(
            &project(),
            &custom(json!([
                {"name": "verify", "steps": [
                    {"name": "unit", "run": "npm test"},
                    {"name": "lint", "run": "npm run lint"}
                ]},
                {"name": "package", "steps": [{"name": "build", "run": "npm run build"}]}
            ])),
            "webhook",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(run.error.as_deref(), Some("Step failed: unit - 1 failing"));
    assert_eq!(run.steps.len(), 1);
    assert_eq!(run.steps[0].stage, "verify");
    assert!(!h.runner.ran("npm run lint"));
    assert!(!h.runner.ran("npm run build"));
}

#[tokio::test]
async fn test_run_written_exactly_twice() {
    let h = default_harness().await;
    h.runner.fail_on("false", "");

    let run = h
        .pipelines
        .run_pipeline(
            &project(),
            &custom(json!([["true"], ["false"]])),
            "manual",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let writes = h.store.pipeline_run_writes(&run.id).await;
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0].status, RunStatus::Running);
    assert!(writes[0].started_at.is_some());
    assert!(writes[0].steps.is_empty());
    assert_eq!(writes[1].status, RunStatus::Failed);
    assert_eq!(writes[1].steps.len(), 2);
    // no stderr or stdout: the exit code is reported
    assert_eq!(writes[1].error.as_deref(), Some("Step failed: false - exited with code 1"));
}

#[tokio::test]
async fn test_commit_resolution_failure_is_not_fatal() {
    let h = default_harness().await;
    h.runner.fail_on("git rev-parse", "fatal: not a git repository");

    let run = h
        .pipelines
        .run_pipeline(&project(), &custom(json!([["make"]])), "manual", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Success);
    assert!(run.commit_hash.is_none());
}

#[tokio::test]
async fn test_empty_steps_are_skipped() {
    let h = default_harness().await;

    let run = h
        .pipelines
        .run_pipeline(
            &project(),
            &custom(json!([["", "make"], [{"name": "placeholder"}]])),
            "manual",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.steps.len(), 1);
    assert_eq!(h.runner.commands().len(), 2);
}

#[tokio::test]
async fn test_timeout_fails_the_step() {
    let h = default_harness().await;
    h.runner.respond("sleep", CommandResult::timeout(600));

    let run = h
        .pipelines
        .run_pipeline(&project(), &custom(json!([["sleep 1000"]])), "manual", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(
        run.error.as_deref(),
        Some("Step failed: sleep 1000 - Command timed out after 600s")
    );
    assert!(run.steps[0].raised_error.is_some());
}

#[tokio::test]
async fn test_cancelled_run() {
    let h = default_harness().await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let run = h
        .pipelines
        .run_pipeline(&project(), &custom(json!([["make"]])), "manual", &cancel)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.error.as_deref(), Some("Cancelled before make"));
    assert!(run.steps.is_empty());
    assert!(!h.runner.ran("make"));
    assert_eq!(h.store.pipeline_run_writes(&run.id).await.len(), 2);
}

#[tokio::test]
async fn test_run_by_id() {
    let h = default_harness().await;
    h.store
        .save_pipeline(&custom(json!([["make"]])))
        .await
        .unwrap();

    let run = h
        .pipelines
        .run("pl-1", "manual", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.pipeline_id, "pl-1");
    assert_eq!(h.store.pipeline_runs_for("pl-1").await.len(), 1);
}

#[tokio::test]
async fn test_unknown_pipeline() {
    let h = default_harness().await;

    let err = h
        .pipelines
        .run("missing", "manual", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Precondition(_)));
    assert!(h.runner.commands().is_empty());
}

#[tokio::test]
async fn test_project_without_server() {
    let h = default_harness().await;
    let mut project = project();
    project.server = None;
    let pipeline = custom(json!([["make"]]));

    let err = h
        .pipelines
        .run_pipeline(&project, &pipeline, "manual", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Precondition(_)));
    assert!(h.runner.commands().is_empty());
    assert!(h.store.pipeline_runs_for("pl-1").await.is_empty());
}

#[tokio::test]
async fn test_external_provider_is_triggered() {
    let h = harness(FakeTrigger::answering(Ok(TriggerResponse {
        external_id: Some("4711".to_string()),
        external_url: Some("https://gitlab.com/acme/shop/-/pipelines/4711".to_string()),
    })))
    .await;

    let run = h
        .pipelines
        .run_pipeline(
            &project(),
            &pipeline(Provider::Gitlab, json!({"stages": ["build"]})),
            "manual",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Running);
    assert_eq!(run.external_id.as_deref(), Some("4711"));
    assert!(h.runner.commands().is_empty());
    assert_eq!(h.trigger.calls.lock().unwrap().len(), 1);
    assert_eq!(h.store.pipeline_run_writes(&run.id).await.len(), 2);
}

#[tokio::test]
async fn test_external_trigger_failure() {
    let h = harness(FakeTrigger::answering(Err("GitLab API token not configured".to_string()))).await;

    let run = h
        .pipelines
        .run_pipeline(
            &project(),
            &pipeline(Provider::Gitlab, json!({})),
            "manual",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error.unwrap().contains("GitLab API token not configured"));
}
