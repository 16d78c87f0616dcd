//! DevFlow Engine - Entry Point
//!
//! Runs one rollback or pipeline run against the records under the storage
//! layout, or lists rollback points, and prints the result as JSON.

use std::collections::HashMap;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use devflow_engine::cancel::CancellationToken;
use devflow_engine::deploy::compose::ComposeOrchestrator;
use devflow_engine::deploy::points::{rollback_points, DEFAULT_LIMIT};
use devflow_engine::deploy::rollback::RollbackSaga;
use devflow_engine::errors::EngineError;
use devflow_engine::logs::{init_logging, LogOptions};
use devflow_engine::notify::TracingNotifier;
use devflow_engine::pipeline::runner::PipelineRunner;
use devflow_engine::pipeline::trigger::HttpCiTrigger;
use devflow_engine::remote::builder::CommandBuilder;
use devflow_engine::remote::executor::ProcessExecutor;
use devflow_engine::remote::RemoteShell;
use devflow_engine::storage::file_store::FileStore;
use devflow_engine::storage::layout::StorageLayout;
use devflow_engine::storage::load_settings;
use devflow_engine::storage::store::Store;
use devflow_engine::utils::{run_diagnostic, version_info};

const USAGE: &str = "usage: devflow-engine [--version | --diagnostic | --rollback=<deployment id> \
                     | --pipeline=<pipeline id> [--trigger=<name>] | --rollback-points=<project id> [--limit=<n>]]";

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    if cli_args.contains_key("version") {
        print_json(&version_info());
        return ExitCode::SUCCESS;
    }

    if cli_args.contains_key("diagnostic") || cli_args.contains_key("diag") {
        let checks = run_diagnostic();
        print_json(&checks);
        return if checks.iter().all(|c| c.path.is_some()) {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    }

    let layout = StorageLayout::default();
    let settings = match load_settings(&layout).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to read settings file: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    let log_options = LogOptions::new(settings.log_level.clone(), cli_args.contains_key("json-logs"));
    if let Err(e) = init_logging(log_options) {
        eprintln!("Failed to initialize logging: {e}");
    }

    if let Err(e) = layout.setup().await {
        error!("Unable to prepare storage at {}: {}", layout.base_dir.display(), e);
        return ExitCode::FAILURE;
    }

    let store: Arc<dyn Store> = Arc::new(FileStore::new(layout.clone()));
    let shell = RemoteShell::new(
        CommandBuilder::new(&settings.ssh),
        Arc::new(ProcessExecutor::new()),
    );

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let result: Result<serde_json::Value, EngineError> = if let Some(target) = cli_args.get("rollback") {
        let saga = RollbackSaga::new(
            store.clone(),
            shell.clone(),
            Arc::new(ComposeOrchestrator::new(shell.clone(), settings.clone())),
            Arc::new(TracingNotifier),
            settings.clone(),
        );
        let deployed_by = cli_args.get("user").cloned();
        match saga.rollback(target, deployed_by, &cancel).await {
            Ok(outcome) => serde_json::to_value(&outcome).map_err(EngineError::from),
            Err(e) => Err(e),
        }
    } else if let Some(pipeline_id) = cli_args.get("pipeline") {
        let trigger = match HttpCiTrigger::new(settings.ci.clone()) {
            Ok(trigger) => trigger,
            Err(e) => {
                error!("Unable to build the CI client: {}", e);
                return ExitCode::FAILURE;
            }
        };
        let runner = PipelineRunner::new(store.clone(), shell.clone(), Arc::new(trigger), settings.clone());
        let trigger_name = cli_args
            .get("trigger")
            .map(String::as_str)
            .unwrap_or("manual");
        match runner.run(pipeline_id, trigger_name, &cancel).await {
            Ok(run) => serde_json::to_value(&run).map_err(EngineError::from),
            Err(e) => Err(e),
        }
    } else if let Some(project_id) = cli_args.get("rollback-points") {
        let limit = match cli_args.get("limit").map(|l| l.parse::<usize>()) {
            None => DEFAULT_LIMIT,
            Some(Ok(limit)) => limit,
            Some(Err(_)) => {
                error!("--limit must be a non-negative integer");
                return ExitCode::FAILURE;
            }
        };
        match rollback_points(store.as_ref(), project_id, Some(limit)).await {
            Ok(points) => serde_json::to_value(&points).map_err(EngineError::from),
            Err(e) => Err(e),
        }
    } else {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };

    match result {
        Ok(value) => {
            print_json(&value);
            let failed = value.get("success") == Some(&serde_json::Value::Bool(false))
                || value.get("status").and_then(|s| s.as_str()) == Some("failed");
            if failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            error!("{}", e);
            print_json(&serde_json::json!({ "success": false, "error": e.to_string() }));
            ExitCode::FAILURE
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Failed to serialize output: {e}"),
    }
}

/// Cancel between steps on SIGINT/SIGTERM; the running command is left alone
async fn cancel_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            _ => {
                warn!("Unable to install signal handlers, cancellation disabled");
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, cancelling after the current step...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, cancelling after the current step...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!("Unable to listen for Ctrl+C, cancellation disabled");
            return;
        }
        info!("Ctrl+C received, cancelling after the current step...");
    }

    cancel.cancel();
}
