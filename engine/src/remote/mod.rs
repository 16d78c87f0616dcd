//! Remote command plumbing: build, then execute

pub mod builder;
pub mod executor;
pub mod keys;
pub mod result;

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::models::host::{Credential, HostDescriptor};
use crate::remote::builder::{BuildOptions, CommandBuilder};
use crate::remote::executor::CommandRunner;
use crate::remote::result::CommandResult;

/// Builder and executor bound together for workflow code
#[derive(Clone)]
pub struct RemoteShell {
    builder: CommandBuilder,
    runner: Arc<dyn CommandRunner>,
}

impl RemoteShell {
    pub fn new(builder: CommandBuilder, runner: Arc<dyn CommandRunner>) -> Self {
        Self { builder, runner }
    }

    pub fn builder(&self) -> &CommandBuilder {
        &self.builder
    }

    /// Run `body` on `host`
    pub async fn run(&self, host: &HostDescriptor, body: &str, timeout: Duration) -> CommandResult {
        self.run_with(host, body, timeout, BuildOptions::default()).await
    }

    /// Run `body` on `host` with explicit build options
    pub async fn run_with(
        &self,
        host: &HostDescriptor,
        body: &str,
        timeout: Duration,
        options: BuildOptions,
    ) -> CommandResult {
        if let Credential::KeyMaterial(key) = &host.credential {
            if !host.is_loopback() {
                if let Err(e) = self.builder.keys().materialize(key).await {
                    return CommandResult::raised(format!("Failed to materialize SSH key: {}", e));
                }
            }
        }

        let command = self.builder.build(host, body, options);
        debug!(host = %host.address, port = host.port, "Running command");
        self.runner.run(&command, timeout).await
    }
}
