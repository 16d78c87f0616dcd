//! Command executor

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::remote::result::{CommandResult, SYNTHETIC_EXIT_CODE};

/// Runs one built command string.
///
/// Implementations never fail: launch errors, IO errors and timeouts all come
/// back as a [`CommandResult`]. One invocation per call, no retries.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str, timeout: Duration) -> CommandResult;
}

/// Runs commands through `sh -c` on this machine
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    shell: String,
}

impl ProcessExecutor {
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }

    /// Use a different POSIX shell binary
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self { shell: shell.into() }
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for ProcessExecutor {
    async fn run(&self, command: &str, timeout: Duration) -> CommandResult {
        let started = Instant::now();

        let child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to spawn {}: {}", self.shell, e);
                return CommandResult::raised(format!("Failed to spawn {}: {}", self.shell, e));
            }
        };

        // Dropping the wait future on timeout kills the child (kill_on_drop)
        let result = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => CommandResult::completed(
                output.status.code().unwrap_or(SYNTHETIC_EXIT_CODE),
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr),
            ),
            Ok(Err(e)) => CommandResult::raised(format!("Failed to read command output: {}", e)),
            Err(_) => {
                warn!("Command timed out after {}s", timeout.as_secs());
                CommandResult::timeout(timeout.as_secs())
            }
        };

        debug!(
            exit_code = result.exit_code,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }
}
