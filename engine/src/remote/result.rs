//! Outcome of one executed command

use std::fmt;

use serde::{Deserialize, Serialize};

/// Exit code reported when the process never produced one
pub const SYNTHETIC_EXIT_CODE: i32 = -1;

/// Exit code `ssh` uses for its own (non-remote) failures
const SSH_ERROR_EXIT_CODE: i32 = 255;

const CONNECTIVITY_MARKERS: [&str; 6] = [
    "connection refused",
    "could not resolve hostname",
    "connection timed out",
    "no route to host",
    "network is unreachable",
    "connection closed by",
];

const AUTH_MARKERS: [&str; 4] = [
    "permission denied",
    "authentication failed",
    "too many authentication failures",
    "invalid format",
];

/// Result of running one built command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,

    /// Set when the executor itself failed (spawn, IO, timeout)
    #[serde(default)]
    pub raised_error: Option<String>,

    /// Set when the per-call timeout elapsed
    #[serde(default)]
    pub timed_out: bool,
}

impl CommandResult {
    /// A process that ran to completion
    pub fn completed(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            raised_error: None,
            timed_out: false,
        }
    }

    /// A successful process with the given output
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self::completed(0, stdout, "")
    }

    /// The executor could not launch or talk to the process
    pub fn raised(message: impl Into<String>) -> Self {
        Self {
            exit_code: SYNTHETIC_EXIT_CODE,
            stdout: String::new(),
            stderr: String::new(),
            raised_error: Some(message.into()),
            timed_out: false,
        }
    }

    /// The per-call timeout elapsed
    pub fn timeout(after_secs: u64) -> Self {
        Self {
            timed_out: true,
            ..Self::raised(format!("Command timed out after {}s", after_secs))
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == 0 && self.raised_error.is_none()
    }

    /// Human-readable failure message: stderr, else the raised error, else stdout
    pub fn error_message(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        if let Some(raised) = &self.raised_error {
            return raised.clone();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        format!("exited with code {}", self.exit_code)
    }

    /// Classify a failure. `None` when the command succeeded.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        if self.succeeded() {
            return None;
        }
        if self.timed_out {
            return Some(FailureKind::Connectivity);
        }
        if self.raised_error.is_some() {
            return Some(FailureKind::System);
        }

        if self.exit_code == SSH_ERROR_EXIT_CODE {
            let stderr = self.stderr.to_lowercase();
            if CONNECTIVITY_MARKERS.iter().any(|m| stderr.contains(m)) {
                return Some(FailureKind::Connectivity);
            }
            if AUTH_MARKERS.iter().any(|m| stderr.contains(m)) {
                return Some(FailureKind::Auth);
            }
        }

        Some(FailureKind::RemoteCommand)
    }
}

/// Failure taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Timeout, refused connection, resolution failure
    Connectivity,

    /// Rejected credentials or malformed key
    Auth,

    /// The remote process ran and exited non-zero
    RemoteCommand,

    /// Caller-level invariant violated before any remote call
    Precondition,

    /// Local spawn or IO failure
    System,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Connectivity => "connectivity failure",
            FailureKind::Auth => "authentication failure",
            FailureKind::RemoteCommand => "remote command failure",
            FailureKind::Precondition => "precondition failure",
            FailureKind::System => "system error",
        };
        f.write_str(name)
    }
}
