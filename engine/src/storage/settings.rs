//! Settings file management

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;

/// Engine settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// SSH command building
    #[serde(default)]
    pub ssh: SshSettings,

    /// Remote directory layout
    #[serde(default)]
    pub paths: PathSettings,

    /// Per-command timeouts
    #[serde(default)]
    pub timeouts: TimeoutSettings,

    /// External CI providers
    #[serde(default)]
    pub ci: CiSettings,

    /// Docker Compose collaborator
    #[serde(default)]
    pub compose: ComposeSettings,
}

/// SSH settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshSettings {
    /// `ssh -o ConnectTimeout`
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Where key material is written for `ssh -i`
    #[serde(default = "default_key_dir")]
    pub key_dir: PathBuf,

    /// Bodies longer than this are shipped base64-encoded
    #[serde(default = "default_encode_threshold")]
    pub encode_threshold: usize,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_key_dir() -> PathBuf {
    std::env::temp_dir().join("devflow-keys")
}

fn default_encode_threshold() -> usize {
    500
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            key_dir: default_key_dir(),
            encode_threshold: default_encode_threshold(),
        }
    }
}

/// Remote directory layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Deployed project checkouts: `<projects_root>/<slug>`
    #[serde(default = "default_projects_root")]
    pub projects_root: String,

    /// Rollback state backups: `<backups_root>/<slug>/<timestamp>`
    #[serde(default = "default_backups_root")]
    pub backups_root: String,

    /// Pipeline workspaces: `<pipelines_root>/<slug>`
    #[serde(default = "default_pipelines_root")]
    pub pipelines_root: String,

    /// Remote scratch directory for backup archives
    #[serde(default = "default_archive_root")]
    pub archive_root: String,
}

fn default_projects_root() -> String {
    "/var/www".to_string()
}

fn default_backups_root() -> String {
    "/var/www/backups".to_string()
}

fn default_pipelines_root() -> String {
    "/opt/devflow/projects".to_string()
}

fn default_archive_root() -> String {
    "/tmp/devflow-backups".to_string()
}

impl PathSettings {
    pub fn project_path(&self, slug: &str) -> String {
        format!("{}/{}", self.projects_root.trim_end_matches('/'), slug)
    }

    pub fn backup_path(&self, slug: &str) -> String {
        format!("{}/{}", self.backups_root.trim_end_matches('/'), slug)
    }

    pub fn pipeline_path(&self, slug: &str) -> String {
        format!("{}/{}", self.pipelines_root.trim_end_matches('/'), slug)
    }
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            projects_root: default_projects_root(),
            backups_root: default_backups_root(),
            pipelines_root: default_pipelines_root(),
            archive_root: default_archive_root(),
        }
    }
}

/// Timeouts in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutSettings {
    #[serde(default = "default_status_check")]
    pub status_check: u64,

    #[serde(default = "default_verification")]
    pub verification: u64,

    #[serde(default = "default_git")]
    pub git: u64,

    #[serde(default = "default_pipeline_step")]
    pub pipeline_step: u64,

    /// Container rebuilds
    #[serde(default = "default_deploy")]
    pub deploy: u64,

    #[serde(default = "default_backup")]
    pub backup: u64,
}

fn default_status_check() -> u64 {
    10
}

fn default_verification() -> u64 {
    30
}

fn default_git() -> u64 {
    120
}

fn default_pipeline_step() -> u64 {
    600
}

fn default_deploy() -> u64 {
    600
}

fn default_backup() -> u64 {
    3600
}

impl TimeoutSettings {
    pub fn status_check(&self) -> Duration {
        Duration::from_secs(self.status_check)
    }

    pub fn verification(&self) -> Duration {
        Duration::from_secs(self.verification)
    }

    pub fn git(&self) -> Duration {
        Duration::from_secs(self.git)
    }

    pub fn pipeline_step(&self) -> Duration {
        Duration::from_secs(self.pipeline_step)
    }

    pub fn deploy(&self) -> Duration {
        Duration::from_secs(self.deploy)
    }

    pub fn backup(&self) -> Duration {
        Duration::from_secs(self.backup)
    }
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            status_check: default_status_check(),
            verification: default_verification(),
            git: default_git(),
            pipeline_step: default_pipeline_step(),
            deploy: default_deploy(),
            backup: default_backup(),
        }
    }
}

/// External CI provider credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CiSettings {
    #[serde(default = "default_github_api")]
    pub github_api_url: String,

    #[serde(default)]
    pub github_token: Option<String>,

    /// Workflow file dispatched on GitHub
    #[serde(default = "default_github_workflow")]
    pub github_workflow: String,

    #[serde(default = "default_gitlab_url")]
    pub gitlab_url: String,

    #[serde(default)]
    pub gitlab_token: Option<String>,

    #[serde(default = "default_bitbucket_api")]
    pub bitbucket_api_url: String,

    #[serde(default)]
    pub bitbucket_token: Option<String>,

    #[serde(default)]
    pub jenkins_url: Option<String>,

    #[serde(default)]
    pub jenkins_user: Option<String>,

    #[serde(default)]
    pub jenkins_token: Option<String>,

    /// HTTP timeout for trigger calls
    #[serde(default = "default_ci_timeout")]
    pub timeout_secs: u64,
}

fn default_github_api() -> String {
    "https://api.github.com".to_string()
}

fn default_github_workflow() -> String {
    "devflow.yml".to_string()
}

fn default_gitlab_url() -> String {
    "https://gitlab.com".to_string()
}

fn default_bitbucket_api() -> String {
    "https://api.bitbucket.org".to_string()
}

fn default_ci_timeout() -> u64 {
    30
}

impl Default for CiSettings {
    fn default() -> Self {
        Self {
            github_api_url: default_github_api(),
            github_token: None,
            github_workflow: default_github_workflow(),
            gitlab_url: default_gitlab_url(),
            gitlab_token: None,
            bitbucket_api_url: default_bitbucket_api(),
            bitbucket_token: None,
            jenkins_url: None,
            jenkins_user: None,
            jenkins_token: None,
            timeout_secs: default_ci_timeout(),
        }
    }
}

/// Docker Compose settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComposeSettings {
    /// Run docker through the sudo prefix
    #[serde(default)]
    pub use_sudo: bool,
}
