//! File backup models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Backup kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupKind {
    Full,
    Incremental,
}

/// Backup lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// A file backup of a project's source tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileBackup {
    pub id: String,
    pub project_id: String,
    pub kind: BackupKind,
    pub status: BackupStatus,

    /// Directory that was archived on the server
    pub source_path: String,

    /// Archive location on the server
    #[serde(default)]
    pub archive_path: Option<String>,

    /// Full backup this incremental builds on
    #[serde(default)]
    pub parent_backup_id: Option<String>,

    /// Glob fragments excluded from the archive
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub error: Option<String>,
}

impl FileBackup {
    pub fn is_completed(&self) -> bool {
        self.status == BackupStatus::Completed
    }
}
