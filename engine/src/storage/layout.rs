//! Storage layout configuration

use std::path::PathBuf;

use crate::errors::EngineError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Environment variable overriding the base directory
pub const HOME_ENV: &str = "DEVFLOW_HOME";

/// On-disk layout for settings and records
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the settings file path
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    pub fn projects_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("projects"))
    }

    pub fn deployments_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("deployments"))
    }

    pub fn pipelines_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("pipelines"))
    }

    pub fn pipeline_runs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("pipeline_runs"))
    }

    pub fn backups_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("backups"))
    }

    /// Default directory for materialized SSH keys
    pub fn keys_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("keys"))
    }

    /// Setup the storage layout (create directories)
    pub async fn setup(&self) -> Result<(), EngineError> {
        self.projects_dir().create().await?;
        self.deployments_dir().create().await?;
        self.pipelines_dir().create().await?;
        self.pipeline_runs_dir().create().await?;
        self.backups_dir().create().await?;
        self.keys_dir().create().await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        let base_dir = std::env::var_os(HOME_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/var/lib/devflow"));

        Self::new(base_dir)
    }
}
