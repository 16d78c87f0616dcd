//! JSON file store: one pretty-printed file per record

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::errors::EngineError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::models::backup::FileBackup;
use crate::models::deployment::Deployment;
use crate::models::pipeline::{Pipeline, PipelineRun};
use crate::models::project::Project;
use crate::storage::layout::StorageLayout;
use crate::storage::store::Store;

/// Store backed by the storage layout's record directories
#[derive(Debug, Clone)]
pub struct FileStore {
    layout: StorageLayout,
}

impl FileStore {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }
}

fn record_file(dir: &Dir, id: &str) -> Result<File, EngineError> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(EngineError::Persistence(format!("Invalid record id: {:?}", id)));
    }
    Ok(dir.file(&format!("{}.json", id)))
}

async fn read_record<T: DeserializeOwned>(dir: &Dir, id: &str) -> Result<Option<T>, EngineError> {
    let file = record_file(dir, id)?;
    if !file.exists().await {
        return Ok(None);
    }
    Ok(Some(file.read_json().await?))
}

async fn write_record<T: Serialize>(
    dir: &Dir,
    id: &str,
    record: &T,
    existing: Option<bool>,
) -> Result<(), EngineError> {
    let file = record_file(dir, id)?;
    match (existing, file.exists().await) {
        (Some(false), true) => {
            return Err(EngineError::Persistence(format!(
                "{} already exists",
                file.path().display()
            )))
        }
        (Some(true), false) => {
            return Err(EngineError::NotFound(file.path().display().to_string()));
        }
        _ => {}
    }
    debug!("Writing record {}", file.path().display());
    file.write_json(record).await
}

async fn read_all<T: DeserializeOwned>(dir: &Dir) -> Result<Vec<T>, EngineError> {
    let mut records = Vec::new();
    for path in dir.list_json_files().await? {
        match File::new(&path).read_json::<T>().await {
            Ok(record) => records.push(record),
            Err(e) => warn!("Skipping unreadable record {}: {}", path.display(), e),
        }
    }
    Ok(records)
}

#[async_trait]
impl Store for FileStore {
    async fn get_project(&self, id: &str) -> Result<Option<Project>, EngineError> {
        read_record(&self.layout.projects_dir(), id).await
    }

    async fn save_project(&self, project: &Project) -> Result<(), EngineError> {
        write_record(&self.layout.projects_dir(), &project.id, project, None).await
    }

    async fn get_deployment(&self, id: &str) -> Result<Option<Deployment>, EngineError> {
        read_record(&self.layout.deployments_dir(), id).await
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<(), EngineError> {
        write_record(&self.layout.deployments_dir(), &deployment.id, deployment, Some(false)).await
    }

    async fn update_deployment(&self, deployment: &Deployment) -> Result<(), EngineError> {
        write_record(&self.layout.deployments_dir(), &deployment.id, deployment, Some(true)).await
    }

    async fn list_deployments(&self, project_id: &str) -> Result<Vec<Deployment>, EngineError> {
        let deployments: Vec<Deployment> = read_all(&self.layout.deployments_dir()).await?;
        Ok(deployments
            .into_iter()
            .filter(|d| d.project_id == project_id)
            .collect())
    }

    async fn get_pipeline(&self, id: &str) -> Result<Option<Pipeline>, EngineError> {
        read_record(&self.layout.pipelines_dir(), id).await
    }

    async fn save_pipeline(&self, pipeline: &Pipeline) -> Result<(), EngineError> {
        write_record(&self.layout.pipelines_dir(), &pipeline.id, pipeline, None).await
    }

    async fn get_pipeline_run(&self, id: &str) -> Result<Option<PipelineRun>, EngineError> {
        read_record(&self.layout.pipeline_runs_dir(), id).await
    }

    async fn create_pipeline_run(&self, run: &PipelineRun) -> Result<(), EngineError> {
        write_record(&self.layout.pipeline_runs_dir(), &run.id, run, Some(false)).await
    }

    async fn update_pipeline_run(&self, run: &PipelineRun) -> Result<(), EngineError> {
        write_record(&self.layout.pipeline_runs_dir(), &run.id, run, Some(true)).await
    }

    async fn get_backup(&self, id: &str) -> Result<Option<FileBackup>, EngineError> {
        read_record(&self.layout.backups_dir(), id).await
    }

    async fn create_backup(&self, backup: &FileBackup) -> Result<(), EngineError> {
        write_record(&self.layout.backups_dir(), &backup.id, backup, Some(false)).await
    }

    async fn update_backup(&self, backup: &FileBackup) -> Result<(), EngineError> {
        write_record(&self.layout.backups_dir(), &backup.id, backup, Some(true)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::fsm::RunStatus;
    use crate::models::deployment::TriggeredBy;

    #[tokio::test]
    async fn test_deployment_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(StorageLayout::new(dir.path()));

        let mut deployment = Deployment::new("p1", "main", TriggeredBy::Rollback);
        store.create_deployment(&deployment).await.unwrap();
        deployment.start().unwrap();
        store.update_deployment(&deployment).await.unwrap();

        let loaded = store.get_deployment(&deployment.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Running);
        assert_eq!(store.list_deployments("p1").await.unwrap().len(), 1);
        assert!(store.list_deployments("p2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(StorageLayout::new(dir.path()));

        assert!(store.get_deployment("../settings").await.is_err());
        assert!(store.get_project("").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(StorageLayout::new(dir.path()));

        assert!(store.get_pipeline("nope").await.unwrap().is_none());
        assert!(store.list_deployments("p1").await.unwrap().is_empty());

        let run = PipelineRun::new("pl-1", "manual");
        assert!(store.update_pipeline_run(&run).await.is_err());
    }
}
