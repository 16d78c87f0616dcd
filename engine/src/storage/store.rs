//! Persistence collaborator

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::EngineError;
use crate::models::backup::FileBackup;
use crate::models::deployment::Deployment;
use crate::models::pipeline::{Pipeline, PipelineRun};
use crate::models::project::Project;

/// Record persistence.
///
/// Each call is an independent atomic write of one record; nothing here is
/// transactional.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_project(&self, id: &str) -> Result<Option<Project>, EngineError>;
    async fn save_project(&self, project: &Project) -> Result<(), EngineError>;

    async fn get_deployment(&self, id: &str) -> Result<Option<Deployment>, EngineError>;
    async fn create_deployment(&self, deployment: &Deployment) -> Result<(), EngineError>;
    async fn update_deployment(&self, deployment: &Deployment) -> Result<(), EngineError>;
    async fn list_deployments(&self, project_id: &str) -> Result<Vec<Deployment>, EngineError>;

    async fn get_pipeline(&self, id: &str) -> Result<Option<Pipeline>, EngineError>;
    async fn save_pipeline(&self, pipeline: &Pipeline) -> Result<(), EngineError>;

    async fn get_pipeline_run(&self, id: &str) -> Result<Option<PipelineRun>, EngineError>;
    async fn create_pipeline_run(&self, run: &PipelineRun) -> Result<(), EngineError>;
    async fn update_pipeline_run(&self, run: &PipelineRun) -> Result<(), EngineError>;

    async fn get_backup(&self, id: &str) -> Result<Option<FileBackup>, EngineError>;
    async fn create_backup(&self, backup: &FileBackup) -> Result<(), EngineError>;
    async fn update_backup(&self, backup: &FileBackup) -> Result<(), EngineError>;
}

/// In-process store.
///
/// Keeps every write of deployments and pipeline runs so callers can audit
/// how a record moved through its states.
#[derive(Default)]
pub struct MemoryStore {
    projects: RwLock<HashMap<String, Project>>,
    deployments: RwLock<HashMap<String, Vec<Deployment>>>,
    pipelines: RwLock<HashMap<String, Pipeline>>,
    pipeline_runs: RwLock<HashMap<String, Vec<PipelineRun>>>,
    backups: RwLock<HashMap<String, FileBackup>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every persisted version of a deployment, oldest first
    pub async fn deployment_writes(&self, id: &str) -> Vec<Deployment> {
        self.deployments.read().await.get(id).cloned().unwrap_or_default()
    }

    /// Every persisted version of a pipeline run, oldest first
    pub async fn pipeline_run_writes(&self, id: &str) -> Vec<PipelineRun> {
        self.pipeline_runs.read().await.get(id).cloned().unwrap_or_default()
    }

    /// All pipeline runs of a pipeline, latest version of each
    pub async fn pipeline_runs_for(&self, pipeline_id: &str) -> Vec<PipelineRun> {
        self.pipeline_runs
            .read()
            .await
            .values()
            .filter_map(|writes| writes.last())
            .filter(|run| run.pipeline_id == pipeline_id)
            .cloned()
            .collect()
    }
}

fn append_write<T: Clone>(
    map: &mut HashMap<String, Vec<T>>,
    id: &str,
    record: &T,
    create: bool,
    kind: &str,
) -> Result<(), EngineError> {
    match (map.get_mut(id), create) {
        (Some(_), true) => Err(EngineError::Persistence(format!("{} {} already exists", kind, id))),
        (None, false) => Err(EngineError::NotFound(format!("{} {}", kind, id))),
        (Some(writes), false) => {
            writes.push(record.clone());
            Ok(())
        }
        (None, true) => {
            map.insert(id.to_string(), vec![record.clone()]);
            Ok(())
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_project(&self, id: &str) -> Result<Option<Project>, EngineError> {
        Ok(self.projects.read().await.get(id).cloned())
    }

    async fn save_project(&self, project: &Project) -> Result<(), EngineError> {
        self.projects
            .write()
            .await
            .insert(project.id.clone(), project.clone());
        Ok(())
    }

    async fn get_deployment(&self, id: &str) -> Result<Option<Deployment>, EngineError> {
        Ok(self
            .deployments
            .read()
            .await
            .get(id)
            .and_then(|writes| writes.last())
            .cloned())
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<(), EngineError> {
        let mut deployments = self.deployments.write().await;
        append_write(&mut deployments, &deployment.id, deployment, true, "deployment")
    }

    async fn update_deployment(&self, deployment: &Deployment) -> Result<(), EngineError> {
        let mut deployments = self.deployments.write().await;
        append_write(&mut deployments, &deployment.id, deployment, false, "deployment")
    }

    async fn list_deployments(&self, project_id: &str) -> Result<Vec<Deployment>, EngineError> {
        Ok(self
            .deployments
            .read()
            .await
            .values()
            .filter_map(|writes| writes.last())
            .filter(|d| d.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn get_pipeline(&self, id: &str) -> Result<Option<Pipeline>, EngineError> {
        Ok(self.pipelines.read().await.get(id).cloned())
    }

    async fn save_pipeline(&self, pipeline: &Pipeline) -> Result<(), EngineError> {
        self.pipelines
            .write()
            .await
            .insert(pipeline.id.clone(), pipeline.clone());
        Ok(())
    }

    async fn get_pipeline_run(&self, id: &str) -> Result<Option<PipelineRun>, EngineError> {
        Ok(self
            .pipeline_runs
            .read()
            .await
            .get(id)
            .and_then(|writes| writes.last())
            .cloned())
    }

    async fn create_pipeline_run(&self, run: &PipelineRun) -> Result<(), EngineError> {
        let mut runs = self.pipeline_runs.write().await;
        append_write(&mut runs, &run.id, run, true, "pipeline run")
    }

    async fn update_pipeline_run(&self, run: &PipelineRun) -> Result<(), EngineError> {
        let mut runs = self.pipeline_runs.write().await;
        append_write(&mut runs, &run.id, run, false, "pipeline run")
    }

    async fn get_backup(&self, id: &str) -> Result<Option<FileBackup>, EngineError> {
        Ok(self.backups.read().await.get(id).cloned())
    }

    async fn create_backup(&self, backup: &FileBackup) -> Result<(), EngineError> {
        let mut backups = self.backups.write().await;
        if backups.contains_key(&backup.id) {
            return Err(EngineError::Persistence(format!("backup {} already exists", backup.id)));
        }
        backups.insert(backup.id.clone(), backup.clone());
        Ok(())
    }

    async fn update_backup(&self, backup: &FileBackup) -> Result<(), EngineError> {
        let mut backups = self.backups.write().await;
        match backups.get_mut(&backup.id) {
            Some(existing) => {
                *existing = backup.clone();
                Ok(())
            }
            None => Err(EngineError::NotFound(format!("backup {}", backup.id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::deployment::TriggeredBy;

    #[tokio::test]
    async fn test_deployment_writes_are_kept() {
        let store = MemoryStore::new();
        let mut deployment = Deployment::new("p1", "main", TriggeredBy::Manual);

        store.create_deployment(&deployment).await.unwrap();
        deployment.start().unwrap();
        store.update_deployment(&deployment).await.unwrap();

        let writes = store.deployment_writes(&deployment.id).await;
        assert_eq!(writes.len(), 2);
        assert_eq!(
            store.get_deployment(&deployment.id).await.unwrap().unwrap().status,
            deployment.status
        );
    }

    #[tokio::test]
    async fn test_create_twice_and_update_missing_fail() {
        let store = MemoryStore::new();
        let deployment = Deployment::new("p1", "main", TriggeredBy::Manual);

        assert!(store.update_deployment(&deployment).await.is_err());
        store.create_deployment(&deployment).await.unwrap();
        assert!(store.create_deployment(&deployment).await.is_err());
    }

    #[tokio::test]
    async fn test_list_deployments_filters_by_project() {
        let store = MemoryStore::new();
        store
            .create_deployment(&Deployment::new("p1", "main", TriggeredBy::Manual))
            .await
            .unwrap();
        store
            .create_deployment(&Deployment::new("p2", "main", TriggeredBy::Manual))
            .await
            .unwrap();

        assert_eq!(store.list_deployments("p1").await.unwrap().len(), 1);
    }
}
