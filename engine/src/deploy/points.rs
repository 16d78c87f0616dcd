//! Rollback point selection

use std::cmp::Ordering;

use crate::deploy::fsm::RunStatus;
use crate::errors::EngineError;
use crate::models::deployment::{Deployment, RollbackPoint, TriggeredBy};
use crate::storage::store::Store;

/// Default number of rollback points returned to the binary
pub const DEFAULT_LIMIT: usize = 10;

/// Newest first: `created_at` descending, then `id` descending
fn newest_first(a: &Deployment, b: &Deployment) -> Ordering {
    b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id))
}

/// The project's most recent deployment, whatever its status or trigger
pub fn latest_deployment_id(deployments: &[Deployment]) -> Option<&str> {
    deployments
        .iter()
        .min_by(|a, b| newest_first(a, b))
        .map(|d| d.id.as_str())
}

/// Successful non-rollback deployments, newest first, annotated with
/// whether they can be rolled back to.
///
/// `deployments` must all belong to one project.
pub fn select_rollback_points(deployments: &[Deployment], limit: Option<usize>) -> Vec<RollbackPoint> {
    let latest = latest_deployment_id(deployments);

    let mut candidates: Vec<&Deployment> = deployments
        .iter()
        .filter(|d| d.status == RunStatus::Success && d.triggered_by != TriggeredBy::Rollback)
        .collect();
    candidates.sort_by(|a, b| newest_first(a, b));

    candidates
        .into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|d| RollbackPoint {
            id: d.id.clone(),
            commit_hash: d.commit_hash.clone(),
            commit_message: d.commit_message.clone(),
            deployed_at: d.completed_at.unwrap_or(d.created_at),
            deployed_by: d.deployed_by.clone(),
            can_rollback: d.commit_hash.is_some() && Some(d.id.as_str()) != latest,
        })
        .collect()
}

/// Load a project's deployments and select its rollback points
pub async fn rollback_points(
    store: &dyn Store,
    project_id: &str,
    limit: Option<usize>,
) -> Result<Vec<RollbackPoint>, EngineError> {
    let deployments = store.list_deployments(project_id).await?;
    Ok(select_rollback_points(&deployments, limit))
}
