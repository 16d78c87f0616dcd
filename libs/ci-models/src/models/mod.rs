//! API models

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// GitHub Actions `workflow_dispatch` request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubDispatchRequest {
    #[serde(rename = "ref")]
    pub git_ref: String,
    #[serde(default)]
    pub inputs: HashMap<String, String>,
}

/// A CI variable passed to a GitLab pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitlabVariable {
    pub key: String,
    pub value: String,
}

/// GitLab pipeline trigger request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitlabPipelineRequest {
    #[serde(rename = "ref")]
    pub git_ref: String,
    #[serde(default)]
    pub variables: Vec<GitlabVariable>,
}

/// GitLab pipeline trigger response (subset)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitlabPipelineResponse {
    pub id: Option<u64>,
    pub web_url: Option<String>,
    pub status: Option<String>,
}

/// GitLab error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitlabErrorResponse {
    pub message: serde_json::Value,
}

/// Bitbucket pipeline target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitbucketTarget {
    #[serde(rename = "type")]
    pub target_type: String,
    pub ref_type: String,
    pub ref_name: String,
}

/// Bitbucket pipeline trigger request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitbucketPipelineRequest {
    pub target: BitbucketTarget,
}

impl BitbucketPipelineRequest {
    /// Trigger the pipeline of a branch
    pub fn for_branch(branch: &str) -> Self {
        Self {
            target: BitbucketTarget {
                target_type: "pipeline_ref_target".to_string(),
                ref_type: "branch".to_string(),
                ref_name: branch.to_string(),
            },
        }
    }
}

/// Bitbucket pipeline trigger response (subset)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitbucketPipelineResponse {
    pub uuid: Option<String>,
    pub build_number: Option<u64>,
}

/// Jenkins `buildWithParameters` form fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JenkinsBuildParameters {
    #[serde(rename = "BRANCH")]
    pub branch: String,
    #[serde(rename = "COMMIT_HASH", skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    #[serde(rename = "DEVFLOW_PIPELINE_RUN_ID")]
    pub pipeline_run_id: String,
    #[serde(rename = "DEVFLOW_PROJECT_ID")]
    pub project_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn github_dispatch_uses_ref_key() {
        let request = GithubDispatchRequest {
            git_ref: "main".to_string(),
            inputs: HashMap::from([("pipeline_run_id".to_string(), "42".to_string())]),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["ref"], "main");
        assert_eq!(json["inputs"]["pipeline_run_id"], "42");
    }

    #[test]
    fn bitbucket_branch_target() {
        let json = serde_json::to_value(BitbucketPipelineRequest::for_branch("develop")).unwrap();
        assert_eq!(json["target"]["type"], "pipeline_ref_target");
        assert_eq!(json["target"]["ref_name"], "develop");
    }

    #[test]
    fn jenkins_parameters_skip_missing_commit() {
        let params = JenkinsBuildParameters {
            branch: "main".to_string(),
            commit_hash: None,
            pipeline_run_id: "run-1".to_string(),
            project_id: "proj-1".to_string(),
        };
        let json = serde_json::to_value(&params).unwrap();
        assert!(json.get("COMMIT_HASH").is_none());
        assert_eq!(json["BRANCH"], "main");
    }
}
