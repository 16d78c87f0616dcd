//! External CI triggers for non-custom providers
//!
//! The provider is told to start its own pipeline and nothing more: the
//! response is recorded on the run and never polled.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use ci_models::models::{
    BitbucketPipelineRequest, BitbucketPipelineResponse, GithubDispatchRequest, GitlabErrorResponse,
    GitlabPipelineRequest, GitlabPipelineResponse, GitlabVariable, JenkinsBuildParameters,
};
use reqwest::{header, Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::errors::EngineError;
use crate::models::pipeline::{Pipeline, PipelineRun, Provider};
use crate::models::project::Project;
use crate::storage::settings::CiSettings;

/// Owner/name of a hosted repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRef {
    /// Everything before the repository name (may contain `/` for nested groups)
    pub owner: String,
    pub name: String,
    /// `owner/name`
    pub path: String,
}

/// Parse `https://host/owner/repo(.git)`, `ssh://git@host/owner/repo` or
/// `git@host:owner/repo(.git)`
pub fn parse_repository(repository_url: &str) -> Result<RepositoryRef, EngineError> {
    let trimmed = repository_url.trim();
    let invalid = || EngineError::Trigger(format!("Invalid repository URL: {}", repository_url));

    let raw_path = if trimmed.contains("://") {
        let parsed = url::Url::parse(trimmed).map_err(|_| invalid())?;
        parsed.path().to_string()
    } else {
        // scp-like syntax: user@host:path
        let (_, path) = trimmed.split_once(':').ok_or_else(invalid)?;
        path.to_string()
    };

    let path = raw_path
        .trim_matches('/')
        .trim_end_matches(".git")
        .trim_end_matches('/')
        .to_string();
    let (owner, name) = path.rsplit_once('/').ok_or_else(invalid)?;
    if owner.is_empty() || name.is_empty() || owner.split('/').any(str::is_empty) {
        return Err(invalid());
    }

    Ok(RepositoryRef {
        owner: owner.to_string(),
        name: name.to_string(),
        path: path.clone(),
    })
}

/// What the provider told us about the started pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerResponse {
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub external_url: Option<String>,
}

/// Starts a pipeline on an external CI provider
#[async_trait]
pub trait CiTrigger: Send + Sync {
    async fn trigger(
        &self,
        project: &Project,
        pipeline: &Pipeline,
        run: &PipelineRun,
    ) -> Result<TriggerResponse, EngineError>;
}

/// reqwest-backed trigger for GitHub, GitLab, Bitbucket and Jenkins
pub struct HttpCiTrigger {
    client: Client,
    settings: CiSettings,
}

impl HttpCiTrigger {
    pub fn new(settings: CiSettings) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(concat!("devflow-engine/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, settings })
    }

    async fn github(
        &self,
        project: &Project,
        pipeline: &Pipeline,
        run: &PipelineRun,
        branch: &str,
    ) -> Result<TriggerResponse, EngineError> {
        let token = required(&self.settings.github_token, "GitHub API token not configured")?;
        let repo = repository(project)?;
        let workflow = pipeline
            .config_str("workflow")
            .unwrap_or(self.settings.github_workflow.as_str());

        let url = format!(
            "{}/repos/{}/{}/actions/workflows/{}/dispatches",
            self.settings.github_api_url.trim_end_matches('/'),
            repo.owner,
            repo.name,
            workflow
        );
        let body = GithubDispatchRequest {
            git_ref: branch.to_string(),
            inputs: HashMap::from([("pipeline_run_id".to_string(), run.id.clone())]),
        };

        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::ACCEPT, "application/vnd.github+json")
            .json(&body)
            .send()
            .await?;
        ensure_success("GitHub", response).await?;

        Ok(TriggerResponse {
            external_id: None,
            external_url: Some(format!("https://github.com/{}/actions", repo.path)),
        })
    }

    async fn gitlab(
        &self,
        project: &Project,
        run: &PipelineRun,
        branch: &str,
    ) -> Result<TriggerResponse, EngineError> {
        let token = required(&self.settings.gitlab_token, "GitLab API token not configured")?;
        let repo = repository(project)?;
        let encoded: String = url::form_urlencoded::byte_serialize(repo.path.as_bytes()).collect();

        let url = format!(
            "{}/api/v4/projects/{}/pipeline",
            self.settings.gitlab_url.trim_end_matches('/'),
            encoded
        );
        let body = GitlabPipelineRequest {
            git_ref: branch.to_string(),
            variables: vec![
                GitlabVariable {
                    key: "DEVFLOW_PIPELINE_RUN_ID".to_string(),
                    value: run.id.clone(),
                },
                GitlabVariable {
                    key: "DEVFLOW_TRIGGERED".to_string(),
                    value: "true".to_string(),
                },
            ],
        };

        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .header("PRIVATE-TOKEN", token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GitlabErrorResponse>(&text)
                .map(|e| e.message.to_string())
                .unwrap_or(text);
            error!("GitLab trigger failed: {} - {}", status, message);
            return Err(EngineError::Trigger(format!("GitLab API returned {}: {}", status, message)));
        }

        let body: GitlabPipelineResponse = response.json().await?;
        Ok(TriggerResponse {
            external_id: body.id.map(|id| id.to_string()),
            external_url: body.web_url,
        })
    }

    async fn bitbucket(&self, project: &Project, branch: &str) -> Result<TriggerResponse, EngineError> {
        let token = required(&self.settings.bitbucket_token, "Bitbucket API token not configured")?;
        let repo = repository(project)?;

        let url = format!(
            "{}/2.0/repositories/{}/{}/pipelines/",
            self.settings.bitbucket_api_url.trim_end_matches('/'),
            repo.owner,
            repo.name
        );

        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .json(&BitbucketPipelineRequest::for_branch(branch))
            .send()
            .await?;
        let response = ensure_success("Bitbucket", response).await?;

        let body: BitbucketPipelineResponse = response.json().await?;
        Ok(TriggerResponse {
            external_url: body.build_number.map(|number| {
                format!(
                    "https://bitbucket.org/{}/pipelines/results/{}",
                    repo.path, number
                )
            }),
            external_id: body.uuid,
        })
    }

    async fn jenkins(
        &self,
        project: &Project,
        pipeline: &Pipeline,
        run: &PipelineRun,
        branch: &str,
    ) -> Result<TriggerResponse, EngineError> {
        let base_url = required(&self.settings.jenkins_url, "Jenkins URL not configured")?;
        let user = required(&self.settings.jenkins_user, "Jenkins user not configured")?;
        let token = required(&self.settings.jenkins_token, "Jenkins API token not configured")?;
        let job = pipeline
            .config_str("jenkins_job_name")
            .unwrap_or(project.slug.as_str());
        let encoded_job: String = url::form_urlencoded::byte_serialize(job.as_bytes()).collect();

        let url = format!(
            "{}/job/{}/buildWithParameters",
            base_url.trim_end_matches('/'),
            encoded_job
        );
        let params = JenkinsBuildParameters {
            branch: branch.to_string(),
            commit_hash: run.commit_hash.clone(),
            pipeline_run_id: run.id.clone(),
            project_id: project.id.clone(),
        };

        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .basic_auth(user, Some(token))
            .form(&params)
            .send()
            .await?;
        let response = ensure_success("Jenkins", response).await?;

        // Jenkins answers 201 with the queue item in Location
        let queue_url = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(TriggerResponse {
            external_id: None,
            external_url: queue_url,
        })
    }
}

#[async_trait]
impl CiTrigger for HttpCiTrigger {
    async fn trigger(
        &self,
        project: &Project,
        pipeline: &Pipeline,
        run: &PipelineRun,
    ) -> Result<TriggerResponse, EngineError> {
        let branch = run.branch.clone().unwrap_or_else(|| project.branch.clone());
        info!(provider = %pipeline.provider, pipeline = %pipeline.id, "Triggering external pipeline");

        match pipeline.provider {
            Provider::Github => self.github(project, pipeline, run, &branch).await,
            Provider::Gitlab => self.gitlab(project, run, &branch).await,
            Provider::Bitbucket => self.bitbucket(project, &branch).await,
            Provider::Jenkins => self.jenkins(project, pipeline, run, &branch).await,
            Provider::Custom => Err(EngineError::Trigger(
                "Custom pipelines run on the target server".to_string(),
            )),
        }
    }
}

fn required<'a>(value: &'a Option<String>, message: &str) -> Result<&'a str, EngineError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| EngineError::Trigger(message.to_string()))
}

fn repository(project: &Project) -> Result<RepositoryRef, EngineError> {
    let url = project
        .repository_url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| EngineError::Trigger("Project has no repository URL".to_string()))?;
    parse_repository(url)
}

async fn ensure_success(provider: &str, response: Response) -> Result<Response, EngineError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    error!("{} trigger failed: {} - {}", provider, status, body);
    Err(EngineError::Trigger(format!("{} API returned {}: {}", provider, status, body)))
}
