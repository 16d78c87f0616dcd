//! Pipeline models

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::deploy::fsm::{RunStatus, StatusEvent, StatusFsm};
use crate::errors::EngineError;

/// CI provider of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Github,
    Gitlab,
    Bitbucket,
    Jenkins,
    Custom,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::Github => "github",
            Provider::Gitlab => "gitlab",
            Provider::Bitbucket => "bitbucket",
            Provider::Jenkins => "jenkins",
            Provider::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// A pipeline definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    /// Unique pipeline ID
    pub id: String,

    /// Owning project
    pub project_id: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// CI provider
    pub provider: Provider,

    /// Provider document, produced by the pipeline generator
    #[serde(default)]
    pub configuration: serde_json::Value,
}

/// Pipeline configuration keyed by provider.
///
/// Only `Custom` has execution semantics here; the others are opaque
/// documents handed to the provider.
#[derive(Debug, Clone)]
pub enum PipelineDefinition {
    Custom(Vec<Stage>),
    External {
        provider: Provider,
        document: serde_json::Value,
    },
}

impl Pipeline {
    /// Interpret the configuration for this pipeline's provider
    pub fn definition(&self) -> Result<PipelineDefinition, EngineError> {
        match self.provider {
            Provider::Custom => {
                let stages = match self.configuration.get("stages") {
                    None | Some(serde_json::Value::Null) => Vec::new(),
                    Some(stages) => serde_json::from_value::<Vec<StageSpec>>(stages.clone())
                        .map_err(|e| {
                            EngineError::ConfigError(format!("Invalid custom pipeline stages: {}", e))
                        })?,
                };
                Ok(PipelineDefinition::Custom(
                    stages
                        .into_iter()
                        .enumerate()
                        .map(|(index, spec)| spec.into_stage(index))
                        .collect(),
                ))
            }
            provider => Ok(PipelineDefinition::External {
                provider,
                document: self.configuration.clone(),
            }),
        }
    }

    /// A string field of the provider document
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.configuration
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|v| !v.is_empty())
    }
}

/// An ordered group of steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub name: String,
    pub steps: Vec<Step>,
}

/// One shell command of a stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub name: String,
    pub command: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StageSpec {
    Compact(Vec<StepSpec>),
    Named {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        steps: Vec<StepSpec>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StepSpec {
    Command(String),
    Named {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        run: Option<String>,
    },
}

impl StageSpec {
    fn into_stage(self, index: usize) -> Stage {
        let (name, steps) = match self {
            StageSpec::Compact(steps) => (None, steps),
            StageSpec::Named { name, steps } => (name, steps),
        };
        Stage {
            name: name.unwrap_or_else(|| format!("stage-{}", index + 1)),
            steps: steps
                .into_iter()
                .enumerate()
                .map(|(i, step)| step.into_step(i))
                .collect(),
        }
    }
}

impl StepSpec {
    fn into_step(self, index: usize) -> Step {
        match self {
            StepSpec::Command(command) => Step {
                name: command.clone(),
                command,
            },
            StepSpec::Named { name, run } => {
                let command = run.unwrap_or_default();
                Step {
                    name: name.unwrap_or_else(|| format!("step-{}", index + 1)),
                    command,
                }
            }
        }
    }
}

/// Outcome of one executed step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepExecution {
    pub stage: String,
    pub step: String,
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    #[serde(default)]
    pub raised_error: Option<String>,
    pub duration_ms: u64,
}

/// One execution of a pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Unique run ID
    pub id: String,

    /// Executed pipeline
    pub pipeline_id: String,

    /// What started the run (manual, webhook, retry, ...)
    pub trigger: String,

    /// Current status
    #[serde(default)]
    pub status: RunStatus,

    /// Commit checked out on the target when the run started
    #[serde(default)]
    pub commit_hash: Option<String>,

    /// Branch of the project
    #[serde(default)]
    pub branch: Option<String>,

    /// First failure message
    #[serde(default)]
    pub error: Option<String>,

    /// Provider-side run identifier
    #[serde(default)]
    pub external_id: Option<String>,

    /// Provider-side run URL
    #[serde(default)]
    pub external_url: Option<String>,

    /// Executed steps, in execution order
    #[serde(default)]
    pub steps: Vec<StepExecution>,

    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    /// Create a pending run
    pub fn new(pipeline_id: impl Into<String>, trigger: impl Into<String>) -> Self {
        Self {
            id: crate::utils::generate_uuid(),
            pipeline_id: pipeline_id.into(),
            trigger: trigger.into(),
            status: RunStatus::Pending,
            commit_hash: None,
            branch: None,
            error: None,
            external_id: None,
            external_url: None,
            steps: Vec::new(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Move to running and stamp `started_at`
    pub fn start(&mut self) -> Result<(), EngineError> {
        self.apply(StatusEvent::Start)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Move to success
    pub fn succeed(&mut self) -> Result<(), EngineError> {
        self.apply(StatusEvent::Succeed)?;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Move to failed
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), EngineError> {
        let error = error.into();
        self.apply(StatusEvent::Fail(error.clone()))?;
        self.error = Some(error);
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    fn apply(&mut self, event: StatusEvent) -> Result<(), EngineError> {
        let mut fsm = StatusFsm::resume(self.status, self.error.clone());
        self.status = fsm.process(event)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn custom(configuration: serde_json::Value) -> Pipeline {
        Pipeline {
            id: "pl-1".to_string(),
            project_id: "p1".to_string(),
            name: "ci".to_string(),
            provider: Provider::Custom,
            configuration,
        }
    }

    fn stages(pipeline: &Pipeline) -> Vec<Stage> {
        match pipeline.definition().unwrap() {
            PipelineDefinition::Custom(stages) => stages,
            other => panic!("expected custom definition, got {:?}", other),
        }
    }

    #[test]
    fn test_compact_stages() {
        let pipeline = custom(json!({"stages": [["npm ci", "npm run build"], ["npm test"]]}));
        let stages = stages(&pipeline);

        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].name, "stage-1");
        assert_eq!(stages[0].steps[1].command, "npm run build");
        assert_eq!(stages[1].steps[0].command, "npm test");
    }

    #[test]
    fn test_named_stages() {
        let pipeline = custom(json!({"stages": [
            {"name": "build", "steps": [{"name": "compile", "run": "cargo build"}, {"name": "noop"}]}
        ]}));
        let stages = stages(&pipeline);

        assert_eq!(stages[0].name, "build");
        assert_eq!(stages[0].steps[0].name, "compile");
        assert_eq!(stages[0].steps[1].command, "");
    }

    #[test]
    fn test_missing_stages_is_empty() {
        assert!(stages(&custom(json!({}))).is_empty());
    }

    #[test]
    fn test_invalid_stages_is_config_error() {
        let pipeline = custom(json!({"stages": 5}));
        assert!(matches!(pipeline.definition(), Err(EngineError::ConfigError(_))));
    }

    #[test]
    fn test_external_provider_is_opaque() {
        let mut pipeline = custom(json!({"on": {"push": {}}}));
        pipeline.provider = Provider::Github;
        match pipeline.definition().unwrap() {
            PipelineDefinition::External { provider, document } => {
                assert_eq!(provider, Provider::Github);
                assert!(document.get("on").is_some());
            }
            other => panic!("expected external definition, got {:?}", other),
        }
    }
}
