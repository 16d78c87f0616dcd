//! Docker Compose orchestrator over the remote shell

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::deploy::orchestrator::{ContainerOrchestrator, ContainerStatus, RedeployOutcome};
use crate::errors::EngineError;
use crate::models::host::HostDescriptor;
use crate::models::project::Project;
use crate::remote::builder::{shell_quote, sudo_prefix};
use crate::remote::RemoteShell;
use crate::storage::settings::Settings;

/// Runs `docker compose` in the project's directory on its server
#[derive(Clone)]
pub struct ComposeOrchestrator {
    shell: RemoteShell,
    settings: Settings,
}

impl ComposeOrchestrator {
    pub fn new(shell: RemoteShell, settings: Settings) -> Self {
        Self { shell, settings }
    }

    fn host(project: &Project) -> Result<HostDescriptor, EngineError> {
        project
            .server
            .as_ref()
            .map(|server| server.host_descriptor())
            .ok_or_else(|| EngineError::Precondition(format!("Project {} has no server", project.slug)))
    }

    fn compose_command(&self, host: &HostDescriptor, project: &Project, args: &str) -> String {
        let prefix = if self.settings.compose.use_sudo {
            sudo_prefix(host)
        } else {
            String::new()
        };
        format!(
            "cd {} && {}docker compose {}",
            shell_quote(&self.settings.paths.project_path(&project.slug)),
            prefix,
            args
        )
    }
}

#[async_trait]
impl ContainerOrchestrator for ComposeOrchestrator {
    async fn redeploy(&self, project: &Project) -> RedeployOutcome {
        let host = match Self::host(project) {
            Ok(host) => host,
            Err(e) => return RedeployOutcome::failed(e.to_string()),
        };

        info!("Rebuilding containers for {}", project.slug);
        let command = self.compose_command(&host, project, "up -d --build --remove-orphans");
        let result = self
            .shell
            .run(&host, &command, self.settings.timeouts.deploy())
            .await;

        if result.succeeded() {
            RedeployOutcome::ok()
        } else {
            warn!("docker compose up failed for {}: {}", project.slug, result.error_message());
            RedeployOutcome::failed(result.error_message())
        }
    }

    async fn container_statuses(&self, project: &Project) -> Result<Vec<ContainerStatus>, EngineError> {
        let host = Self::host(project)?;
        let command = self.compose_command(
            &host,
            project,
            "ps -a --format '{{.Name}}\\t{{.State}}'",
        );
        let result = self
            .shell
            .run(&host, &command, self.settings.timeouts.verification())
            .await;

        if !result.succeeded() {
            return Err(EngineError::Collaborator(result.error_message()));
        }

        let statuses = parse_ps_output(&result.stdout);
        debug!("{} containers reported for {}", statuses.len(), project.slug);
        Ok(statuses)
    }
}

/// Parse `name<TAB>state` lines; blank lines are ignored
pub fn parse_ps_output(output: &str) -> Vec<ContainerStatus> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| match line.split_once('\t') {
            Some((name, status)) => ContainerStatus::new(name.trim(), status.trim()),
            None => match line.split_once(char::is_whitespace) {
                Some((name, status)) => ContainerStatus::new(name, status.trim()),
                None => ContainerStatus::new(line, ""),
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ps_output() {
        let statuses = parse_ps_output("shop-web-1\trunning\nshop-db-1\texited\n\n");
        assert_eq!(
            statuses,
            vec![
                ContainerStatus::new("shop-web-1", "running"),
                ContainerStatus::new("shop-db-1", "exited"),
            ]
        );
    }

    #[test]
    fn test_parse_ps_output_without_tabs() {
        let statuses = parse_ps_output("web Up 2 minutes");
        assert_eq!(statuses, vec![ContainerStatus::new("web", "Up 2 minutes")]);
        assert!(statuses[0].is_running());
    }
}
