//! Incremental file backups on top of a completed full backup

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use crate::errors::EngineError;
use crate::models::backup::{BackupKind, BackupStatus, FileBackup};
use crate::models::project::Project;
use crate::remote::builder::shell_quote;
use crate::remote::RemoteShell;
use crate::storage::settings::Settings;
use crate::storage::store::Store;

/// Creates file backups on a project's server
pub struct BackupService {
    store: Arc<dyn Store>,
    shell: RemoteShell,
    settings: Settings,
}

impl BackupService {
    pub fn new(store: Arc<dyn Store>, shell: RemoteShell, settings: Settings) -> Self {
        Self {
            store,
            shell,
            settings,
        }
    }

    /// Archive every file changed since `base` completed.
    ///
    /// `base` must be a completed full backup of the same project; both checks
    /// happen before anything runs on the server.
    pub async fn create_incremental(&self, project: &Project, base: &FileBackup) -> Result<FileBackup, EngineError> {
        if base.kind != BackupKind::Full {
            return Err(EngineError::Precondition("Base backup must be a full backup".to_string()));
        }
        if base.status != BackupStatus::Completed {
            return Err(EngineError::Precondition("Base backup must be completed".to_string()));
        }
        if base.project_id != project.id {
            return Err(EngineError::Precondition(
                "Base backup belongs to another project".to_string(),
            ));
        }
        let host = project
            .server
            .as_ref()
            .map(|server| server.host_descriptor())
            .ok_or_else(|| EngineError::Precondition(format!("Project {} has no server", project.slug)))?;

        let now = Utc::now();
        let archive_dir = format!(
            "{}/{}",
            self.settings.paths.archive_root.trim_end_matches('/'),
            project.slug
        );
        let archive_path = format!("{}/incremental_{}.tar.gz", archive_dir, now.format("%Y%m%d_%H%M%S"));

        let mut backup = FileBackup {
            id: crate::utils::generate_uuid(),
            project_id: project.id.clone(),
            kind: BackupKind::Incremental,
            status: BackupStatus::Running,
            source_path: base.source_path.clone(),
            archive_path: Some(archive_path.clone()),
            parent_backup_id: Some(base.id.clone()),
            exclude_patterns: base.exclude_patterns.clone(),
            created_at: now,
            completed_at: None,
            error: None,
        };
        self.store.create_backup(&backup).await?;

        let since = base.completed_at.unwrap_or(base.created_at).timestamp();
        let command = format!(
            "mkdir -p {} && {}",
            shell_quote(&archive_dir),
            incremental_command(&backup.source_path, since, &backup.exclude_patterns, &archive_path)
        );

        info!(project = %project.slug, base = %base.id, "Creating incremental backup");
        let result = self
            .shell
            .run(&host, &command, self.settings.timeouts.backup())
            .await;

        backup.completed_at = Some(Utc::now());
        if result.succeeded() {
            backup.status = BackupStatus::Completed;
            info!(backup = %backup.id, "Incremental backup completed");
        } else {
            let message = result.error_message();
            error!(backup = %backup.id, "Incremental backup failed: {}", message);
            backup.status = BackupStatus::Failed;
            backup.error = Some(message);
        }

        self.store.update_backup(&backup).await?;
        Ok(backup)
    }
}

/// `find | tar` pipeline archiving files newer than `since` (unix seconds)
pub fn incremental_command(source: &str, since: i64, excludes: &[String], target: &str) -> String {
    let mut find = format!(
        "find . -type f -newermt {} ! -path './.git/*'",
        shell_quote(&format!("@{}", since))
    );
    for pattern in excludes.iter().filter(|p| !p.trim().is_empty()) {
        let pattern = pattern.trim().trim_start_matches("./");
        find.push_str(&format!(" ! -path {}", shell_quote(&format!("./{}", pattern))));
    }

    format!(
        "cd {} && {} -print0 | tar -czf {} --null -T -",
        shell_quote(source),
        find,
        shell_quote(target)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incremental_command() {
        let command = incremental_command(
            "/var/www/shop",
            1_700_000_000,
            &["node_modules/*".to_string(), " ".to_string()],
            "/tmp/devflow-backups/shop/incremental.tar.gz",
        );

        assert_eq!(
            command,
            "cd '/var/www/shop' && find . -type f -newermt '@1700000000' ! -path './.git/*' \
             ! -path './node_modules/*' -print0 | tar -czf '/tmp/devflow-backups/shop/incremental.tar.gz' --null -T -"
        );
    }

    #[test]
    fn test_excludes_are_quoted() {
        let command = incremental_command("/src", 0, &["x'; rm -rf /; '".to_string()], "/t.tgz");
        assert!(command.contains("! -path './x'\\''; rm -rf /; '\\'''"));
    }
}
