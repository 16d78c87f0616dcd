//! Settings, on-disk layout and record persistence

pub mod file_store;
pub mod layout;
pub mod settings;
pub mod store;

use crate::errors::EngineError;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;

/// Load settings from the layout, falling back to defaults when absent
pub async fn load_settings(layout: &StorageLayout) -> Result<Settings, EngineError> {
    let file = layout.settings_file();
    if !file.exists().await {
        return Ok(Settings::default());
    }
    file.read_json().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_settings_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings(&StorageLayout::new(dir.path())).await.unwrap();
        assert_eq!(settings.timeouts.git, 120);
    }

    #[tokio::test]
    async fn test_load_settings_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path());
        layout
            .settings_file()
            .write_json(&serde_json::json!({"compose": {"use_sudo": true}}))
            .await
            .unwrap();

        let settings = load_settings(&layout).await.unwrap();
        assert!(settings.compose.use_sudo);
    }
}
