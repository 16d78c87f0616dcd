//! Private key materialization
//!
//! `ssh -i` needs a file. Keys are written once under the key directory,
//! named by the SHA-256 of their content, so the builder can compute the path
//! without touching the disk.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::EngineError;
use crate::filesys::file::File;
use crate::utils::sha256_hash;

#[derive(Debug, Clone)]
pub struct KeyStore {
    dir: PathBuf,
}

impl KeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path the key is (or will be) materialized at
    pub fn path_for(&self, key_material: &str) -> PathBuf {
        self.dir.join(format!("id_{}", sha256_hash(key_material.as_bytes())))
    }

    /// Write the key with owner-only permissions if it is not there yet
    pub async fn materialize(&self, key_material: &str) -> Result<PathBuf, EngineError> {
        let path = self.path_for(key_material);
        let file = File::new(&path);
        if file.exists().await {
            return Ok(path);
        }

        let mut contents = key_material.to_string();
        if !contents.ends_with('\n') {
            contents.push('\n');
        }
        file.write_private(contents.as_bytes()).await?;
        debug!("Materialized SSH key at {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_is_stable_per_key() {
        let store = KeyStore::new("/keys");
        assert_eq!(store.path_for("a"), store.path_for("a"));
        assert_ne!(store.path_for("a"), store.path_for("b"));
        assert!(store.path_for("a").starts_with("/keys"));
    }

    #[tokio::test]
    async fn test_materialize_writes_private_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::new(dir.path());

        let path = store.materialize("-----BEGIN KEY-----").await.unwrap();
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents, "-----BEGIN KEY-----\n");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = tokio::fs::metadata(&path).await.unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        assert_eq!(store.materialize("-----BEGIN KEY-----").await.unwrap(), path);
    }
}
