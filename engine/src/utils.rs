//! Utility functions

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Version information for the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// External tools the remote shell relies on
pub const REQUIRED_TOOLS: [&str; 3] = ["ssh", "sshpass", "base64"];

/// Presence of one external tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCheck {
    pub name: String,
    pub path: Option<PathBuf>,
}

/// Locate an executable on `PATH`
pub fn find_on_path(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Check every tool in [`REQUIRED_TOOLS`]
pub fn run_diagnostic() -> Vec<ToolCheck> {
    REQUIRED_TOOLS
        .iter()
        .map(|name| ToolCheck {
            name: name.to_string(),
            path: find_on_path(name),
        })
        .collect()
}

/// Generate a random UUID v4
pub fn generate_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Calculate SHA256 hash of data
pub fn sha256_hash(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// First seven characters of a commit hash
pub fn short_hash(hash: &str) -> &str {
    match hash.char_indices().nth(7) {
        Some((idx, _)) => &hash[..idx],
        None => hash,
    }
}

/// Hex encoding utilities
mod hex {
    const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

    pub fn encode(data: impl AsRef<[u8]>) -> String {
        let data = data.as_ref();
        let mut result = String::with_capacity(data.len() * 2);
        for byte in data {
            result.push(HEX_CHARS[(byte >> 4) as usize] as char);
            result.push(HEX_CHARS[(byte & 0x0f) as usize] as char);
        }
        result
    }
}
