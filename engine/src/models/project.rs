//! Project and server models

use serde::{Deserialize, Serialize};

use crate::models::host::{Credential, HostDescriptor, DEFAULT_SSH_PORT};

/// Server connection facts stored with a project
#[derive(Clone, Serialize, Deserialize)]
pub struct Server {
    /// IP address or hostname
    pub address: String,

    /// SSH port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Login user
    pub username: String,

    /// Private key material, if key auth is configured
    #[serde(default)]
    pub ssh_key: Option<String>,

    /// Password, if password auth is configured
    #[serde(default)]
    pub ssh_password: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("ssh_key", &self.ssh_key.as_ref().map(|_| "<redacted>"))
            .field("ssh_password", &self.ssh_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Server {
    /// Build the host descriptor for this server.
    ///
    /// Credential precedence: key material, then password, then none.
    pub fn host_descriptor(&self) -> HostDescriptor {
        let credential = match (non_empty(&self.ssh_key), non_empty(&self.ssh_password)) {
            (Some(key), _) => Credential::KeyMaterial(key.to_string()),
            (None, Some(password)) => Credential::Password(password.to_string()),
            (None, None) => Credential::None,
        };

        HostDescriptor {
            address: self.address.clone(),
            port: self.port,
            username: self.username.clone(),
            credential,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// A deployable project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Unique project ID
    pub id: String,

    /// URL/path-safe identifier
    pub slug: String,

    /// Display name
    pub name: String,

    /// Deployed branch
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Git remote URL
    #[serde(default)]
    pub repository_url: Option<String>,

    /// Target server; `None` when the project is not attached to one
    #[serde(default)]
    pub server: Option<Server>,
}

fn default_branch() -> String {
    "main".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(key: Option<&str>, password: Option<&str>) -> Server {
        Server {
            address: "10.0.0.9".to_string(),
            port: 2222,
            username: "deploy".to_string(),
            ssh_key: key.map(str::to_string),
            ssh_password: password.map(str::to_string),
        }
    }

    #[test]
    fn test_key_wins_over_password() {
        let host = server(Some("KEY"), Some("pw")).host_descriptor();
        assert_eq!(host.credential, Credential::KeyMaterial("KEY".to_string()));
        assert_eq!(host.port, 2222);
    }

    #[test]
    fn test_password_when_no_key() {
        let host = server(Some("  "), Some("pw")).host_descriptor();
        assert_eq!(host.credential, Credential::Password("pw".to_string()));
    }

    #[test]
    fn test_no_credentials() {
        let host = server(None, None).host_descriptor();
        assert_eq!(host.credential, Credential::None);
    }
}
