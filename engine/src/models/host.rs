//! Host descriptor models

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default SSH port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Addresses that are executed locally instead of over SSH
const LOOPBACK_ADDRESSES: [&str; 3] = ["127.0.0.1", "::1", "localhost"];

/// How a host authenticates the SSH session
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Credential {
    /// Private key material (PEM/OpenSSH text)
    KeyMaterial(String),

    /// Account password, supplied through `sshpass`
    Password(String),

    /// Agent or default-key authentication
    #[default]
    None,
}

impl Credential {
    /// Password, when the credential is password based
    pub fn password(&self) -> Option<&str> {
        match self {
            Credential::Password(password) => Some(password),
            _ => None,
        }
    }

    /// Key material, when the credential is key based
    pub fn key_material(&self) -> Option<&str> {
        match self {
            Credential::KeyMaterial(key) => Some(key),
            _ => None,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::KeyMaterial(_) => f.write_str("KeyMaterial(<redacted>)"),
            Credential::Password(_) => f.write_str("Password(<redacted>)"),
            Credential::None => f.write_str("None"),
        }
    }
}

/// Immutable connection facts for one remote target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostDescriptor {
    /// IPv4/IPv6 address or hostname
    pub address: String,

    /// SSH port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Login user
    pub username: String,

    /// Authentication material
    #[serde(default)]
    pub credential: Credential,
}

fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

impl HostDescriptor {
    /// Create a descriptor on the default port
    pub fn new(address: impl Into<String>, username: impl Into<String>, credential: Credential) -> Self {
        Self {
            address: address.into(),
            port: DEFAULT_SSH_PORT,
            username: username.into(),
            credential,
        }
    }

    /// Descriptor for commands that run on this machine
    pub fn local() -> Self {
        Self::new("127.0.0.1", "root", Credential::None)
    }

    /// Override the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Whether the login user is root
    pub fn is_root(&self) -> bool {
        self.username == "root"
    }

    /// Whether commands run locally without SSH
    pub fn is_loopback(&self) -> bool {
        LOOPBACK_ADDRESSES.contains(&self.address.as_str())
    }
}
