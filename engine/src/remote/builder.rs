//! SSH command builder
//!
//! Renders the final shell string for one host. Everything caller controlled
//! (user, address, password, key path, command body) is single-quoted before
//! it is interpolated; nothing here touches the network or the filesystem.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::models::host::{Credential, HostDescriptor};
use crate::remote::keys::KeyStore;
use crate::storage::settings::SshSettings;

/// Options for one build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Discard the remote command's stderr
    pub suppress_warnings: bool,
}

impl BuildOptions {
    pub fn quiet() -> Self {
        Self {
            suppress_warnings: true,
        }
    }
}

/// Builds invocable command strings for remote hosts
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    connect_timeout_secs: u64,
    encode_threshold: usize,
    keys: KeyStore,
}

impl CommandBuilder {
    pub fn new(settings: &SshSettings) -> Self {
        Self {
            connect_timeout_secs: settings.connect_timeout_secs,
            encode_threshold: settings.encode_threshold,
            keys: KeyStore::new(&settings.key_dir),
        }
    }

    /// Key store whose paths this builder references
    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    /// Render `body` for `host`.
    ///
    /// Loopback hosts get the body back untouched. Everything else is wrapped
    /// in an `ssh` invocation, prefixed with `sshpass` for password auth.
    pub fn build(&self, host: &HostDescriptor, body: &str, options: BuildOptions) -> String {
        if host.is_loopback() {
            return body.to_string();
        }

        let remote = if self.needs_encoding(body) {
            format!("echo {} | base64 -d | sh", BASE64.encode(body.as_bytes()))
        } else {
            body.to_string()
        };

        let mut ssh_options = vec![
            "-o StrictHostKeyChecking=no".to_string(),
            "-o UserKnownHostsFile=/dev/null".to_string(),
            format!("-o ConnectTimeout={}", self.connect_timeout_secs),
            "-o LogLevel=ERROR".to_string(),
        ];

        let password = match &host.credential {
            Credential::KeyMaterial(key) => {
                ssh_options.push("-o BatchMode=yes".to_string());
                let key_path = self.keys.path_for(key);
                ssh_options.push(format!("-i {}", shell_quote(&key_path.to_string_lossy())));
                None
            }
            Credential::Password(password) => Some(password),
            Credential::None => {
                ssh_options.push("-o BatchMode=yes".to_string());
                None
            }
        };
        ssh_options.push(format!("-p {}", host.port));

        let mut command = format!(
            "ssh {} {}@{} {}",
            ssh_options.join(" "),
            shell_quote(&host.username),
            shell_quote(&host.address),
            shell_quote(&remote)
        );

        if let Some(password) = password {
            command = format!("sshpass -p {} {}", shell_quote(password), command);
        }

        if options.suppress_warnings {
            command.push_str(" 2>/dev/null");
        }

        command
    }

    fn needs_encoding(&self, body: &str) -> bool {
        body.len() > self.encode_threshold || body.contains('\n')
    }
}

/// Prefix that runs the following command with root privileges.
///
/// Root needs nothing; a password host pipes the password into `sudo -S`;
/// anything else relies on passwordless sudo.
pub fn sudo_prefix(host: &HostDescriptor) -> String {
    if host.is_root() {
        return String::new();
    }

    match host.credential.password() {
        Some(password) => format!("echo {} | sudo -S ", shell_quote(password)),
        None => "sudo ".to_string(),
    }
}

/// Prefix `body` with [`sudo_prefix`]
pub fn privileged(host: &HostDescriptor, body: &str) -> String {
    format!("{}{}", sudo_prefix(host), body)
}

/// Single-quote a string for POSIX shells
pub fn shell_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(ch);
        }
    }
    quoted.push('\'');
    quoted
}
