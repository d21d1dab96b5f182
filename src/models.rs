use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_SSH_PORT: u16 = 22;

/// Connection parameters for one `Host` block of an SSH config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshHost {
    pub alias: String,
    pub host: String,
    pub user: String,
    pub port: Option<u16>,
    pub identity_file: PathBuf,
}

impl SshHost {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_SSH_PORT)
    }

    /// `user@host`, as passed to `ssh`.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

/// A local file and where it lands on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMapping {
    pub local: PathBuf,
    pub remote: String,
}

impl FileMapping {
    pub fn new(local: impl Into<PathBuf>, remote: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            remote: remote.into(),
        }
    }

    pub fn file_name(&self) -> String {
        self.local
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}
