//! Per-call host key trust.
//!
//! Each remote call gets its own throwaway known_hosts file. Nothing is read
//! from or written to `~/.ssh/known_hosts` or the global store, and the file
//! is deleted when the scope is dropped.

use std::path::Path;

use tempfile::NamedTempFile;

use crate::errors::DeployError;

/// Disposable known_hosts scope for one ssh or scp invocation
#[derive(Debug)]
pub struct EphemeralTrust {
    known_hosts: NamedTempFile,
}

impl EphemeralTrust {
    /// Allocate a fresh, empty known_hosts file
    pub fn new() -> Result<Self, DeployError> {
        let known_hosts = tempfile::Builder::new()
            .prefix("reldeploy-known-hosts-")
            .tempfile()?;
        Ok(Self { known_hosts })
    }

    /// Path of the scoped known_hosts file
    pub fn known_hosts_path(&self) -> &Path {
        self.known_hosts.path()
    }

    /// `-o` options pointing ssh at the scoped file
    pub fn ssh_options(&self) -> Vec<String> {
        vec![
            "-o".to_string(),
            format!("UserKnownHostsFile={}", self.known_hosts_path().display()),
            "-o".to_string(),
            "GlobalKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
        ]
    }
}
