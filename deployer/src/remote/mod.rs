//! Remote command execution and file transfer

pub mod script;
pub mod ssh;
pub mod trust;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::DeployError;
use crate::hosts::HostTarget;

pub use script::{shell_quote, RemoteScript};
pub use ssh::OpenSsh;
pub use trust::EphemeralTrust;

/// Captured result of a remote command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Most useful single line to show when the command failed
    pub fn failure_summary(&self) -> String {
        let text = if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        };
        let last = text.lines().last().unwrap_or("").trim();
        match (self.exit_code, last.is_empty()) {
            (Some(code), true) => format!("exit code {}", code),
            (Some(code), false) => format!("exit code {}: {}", code, last),
            (None, true) => "terminated by signal".to_string(),
            (None, false) => format!("terminated by signal: {}", last),
        }
    }
}

/// Transport settings shared by every remote operation
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Upper bound for a single command or copy
    pub timeout: Duration,

    /// ssh ConnectTimeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            connect_timeout_secs: 15,
        }
    }
}

/// Remote shell transport.
///
/// A non-zero exit of the remote script is reported as an unsuccessful
/// [`CommandOutput`]; failing to reach or authenticate with the host is a
/// [`DeployError::TransportError`]. Neither is retried here.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Run a script on the target
    async fn execute(
        &self,
        target: &HostTarget,
        script: &RemoteScript,
    ) -> Result<CommandOutput, DeployError>;

    /// Copy a local file to a remote path, overwriting it. Single attempt.
    async fn copy_file(
        &self,
        target: &HostTarget,
        local_path: &Path,
        remote_path: &str,
    ) -> Result<(), DeployError>;
}
