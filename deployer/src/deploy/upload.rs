//! Artifact upload with bounded retry

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::errors::DeployError;
use crate::hosts::HostTarget;
use crate::remote::RemoteShell;

/// Upload retry settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,

    /// Pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// Copies the artifact to a host, restarting the whole transfer on failure
pub struct Uploader {
    shell: Arc<dyn RemoteShell>,
    policy: RetryPolicy,
}

impl Uploader {
    pub fn new(shell: Arc<dyn RemoteShell>, policy: RetryPolicy) -> Self {
        Self { shell, policy }
    }

    /// Attempts made before giving up; never less than one
    pub fn max_attempts(&self) -> u32 {
        self.policy.max_attempts.max(1)
    }

    /// Upload `local_path` to `remote_path`.
    ///
    /// Returns the number of attempts used on success; a failure means every
    /// one of [`Uploader::max_attempts`] attempts failed. Each attempt
    /// overwrites the remote file, so a retry never sees a partial copy.
    pub async fn upload(
        &self,
        target: &HostTarget,
        local_path: &Path,
        remote_path: &str,
    ) -> Result<u32, DeployError> {
        let max_attempts = self.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.shell.copy_file(target, local_path, remote_path).await {
                Ok(()) => {
                    if attempt > 1 {
                        info!("Upload to {} succeeded on attempt {}", target, attempt);
                    }
                    return Ok(attempt);
                }
                Err(e) if attempt < max_attempts => {
                    warn!(
                        "Upload to {} failed (attempt {}/{}): {}; retrying in {:?}",
                        target, attempt, max_attempts, e, self.policy.delay
                    );
                    tokio::time::sleep(self.policy.delay).await;
                }
                Err(e) => {
                    return Err(DeployError::TransportError(format!(
                        "upload failed after {} attempts: {}",
                        attempt, e
                    )));
                }
            }
        }
    }
}
