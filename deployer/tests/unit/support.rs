//! Test doubles for the remote shell

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use reldeploy::errors::DeployError;
use reldeploy::hosts::HostTarget;
use reldeploy::packaging::{create_archive, ArchiveRules, Artifact};
use reldeploy::remote::{CommandOutput, RemoteScript, RemoteShell};

/// Runs scripts with the local `sh` and copies files on the local
/// filesystem, so absolute "remote" paths land on this machine.
///
/// Copies to a host can be made to fail a set number of times.
#[derive(Default)]
pub struct LocalShell {
    scripts: Mutex<Vec<(String, String)>>,
    copy_failures: Mutex<HashMap<String, u32>>,
    copy_attempts: Mutex<HashMap<String, u32>>,
}

impl LocalShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` copies to `host`
    pub fn fail_copies(&self, host: &str, times: u32) {
        self.copy_failures
            .lock()
            .unwrap()
            .insert(host.to_string(), times);
    }

    pub fn copy_attempts(&self, host: &str) -> u32 {
        self.copy_attempts
            .lock()
            .unwrap()
            .get(host)
            .copied()
            .unwrap_or(0)
    }

    /// Whether any script sent to `host` contains `fragment`
    pub fn ran_on(&self, host: &str, fragment: &str) -> bool {
        self.scripts
            .lock()
            .unwrap()
            .iter()
            .any(|(h, script)| h == host && script.contains(fragment))
    }
}

#[async_trait]
impl RemoteShell for LocalShell {
    async fn execute(
        &self,
        target: &HostTarget,
        script: &RemoteScript,
    ) -> Result<CommandOutput, DeployError> {
        let text = script.render();
        self.scripts
            .lock()
            .unwrap()
            .push((target.host.clone(), text.clone()));

        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&text)
            .output()
            .await?;
        Ok(CommandOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    async fn copy_file(
        &self,
        target: &HostTarget,
        local_path: &Path,
        remote_path: &str,
    ) -> Result<(), DeployError> {
        *self
            .copy_attempts
            .lock()
            .unwrap()
            .entry(target.host.clone())
            .or_insert(0) += 1;

        let should_fail = {
            let mut failures = self.copy_failures.lock().unwrap();
            match failures.get_mut(&target.host) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };
        if should_fail {
            return Err(DeployError::TransportError(
                "lost connection".to_string(),
            ));
        }

        tokio::fs::copy(local_path, remote_path).await?;
        Ok(())
    }
}

/// Succeeds at everything without touching the filesystem, after a
/// per-host delay. Records the order in which hosts finished.
#[derive(Default)]
pub struct DelayShell {
    delays: HashMap<String, Duration>,
    finished: Mutex<Vec<String>>,
}

impl DelayShell {
    pub fn new(delays: &[(&str, u64)]) -> Self {
        Self {
            delays: delays
                .iter()
                .map(|(host, ms)| (host.to_string(), Duration::from_millis(*ms)))
                .collect(),
            finished: Mutex::new(Vec::new()),
        }
    }

    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteShell for DelayShell {
    async fn execute(
        &self,
        target: &HostTarget,
        script: &RemoteScript,
    ) -> Result<CommandOutput, DeployError> {
        if script.render().contains("mv '-Tf'") {
            if let Some(delay) = self.delays.get(&target.host) {
                tokio::time::sleep(*delay).await;
            }
            self.finished.lock().unwrap().push(target.host.clone());
        }
        Ok(CommandOutput {
            success: true,
            exit_code: Some(0),
            ..Default::default()
        })
    }

    async fn copy_file(
        &self,
        _target: &HostTarget,
        _local_path: &Path,
        _remote_path: &str,
    ) -> Result<(), DeployError> {
        Ok(())
    }
}

/// A small static site whose index page names `version`
pub fn write_site(dir: &Path, version: &str) {
    std::fs::create_dir_all(dir.join("assets")).unwrap();
    std::fs::write(dir.join("index.html"), format!("<h1>{}</h1>", version)).unwrap();
    std::fs::write(dir.join("assets/site.css"), "body { margin: 0 }").unwrap();
}

/// Package a site for `version` into `out_dir`
pub async fn build_artifact(out_dir: &Path, project: &str, version: &str) -> Artifact {
    let site = out_dir.join(format!("site-{}", version));
    write_site(&site, version);
    let dest: PathBuf = out_dir.join(format!("{}-{}.tar.gz", project, version));
    create_archive(&site, &dest, &ArchiveRules::default())
        .await
        .unwrap()
}

/// Never answers, like a host that stopped responding mid-run
pub struct HangingShell;

#[async_trait]
impl RemoteShell for HangingShell {
    async fn execute(
        &self,
        _target: &HostTarget,
        _script: &RemoteScript,
    ) -> Result<CommandOutput, DeployError> {
        std::future::pending().await
    }

    async fn copy_file(
        &self,
        _target: &HostTarget,
        _local_path: &Path,
        _remote_path: &str,
    ) -> Result<(), DeployError> {
        std::future::pending().await
    }
}
