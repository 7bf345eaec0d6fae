//! OpenSSH client transport

use std::path::Path;
use std::process::{Output, Stdio};

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tokio::process::Command;
use tracing::debug;

use crate::errors::DeployError;
use crate::hosts::{Credential, HostTarget};
use crate::utils::mask_host;
use crate::remote::{
    shell_quote, CommandOutput, EphemeralTrust, RemoteScript, RemoteShell, TransportOptions,
};

/// Exit status ssh reports for its own connection or authentication errors
const SSH_TRANSPORT_FAILURE: i32 = 255;

/// Drives the system `ssh` and `scp` binaries.
///
/// Password credentials go through `sshpass -e`, which reads the secret from
/// the `SSHPASS` environment variable of the child process.
#[derive(Debug, Clone, Default)]
pub struct OpenSsh {
    options: TransportOptions,
}

impl OpenSsh {
    pub fn new(options: TransportOptions) -> Self {
        Self { options }
    }

    /// Start building `program` for `target`, wrapped in sshpass when needed
    fn base_command(program: &str, target: &HostTarget) -> Command {
        match &target.credential {
            Credential::Password(secret) => {
                let mut command = Command::new("sshpass");
                command
                    .arg("-e")
                    .arg(program)
                    .env("SSHPASS", secret.expose_secret());
                command
            }
            Credential::KeyBased => Command::new(program),
        }
    }

    /// Options common to ssh and scp
    fn common_args(&self, target: &HostTarget, trust: &EphemeralTrust) -> Vec<String> {
        let mut args = trust.ssh_options();
        args.push("-o".to_string());
        args.push(format!("ConnectTimeout={}", self.options.connect_timeout_secs));
        args.push("-o".to_string());
        args.push("LogLevel=ERROR".to_string());
        match target.credential {
            Credential::Password(_) => {
                args.push("-o".to_string());
                args.push("PubkeyAuthentication=no".to_string());
                args.push("-o".to_string());
                args.push("PreferredAuthentications=password,keyboard-interactive".to_string());
            }
            Credential::KeyBased => {
                args.push("-o".to_string());
                args.push("BatchMode=yes".to_string());
            }
        }
        args
    }

    /// Arguments for running `script` over ssh
    pub fn ssh_args(
        &self,
        target: &HostTarget,
        trust: &EphemeralTrust,
        script: &RemoteScript,
    ) -> Vec<String> {
        let mut args = self.common_args(target, trust);
        args.push("-p".to_string());
        args.push(target.port.to_string());
        args.push("--".to_string());
        args.push(target.destination());
        args.push(format!("sh -c {}", shell_quote(&script.render())));
        args
    }

    /// Arguments for copying `local_path` to `remote_path` over scp
    pub fn scp_args(
        &self,
        target: &HostTarget,
        trust: &EphemeralTrust,
        local_path: &Path,
        remote_path: &str,
    ) -> Vec<String> {
        let mut args = self.common_args(target, trust);
        args.push("-q".to_string());
        args.push("-P".to_string());
        args.push(target.port.to_string());
        args.push("--".to_string());
        args.push(local_path.display().to_string());
        args.push(format!("{}:{}", target.destination(), remote_path));
        args
    }

    /// Run a prepared command under the per-operation timeout
    async fn run(&self, mut command: Command, what: &str) -> Result<Output, DeployError> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|e| DeployError::TransportError(format!("failed to start {}: {}", what, e)))?;

        match tokio::time::timeout(self.options.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(DeployError::TransportError(format!(
                "{} did not complete: {}",
                what, e
            ))),
            Err(_) => Err(DeployError::TransportError(format!(
                "{} timed out after {:?}",
                what, self.options.timeout
            ))),
        }
    }
}

#[async_trait]
impl RemoteShell for OpenSsh {
    async fn execute(
        &self,
        target: &HostTarget,
        script: &RemoteScript,
    ) -> Result<CommandOutput, DeployError> {
        let trust = EphemeralTrust::new()?;
        let mut command = Self::base_command("ssh", target);
        command.args(self.ssh_args(target, &trust, script));

        debug!("Running remote script on {}", target);
        let output = self.run(command, "ssh").await?;

        let result = CommandOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: scrub_target_details(&String::from_utf8_lossy(&output.stdout), target),
            stderr: scrub_target_details(&String::from_utf8_lossy(&output.stderr), target),
        };

        if result.exit_code == Some(SSH_TRANSPORT_FAILURE) {
            return Err(DeployError::TransportError(format!(
                "ssh to {} failed: {}",
                target,
                result.failure_summary()
            )));
        }

        Ok(result)
    }

    async fn copy_file(
        &self,
        target: &HostTarget,
        local_path: &Path,
        remote_path: &str,
    ) -> Result<(), DeployError> {
        let trust = EphemeralTrust::new()?;
        let mut command = Self::base_command("scp", target);
        command.args(self.scp_args(target, &trust, local_path, remote_path));

        debug!("Copying {} to {}", local_path.display(), target);
        let output = self.run(command, "scp").await?;
        if output.status.success() {
            return Ok(());
        }

        let summary = CommandOutput {
            success: false,
            exit_code: output.status.code(),
            stdout: String::new(),
            stderr: scrub_target_details(&String::from_utf8_lossy(&output.stderr), target),
        }
        .failure_summary();
        Err(DeployError::TransportError(format!(
            "scp to {} failed: {}",
            target, summary
        )))
    }
}

/// Mask the target's host and drop port numbers from ssh or scp output.
///
/// ssh reports connection errors as `connect to host <host> port <n>`, which
/// would otherwise end up in host outcomes and logs.
pub fn scrub_target_details(text: &str, target: &HostTarget) -> String {
    let masked = mask_host(&target.host);
    let text = replace_name(text, &target.host, &masked);
    let port = target.port.to_string();
    let text = text
        .replace(&format!("{}]:{}", masked, port), &format!("{}]", masked))
        .replace(&format!("{}:{}", masked, port), &masked);
    drop_port_fragments(&text)
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Replace `name` where it is not part of a longer name
fn replace_name(text: &str, name: &str, replacement: &str) -> String {
    if name.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (start, _) in text.match_indices(name) {
        if start < last {
            continue;
        }
        let end = start + name.len();
        let before = text[..start].chars().next_back();
        let after = text[end..].chars().next();
        let bounded = !before.is_some_and(|c| is_name_char(c) || c == '.')
            && !after.is_some_and(is_name_char);
        if bounded {
            out.push_str(&text[last..start]);
            out.push_str(replacement);
            last = end;
        }
    }
    out.push_str(&text[last..]);
    out
}

/// Remove `port <n>`, `-p <n>` and `-P <n>`, keeping trailing punctuation
fn drop_port_fragments(text: &str) -> String {
    let words: Vec<&str> = text.split(' ').collect();
    let mut kept: Vec<String> = Vec::with_capacity(words.len());
    let mut i = 0;
    while i < words.len() {
        let word = words[i];
        if matches!(word, "port" | "-p" | "-P") {
            if let Some(next) = words.get(i + 1) {
                let digits = next.trim_end_matches(|c: char| !c.is_ascii_digit());
                if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                    let rest = &next[digits.len()..];
                    match kept.last_mut() {
                        Some(prev) => prev.push_str(rest),
                        None if !rest.is_empty() => kept.push(rest.to_string()),
                        None => {}
                    }
                    i += 2;
                    continue;
                }
            }
        }
        kept.push(word.to_string());
        i += 1;
    }
    kept.join(" ")
}
