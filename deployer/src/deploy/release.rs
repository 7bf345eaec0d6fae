//! Per-host release pipeline.
//!
//! precondition -> upload -> extract -> activate -> post-deploy (optional)
//!
//! A failing step ends this host's pipeline and is recorded as its outcome;
//! it never escapes to the caller.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::deploy::fsm::{DeployStep, ReleaseEvent, ReleaseFsm, ReleaseState};
use crate::deploy::outcome::DeploymentOutcome;
use crate::deploy::plan::DeploymentPlan;
use crate::deploy::upload::{RetryPolicy, Uploader};
use crate::errors::DeployError;
use crate::hosts::HostTarget;
use crate::remote::{shell_quote, CommandOutput, RemoteScript, RemoteShell};

/// Exit status of the precondition script when the activation point is
/// occupied by something other than a symlink
pub const OCCUPIED_EXIT_CODE: i32 = 65;

/// Release behaviour switches
#[derive(Debug, Clone, Default)]
pub struct ReleaseOptions {
    /// Remove a release directory left behind by a failed extract
    pub cleanup_failed_release: bool,
}

/// What happened on one host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseResult {
    pub outcome: DeploymentOutcome,
    pub upload_attempts: u32,
}

/// Drives one host through the release steps
pub struct ReleaseManager {
    plan: Arc<DeploymentPlan>,
    shell: Arc<dyn RemoteShell>,
    uploader: Uploader,
    options: ReleaseOptions,
}

impl ReleaseManager {
    pub fn new(
        plan: Arc<DeploymentPlan>,
        shell: Arc<dyn RemoteShell>,
        retry: RetryPolicy,
        options: ReleaseOptions,
    ) -> Self {
        let uploader = Uploader::new(shell.clone(), retry);
        Self {
            plan,
            shell,
            uploader,
            options,
        }
    }

    pub fn plan(&self) -> &DeploymentPlan {
        &self.plan
    }

    /// Refuse to touch a real file or directory at the activation point,
    /// then create the release directory
    pub fn precondition_script(&self) -> RemoteScript {
        RemoteScript::new()
            .require_symlink_or_absent(&self.plan.remote_active_link(), OCCUPIED_EXIT_CODE)
            .cmd("mkdir", &["-p", &self.plan.remote_release_dir()])
    }

    /// Unpack the artifact in place and drop the uploaded copy
    pub fn extract_script(&self) -> RemoteScript {
        RemoteScript::new()
            .cd(&self.plan.remote_release_dir())
            .cmd("tar", &["-xzf", &self.plan.artifact_file_name])
            .cmd("rm", &["-f", &self.plan.artifact_file_name])
    }

    /// Point the active link at the release.
    ///
    /// The new link is created under a scratch name and renamed over the old
    /// one, so readers always see either the previous or the new release.
    /// `mv -T` needs GNU coreutils or BusyBox, so remote hosts must be Linux.
    pub fn activation_script(&self, token: &str) -> RemoteScript {
        let scratch = self.plan.activation_temp_link(token);
        RemoteScript::new()
            .cmd("ln", &["-sfn", &self.plan.remote_release_dir(), &scratch])
            .cmd("mv", &["-Tf", &scratch, &self.plan.remote_active_link()])
    }

    /// Operator command run from inside the live release
    pub fn post_deploy_script(&self) -> Option<RemoteScript> {
        self.plan.post_deploy().map(|command| {
            RemoteScript::new()
                .cd(&self.plan.remote_active_link())
                .raw(command)
        })
    }

    /// Remove the release directory unless it is the active one
    pub fn cleanup_script(&self) -> RemoteScript {
        let release = self.plan.remote_release_dir();
        RemoteScript::new().raw(format!(
            "if [ \"$(readlink {link} 2>/dev/null || true)\" != {release} ]; then rm -rf {release}; fi",
            link = shell_quote(&self.plan.remote_active_link()),
            release = shell_quote(&release),
        ))
    }

    /// Deploy the plan to one host
    pub async fn deploy(&self, target: &HostTarget) -> ReleaseResult {
        let mut fsm = ReleaseFsm::new(self.plan.post_deploy().is_some());
        let mut upload_attempts = 0;

        if let Err(e) = fsm.process(ReleaseEvent::Start) {
            return ReleaseResult {
                outcome: DeploymentOutcome::failed(DeployStep::Precondition, e),
                upload_attempts,
            };
        }

        while let Some(step) = fsm.current_step() {
            debug!("{}: {} started", target, step);
            let event = match self.run_step(step, target, &mut upload_attempts).await {
                Ok(()) => {
                    info!("{}: {} done", target, step);
                    ReleaseEvent::StepDone
                }
                Err(e) => {
                    warn!("{}: {} failed: {}", target, step, e);
                    if step == DeployStep::Extract && self.options.cleanup_failed_release {
                        self.cleanup(target).await;
                    }
                    ReleaseEvent::StepFailed(e.to_string())
                }
            };

            if let Err(e) = fsm.process(event) {
                return ReleaseResult {
                    outcome: DeploymentOutcome::failed(step, e),
                    upload_attempts,
                };
            }
        }

        let outcome = match fsm.state() {
            ReleaseState::Live => DeploymentOutcome::Success,
            ReleaseState::Failed(step) => {
                DeploymentOutcome::failed(step, fsm.error().unwrap_or("unknown error"))
            }
            ReleaseState::Pending | ReleaseState::Running(_) => DeploymentOutcome::failed(
                DeployStep::Precondition,
                "release pipeline stopped before completion",
            ),
        };

        ReleaseResult {
            outcome,
            upload_attempts,
        }
    }

    async fn run_step(
        &self,
        step: DeployStep,
        target: &HostTarget,
        upload_attempts: &mut u32,
    ) -> Result<(), DeployError> {
        match step {
            DeployStep::Precondition => {
                let output = self.shell.execute(target, &self.precondition_script()).await?;
                if output.exit_code == Some(OCCUPIED_EXIT_CODE) {
                    return Err(DeployError::PreconditionError(format!(
                        "{} exists and is not a symbolic link",
                        self.plan.remote_active_link()
                    )));
                }
                require_success(output)
            }
            DeployStep::Upload => {
                let result = self
                    .uploader
                    .upload(
                        target,
                        &self.plan.local_artifact_path,
                        &self.plan.remote_artifact_path(),
                    )
                    .await;
                match result {
                    Ok(attempts) => {
                        *upload_attempts = attempts;
                        Ok(())
                    }
                    Err(e) => {
                        *upload_attempts = self.uploader.max_attempts();
                        Err(e)
                    }
                }
            }
            DeployStep::Extract => {
                require_success(self.shell.execute(target, &self.extract_script()).await?)
            }
            DeployStep::Activate => {
                let token = uuid::Uuid::new_v4().simple().to_string();
                let script = self.activation_script(&token);
                require_success(self.shell.execute(target, &script).await?)?;
                info!(
                    "{}: {} now points at release {}",
                    target,
                    crate::deploy::plan::ACTIVE_LINK_NAME,
                    self.plan.version
                );
                Ok(())
            }
            DeployStep::PostDeploy => match self.post_deploy_script() {
                Some(script) => require_success(self.shell.execute(target, &script).await?),
                None => Ok(()),
            },
        }
    }

    async fn cleanup(&self, target: &HostTarget) {
        match self.shell.execute(target, &self.cleanup_script()).await {
            Ok(output) if output.success => {
                info!("{}: removed partial release {}", target, self.plan.version)
            }
            Ok(output) => warn!(
                "{}: could not remove partial release: {}",
                target,
                output.failure_summary()
            ),
            Err(e) => warn!("{}: could not remove partial release: {}", target, e),
        }
    }
}

fn require_success(output: CommandOutput) -> Result<(), DeployError> {
    if output.success {
        Ok(())
    } else {
        Err(DeployError::RemoteCommandError(output.failure_summary()))
    }
}
