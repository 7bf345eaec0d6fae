//! Finite state machine for a single host release

use std::fmt;

use serde::{Deserialize, Serialize};

/// One step of the per-host pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStep {
    /// Activation point check and release directory creation
    Precondition,

    /// Artifact transfer
    Upload,

    /// Remote decompression of the artifact
    Extract,

    /// Symlink cutover
    Activate,

    /// Operator command run in the live release
    PostDeploy,
}

impl DeployStep {
    /// Step that follows this one, if any
    pub fn next(self, has_post_deploy: bool) -> Option<DeployStep> {
        match self {
            DeployStep::Precondition => Some(DeployStep::Upload),
            DeployStep::Upload => Some(DeployStep::Extract),
            DeployStep::Extract => Some(DeployStep::Activate),
            DeployStep::Activate if has_post_deploy => Some(DeployStep::PostDeploy),
            DeployStep::Activate | DeployStep::PostDeploy => None,
        }
    }

    /// Whether the new release is already live once this step has been reached
    pub fn is_after_activation(self) -> bool {
        matches!(self, DeployStep::PostDeploy)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeployStep::Precondition => "precondition",
            DeployStep::Upload => "upload",
            DeployStep::Extract => "extract",
            DeployStep::Activate => "activate",
            DeployStep::PostDeploy => "post-deploy",
        }
    }
}

impl fmt::Display for DeployStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Release state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseState {
    /// Nothing attempted yet
    Pending,

    /// Executing a step
    Running(DeployStep),

    /// Activated and, if configured, post-deploy command completed
    Live,

    /// Stopped at a step
    Failed(DeployStep),
}

/// Release event
#[derive(Debug, Clone)]
pub enum ReleaseEvent {
    /// Begin the pipeline
    Start,

    /// The current step completed
    StepDone,

    /// The current step failed
    StepFailed(String),
}

/// Per-host release FSM
#[derive(Debug, Clone)]
pub struct ReleaseFsm {
    state: ReleaseState,
    has_post_deploy: bool,
    error: Option<String>,
}

impl ReleaseFsm {
    /// Create a new FSM in pending state
    pub fn new(has_post_deploy: bool) -> Self {
        Self {
            state: ReleaseState::Pending,
            has_post_deploy,
            error: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> ReleaseState {
        self.state
    }

    /// Step currently executing, if any
    pub fn current_step(&self) -> Option<DeployStep> {
        match self.state {
            ReleaseState::Running(step) => Some(step),
            _ => None,
        }
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, ReleaseState::Live | ReleaseState::Failed(_))
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: ReleaseEvent) -> Result<ReleaseState, String> {
        let new_state = match (self.state, &event) {
            (ReleaseState::Pending, ReleaseEvent::Start) => {
                ReleaseState::Running(DeployStep::Precondition)
            }

            (ReleaseState::Running(step), ReleaseEvent::StepDone) => {
                match step.next(self.has_post_deploy) {
                    Some(next) => ReleaseState::Running(next),
                    None => ReleaseState::Live,
                }
            }

            (ReleaseState::Running(step), ReleaseEvent::StepFailed(err)) => {
                self.error = Some(err.clone());
                ReleaseState::Failed(step)
            }

            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(new_state)
    }
}
