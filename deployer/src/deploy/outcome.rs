//! Per-host outcomes and the run summary

use serde::Serialize;

use crate::deploy::fsm::DeployStep;

/// Result of deploying to one host. Never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeploymentOutcome {
    Success,
    Skipped { reason: String },
    Failed { step: DeployStep, reason: String },
}

impl DeploymentOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        DeploymentOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn failed(step: DeployStep, reason: impl Into<String>) -> Self {
        DeploymentOutcome::Failed {
            step,
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DeploymentOutcome::Success)
    }

    /// Whether the new release went live despite the outcome
    pub fn is_live(&self) -> bool {
        match self {
            DeploymentOutcome::Success => true,
            DeploymentOutcome::Failed { step, .. } => step.is_after_activation(),
            DeploymentOutcome::Skipped { .. } => false,
        }
    }
}

/// Outcome for one entry of the host list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostReport {
    /// Position in the host list
    pub index: usize,

    /// Masked `user@host`, or `#n` when the spec could not be parsed
    pub label: String,

    pub outcome: DeploymentOutcome,

    /// Upload attempts made (0 when the upload was never reached)
    pub upload_attempts: u32,
}

/// Ordered results of a whole run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub reports: Vec<HostReport>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, DeploymentOutcome::Success))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, DeploymentOutcome::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, DeploymentOutcome::Skipped { .. }))
    }

    /// True only when every host in the list succeeded
    pub fn is_success(&self) -> bool {
        !self.reports.is_empty() && self.reports.iter().all(|r| r.outcome.is_success())
    }

    fn count(&self, pred: impl Fn(&DeploymentOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }
}

impl FromIterator<HostReport> for RunSummary {
    fn from_iter<I: IntoIterator<Item = HostReport>>(iter: I) -> Self {
        Self {
            reports: iter.into_iter().collect(),
        }
    }
}
