//! Release deployment

pub mod fsm;
pub mod orchestrator;
pub mod outcome;
pub mod plan;
pub mod release;
pub mod upload;

pub use fsm::DeployStep;
pub use orchestrator::{DeploymentOrchestrator, OrchestratorOptions};
pub use outcome::{DeploymentOutcome, HostReport, RunSummary};
pub use plan::DeploymentPlan;
pub use release::{ReleaseManager, ReleaseOptions};
pub use upload::{RetryPolicy, Uploader};
