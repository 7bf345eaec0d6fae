//! Multi-host deployment

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{info, info_span, warn, Instrument};

use crate::deploy::outcome::{DeploymentOutcome, HostReport, RunSummary};
use crate::deploy::release::ReleaseManager;
use crate::hosts::parse_host_spec;

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Host pipelines allowed to run at the same time
    pub max_parallel_hosts: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            max_parallel_hosts: 1,
        }
    }
}

/// Runs the release pipeline for every entry of a host list
pub struct DeploymentOrchestrator {
    release_manager: Arc<ReleaseManager>,
    options: OrchestratorOptions,
}

impl DeploymentOrchestrator {
    pub fn new(release_manager: Arc<ReleaseManager>, options: OrchestratorOptions) -> Self {
        Self {
            release_manager,
            options,
        }
    }

    /// Deploy to every host spec token.
    ///
    /// One report per token, in input order. A token that does not parse is
    /// skipped; a failing host never stops the hosts after it.
    pub async fn run(&self, tokens: &[String]) -> RunSummary {
        let parallel = self.options.max_parallel_hosts.max(1);
        info!(
            "Deploying release {} to {} host(s), {} at a time",
            self.release_manager.plan().version,
            tokens.len(),
            parallel
        );

        stream::iter(tokens.iter().enumerate())
            .map(|(index, token)| self.deploy_one(index, token))
            .buffered(parallel)
            .collect::<Vec<HostReport>>()
            .await
            .into_iter()
            .collect()
    }

    async fn deploy_one(&self, index: usize, token: &str) -> HostReport {
        let target = match parse_host_spec(token) {
            Ok(target) => target,
            Err(e) => {
                warn!("Skipping host #{}: {}", index + 1, e);
                return HostReport {
                    index,
                    label: format!("#{}", index + 1),
                    outcome: DeploymentOutcome::skipped("invalid host spec"),
                    upload_attempts: 0,
                };
            }
        };

        let label = target.label();
        let span = info_span!("host", index = index + 1, target = %label);
        let result = self
            .release_manager
            .deploy(&target)
            .instrument(span)
            .await;

        HostReport {
            index,
            label,
            outcome: result.outcome,
            upload_attempts: result.upload_attempts,
        }
    }
}
