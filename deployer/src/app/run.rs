//! Run driver: package once, deploy to every host

use std::future::Future;
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{error, info, warn};

use crate::app::options::DeployOptions;
use crate::deploy::{DeploymentOrchestrator, ReleaseManager, RunSummary};
use crate::errors::DeployError;
use crate::filesys::is_readable_dir;
use crate::packaging::create_archive;
use crate::remote::{OpenSsh, RemoteShell};

/// Prefix of the per-run workspace directory
pub const WORKSPACE_PREFIX: &str = "reldeploy-";

/// Deploy over the system ssh client
pub async fn run(
    options: DeployOptions,
    shutdown_signal: impl Future<Output = ()> + Send,
) -> Result<RunSummary, DeployError> {
    let shell: Arc<dyn RemoteShell> = Arc::new(OpenSsh::new(options.transport.clone()));
    run_with_shell(options, shell, shutdown_signal).await
}

/// Deploy through `shell`.
///
/// Configuration and packaging errors, and the shutdown signal, end the run
/// with an error. Host failures are reported in the summary. The run
/// workspace is removed on every path out of this function.
pub async fn run_with_shell(
    options: DeployOptions,
    shell: Arc<dyn RemoteShell>,
    shutdown_signal: impl Future<Output = ()> + Send,
) -> Result<RunSummary, DeployError> {
    check_options(&options).await?;

    let workspace = create_workspace(&options)?;
    info!("Run workspace: {}", workspace.path().display());

    let result = tokio::select! {
        result = deploy(&options, shell, &workspace) => result,
        _ = shutdown_signal => {
            warn!("Shutdown signal received, abandoning the run");
            Err(DeployError::Interrupted(
                "shutdown signal received; remote hosts may hold a partial release".to_string(),
            ))
        }
    };

    let path = workspace.path().to_path_buf();
    if let Err(e) = workspace.close() {
        error!("Failed to remove run workspace {}: {}", path.display(), e);
    }
    result
}

async fn check_options(options: &DeployOptions) -> Result<(), DeployError> {
    if options.hosts.is_empty() {
        return Err(DeployError::ConfigError("host list is empty".to_string()));
    }
    if !is_readable_dir(&options.project_path).await {
        return Err(DeployError::ConfigError(format!(
            "project path {} is not a readable directory",
            options.project_path.display()
        )));
    }
    if options.retry.max_attempts == 0 {
        return Err(DeployError::ConfigError(
            "upload attempts must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn create_workspace(options: &DeployOptions) -> Result<TempDir, DeployError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(WORKSPACE_PREFIX);
    let workspace = match &options.work_dir {
        Some(dir) => builder.tempdir_in(dir),
        None => builder.tempdir(),
    };
    workspace.map_err(|e| DeployError::ConfigError(format!("cannot create run workspace: {}", e)))
}

async fn deploy(
    options: &DeployOptions,
    shell: Arc<dyn RemoteShell>,
    workspace: &TempDir,
) -> Result<RunSummary, DeployError> {
    let artifact_path = workspace.path().join(options.artifact_file_name());
    let artifact =
        create_archive(&options.project_path, &artifact_path, &options.archive_rules).await?;

    let plan = options.plan(artifact.path.clone());
    plan.validate()?;
    info!(
        "Release {} of {} -> {}",
        plan.version,
        plan.project_name,
        plan.remote_release_dir()
    );

    let release_manager = Arc::new(ReleaseManager::new(
        Arc::new(plan),
        shell,
        options.retry.clone(),
        options.release.clone(),
    ));
    let orchestrator = DeploymentOrchestrator::new(release_manager, options.orchestrator.clone());

    Ok(orchestrator.run(&options.hosts).await)
}
