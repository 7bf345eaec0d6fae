//! Release lifecycle tests against a local "remote" directory

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use reldeploy::deploy::plan::DeploymentPlan;
use reldeploy::deploy::release::{ReleaseManager, ReleaseOptions, ReleaseResult};
use reldeploy::deploy::{DeployStep, DeploymentOutcome, RetryPolicy};
use reldeploy::hosts::parse_host_spec;

use crate::support::{build_artifact, LocalShell};

const PROJECT: &str = "shop";

struct Fixture {
    remote: TempDir,
    local: TempDir,
    shell: Arc<LocalShell>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            remote: tempfile::tempdir().unwrap(),
            local: tempfile::tempdir().unwrap(),
            shell: Arc::new(LocalShell::new()),
        }
    }

    fn app_dir(&self) -> std::path::PathBuf {
        self.remote.path().join(PROJECT)
    }

    fn release_dir(&self, version: &str) -> std::path::PathBuf {
        self.app_dir().join("releases").join(version)
    }

    fn active_link(&self) -> std::path::PathBuf {
        self.app_dir().join("website")
    }

    async fn plan(&self, version: &str, post_deploy: Option<&str>) -> DeploymentPlan {
        let artifact = build_artifact(self.local.path(), PROJECT, version).await;
        DeploymentPlan {
            project_name: PROJECT.to_string(),
            version: version.to_string(),
            remote_base_dir: self.remote.path().display().to_string(),
            artifact_file_name: artifact.file_name(),
            local_artifact_path: artifact.path,
            post_deploy_command: post_deploy.map(str::to_string),
        }
    }

    fn manager(&self, plan: DeploymentPlan, options: ReleaseOptions) -> ReleaseManager {
        ReleaseManager::new(
            Arc::new(plan),
            self.shell.clone(),
            RetryPolicy {
                max_attempts: 3,
                delay: Duration::ZERO,
            },
            options,
        )
    }

    async fn deploy(&self, version: &str, post_deploy: Option<&str>) -> ReleaseResult {
        let plan = self.plan(version, post_deploy).await;
        let target = parse_host_spec("deploy@web1").unwrap();
        self.manager(plan, ReleaseOptions::default())
            .deploy(&target)
            .await
    }
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[tokio::test]
async fn test_new_release_becomes_active() {
    let fx = Fixture::new();

    let result = fx.deploy("v1", None).await;
    assert_eq!(result.outcome, DeploymentOutcome::Success);
    assert_eq!(result.upload_attempts, 1);

    assert_eq!(fs::read_link(fx.active_link()).unwrap(), fx.release_dir("v1"));
    assert_eq!(read(&fx.active_link().join("index.html")), "<h1>v1</h1>");
    assert!(fx.active_link().join("assets/site.css").exists());
    // the uploaded tarball does not stay in the release
    assert!(!fx.release_dir("v1").join("shop-v1.tar.gz").exists());
}

#[tokio::test]
async fn test_second_release_switches_link_and_keeps_first() {
    let fx = Fixture::new();

    assert!(fx.deploy("v1", None).await.outcome.is_success());
    assert!(fx.deploy("v2", None).await.outcome.is_success());

    assert_eq!(fs::read_link(fx.active_link()).unwrap(), fx.release_dir("v2"));
    assert_eq!(read(&fx.active_link().join("index.html")), "<h1>v2</h1>");
    assert_eq!(read(&fx.release_dir("v1").join("index.html")), "<h1>v1</h1>");

    // no scratch links left behind by activation
    let leftovers: Vec<_> = fs::read_dir(fx.app_dir())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "{:?}", leftovers);
}

#[tokio::test]
async fn test_redeploying_same_version_is_idempotent() {
    let fx = Fixture::new();

    assert!(fx.deploy("v1", None).await.outcome.is_success());
    assert!(fx.deploy("v2", None).await.outcome.is_success());
    let again = fx.deploy("v2", None).await;

    assert_eq!(again.outcome, DeploymentOutcome::Success);
    assert_eq!(fs::read_link(fx.active_link()).unwrap(), fx.release_dir("v2"));
    assert_eq!(read(&fx.release_dir("v1").join("index.html")), "<h1>v1</h1>");
}

#[tokio::test]
async fn test_regular_file_at_activation_point_is_never_replaced() {
    let fx = Fixture::new();
    fs::create_dir_all(fx.app_dir()).unwrap();
    fs::write(fx.active_link(), "hand-made site").unwrap();

    let result = fx.deploy("v1", None).await;

    match &result.outcome {
        DeploymentOutcome::Failed { step, reason } => {
            assert_eq!(*step, DeployStep::Precondition);
            assert!(reason.contains("is not a symbolic link"), "{}", reason);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(result.upload_attempts, 0);
    assert_eq!(fx.shell.copy_attempts("web1"), 0);
    assert_eq!(read(&fx.active_link()), "hand-made site");
    assert!(!fx.release_dir("v1").exists());
}

#[tokio::test]
async fn test_directory_at_activation_point_is_never_replaced() {
    let fx = Fixture::new();
    fs::create_dir_all(fx.active_link()).unwrap();

    let result = fx.deploy("v1", None).await;

    assert!(matches!(
        result.outcome,
        DeploymentOutcome::Failed {
            step: DeployStep::Precondition,
            ..
        }
    ));
    assert!(fx.active_link().is_dir());
    assert!(fs::symlink_metadata(fx.active_link()).unwrap().is_dir());
}

#[tokio::test]
async fn test_post_deploy_runs_inside_active_release() {
    let fx = Fixture::new();

    let result = fx.deploy("v1", Some("pwd -P > deployed.txt")).await;

    assert_eq!(result.outcome, DeploymentOutcome::Success);
    let marker = fx.release_dir("v1").join("deployed.txt");
    let recorded = read(&marker);
    let expected = fs::canonicalize(fx.release_dir("v1")).unwrap();
    assert_eq!(recorded.trim(), expected.display().to_string());
}

#[tokio::test]
async fn test_post_deploy_failure_leaves_release_live() {
    let fx = Fixture::new();
    assert!(fx.deploy("v1", None).await.outcome.is_success());

    let result = fx.deploy("v2", Some("exit 3")).await;

    match &result.outcome {
        DeploymentOutcome::Failed { step, reason } => {
            assert_eq!(*step, DeployStep::PostDeploy);
            assert!(reason.contains("exit code 3"), "{}", reason);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(result.outcome.is_live());
    assert_eq!(fs::read_link(fx.active_link()).unwrap(), fx.release_dir("v2"));
}

#[tokio::test]
async fn test_extract_failure_keeps_previous_release_active() {
    let fx = Fixture::new();
    assert!(fx.deploy("v1", None).await.outcome.is_success());

    let mut plan = fx.plan("v2", None).await;
    let broken = fx.local.path().join("broken.tar.gz");
    fs::write(&broken, "not a tarball").unwrap();
    plan.local_artifact_path = broken;

    let target = parse_host_spec("deploy@web1").unwrap();
    let result = fx.manager(plan, ReleaseOptions::default()).deploy(&target).await;

    assert!(matches!(
        result.outcome,
        DeploymentOutcome::Failed {
            step: DeployStep::Extract,
            ..
        }
    ));
    assert!(!result.outcome.is_live());
    assert_eq!(fs::read_link(fx.active_link()).unwrap(), fx.release_dir("v1"));
    // partial release stays unless cleanup is enabled
    assert!(fx.release_dir("v2").exists());
}

#[tokio::test]
async fn test_extract_failure_cleanup_removes_partial_release() {
    let fx = Fixture::new();
    assert!(fx.deploy("v1", None).await.outcome.is_success());

    let mut plan = fx.plan("v2", None).await;
    let broken = fx.local.path().join("broken.tar.gz");
    fs::write(&broken, "not a tarball").unwrap();
    plan.local_artifact_path = broken;

    let target = parse_host_spec("deploy@web1").unwrap();
    let options = ReleaseOptions {
        cleanup_failed_release: true,
    };
    let result = fx.manager(plan, options).deploy(&target).await;

    assert!(!result.outcome.is_success());
    assert!(!fx.release_dir("v2").exists());
    assert!(fx.release_dir("v1").exists());
    assert!(fx.shell.ran_on("web1", "rm -rf"));
}

#[test]
fn test_deploy_on_a_plain_runtime() {
    let fx = Fixture::new();
    let result = tokio_test::block_on(fx.deploy("v1", None));
    tokio_test::assert_ok!(fs::read_link(fx.active_link()));
    assert!(result.outcome.is_success());
}
