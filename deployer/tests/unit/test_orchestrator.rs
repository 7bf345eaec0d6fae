//! Multi-host orchestration tests

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use reldeploy::deploy::plan::DeploymentPlan;
use reldeploy::deploy::{
    DeployStep, DeploymentOrchestrator, DeploymentOutcome, OrchestratorOptions, ReleaseManager,
    ReleaseOptions, RetryPolicy,
};
use reldeploy::remote::RemoteShell;

use crate::support::{build_artifact, DelayShell, LocalShell};

fn tokens(list: &[&str]) -> Vec<String> {
    list.iter().map(|t| t.to_string()).collect()
}

async fn local_plan(remote: &TempDir, local: &TempDir) -> DeploymentPlan {
    let artifact = build_artifact(local.path(), "shop", "v1").await;
    DeploymentPlan {
        project_name: "shop".to_string(),
        version: "v1".to_string(),
        remote_base_dir: remote.path().display().to_string(),
        artifact_file_name: artifact.file_name(),
        local_artifact_path: artifact.path,
        post_deploy_command: None,
    }
}

fn orchestrator(
    plan: DeploymentPlan,
    shell: Arc<dyn RemoteShell>,
    max_parallel_hosts: usize,
) -> DeploymentOrchestrator {
    let manager = ReleaseManager::new(
        Arc::new(plan),
        shell,
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::ZERO,
        },
        ReleaseOptions::default(),
    );
    DeploymentOrchestrator::new(
        Arc::new(manager),
        OrchestratorOptions { max_parallel_hosts },
    )
}

#[tokio::test]
async fn test_failed_host_does_not_stop_the_next() {
    let (remote, local) = (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap());
    let shell = Arc::new(LocalShell::new());
    shell.fail_copies("web1", u32::MAX);

    let plan = local_plan(&remote, &local).await;
    let summary = orchestrator(plan, shell.clone(), 1)
        .run(&tokens(&["deploy@web1", "deploy@web2"]))
        .await;

    assert_eq!(summary.reports.len(), 2);
    assert_eq!(summary.reports[0].index, 0);
    assert!(matches!(
        summary.reports[0].outcome,
        DeploymentOutcome::Failed {
            step: DeployStep::Upload,
            ..
        }
    ));
    assert_eq!(summary.reports[1].index, 1);
    assert_eq!(summary.reports[1].outcome, DeploymentOutcome::Success);
    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.failed(), 1);
    assert!(!summary.is_success());
}

#[tokio::test]
async fn test_invalid_specs_are_skipped() {
    let (remote, local) = (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap());
    let shell = Arc::new(LocalShell::new());

    let plan = local_plan(&remote, &local).await;
    let summary = orchestrator(plan, shell, 1)
        .run(&tokens(&["not-a-valid-spec", "", "deploy@web2"]))
        .await;

    assert_eq!(summary.reports.len(), 3);
    for report in &summary.reports[..2] {
        assert_eq!(
            report.outcome,
            DeploymentOutcome::skipped("invalid host spec")
        );
        assert_eq!(report.upload_attempts, 0);
    }
    assert_eq!(summary.reports[0].label, "#1");
    assert_eq!(summary.reports[2].outcome, DeploymentOutcome::Success);
    assert_eq!(summary.skipped(), 2);
}

#[tokio::test]
async fn test_upload_succeeds_on_third_attempt() {
    let (remote, local) = (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap());
    let shell = Arc::new(LocalShell::new());
    shell.fail_copies("web1", 2);

    let plan = local_plan(&remote, &local).await;
    let summary = orchestrator(plan, shell.clone(), 1)
        .run(&tokens(&["deploy@web1"]))
        .await;

    assert_eq!(summary.reports[0].outcome, DeploymentOutcome::Success);
    assert_eq!(summary.reports[0].upload_attempts, 3);
    assert_eq!(shell.copy_attempts("web1"), 3);
    assert!(summary.is_success());
    assert!(fs::read_link(remote.path().join("shop/website")).is_ok());
}

#[tokio::test]
async fn test_exhausted_upload_skips_extract_and_activate() {
    let (remote, local) = (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap());
    let shell = Arc::new(LocalShell::new());
    shell.fail_copies("web1", 3);

    let plan = local_plan(&remote, &local).await;
    let summary = orchestrator(plan, shell.clone(), 1)
        .run(&tokens(&["deploy@web1"]))
        .await;

    match &summary.reports[0].outcome {
        DeploymentOutcome::Failed { step, reason } => {
            assert_eq!(*step, DeployStep::Upload);
            assert!(reason.contains("after 3 attempts"), "{}", reason);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(summary.reports[0].upload_attempts, 3);
    assert_eq!(shell.copy_attempts("web1"), 3);
    assert!(!shell.ran_on("web1", "tar '-xzf'"));
    assert!(!shell.ran_on("web1", "mv '-Tf'"));
    assert!(fs::symlink_metadata(remote.path().join("shop/website")).is_err());
}

#[tokio::test]
async fn test_parallel_run_keeps_input_order() {
    let local = tempfile::tempdir().unwrap();
    let remote = tempfile::tempdir().unwrap();
    let shell = Arc::new(DelayShell::new(&[("web1", 150), ("web2", 50), ("web3", 0)]));

    let plan = local_plan(&remote, &local).await;
    let summary = orchestrator(plan, shell.clone(), 3)
        .run(&tokens(&["deploy@web1", "deploy@web2", "deploy@web3"]))
        .await;

    assert!(summary.is_success());
    let order: Vec<usize> = summary.reports.iter().map(|r| r.index).collect();
    assert_eq!(order, vec![0, 1, 2]);
    // the hosts really overlapped
    assert_eq!(shell.finished(), vec!["web3", "web2", "web1"]);
}

#[tokio::test]
async fn test_empty_run_is_not_a_success() {
    let (remote, local) = (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap());
    let plan = local_plan(&remote, &local).await;
    let summary = orchestrator(plan, Arc::new(LocalShell::new()), 1)
        .run(&[])
        .await;
    assert!(summary.reports.is_empty());
    assert!(!summary.is_success());
}
