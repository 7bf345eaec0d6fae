//! Console status lines for a finished run

use colored::Colorize;

use crate::deploy::{DeploymentOutcome, HostReport, RunSummary};

/// Status tag of a host report
pub fn status_tag(outcome: &DeploymentOutcome) -> &'static str {
    match outcome {
        DeploymentOutcome::Success => "OK",
        DeploymentOutcome::Skipped { .. } => "SKIP",
        DeploymentOutcome::Failed { .. } => "FAIL",
    }
}

/// One line per host, without colors.
///
/// Labels are already masked, so nothing here can leak a password or port.
pub fn host_line(report: &HostReport) -> String {
    let detail = match &report.outcome {
        DeploymentOutcome::Success => "deployed".to_string(),
        DeploymentOutcome::Skipped { reason } => reason.clone(),
        DeploymentOutcome::Failed { step, reason } if report.outcome.is_live() => {
            format!("{} failed, release is live: {}", step, reason)
        }
        DeploymentOutcome::Failed { step, reason } => format!("{} failed: {}", step, reason),
    };
    let attempts = if report.upload_attempts > 1 {
        format!(" ({} upload attempts)", report.upload_attempts)
    } else {
        String::new()
    };
    format!(
        "[{}] #{} {}: {}{}",
        status_tag(&report.outcome),
        report.index + 1,
        report.label,
        detail,
        attempts
    )
}

pub fn summary_line(summary: &RunSummary) -> String {
    format!(
        "{} host(s): {} succeeded, {} failed, {} skipped",
        summary.reports.len(),
        summary.succeeded(),
        summary.failed(),
        summary.skipped()
    )
}

/// Print the run to stdout, colored unless `json` is set
pub fn print_summary(summary: &RunSummary, json: bool) {
    if json {
        match serde_json::to_string(summary) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Unable to serialize run summary: {}", e),
        }
        return;
    }

    for report in &summary.reports {
        let line = host_line(report);
        let line = match report.outcome {
            DeploymentOutcome::Success => line.green(),
            DeploymentOutcome::Skipped { .. } => line.yellow(),
            DeploymentOutcome::Failed { .. } => line.red(),
        };
        println!("{}", line);
    }

    let summary_text = summary_line(summary);
    if summary.is_success() {
        println!("{}", summary_text.green().bold());
    } else {
        println!("{}", summary_text.red().bold());
    }
}
