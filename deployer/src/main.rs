//! reldeploy - Entry Point
//!
//! Packages a project directory and deploys it as a new release to every
//! host in the list, switching each host's `website` link atomically.

use std::env;
use std::process::ExitCode;

use reldeploy::app::options::{load_settings, log_options, process_env, CliArgs, DeployOptions};
use reldeploy::app::report::print_summary;
use reldeploy::app::run;
use reldeploy::errors::DeployError;
use reldeploy::logs::init_logging;
use reldeploy::utils::version_info;

use tracing::{error, info};

const EXIT_HOST_FAILURES: u8 = 1;
const EXIT_FATAL: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

const USAGE: &str = "\
Usage: reldeploy --hosts=\"<spec> [<spec> ...]\" --project-path=<dir> [options]

Host specs: user:pass@host:port | user:pass@host | user@host:port | user@host

Options (environment fallback in brackets):
  --hosts=<list>            [DEPLOY_HOSTS]
  --project-path=<dir>      [DEPLOY_PROJECT_PATH]
  --project-name=<name>     [DEPLOY_PROJECT_NAME]  default: project dir name
  --release=<version>       [DEPLOY_VERSION]       default: YYYYMMDDHHMMSS
  --remote-base-dir=<dir>   [DEPLOY_REMOTE_BASE_DIR] default: /data/apps
  --post-deploy=<command>   [DEPLOY_POST_COMMAND]
  --include=<a,b,...>       [DEPLOY_INCLUDE]
  --exclude=<a,b,...>       [DEPLOY_EXCLUDE]
  --settings=<file.json>    [DEPLOY_SETTINGS]
  --log-level=<level>       [DEPLOY_LOG_LEVEL]
  --work-dir=<dir>          [DEPLOY_WORK_DIR]
  --version                 print build information
  --help                    print this message";

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse(env::args().skip(1));

    // Print version and exit
    if args.has_flag("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Unable to print version: {}", e),
        }
        return ExitCode::SUCCESS;
    }

    if args.has_flag("help") {
        println!("{}", USAGE);
        return ExitCode::SUCCESS;
    }

    // Retrieve the settings file
    let settings = match load_settings(&args, &process_env).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(EXIT_FATAL);
        }
    };

    // Initialize logging
    let log_options = match log_options(&args, &process_env, &settings) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(EXIT_FATAL);
        }
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let options = match DeployOptions::resolve(&args, &process_env, &settings) {
        Ok(options) => options,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", USAGE);
            return ExitCode::from(EXIT_FATAL);
        }
    };

    info!(
        "Deploying {} release {} to {} host(s)",
        options.project_name,
        options.version,
        options.hosts.len()
    );
    match run(options, await_shutdown_signal()).await {
        Ok(summary) => {
            print_summary(&summary, settings.json_logs);
            if summary.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_HOST_FAILURES)
            }
        }
        Err(DeployError::Interrupted(reason)) => {
            error!("Interrupted: {}", reason);
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(e) => {
            error!("Deployment aborted: {}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!("Unable to listen for SIGTERM: {}", e);
                if tokio::signal::ctrl_c().await.is_err() {
                    std::future::pending::<()>().await;
                }
                info!("Ctrl+C received, shutting down...");
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Ctrl+C received, shutting down...");
    }
}
