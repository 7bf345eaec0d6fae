//! Run options.
//!
//! Every option can be given as `--key=value` or through its environment
//! variable; the flag wins. Tunables that are rarely changed live in the
//! optional JSON settings file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::deploy::{DeploymentPlan, OrchestratorOptions, ReleaseOptions, RetryPolicy};
use crate::errors::DeployError;
use crate::filesys::File;
use crate::hosts::split_host_list;
use crate::logs::{LogLevel, LogOptions};
use crate::packaging::ArchiveRules;
use crate::remote::TransportOptions;
use crate::settings::Settings;
use crate::utils::release_version_now;

/// A command line option and its environment fallback
#[derive(Debug, Clone, Copy)]
pub struct OptionKey {
    pub flag: &'static str,
    pub env: &'static str,
}

pub const HOSTS: OptionKey = OptionKey { flag: "hosts", env: "DEPLOY_HOSTS" };
pub const PROJECT_PATH: OptionKey = OptionKey { flag: "project-path", env: "DEPLOY_PROJECT_PATH" };
pub const PROJECT_NAME: OptionKey = OptionKey { flag: "project-name", env: "DEPLOY_PROJECT_NAME" };
pub const VERSION: OptionKey = OptionKey { flag: "release", env: "DEPLOY_VERSION" };
pub const REMOTE_BASE_DIR: OptionKey = OptionKey { flag: "remote-base-dir", env: "DEPLOY_REMOTE_BASE_DIR" };
pub const POST_DEPLOY: OptionKey = OptionKey { flag: "post-deploy", env: "DEPLOY_POST_COMMAND" };
pub const INCLUDE: OptionKey = OptionKey { flag: "include", env: "DEPLOY_INCLUDE" };
pub const EXCLUDE: OptionKey = OptionKey { flag: "exclude", env: "DEPLOY_EXCLUDE" };
pub const SETTINGS: OptionKey = OptionKey { flag: "settings", env: "DEPLOY_SETTINGS" };
pub const LOG_LEVEL: OptionKey = OptionKey { flag: "log-level", env: "DEPLOY_LOG_LEVEL" };
pub const WORK_DIR: OptionKey = OptionKey { flag: "work-dir", env: "DEPLOY_WORK_DIR" };

/// Parsed `--key=value` and `--flag` arguments
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    values: HashMap<String, String>,
}

impl CliArgs {
    /// Parse arguments, excluding the program name
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut values = HashMap::new();
        for arg in args {
            let arg = arg.as_ref();
            if let Some((key, value)) = arg.split_once('=') {
                let clean_key = key.trim_start_matches('-');
                values.insert(clean_key.to_string(), value.to_string());
            } else if arg.starts_with("--") {
                let clean_key = arg.trim_start_matches('-');
                values.insert(clean_key.to_string(), "true".to_string());
            }
        }
        Self { values }
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.values.contains_key(flag)
    }

    /// Value of `key` from the flags, else from the environment
    pub fn get(&self, key: OptionKey, env: &dyn Fn(&str) -> Option<String>) -> Option<String> {
        self.values
            .get(key.flag)
            .cloned()
            .or_else(|| env(key.env))
            .filter(|v| !v.trim().is_empty())
    }
}

/// Environment lookup backed by the process environment
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Load the settings file named by `--settings`/`DEPLOY_SETTINGS`, if any
pub async fn load_settings(
    args: &CliArgs,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<Settings, DeployError> {
    let Some(path) = args.get(SETTINGS, env) else {
        return Ok(Settings::default());
    };
    File::new(&path).read_json::<Settings>().await.map_err(|e| {
        DeployError::ConfigError(format!("unable to read settings file {}: {}", path, e))
    })
}

/// Logging options from settings, with `--log-level` taking precedence
pub fn log_options(
    args: &CliArgs,
    env: &dyn Fn(&str) -> Option<String>,
    settings: &Settings,
) -> Result<LogOptions, DeployError> {
    let log_level = match args.get(LOG_LEVEL, env) {
        Some(level) => level
            .parse::<LogLevel>()
            .map_err(DeployError::ConfigError)?,
        None => settings.log_level.clone(),
    };
    Ok(LogOptions {
        log_level,
        stderr: true,
        log_dir: settings.log_dir.clone(),
        json_format: settings.json_logs,
    })
}

/// Everything a run needs
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Host spec tokens, in deployment order
    pub hosts: Vec<String>,
    pub project_path: PathBuf,
    pub project_name: String,
    pub version: String,
    pub remote_base_dir: String,
    pub post_deploy_command: Option<String>,
    pub archive_rules: ArchiveRules,
    pub retry: RetryPolicy,
    pub transport: TransportOptions,
    pub orchestrator: OrchestratorOptions,
    pub release: ReleaseOptions,

    /// Where the run workspace is created; system temp dir when unset
    pub work_dir: Option<PathBuf>,
}

impl DeployOptions {
    /// Resolve options from flags, environment and settings
    pub fn resolve(
        args: &CliArgs,
        env: &dyn Fn(&str) -> Option<String>,
        settings: &Settings,
    ) -> Result<Self, DeployError> {
        let hosts = args
            .get(HOSTS, env)
            .map(|list| split_host_list(&list))
            .unwrap_or_default();
        if hosts.is_empty() {
            return Err(DeployError::ConfigError(format!(
                "no hosts given (--{} or {})",
                HOSTS.flag, HOSTS.env
            )));
        }

        let project_path = args.get(PROJECT_PATH, env).map(PathBuf::from).ok_or_else(|| {
            DeployError::ConfigError(format!(
                "no project path given (--{} or {})",
                PROJECT_PATH.flag, PROJECT_PATH.env
            ))
        })?;

        let project_name = match args.get(PROJECT_NAME, env) {
            Some(name) => name,
            None => default_project_name(&project_path)?,
        };

        let version = args
            .get(VERSION, env)
            .unwrap_or_else(release_version_now);

        let remote_base_dir = args
            .get(REMOTE_BASE_DIR, env)
            .unwrap_or_else(|| settings.remote_base_dir.clone());

        let includes = args.get(INCLUDE, env).map(|v| split_list(&v)).unwrap_or_default();
        let mut excludes = settings.excludes.clone();
        excludes.extend(args.get(EXCLUDE, env).map(|v| split_list(&v)).unwrap_or_default());

        if settings.upload_attempts == 0 {
            return Err(DeployError::ConfigError(
                "upload_attempts must be at least 1".to_string(),
            ));
        }
        if settings.max_parallel_hosts == 0 {
            return Err(DeployError::ConfigError(
                "max_parallel_hosts must be at least 1".to_string(),
            ));
        }
        if settings.command_timeout_secs == 0 {
            return Err(DeployError::ConfigError(
                "command_timeout_secs must be at least 1".to_string(),
            ));
        }

        let options = Self {
            hosts,
            project_path,
            project_name,
            version,
            remote_base_dir,
            post_deploy_command: args.get(POST_DEPLOY, env),
            archive_rules: ArchiveRules::new(includes, excludes),
            retry: RetryPolicy {
                max_attempts: settings.upload_attempts,
                delay: settings.upload_retry_delay(),
            },
            transport: TransportOptions {
                timeout: settings.command_timeout(),
                connect_timeout_secs: settings.connect_timeout_secs,
            },
            orchestrator: OrchestratorOptions {
                max_parallel_hosts: settings.max_parallel_hosts,
            },
            release: ReleaseOptions {
                cleanup_failed_release: settings.cleanup_failed_release,
            },
            work_dir: args.get(WORK_DIR, env).map(PathBuf::from),
        };

        options.plan(PathBuf::from(options.artifact_file_name())).validate()?;
        Ok(options)
    }

    /// `{project}-{version}.tar.gz`
    pub fn artifact_file_name(&self) -> String {
        format!("{}-{}.tar.gz", self.project_name, self.version)
    }

    /// Deployment plan for an artifact at `artifact_path`
    pub fn plan(&self, artifact_path: PathBuf) -> DeploymentPlan {
        DeploymentPlan {
            project_name: self.project_name.clone(),
            version: self.version.clone(),
            remote_base_dir: self.remote_base_dir.clone(),
            local_artifact_path: artifact_path,
            artifact_file_name: self.artifact_file_name(),
            post_deploy_command: self.post_deploy_command.clone(),
        }
    }

    /// Options for a host list with every tunable at its default
    pub fn new(hosts: Vec<String>, project_path: PathBuf, project_name: &str, version: &str) -> Self {
        let settings = Settings::default();
        Self {
            hosts,
            project_path,
            project_name: project_name.to_string(),
            version: version.to_string(),
            remote_base_dir: settings.remote_base_dir.clone(),
            post_deploy_command: None,
            archive_rules: ArchiveRules::new(Vec::new(), settings.excludes.clone()),
            retry: RetryPolicy::default(),
            transport: TransportOptions::default(),
            orchestrator: OrchestratorOptions::default(),
            release: ReleaseOptions::default(),
            work_dir: None,
        }
    }
}

fn default_project_name(project_path: &Path) -> Result<String, DeployError> {
    let absolute = std::path::absolute(project_path)?;
    absolute
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| {
            DeployError::ConfigError(format!(
                "cannot derive a project name from {}; set --{}",
                project_path.display(),
                PROJECT_NAME.flag
            ))
        })
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
