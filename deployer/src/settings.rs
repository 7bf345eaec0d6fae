//! Settings file

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;

/// Remote base directory used when neither settings nor flags set one
pub const DEFAULT_REMOTE_BASE_DIR: &str = "/data/apps";

/// Optional JSON settings. Every field has a default, so `{}` is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs (and the final summary) as JSON
    #[serde(default)]
    pub json_logs: bool,

    /// Also write logs to this directory
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Directory on each host that holds one subdirectory per project
    #[serde(default = "default_remote_base_dir")]
    pub remote_base_dir: String,

    /// Upload attempts per host, including the first
    #[serde(default = "default_upload_attempts")]
    pub upload_attempts: u32,

    /// Pause between upload attempts, in seconds
    #[serde(default = "default_upload_retry_delay")]
    pub upload_retry_delay_secs: u64,

    /// Upper bound for any single remote command or copy, in seconds
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// ssh connect timeout, in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Hosts deployed at the same time
    #[serde(default = "default_max_parallel_hosts")]
    pub max_parallel_hosts: usize,

    /// Remove the release directory when extraction fails
    #[serde(default)]
    pub cleanup_failed_release: bool,

    /// Packaging exclude patterns
    #[serde(default = "default_excludes")]
    pub excludes: Vec<String>,
}

fn default_remote_base_dir() -> String {
    DEFAULT_REMOTE_BASE_DIR.to_string()
}

fn default_upload_attempts() -> u32 {
    3
}

fn default_upload_retry_delay() -> u64 {
    2
}

fn default_command_timeout() -> u64 {
    600
}

fn default_connect_timeout() -> u64 {
    15
}

fn default_max_parallel_hosts() -> usize {
    1
}

fn default_excludes() -> Vec<String> {
    vec![".git".to_string()]
}

impl Settings {
    pub fn upload_retry_delay(&self) -> Duration {
        Duration::from_secs(self.upload_retry_delay_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            json_logs: false,
            log_dir: None,
            remote_base_dir: default_remote_base_dir(),
            upload_attempts: default_upload_attempts(),
            upload_retry_delay_secs: default_upload_retry_delay(),
            command_timeout_secs: default_command_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            max_parallel_hosts: default_max_parallel_hosts(),
            cleanup_failed_release: false,
            excludes: default_excludes(),
        }
    }
}
