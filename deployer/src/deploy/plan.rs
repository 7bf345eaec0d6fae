//! Deployment plan and the remote directory layout

use std::path::PathBuf;

use crate::errors::DeployError;

/// Name of the symlink that marks the active release
pub const ACTIVE_LINK_NAME: &str = "website";

/// Directory holding one subdirectory per release
pub const RELEASES_DIR_NAME: &str = "releases";

/// What to deploy and where it lands on every host.
///
/// Remote layout:
///
/// ```text
/// {remote_base_dir}/{project_name}/releases/{version}/   release payload
/// {remote_base_dir}/{project_name}/website               symlink to the active release
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentPlan {
    pub project_name: String,
    pub version: String,
    pub remote_base_dir: String,
    pub local_artifact_path: PathBuf,
    pub artifact_file_name: String,
    pub post_deploy_command: Option<String>,
}

impl DeploymentPlan {
    /// `{remote_base_dir}/{project_name}`
    pub fn remote_app_dir(&self) -> String {
        format!(
            "{}/{}",
            self.remote_base_dir.trim_end_matches('/'),
            self.project_name
        )
    }

    /// `{remote_app_dir}/releases/{version}`
    pub fn remote_release_dir(&self) -> String {
        format!(
            "{}/{}/{}",
            self.remote_app_dir(),
            RELEASES_DIR_NAME,
            self.version
        )
    }

    /// `{remote_release_dir}/{artifact_file_name}`
    pub fn remote_artifact_path(&self) -> String {
        format!("{}/{}", self.remote_release_dir(), self.artifact_file_name)
    }

    /// `{remote_app_dir}/website`
    pub fn remote_active_link(&self) -> String {
        format!("{}/{}", self.remote_app_dir(), ACTIVE_LINK_NAME)
    }

    /// Scratch link renamed over the active link during activation
    pub fn activation_temp_link(&self, token: &str) -> String {
        format!("{}/.{}-{}.tmp", self.remote_app_dir(), ACTIVE_LINK_NAME, token)
    }

    /// Post-deploy command, if one is set and not blank
    pub fn post_deploy(&self) -> Option<&str> {
        self.post_deploy_command
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Check the plan can be laid out safely on a remote filesystem
    pub fn validate(&self) -> Result<(), DeployError> {
        validate_segment("project name", &self.project_name)?;
        validate_segment("version", &self.version)?;
        validate_segment("artifact file name", &self.artifact_file_name)?;

        if !self.remote_base_dir.starts_with('/') {
            return Err(DeployError::ConfigError(format!(
                "remote base directory must be absolute, got '{}'",
                self.remote_base_dir
            )));
        }
        if !self.remote_base_dir.chars().all(|c| c == '/' || is_path_char(c)) {
            return Err(DeployError::ConfigError(format!(
                "remote base directory may only contain letters, digits and / . _ - +, got '{}'",
                self.remote_base_dir
            )));
        }
        Ok(())
    }
}

/// Characters that mean nothing to a shell, so remote paths built from them
/// stay intact even where scp hands them to the remote shell unquoted
fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '+')
}

/// A single path segment: non-empty, shell-inert characters only, not `.`/`..`
fn validate_segment(what: &str, value: &str) -> Result<(), DeployError> {
    let bad = value.is_empty() || value == "." || value == ".." || !value.chars().all(is_path_char);
    if bad {
        return Err(DeployError::ConfigError(format!(
            "invalid {}: '{}'",
            what, value
        )));
    }
    Ok(())
}
