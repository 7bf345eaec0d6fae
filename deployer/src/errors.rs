//! Error types for reldeploy

use thiserror::Error;

/// Main error type for a deployment run
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Packaging error: {0}")]
    PackagingError(String),

    #[error("Invalid host spec: {0}")]
    InvalidHostSpec(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Remote command failed: {0}")]
    RemoteCommandError(String),

    #[error("Precondition failed: {0}")]
    PreconditionError(String),

    #[error("Interrupted: {0}")]
    Interrupted(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeployError {
    /// Whether this error ends the whole run rather than a single host
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DeployError::ConfigError(_)
                | DeployError::PackagingError(_)
                | DeployError::Interrupted(_)
        )
    }
}

impl From<anyhow::Error> for DeployError {
    fn from(err: anyhow::Error) -> Self {
        DeployError::Internal(format!("{:#}", err))
    }
}
