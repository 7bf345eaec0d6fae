//! Parsed connection target

use std::fmt;

use secrecy::SecretString;

use crate::utils::mask_host;

/// Port used when a host spec does not name one
pub const DEFAULT_SSH_PORT: u16 = 22;

/// How the transport authenticates against a host
#[derive(Debug)]
pub enum Credential {
    /// Password supplied non-interactively to the transport
    Password(SecretString),

    /// Ambient key agent or identity files
    KeyBased,
}

impl Credential {
    pub fn is_password(&self) -> bool {
        matches!(self, Credential::Password(_))
    }
}

/// A remote host to deploy to.
///
/// Built once per run from a host spec and never mutated afterwards.
pub struct HostTarget {
    pub user: String,
    pub host: String,
    pub port: u16,
    pub credential: Credential,
}

impl HostTarget {
    /// `user@host` as understood by ssh and scp
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// Display label with the host partially masked and no port
    pub fn label(&self) -> String {
        format!("{}@{}", self.user, mask_host(&self.host))
    }
}

impl fmt::Debug for HostTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostTarget")
            .field("user", &self.user)
            .field("host", &mask_host(&self.host))
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for HostTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
