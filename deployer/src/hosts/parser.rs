//! Host spec grammar.
//!
//! A host spec is one of, in order of precedence:
//!
//! 1. `user:pass@host:port`
//! 2. `user:pass@host`
//! 3. `user@host:port`
//! 4. `user@host`
//!
//! The first `:` before the first `@` separates user from password, the first
//! `@` separates credentials from the host, and a trailing `:digits` is the
//! port. Passwords containing `@` and hosts containing `:` (IPv6 literals
//! included) cannot be expressed and are rejected.

use secrecy::SecretString;

use crate::errors::DeployError;
use crate::hosts::target::{Credential, HostTarget, DEFAULT_SSH_PORT};

/// One rule of the host spec grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSpecForm {
    /// `user:pass@host:port`
    PasswordWithPort,
    /// `user:pass@host`
    Password,
    /// `user@host:port`
    KeyWithPort,
    /// `user@host`
    Key,
}

impl HostSpecForm {
    /// Rules in the order they are tried
    pub const ORDER: [HostSpecForm; 4] = [
        HostSpecForm::PasswordWithPort,
        HostSpecForm::Password,
        HostSpecForm::KeyWithPort,
        HostSpecForm::Key,
    ];

    /// Match a single token against this rule
    pub fn try_match(self, token: &str) -> Option<HostTarget> {
        let (credentials, address) = token.split_once('@')?;
        let (user, password) = match credentials.split_once(':') {
            Some((user, password)) => (user, Some(password)),
            None => (credentials, None),
        };
        let (host, port) = match address.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (address, None),
        };

        let wants_password = matches!(
            self,
            HostSpecForm::PasswordWithPort | HostSpecForm::Password
        );
        let wants_port = matches!(
            self,
            HostSpecForm::PasswordWithPort | HostSpecForm::KeyWithPort
        );
        if wants_password != password.is_some() || wants_port != port.is_some() {
            return None;
        }

        if !is_valid_user(user) || !is_valid_host(host) {
            return None;
        }

        let credential = match password {
            Some(password) if is_valid_password(password) => {
                Credential::Password(SecretString::from(password.to_string()))
            }
            Some(_) => return None,
            None => Credential::KeyBased,
        };

        let port = match port {
            Some(port) => parse_port(port)?,
            None => DEFAULT_SSH_PORT,
        };

        Some(HostTarget {
            user: user.to_string(),
            host: host.to_string(),
            port,
            credential,
        })
    }
}

/// Parse one host spec token, trying each grammar rule in order
pub fn parse_host_spec(token: &str) -> Result<HostTarget, DeployError> {
    HostSpecForm::ORDER
        .iter()
        .find_map(|form| form.try_match(token))
        .ok_or_else(|| DeployError::InvalidHostSpec("invalid host spec".to_string()))
}

/// Split a host list on ASCII spaces. No quoting is supported.
pub fn split_host_list(list: &str) -> Vec<String> {
    list.split(' ')
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Shared by user and host: a leading `-` would reach ssh as an option
fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && !name.contains([':', '@'])
        && !name.chars().any(char::is_whitespace)
}

fn is_valid_user(user: &str) -> bool {
    is_valid_name(user)
}

fn is_valid_password(password: &str) -> bool {
    !password.is_empty() && !password.contains('@')
}

fn is_valid_host(host: &str) -> bool {
    is_valid_name(host)
}

fn parse_port(port: &str) -> Option<u16> {
    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    port.parse::<u16>().ok().filter(|p| *p > 0)
}
