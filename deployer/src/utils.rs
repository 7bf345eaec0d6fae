//! Utility functions

use std::io;
use std::path::Path;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Version information for the binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Sortable release version for the given instant (`YYYYMMDDHHMMSS`)
pub fn release_version_at(at: DateTime<Local>) -> String {
    at.format("%Y%m%d%H%M%S").to_string()
}

/// Release version for the current local time
pub fn release_version_now() -> String {
    release_version_at(Local::now())
}

/// Partially mask a host name or IPv4 address for status output.
///
/// IPv4 addresses keep their first two octets; names keep the first character
/// of the leading label and every following label.
pub fn mask_host(host: &str) -> String {
    let octets: Vec<&str> = host.split('.').collect();
    let is_ipv4 = octets.len() == 4
        && octets
            .iter()
            .all(|o| !o.is_empty() && o.len() <= 3 && o.bytes().all(|b| b.is_ascii_digit()));
    if is_ipv4 {
        return format!("{}.{}.*.*", octets[0], octets[1]);
    }

    let (first, rest) = match host.split_once('.') {
        Some((first, rest)) => (first, Some(rest)),
        None => (host, None),
    };
    let lead: String = first.chars().take(1).collect();
    match rest {
        Some(rest) => format!("{}***.{}", lead, rest),
        None => format!("{}***", lead),
    }
}

/// Calculate the SHA256 hash of a file, streaming its contents
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Hex encoding utilities
mod hex {
    const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

    pub fn encode(data: impl AsRef<[u8]>) -> String {
        let data = data.as_ref();
        let mut result = String::with_capacity(data.len() * 2);
        for byte in data {
            result.push(HEX_CHARS[(byte >> 4) as usize] as char);
            result.push(HEX_CHARS[(byte & 0x0f) as usize] as char);
        }
        result
    }
}
