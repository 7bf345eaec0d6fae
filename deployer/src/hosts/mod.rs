//! Host targets and the host-spec grammar

pub mod parser;
pub mod target;

pub use parser::{parse_host_spec, split_host_list, HostSpecForm};
pub use target::{Credential, HostTarget, DEFAULT_SSH_PORT};
