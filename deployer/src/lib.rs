//! reldeploy library
//!
//! Release-based deployment of a packaged project to remote hosts over ssh,
//! with an atomic symlink cutover per host.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod hosts;
pub mod logs;
pub mod packaging;
pub mod remote;
pub mod settings;
pub mod utils;
