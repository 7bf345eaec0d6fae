//! Artifact packaging

pub mod archive;
pub mod rules;

pub use archive::{create_archive, Artifact};
pub use rules::ArchiveRules;
