//! Local filesystem helpers

pub mod file;

pub use file::{is_readable_dir, File};
