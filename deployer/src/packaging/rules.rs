//! Include and exclude rules for packaging

use std::path::{Path, PathBuf};

/// Which project files go into the artifact.
///
/// Paths are relative to the project root and compared component-wise.
/// Exclude patterns come in three shapes:
///
/// - `*.log` matches file names ending in `.log`
/// - `build/tmp` (contains `/`) matches that path and everything below it
/// - `node_modules` matches any path component with that exact name
///
/// When `includes` is non-empty only paths under one of them are packaged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveRules {
    pub includes: Vec<PathBuf>,
    pub excludes: Vec<String>,
}

impl ArchiveRules {
    pub fn new(includes: Vec<String>, excludes: Vec<String>) -> Self {
        Self {
            includes: includes
                .into_iter()
                .filter(|i| !i.trim().is_empty())
                .map(|i| PathBuf::from(i.trim().trim_start_matches("./")))
                .collect(),
            excludes: excludes
                .into_iter()
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// Whether an entry at `rel` is packaged
    pub fn allows(&self, rel: &Path) -> bool {
        if self.is_excluded(rel) {
            return false;
        }
        self.includes.is_empty() || self.includes.iter().any(|inc| rel.starts_with(inc))
    }

    /// Whether a directory at `rel` may contain packaged entries
    pub fn should_descend(&self, rel: &Path) -> bool {
        if self.is_excluded(rel) {
            return false;
        }
        self.includes.is_empty()
            || self
                .includes
                .iter()
                .any(|inc| rel.starts_with(inc) || inc.starts_with(rel))
    }

    fn is_excluded(&self, rel: &Path) -> bool {
        self.excludes.iter().any(|pattern| {
            if let Some(suffix) = pattern.strip_prefix('*') {
                rel.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.ends_with(suffix))
                    .unwrap_or(false)
            } else if pattern.contains('/') {
                rel.starts_with(pattern.trim_end_matches('/'))
            } else {
                rel.components()
                    .any(|c| c.as_os_str() == pattern.as_str())
            }
        })
    }
}
