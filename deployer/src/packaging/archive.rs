//! Gzip tarball creation

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, info};

use crate::errors::DeployError;
use crate::packaging::rules::ArchiveRules;
use crate::utils::sha256_file;

/// A packaged project ready for upload. Read-only once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub size: u64,
    pub sha256: String,
    pub entries: usize,
}

impl Artifact {
    /// File name of the artifact, as uploaded to each host
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Package `source_dir` into the gzip tarball `dest`.
///
/// Runs on the blocking pool. Fails when the source is not a directory or
/// when the rules leave nothing to package.
pub async fn create_archive(
    source_dir: &Path,
    dest: &Path,
    rules: &ArchiveRules,
) -> Result<Artifact, DeployError> {
    let source_dir = source_dir.to_path_buf();
    let dest = dest.to_path_buf();
    let rules = rules.clone();

    let artifact = tokio::task::spawn_blocking(move || build_archive(&source_dir, &dest, &rules))
        .await
        .map_err(|e| DeployError::PackagingError(format!("archive task failed: {}", e)))?
        .map_err(|e| DeployError::PackagingError(format!("{:#}", e)))?;

    info!(
        "Packaged {} entries into {} ({} bytes, sha256 {})",
        artifact.entries,
        artifact.file_name(),
        artifact.size,
        artifact.sha256
    );
    Ok(artifact)
}

fn build_archive(source: &Path, dest: &Path, rules: &ArchiveRules) -> anyhow::Result<Artifact> {
    if !source.is_dir() {
        bail!("{} is not a directory", source.display());
    }

    let file = fs::File::create(dest)
        .with_context(|| format!("creating archive {}", dest.display()))?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    let mut entries = 0;
    append_dir(&mut builder, source, Path::new(""), rules, &mut entries)?;
    if entries == 0 {
        bail!("no files in {} matched the packaging rules", source.display());
    }

    let encoder = builder.into_inner().context("finishing tar stream")?;
    let mut writer = encoder.finish().context("finishing gzip stream")?;
    writer.flush().context("flushing archive")?;
    drop(writer);

    let size = fs::metadata(dest)
        .with_context(|| format!("reading size of {}", dest.display()))?
        .len();
    let sha256 = sha256_file(dest).context("hashing archive")?;

    Ok(Artifact {
        path: dest.to_path_buf(),
        size,
        sha256,
        entries,
    })
}

fn append_dir<W: Write>(
    builder: &mut tar::Builder<W>,
    root: &Path,
    rel: &Path,
    rules: &ArchiveRules,
    entries: &mut usize,
) -> anyhow::Result<()> {
    let dir = root.join(rel);
    let mut children = fs::read_dir(&dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("listing {}", dir.display()))?;
    children.sort_by_key(|entry| entry.file_name());

    for child in children {
        let rel_path = rel.join(child.file_name());
        let full_path = child.path();
        let file_type = child
            .file_type()
            .with_context(|| format!("inspecting {}", full_path.display()))?;

        if file_type.is_dir() {
            if rules.allows(&rel_path) {
                builder
                    .append_dir(&rel_path, &full_path)
                    .with_context(|| format!("adding {}", rel_path.display()))?;
            }
            if rules.should_descend(&rel_path) {
                append_dir(builder, root, &rel_path, rules, entries)?;
            }
        } else if rules.allows(&rel_path) {
            debug!("Adding {}", rel_path.display());
            builder
                .append_path_with_name(&full_path, &rel_path)
                .with_context(|| format!("adding {}", rel_path.display()))?;
            *entries += 1;
        }
    }

    Ok(())
}
