//! Filesystem sink for rendered artifacts

use super::emitter::RenderedArtifact;
use crate::error::GenerationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::NamedTempFile;
use tracing::debug;

/// What to do when an artifact's target file already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Leave existing files alone and report them as skipped
    #[default]
    FailOnExists,
    ForceOverwrite,
    /// Compute paths and content without touching the disk
    DryRun,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConflictPolicy::FailOnExists => "fail-on-exists",
            ConflictPolicy::ForceOverwrite => "force-overwrite",
            ConflictPolicy::DryRun => "dry-run",
        })
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "fail-on-exists" | "skip" => Ok(ConflictPolicy::FailOnExists),
            "force-overwrite" | "force" | "overwrite" => Ok(ConflictPolicy::ForceOverwrite),
            "dry-run" | "preview" => Ok(ConflictPolicy::DryRun),
            other => Err(format!(
                "Unknown conflict policy '{}'. Expected: fail-on-exists, force-overwrite, dry-run",
                other
            )),
        }
    }
}

/// Successful outcome of one write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written(PathBuf),
    Skipped(PathBuf),
    Planned(PathBuf),
}

impl WriteOutcome {
    pub fn path(&self) -> &Path {
        match self {
            WriteOutcome::Written(p) | WriteOutcome::Skipped(p) | WriteOutcome::Planned(p) => p,
        }
    }
}

/// Stage `contents` in a temporary file beside `path`, creating parent
/// directories if needed.
///
/// Nothing appears at `path` until the staged file is persisted, so a failed
/// write never leaves a truncated artifact behind.
fn stage<C: AsRef<[u8]>>(path: &Path, contents: C) -> io::Result<NamedTempFile> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut staged = NamedTempFile::new_in(parent)?;
    staged.write_all(contents.as_ref())?;
    staged.as_file().sync_all()?;
    Ok(staged)
}

/// Write content to a file, replacing it if present
pub fn write_file<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> io::Result<()> {
    let path = path.as_ref();
    stage(path, contents)?.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Write content to a file only if it does not exist yet.
///
/// Returns `Ok(false)` when the file already exists.
pub fn write_new_file<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> io::Result<bool> {
    let path = path.as_ref();
    if path.exists() {
        return Ok(false);
    }
    match stage(path, contents)?.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error),
    }
}

/// Write one artifact under `output_root` according to `policy`.
///
/// Failures are returned, never panicked on; the caller records them and
/// moves on to the next artifact.
pub fn write_artifact(
    artifact: &RenderedArtifact,
    output_root: &Path,
    policy: ConflictPolicy,
) -> Result<WriteOutcome, GenerationError> {
    let path = output_root.join(&artifact.relative_path);
    let to_error = |e: io::Error| GenerationError::FileWrite {
        path: path.clone(),
        message: e.to_string(),
    };

    match policy {
        ConflictPolicy::DryRun => Ok(WriteOutcome::Planned(path.clone())),
        ConflictPolicy::ForceOverwrite => {
            write_file(&path, &artifact.content).map_err(to_error)?;
            debug!("Wrote {}", path.display());
            Ok(WriteOutcome::Written(path.clone()))
        }
        ConflictPolicy::FailOnExists => {
            if write_new_file(&path, &artifact.content).map_err(to_error)? {
                debug!("Wrote {}", path.display());
                Ok(WriteOutcome::Written(path.clone()))
            } else {
                debug!("Skipped existing {}", path.display());
                Ok(WriteOutcome::Skipped(path.clone()))
            }
        }
    }
}
