//! The `Downloader` trait boundary: template *acquisition* is an external
//! collaborator (`spec.md` §1) — cloning a remote git repo, resolving
//! `@latest`, unpacking a tarball. This crate only defines the interface the
//! driver consumes plus one dependency-free implementation,
//! [`LocalDirDownloader`], that treats an existing local directory as the
//! template: enough to render something without pulling in a git client.

use std::path::Path;

use crate::errors::{Error, Result};
use crate::fs::Fs;

#[cfg(test)]
#[path = "downloader_tests.rs"]
mod tests;

/// Git metadata reported by a downloader that materialized the template
/// from a git source. All fields are empty when the source is not git.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitVars {
    pub tag: String,
    pub sha: String,
    pub short_sha: String,
}

/// What a [`Downloader`] reports about the template it just materialized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadMetadata {
    /// A source string sufficient to re-fetch the same template later
    /// (e.g. `github.com/org/repo/subdir`). Empty when the source has no
    /// stable canonical form (an arbitrary local directory).
    pub canonical_source: String,
    /// `"remote_git"`, `"local_git"`, or `"local_dir"`.
    pub location_type: String,
    pub version: String,
    pub git_vars: GitVars,
    pub is_canonical: bool,
}

/// Materializes a template into a local directory. Called once per render.
pub trait Downloader: Send + Sync {
    fn download(&self, cwd: &Path, out_dir: &Path, dest_dir: &Path) -> Result<DownloadMetadata>;
}

/// Treats `source` as an already-local template directory and copies its
/// contents into `out_dir`. `location_type` is `"local_dir"`, the version
/// is empty, `git_vars` is empty, and `is_canonical` is false — a plain
/// directory has no stable re-fetchable identity.
pub struct LocalDirDownloader {
    source: std::path::PathBuf,
}

impl LocalDirDownloader {
    pub fn new(source: impl Into<std::path::PathBuf>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

impl Downloader for LocalDirDownloader {
    fn download(&self, _cwd: &Path, out_dir: &Path, _dest_dir: &Path) -> Result<DownloadMetadata> {
        copy_dir_contents(&crate::fs::OsFs, &self.source, out_dir)?;
        Ok(DownloadMetadata {
            canonical_source: String::new(),
            location_type: "local_dir".to_string(),
            version: String::new(),
            git_vars: GitVars::default(),
            is_canonical: false,
        })
    }
}

/// Recursively copies every file under `src` to `dst`, creating parent
/// directories as needed. Used only at template-acquisition time, before
/// any scope or scratch state exists — a simpler pass than [`crate::copy`],
/// which exists to enforce overwrite/backup/hash policy the downloader has
/// no need for.
fn copy_dir_contents(fs: &dyn Fs, src: &Path, dst: &Path) -> Result<()> {
    for entry in fs.walk_dir(src).map_err(Error::Io)? {
        if entry.is_dir || entry.is_symlink {
            continue;
        }
        let rel = entry.path.strip_prefix(src).unwrap_or(&entry.path);
        let dst_path = dst.join(rel);
        if let Some(parent) = dst_path.parent() {
            fs.mkdir_all(parent).map_err(Error::Io)?;
        }
        let contents = fs.read_file(&entry.path).map_err(Error::Io)?;
        fs.write_file(&dst_path, &contents, crate::fs::WriteMode::Truncate)
            .map_err(Error::Io)?;
        fs.copy_mode(&entry.path, &dst_path).map_err(Error::Io)?;
    }
    Ok(())
}
