//! The recursive copy engine shared by every action that moves bytes into
//! the scratch directory, and by the two-phase commit that moves scratch
//! into the destination.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::errors::{Error, Result};
use crate::fs::{Fs, WriteMode};

#[cfg(test)]
#[path = "copy_tests.rs"]
mod tests;

/// Per-entry policy returned by a copy visitor.
#[derive(Debug, Clone, Copy)]
pub struct VisitDecision {
    pub skip: bool,
    pub overwrite: bool,
    pub backup_if_exists: bool,
}

impl VisitDecision {
    pub fn skip() -> Self {
        Self {
            skip: true,
            overwrite: false,
            backup_if_exists: false,
        }
    }

    pub fn copy(overwrite: bool, backup_if_exists: bool) -> Self {
        Self {
            skip: false,
            overwrite,
            backup_if_exists,
        }
    }
}

/// Options controlling one [`copy_tree`] pass.
pub struct CopyOptions<'a> {
    /// When true, every conflict/overwrite check still runs (and still
    /// errors), but no bytes are written to `dst_root`, the backup
    /// directory, or any parent directory created for them.
    pub dry_run: bool,
    /// Where pre-overwrite backups are written, relative-path-preserved.
    /// `None` disables backups even if a visitor asks for one.
    pub backup_dir: Option<&'a Path>,
    /// Whether to compute a SHA-256 of each file's source bytes.
    pub hash: bool,
}

/// Recursively copies files from `src_root` to `dst_root`.
///
/// For each file under `src_root`, `visitor` is called with the
/// forward-slash relative path and decides whether to skip it, whether an
/// existing destination file may be overwritten, and whether to back it up
/// first. Returns the SHA-256 digest of every file's source bytes, keyed by
/// relative path, when `options.hash` is set (computed regardless of
/// `dry_run`, since hashing only reads).
pub fn copy_tree<V>(
    fs: &dyn Fs,
    src_root: &Path,
    dst_root: &Path,
    options: &CopyOptions,
    mut visitor: V,
) -> Result<HashMap<String, [u8; 32]>>
where
    V: FnMut(&str) -> Result<VisitDecision>,
{
    let mut hashes = HashMap::new();
    let mut rel_paths: Vec<String> = fs
        .walk_dir(src_root)?
        .into_iter()
        .filter(|e| !e.is_dir && !e.is_symlink)
        .map(|e| {
            e.path
                .strip_prefix(src_root)
                .unwrap_or(&e.path)
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    rel_paths.sort();

    for rel in rel_paths {
        let decision = visitor(&rel)?;
        if decision.skip {
            continue;
        }

        let src_path = src_root.join(&rel);
        let dst_path = dst_root.join(&rel);

        let existing = match fs.stat(&dst_path) {
            Ok(meta) if meta.is_dir => return Err(Error::file_conflict(&dst_path)),
            Ok(meta) => Some(meta),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(Error::Io(e)),
        };

        if existing.is_some() && !decision.overwrite {
            return Err(Error::Overwrite(dst_path.display().to_string()));
        }

        let contents = fs.read_file(&src_path)?;

        if options.hash {
            let digest = Sha256::digest(&contents);
            hashes.insert(rel.clone(), digest.into());
        }

        if existing.is_some() && decision.overwrite && decision.backup_if_exists {
            let old_contents = fs.read_file(&dst_path)?;
            if !options.dry_run {
                if let Some(backup_dir) = options.backup_dir {
                    let backup_path = backup_dir.join(&rel);
                    if let Some(parent) = backup_path.parent() {
                        fs.mkdir_all(parent)?;
                    }
                    fs.write_file(&backup_path, &old_contents, WriteMode::Truncate)?;
                }
            }
        }

        if !options.dry_run {
            if let Some(parent) = dst_path.parent() {
                fs.mkdir_all(parent)?;
            }
            fs.write_file(&dst_path, &contents, WriteMode::Truncate)?;
            fs.copy_mode(&src_path, &dst_path)?;
        }
    }

    Ok(hashes)
}
