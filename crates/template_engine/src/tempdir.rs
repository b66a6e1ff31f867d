//! Tracks temporary directories created during a render and removes them on
//! every exit path unless the caller asked to keep them.
//!
//! A render creates up to three temp directories (template, scratch,
//! optional backup) plus an optional debug git directory. All of them are
//! acquired through a single [`TempDirTracker`] so cleanup is centralized
//! instead of scattered across the driver.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::fs::Fs;

#[cfg(test)]
#[path = "tempdir_tests.rs"]
mod tests;

/// Owns a set of temp directories created during one render and removes
/// them when dropped, unless `keep` was requested.
pub struct TempDirTracker {
    fs: Arc<dyn Fs>,
    dirs: Vec<PathBuf>,
    keep: bool,
}

impl TempDirTracker {
    pub fn new(fs: Arc<dyn Fs>, keep: bool) -> Self {
        Self {
            fs,
            dirs: Vec::new(),
            keep,
        }
    }

    /// Creates a new temp directory under `base` named `<name_part>-XXXX`
    /// and tracks it for later removal.
    pub fn mkdtemp(&mut self, base: &Path, name_part: &str) -> std::io::Result<PathBuf> {
        let dir = self.fs.mkdtemp(base, name_part)?;
        self.dirs.push(dir.clone());
        Ok(dir)
    }

    /// Removes every tracked directory now, regardless of the `keep` flag.
    /// Used when a render succeeds and the caller explicitly wants cleanup
    /// even though `keep_temp_dirs` was set for debugging a failure that
    /// didn't happen.
    pub fn cleanup_now(&mut self) {
        for dir in self.dirs.drain(..) {
            let _ = self.fs.remove_all(&dir);
        }
    }

    pub fn tracked_dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

impl Drop for TempDirTracker {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        for dir in &self.dirs {
            let _ = self.fs.remove_all(dir);
        }
    }
}
