//! Reverse-patch generation (`spec.md` §4.8, §9): for a file `include`d
//! `from: destination` and then modified in place, the manifest stores a
//! unified diff that, applied to the post-render file, recovers the
//! pre-render contents — so a later upgrade can undo this render's
//! in-place edit before applying the next one. `diff` is invoked as a
//! subprocess, behind this trait.

use std::io::Write as _;
use std::process::Command;

use crate::errors::{Error, Result};

#[cfg(test)]
#[path = "patch_tests.rs"]
mod tests;

pub trait ReversePatchGenerator: Send + Sync {
    /// Returns a unified diff that turns `after` into `before` when
    /// applied, labeling both sides with `rel_path`.
    fn reverse_patch(&self, before: &[u8], after: &[u8], rel_path: &str) -> Result<String>;
}

/// Shells out to the real `diff` binary.
pub struct CommandDiffPatchGenerator;

impl ReversePatchGenerator for CommandDiffPatchGenerator {
    fn reverse_patch(&self, before: &[u8], after: &[u8], rel_path: &str) -> Result<String> {
        let after_file = write_temp(after)?;
        let before_file = write_temp(before)?;

        // `diff -u after before`: a patch that, applied to `after`,
        // produces `before` — the reverse of the render's own edit.
        let output = Command::new("diff")
            .arg("-u")
            .arg("--label")
            .arg(rel_path)
            .arg("--label")
            .arg(rel_path)
            .arg(after_file.path())
            .arg(before_file.path())
            .output()
            .map_err(|e| Error::SubprocessFailed {
                command: "diff -u".to_string(),
                message: e.to_string(),
            })?;

        // `diff` exits 0 (identical), 1 (differences found), or 2 (error).
        match output.status.code() {
            Some(0) | Some(1) => Ok(String::from_utf8_lossy(&output.stdout).into_owned()),
            _ => Err(Error::SubprocessFailed {
                command: "diff -u".to_string(),
                message: String::from_utf8_lossy(&output.stderr).into_owned(),
            }),
        }
    }
}

fn write_temp(contents: &[u8]) -> Result<tempfile::NamedTempFile> {
    let mut f = tempfile::NamedTempFile::new().map_err(Error::Io)?;
    f.write_all(contents).map_err(Error::Io)?;
    f.flush().map_err(Error::Io)?;
    Ok(f)
}

/// Returns a fixed placeholder instead of invoking `diff`, for tests that
/// only need to assert a patch *was* recorded for a given path, not its
/// exact unified-diff bytes.
pub struct RecordingPatchGenerator;

impl ReversePatchGenerator for RecordingPatchGenerator {
    fn reverse_patch(&self, before: &[u8], after: &[u8], rel_path: &str) -> Result<String> {
        Ok(format!(
            "--- {rel_path}\n+++ {rel_path}\n(recorded: {} -> {} bytes)\n",
            after.len(),
            before.len()
        ))
    }
}
