//! The optional `--debug-step-diffs` instrumentation (`spec.md` §4.6 step 7,
//! §9): after each step, the scratch directory's state is committed to a
//! side git repository whose work-tree *is* the scratch directory, so a
//! human can `git log -p` through the render afterward. `git` is invoked as
//! a subprocess, behind this trait, exactly as `spec.md` §9 calls for.

use std::path::Path;
use std::process::Command;
use std::sync::Mutex;

use crate::errors::{Error, Result};

#[cfg(test)]
#[path = "debuggit_tests.rs"]
mod tests;

pub trait DebugGitCommitter: Send + Sync {
    /// Initializes a git repository whose work-tree is `work_tree`.
    fn init(&self, work_tree: &Path) -> Result<()>;

    /// Stages everything under `work_tree` and commits it with `message`,
    /// allowing an empty commit (a step that touched nothing still gets a
    /// commit, so the commit sequence lines up 1:1 with the step sequence).
    fn commit_all(&self, work_tree: &Path, message: &str) -> Result<()>;
}

/// Shells out to the real `git` binary.
pub struct CommandGitCommitter;

impl DebugGitCommitter for CommandGitCommitter {
    fn init(&self, work_tree: &Path) -> Result<()> {
        run_git(work_tree, &["init", "--quiet"])?;
        run_git(work_tree, &["config", "user.name", "abc templates"])?;
        run_git(work_tree, &["config", "user.email", "abc-templates@localhost"])?;
        Ok(())
    }

    fn commit_all(&self, work_tree: &Path, message: &str) -> Result<()> {
        run_git(work_tree, &["add", "-A"])?;
        run_git(
            work_tree,
            &["commit", "--allow-empty", "--quiet", "-m", message],
        )?;
        Ok(())
    }
}

fn run_git(work_tree: &Path, args: &[&str]) -> Result<()> {
    let output = Command::new("git")
        .arg("-C")
        .arg(work_tree)
        .args(args)
        .output()
        .map_err(|e| Error::SubprocessFailed {
            command: format!("git {}", args.join(" ")),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(Error::SubprocessFailed {
            command: format!("git {}", args.join(" ")),
            message: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}

/// Records calls instead of invoking `git`, for tests that want to assert
/// the driver ran one commit per executed step without a git binary or a
/// real side repository on disk.
#[derive(Default)]
pub struct RecordingGitCommitter {
    pub calls: Mutex<Vec<String>>,
}

impl DebugGitCommitter for RecordingGitCommitter {
    fn init(&self, _work_tree: &Path) -> Result<()> {
        self.calls.lock().unwrap().push("init".to_string());
        Ok(())
    }

    fn commit_all(&self, _work_tree: &Path, message: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("commit: {message}"));
        Ok(())
    }
}
