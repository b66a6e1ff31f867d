//! Filesystem abstraction.
//!
//! Every filesystem touch in the render pipeline goes through the [`Fs`]
//! trait rather than `std::fs` directly. Production code uses [`OsFs`];
//! tests compose [`InjectingFs`] over a real (tempdir-rooted) filesystem to
//! exercise error paths that are otherwise hard to trigger (a read failing
//! partway through a copy, a `mkdir_all` failing under a write).
//!
//! Paths accepted and returned by this trait use OS-native separators.
//! Callers that need forward-slash-normalized paths (hashes, manifest
//! entries) normalize at the call site, not here.

use std::fs::OpenOptions;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

#[cfg(test)]
#[path = "fs_tests.rs"]
mod tests;

/// Metadata about a directory entry, as returned by [`Fs::stat`].
#[derive(Debug, Clone)]
pub struct Metadata {
    pub is_dir: bool,
    pub is_file: bool,
    pub is_symlink: bool,
    pub len: u64,
    #[cfg(unix)]
    pub mode: u32,
}

/// How a file should be opened for writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Create the file, failing if it already exists.
    CreateNew,
    /// Create the file if needed, truncating any existing content.
    Truncate,
}

/// A single entry discovered by [`Fs::walk_dir`].
#[derive(Debug, Clone)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub is_dir: bool,
    pub is_symlink: bool,
}

/// Uniform filesystem interface consumed by the copy engine, the action
/// executors, and the manifest writer.
pub trait Fs: Send + Sync {
    fn stat(&self, path: &Path) -> io::Result<Metadata>;
    fn mkdir_all(&self, path: &Path) -> io::Result<()>;
    fn mkdtemp(&self, base: &Path, name_part: &str) -> io::Result<PathBuf>;
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn write_file(&self, path: &Path, contents: &[u8], mode: WriteMode) -> io::Result<()>;
    fn remove_all(&self, path: &Path) -> io::Result<()>;
    fn walk_dir(&self, root: &Path) -> io::Result<Vec<WalkEntry>>;

    /// Copies the Unix mode bits of `src` onto `dst`. A no-op on platforms
    /// without POSIX permission bits.
    fn copy_mode(&self, src: &Path, dst: &Path) -> io::Result<()>;
}

/// The real, OS-backed [`Fs`] implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFs;

impl Fs for OsFs {
    fn stat(&self, path: &Path) -> io::Result<Metadata> {
        let meta = std::fs::symlink_metadata(path)?;
        #[cfg(unix)]
        let mode = {
            use std::os::unix::fs::PermissionsExt;
            meta.permissions().mode()
        };
        Ok(Metadata {
            is_dir: meta.is_dir(),
            is_file: meta.is_file(),
            is_symlink: meta.is_symlink(),
            len: meta.len(),
            #[cfg(unix)]
            mode,
        })
    }

    fn mkdir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn mkdtemp(&self, base: &Path, name_part: &str) -> io::Result<PathBuf> {
        self.mkdir_all(base)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{name_part}-"))
            .tempdir_in(base)?;
        // Persist: the caller owns cleanup via the temp-dir tracker.
        Ok(dir.into_path())
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        let mut f = std::fs::File::open(path)?;
        let mut buf = Vec::new();
        f.read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn write_file(&self, path: &Path, contents: &[u8], mode: WriteMode) -> io::Result<()> {
        let mut options = OpenOptions::new();
        options.write(true);
        match mode {
            WriteMode::CreateNew => {
                options.create_new(true);
            }
            WriteMode::Truncate => {
                options.create(true).truncate(true);
            }
        }
        let mut f = options.open(path)?;
        f.write_all(contents)
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        let meta = match std::fs::symlink_metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        if meta.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        }
    }

    fn walk_dir(&self, root: &Path) -> io::Result<Vec<WalkEntry>> {
        let mut out = Vec::new();
        for entry in walkdir::WalkDir::new(root)
            .follow_links(false)
            .min_depth(1)
        {
            let entry = entry.map_err(io::Error::other)?;
            let file_type = entry.file_type();
            out.push(WalkEntry {
                path: entry.path().to_path_buf(),
                is_dir: file_type.is_dir(),
                is_symlink: file_type.is_symlink(),
            });
        }
        Ok(out)
    }

    fn copy_mode(&self, src: &Path, dst: &Path) -> io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::metadata(src)?.permissions();
            let mode = perms.mode();
            std::fs::set_permissions(dst, std::fs::Permissions::from_mode(mode))?;
        }
        #[cfg(not(unix))]
        {
            let _ = (src, dst);
        }
        Ok(())
    }
}

/// Which [`Fs`] call an [`InjectingFs`] should fail, and with what error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    Stat,
    ReadFile,
    WriteFile,
    RemoveAll,
}

/// Wraps another [`Fs`] and, for paths matching a configured predicate,
/// fails the call with an injected error. Used to exercise error-handling
/// paths (e.g. "dry-run surfaces a read failure before any write occurs")
/// that are difficult to provoke with a real filesystem alone.
pub struct InjectingFs<F: Fs> {
    inner: F,
    failures: Vec<(InjectedFailure, PathBuf)>,
}

impl<F: Fs> InjectingFs<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            failures: Vec::new(),
        }
    }

    /// Registers a failure: the next (and every subsequent) call of `kind`
    /// against exactly `path` returns a permission-denied error.
    pub fn fail_on(&mut self, kind: InjectedFailure, path: impl Into<PathBuf>) {
        self.failures.push((kind, path.into()));
    }

    fn should_fail(&self, kind: InjectedFailure, path: &Path) -> bool {
        self.failures
            .iter()
            .any(|(k, p)| *k == kind && p == path)
    }

    fn injected_error() -> io::Error {
        io::Error::new(io::ErrorKind::PermissionDenied, "injected failure")
    }
}

impl<F: Fs> Fs for InjectingFs<F> {
    fn stat(&self, path: &Path) -> io::Result<Metadata> {
        if self.should_fail(InjectedFailure::Stat, path) {
            return Err(Self::injected_error());
        }
        self.inner.stat(path)
    }

    fn mkdir_all(&self, path: &Path) -> io::Result<()> {
        self.inner.mkdir_all(path)
    }

    fn mkdtemp(&self, base: &Path, name_part: &str) -> io::Result<PathBuf> {
        self.inner.mkdtemp(base, name_part)
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        if self.should_fail(InjectedFailure::ReadFile, path) {
            return Err(Self::injected_error());
        }
        self.inner.read_file(path)
    }

    fn write_file(&self, path: &Path, contents: &[u8], mode: WriteMode) -> io::Result<()> {
        if self.should_fail(InjectedFailure::WriteFile, path) {
            return Err(Self::injected_error());
        }
        self.inner.write_file(path, contents, mode)
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        if self.should_fail(InjectedFailure::RemoveAll, path) {
            return Err(Self::injected_error());
        }
        self.inner.remove_all(path)
    }

    fn walk_dir(&self, root: &Path) -> io::Result<Vec<WalkEntry>> {
        self.inner.walk_dir(root)
    }

    fn copy_mode(&self, src: &Path, dst: &Path) -> io::Result<()> {
        self.inner.copy_mode(src, dst)
    }
}
