//! Error types produced by the render pipeline.
//!
//! Every error kind in this module corresponds to one row of the error table
//! in the design notes: each is a distinguishable variant so callers (and
//! tests) can match on *kind*, not on message text.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// A location within a parsed spec document, used to annotate action
/// errors with "at line N column M:" exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {} column {}", self.line, self.column)
    }
}

/// All error conditions the render pipeline can produce.
#[derive(Error, Debug)]
pub enum Error {
    /// A relative path contained a `..` component, or otherwise escaped the
    /// root it was resolved against.
    #[error("path escapes its root: {0}")]
    PathEscape(String),

    /// A glob pattern expanded to zero files and the caller required at
    /// least one match.
    #[error("glob pattern matched no files: {0}")]
    GlobNoMatch(String),

    /// A declared input has no value from any source (flag, input file,
    /// manifest, default, or prompt).
    #[error("missing required input: {0}")]
    MissingInput(String),

    /// An input key was supplied that the spec does not declare.
    #[error("unknown input: {0}")]
    UnknownInput(String),

    /// A template or expression referenced a variable that is not in
    /// scope. Kept as its own kind (rather than folded into a generic
    /// "render failed") so callers can discriminate it in tests and
    /// diagnostics.
    #[error("unknown variable: {0}")]
    UnknownVar(String),

    /// A validation rule (input-level or global) evaluated to `false`.
    #[error("validation rule failed: {0}")]
    RuleFailed(String),

    /// The destination held a directory where a file was expected, or vice
    /// versa.
    #[error("file/directory conflict at {path}")]
    FileConflict { path: String },

    /// The destination already contained a file and overwriting it was not
    /// permitted.
    #[error("refusing to overwrite existing file: {0}")]
    Overwrite(String),

    /// An action attempted to write to the reserved `.abc` destination
    /// path.
    #[error("{0} is a reserved destination path")]
    ReservedName(String),

    /// The spec document was malformed, or used a field unsupported by its
    /// declared `api_version`.
    #[error("spec parse error: {0}")]
    SpecParse(String),

    /// An optional `git` or `diff` subprocess invocation failed.
    #[error("subprocess {command} failed: {message}")]
    SubprocessFailed { command: String, message: String },

    /// Filesystem operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Wraps another error with the source position of the step that
    /// produced it. The driver applies this exactly once per action
    /// dispatch; it must never be nested by inner call sites.
    #[error("at {position}: {source}")]
    AtPosition {
        position: SourcePosition,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wraps `self` with a source position, unless it is already wrapped
    /// (guards against double annotation if a lower layer already attached
    /// one).
    pub fn with_position(self, position: SourcePosition) -> Error {
        match self {
            Error::AtPosition { .. } => self,
            other => Error::AtPosition {
                position,
                source: Box::new(other),
            },
        }
    }

    pub fn file_conflict(path: impl Into<PathBuf>) -> Error {
        Error::FileConflict {
            path: path.into().display().to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
