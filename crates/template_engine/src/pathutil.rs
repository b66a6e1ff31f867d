//! Path safety, template expansion of path strings, glob expansion, and
//! ignore-pattern matching.

use std::path::{Path, PathBuf};

use crate::errors::{Error, Result};
use crate::scope::Scope;
use crate::template_string::{self, TemplateFeatures};

#[cfg(test)]
#[path = "pathutil_tests.rs"]
mod tests;

/// Default ignore patterns applied when a spec declares none.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[".DS_Store", ".bin", ".ssh"];

/// Rejects any path containing a `..` component, strips a single leading
/// separator, and returns a clean, relative, forward-slash-free-of-`..`
/// path string. Backslashes are only rejected by [`reject_glob_backslash`];
/// this function accepts them as literal path characters.
pub fn safe_rel_path(p: &str) -> Result<String> {
    let trimmed = p.strip_prefix('/').unwrap_or(p);
    let trimmed = trimmed.strip_prefix('\\').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Err(Error::PathEscape(p.to_string()));
    }
    for component in trimmed.split(['/', '\\']) {
        if component == ".." {
            return Err(Error::PathEscape(p.to_string()));
        }
    }
    Ok(trimmed.to_string())
}

/// Rejects backslashes in a glob pattern, independent of host OS (per
/// `spec.md`'s design note (c)).
pub fn reject_glob_backslash(pattern: &str) -> Result<()> {
    if pattern.contains('\\') {
        return Err(Error::PathEscape(format!(
            "glob pattern `{pattern}` contains a backslash"
        )));
    }
    Ok(())
}

/// Runs string-template expansion over each path, then `safe_rel_path`.
/// Never mutates `paths`; returns the resolved list in input order.
pub fn process_paths(paths: &[String], scope: &Scope) -> Result<Vec<String>> {
    let mut out = Vec::with_capacity(paths.len());
    for p in paths {
        let expanded = template_string::render(p, scope, TemplateFeatures::default())?;
        out.push(safe_rel_path(&expanded)?);
    }
    Ok(out)
}

/// Expands each already-resolved path as a glob relative to `root`.
///
/// When `skip_globs` is true (pre-`api_version` templates that predate
/// glob support), each path is treated literally and must exist as a file
/// or directory. Otherwise each path is expanded with the `glob` crate;
/// patterns with zero matches are an error unless `allow_no_match` is set
/// (used by `include`'s `skip:` list, which may legitimately match
/// nothing). Results preserve input order and are de-duplicated.
pub fn process_globs(
    paths: &[String],
    root: &Path,
    skip_globs: bool,
    allow_no_match: bool,
) -> Result<Vec<String>> {
    let mut out = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for pattern in paths {
        reject_glob_backslash(pattern)?;

        if skip_globs {
            let full = root.join(pattern);
            if !full.exists() {
                return Err(Error::GlobNoMatch(pattern.clone()));
            }
            if seen.insert(pattern.clone()) {
                out.push(pattern.clone());
            }
            continue;
        }

        let full_pattern = root.join(pattern);
        let full_pattern_str = full_pattern.to_string_lossy().to_string();
        let options = glob::MatchOptions {
            case_sensitive: true,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };

        let mut matched_any = false;
        for entry in glob::glob_with(&full_pattern_str, options)
            .map_err(|e| Error::SpecParse(format!("invalid glob pattern `{pattern}`: {e}")))?
        {
            let path = entry.map_err(|e| Error::Io(e.into_error()))?;
            matched_any = true;
            let rel = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            if seen.insert(rel.clone()) {
                out.push(rel);
            }
        }

        if !matched_any && !allow_no_match {
            return Err(Error::GlobNoMatch(pattern.clone()));
        }
    }

    Ok(out)
}

/// Matches `path` (forward-slash, relative to some root) against an
/// ignore pattern:
/// - a bare filename (no `/`) matches against the path's last component,
/// - a pattern beginning with `/` matches against the full relative path
///   with the leading slash stripped,
/// - anything else matches against the full relative path.
pub fn match_ignore(patterns: &[String], path: &str) -> bool {
    let normalized = path.replace('\\', "/");
    let last_component = normalized.rsplit('/').next().unwrap_or(&normalized);

    for pattern in patterns {
        if let Some(stripped) = pattern.strip_prefix('/') {
            if normalized == stripped {
                return true;
            }
        } else if !pattern.contains('/') {
            if last_component == pattern {
                return true;
            }
        } else if normalized == *pattern {
            return true;
        }
    }
    false
}

/// Returns the effective ignore pattern list: the spec's own patterns, or
/// [`DEFAULT_IGNORE_PATTERNS`] if none were declared.
pub fn effective_ignore_patterns(declared: &[String]) -> Vec<String> {
    if declared.is_empty() {
        DEFAULT_IGNORE_PATTERNS.iter().map(|s| s.to_string()).collect()
    } else {
        declared.to_vec()
    }
}

/// Joins a relative directory and a relative file path without
/// reintroducing a path-escape: both sides are assumed already validated
/// by [`safe_rel_path`].
pub fn join_rel(base: &str, rel: &str) -> String {
    if base.is_empty() {
        rel.to_string()
    } else {
        format!("{base}/{rel}")
    }
}

pub fn to_path_buf(rel: &str) -> PathBuf {
    PathBuf::from(rel)
}
