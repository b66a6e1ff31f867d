//! The `include` action: copies files matched by one or more glob entries
//! from `template_dir` or `destination_dir` into `scratch_dir`, optionally
//! renaming/nesting them under an `as` entry and skipping matches against a
//! per-entry `skip` list or the ambient ignore patterns.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::errors::{Error, Result};
use crate::fs::WriteMode;
use crate::pathutil;
use crate::spec::{FromSource, IncludeEntry};

use super::StepParams;

#[cfg(test)]
#[path = "include_tests.rs"]
mod tests;

/// Root-level names silently skipped when including from the template
/// directory itself (never in subdirectories, and never for destination
/// includes).
const TEMPLATE_ROOT_EXCLUSIONS: &[&str] = &["spec.yaml", "testdata/golden"];

pub fn execute(params: &mut StepParams, entries: &[IncludeEntry]) -> Result<()> {
    for entry in entries {
        execute_one(params, entry)?;
    }
    Ok(())
}

fn execute_one(params: &mut StepParams, entry: &IncludeEntry) -> Result<()> {
    let from_dir: &Path = match entry.from {
        FromSource::Template => params.template_dir,
        FromSource::Destination => params
            .destination_dir
            .ok_or_else(|| Error::SpecParse("include from: destination with no destination directory set".to_string()))?,
    };
    let from_template_root = matches!(entry.from, FromSource::Template);

    let resolved_paths = pathutil::process_paths(&entry.paths, &params.scope)?;
    if !entry.as_.is_empty() && entry.as_.len() != resolved_paths.len() {
        return Err(Error::SpecParse(format!(
            "include `as` has {} entries but `paths` has {}",
            entry.as_.len(),
            resolved_paths.len()
        )));
    }
    let resolved_skip = pathutil::process_paths(&entry.skip, &params.scope)?;
    let skip_patterns = pathutil::process_globs(
        &resolved_skip,
        from_dir,
        params.features.skip_globs,
        true,
    )?;
    let ignore_patterns = params.ignore_patterns;

    for (idx, pattern) in resolved_paths.iter().enumerate() {
        let matches = pathutil::process_globs(
            std::slice::from_ref(pattern),
            from_dir,
            params.features.skip_globs,
            false,
        )?;
        let is_glob_expansion = matches.len() > 1 || matches.iter().any(|m| m != pattern);
        let as_entry = entry.as_.get(idx);

        for rel_src in &matches {
            let src_path = from_dir.join(rel_src);
            let meta = params.fs.stat(&src_path).map_err(Error::Io)?;

            let rel_dst_root = match as_entry {
                None => rel_src.clone(),
                Some(as_name) if is_glob_expansion => pathutil::join_rel(as_name, rel_src),
                Some(as_name) => as_name.clone(),
            };

            if meta.is_dir {
                copy_dir(
                    params,
                    from_dir,
                    rel_src,
                    &rel_dst_root,
                    &skip_patterns,
                    ignore_patterns,
                    from_template_root,
                    entry.from,
                )?;
            } else {
                copy_file(
                    params,
                    from_dir,
                    rel_src,
                    &rel_dst_root,
                    &skip_patterns,
                    ignore_patterns,
                    from_template_root,
                    entry.from,
                )?;
            }
        }
    }

    Ok(())
}

/// Whether `rel_path` (relative to the include's `from_dir`) should be
/// silently dropped: either it is a root-level template exclusion, or it
/// matches a `skip`/ignore pattern.
fn is_excluded(
    rel_path: &str,
    skip_patterns: &[String],
    ignore_patterns: &[String],
    from_template_root: bool,
) -> bool {
    if from_template_root
        && TEMPLATE_ROOT_EXCLUSIONS
            .iter()
            .any(|excluded| rel_path == *excluded || rel_path.starts_with(&format!("{excluded}/")))
    {
        return true;
    }
    pathutil::match_ignore(skip_patterns, rel_path) || pathutil::match_ignore(ignore_patterns, rel_path)
}

#[allow(clippy::too_many_arguments)]
fn copy_file(
    params: &mut StepParams,
    from_dir: &Path,
    rel_src: &str,
    rel_dst: &str,
    skip_patterns: &[String],
    ignore_patterns: &[String],
    from_template_root: bool,
    from: FromSource,
) -> Result<()> {
    if is_excluded(rel_src, skip_patterns, ignore_patterns, from_template_root) {
        return Ok(());
    }

    let src_path = from_dir.join(rel_src);
    let dst_path = params.scratch_dir.join(rel_dst);
    let contents = params.fs.read_file(&src_path).map_err(Error::Io)?;
    if let Some(parent) = dst_path.parent() {
        params.fs.mkdir_all(parent).map_err(Error::Io)?;
    }
    params
        .fs
        .write_file(&dst_path, &contents, WriteMode::Truncate)
        .map_err(Error::Io)?;
    params.fs.copy_mode(&src_path, &dst_path).map_err(Error::Io)?;

    if from == FromSource::Destination {
        params
            .included_from_dest
            .insert(rel_dst.to_string(), from_dir.to_path_buf());
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn copy_dir(
    params: &mut StepParams,
    from_dir: &Path,
    rel_src_dir: &str,
    rel_dst_dir: &str,
    skip_patterns: &[String],
    ignore_patterns: &[String],
    from_template_root: bool,
    from: FromSource,
) -> Result<()> {
    if is_excluded(rel_src_dir, skip_patterns, ignore_patterns, from_template_root) {
        return Ok(());
    }

    let full_src_dir = from_dir.join(rel_src_dir);
    let mut rel_files: Vec<PathBuf> = params
        .fs
        .walk_dir(&full_src_dir)
        .map_err(Error::Io)?
        .into_iter()
        .filter(|e| !e.is_dir && !e.is_symlink)
        .map(|e| e.path.strip_prefix(&full_src_dir).unwrap_or(&e.path).to_path_buf())
        .collect();
    rel_files.sort();

    let mut seen_dirs: HashSet<PathBuf> = HashSet::new();
    'files: for sub in rel_files {
        let sub_str = sub.to_string_lossy().replace('\\', "/");
        let full_sub_src = pathutil::join_rel(rel_src_dir, &sub_str);

        // Directory-level short-circuit: if any ancestor directory under
        // rel_src_dir is excluded, skip this file without a per-ancestor
        // `is_excluded` repeat call per file when the same ancestor was
        // already found excluded.
        let mut ancestor = PathBuf::new();
        for component in sub.parent().into_iter().flat_map(|p| p.components()) {
            ancestor.push(component);
            if seen_dirs.contains(&ancestor) {
                continue 'files;
            }
            let ancestor_rel = pathutil::join_rel(rel_src_dir, &ancestor.to_string_lossy().replace('\\', "/"));
            if is_excluded(&ancestor_rel, skip_patterns, ignore_patterns, from_template_root) {
                seen_dirs.insert(ancestor.clone());
                continue 'files;
            }
        }

        if is_excluded(&full_sub_src, skip_patterns, ignore_patterns, from_template_root) {
            continue;
        }

        let rel_dst_file = pathutil::join_rel(rel_dst_dir, &sub_str);
        copy_file(
            params,
            from_dir,
            &full_sub_src,
            &rel_dst_file,
            skip_patterns,
            ignore_patterns,
            from_template_root,
            from,
        )?;
    }

    Ok(())
}
