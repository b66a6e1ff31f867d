//! Dispatch and shared plumbing for the eight action kinds a step may run.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::Result;
use crate::fs::{Fs, WriteMode};
use crate::pathutil;
use crate::scope::Scope;
use crate::spec::{Action, Features, Step};

mod append;
mod for_each;
mod go_template;
mod include;
mod print;
mod regex_name_lookup;
mod regex_replace;
mod string_replace;

/// Everything an action executor needs to do its job, threaded through the
/// sequential execution of a step list.
///
/// `scope` is owned by value (a [`Scope`] clone is cheap — it is an `Arc`
/// chain) so `for_each` can swap in a child scope for its nested steps and
/// restore the parent afterward without any of the nested bindings leaking.
pub struct StepParams<'a> {
    pub fs: &'a dyn Fs,
    pub scope: Scope,
    pub scratch_dir: &'a Path,
    pub template_dir: &'a Path,
    pub destination_dir: Option<&'a Path>,
    pub ignore_patterns: &'a [String],
    pub features: Features,
    pub included_from_dest: &'a mut HashMap<String, PathBuf>,
    pub suppress_print: bool,
    pub stdout: &'a mut dyn Write,
    /// In scope only for `print` actions, as `_flag_dest`/`_flag_source`.
    pub flag_dest: String,
    pub flag_source: String,
}

/// Executes one step: evaluates its `if:` gate (if present), then dispatches
/// to the matching action executor. Errors are annotated with the step's
/// source position exactly once.
pub fn execute_step(step: &Step, params: &mut StepParams) -> Result<()> {
    if let Some(if_expr) = &step.if_expr {
        let gate = crate::expr::eval_bool(if_expr, &params.scope).map_err(|e| e.with_position(step.position))?;
        if !gate {
            return Ok(());
        }
    }

    let result = match &step.action {
        Action::Include(p) => include::execute(params, &p.paths),
        Action::Append(p) => append::execute(params, p),
        Action::StringReplace(p) => string_replace::execute(params, p),
        Action::RegexReplace(p) => regex_replace::execute(params, p),
        Action::RegexNameLookup(p) => regex_name_lookup::execute(params, p),
        Action::GoTemplate(p) => go_template::execute(params, p),
        Action::Print(p) => print::execute(params, p),
        Action::ForEach(p) => for_each::execute(params, p),
    };
    result.map_err(|e| e.with_position(step.position))
}

/// The walk-and-modify helper shared by `append`, `string_replace`,
/// `regex_replace`, `regex_name_lookup`, and `go_template`: resolves
/// `paths` against the scratch directory, deduplicates the matched file
/// set, and calls `visitor` with each file's current bytes. The file is
/// only rewritten if `visitor` returns different bytes; writing to the same
/// path with [`WriteMode::Truncate`] keeps the file's existing mode bits,
/// so no separate mode-preservation step is needed.
pub fn walk_and_modify<F>(params: &StepParams, paths: &[String], mut visitor: F) -> Result<()>
where
    F: FnMut(&[u8]) -> Result<Vec<u8>>,
{
    let resolved = pathutil::process_paths(paths, &params.scope)?;
    let matched = pathutil::process_globs(
        &resolved,
        params.scratch_dir,
        params.features.skip_globs,
        false,
    )?;

    if matched.is_empty() {
        return Err(crate::errors::Error::GlobNoMatch(
            "walk_and_modify: path list matched no files".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for rel in matched {
        if !seen.insert(rel.clone()) {
            continue;
        }
        let full = params.scratch_dir.join(&rel);
        let original = params.fs.read_file(&full)?;
        let updated = visitor(&original)?;
        if updated != original {
            params.fs.write_file(&full, &updated, WriteMode::Truncate)?;
        }
    }
    Ok(())
}
