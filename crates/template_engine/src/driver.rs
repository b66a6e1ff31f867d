//! The render driver: the top-level `render()` entry point that ties the
//! downloader, spec parser, input resolution, action execution, two-phase
//! commit, and manifest writer together into one render.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, trace, warn};

use crate::actions::{execute_step, StepParams};
use crate::copy::{copy_tree, CopyOptions, VisitDecision};
use crate::debuggit::DebugGitCommitter;
use crate::downloader::{DownloadMetadata, Downloader};
use crate::errors::{Error, Result};
use crate::fs::Fs;
use crate::manifest;
use crate::patch::ReversePatchGenerator;
use crate::pathutil;
use crate::prompter::Prompter;
use crate::scope::Scope;
use crate::spec::{Action, Spec};
use crate::tempdir::TempDirTracker;

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;

/// Names reserved under the destination (`spec.md` §3/§6): a path with any
/// component case-insensitively matching either is rejected at commit
/// time, at any depth.
const RESERVED_ROOT_NAMES: &[&str] = &[".abc", ".abc_internal"];

/// Everything one `render()` call needs: the external collaborators
/// (downloader, prompter, optional debug git committer, patch generator),
/// the filesystem, and every CLI-level flag.
pub struct Params<'a> {
    pub fs: Arc<dyn Fs>,
    pub downloader: &'a dyn Downloader,
    pub prompter: &'a dyn Prompter,
    pub git_committer: Option<&'a dyn DebugGitCommitter>,
    pub patch_generator: &'a dyn ReversePatchGenerator,
    pub stdout: &'a mut dyn Write,

    pub cwd: PathBuf,
    /// The user-provided source string (e.g. a git URL, or a local path),
    /// exposed to templates as `_flag_source`. Handed to the downloader
    /// verbatim.
    pub source: String,
    pub destination_dir: PathBuf,
    /// The spec file's name within the downloaded template directory.
    /// `None` uses the default, `spec.yaml`.
    pub spec_filename: Option<String>,

    /// Input values supplied directly (highest precedence).
    pub inputs: HashMap<String, String>,
    /// Input values merged from `--input-files` documents.
    pub input_file_values: HashMap<String, String>,
    /// Input values carried over from a prior manifest (lowest precedence
    /// source, used by upgrades).
    pub manifest_inputs: HashMap<String, String>,
    /// Built-in variable overrides, used by golden tests to pin `_now_ms`
    /// (and git vars) to fixed values instead of the real clock/downloader.
    pub override_builtin_vars: HashMap<String, String>,

    pub accept_defaults: bool,
    pub prompt: bool,
    pub skip_input_validation: bool,
    pub ignore_unknown_inputs: bool,
    pub force_overwrite: bool,
    pub backups_enabled: bool,
    pub keep_temp_dirs: bool,
    pub write_manifest: bool,
    pub debug_step_diffs: bool,
    pub backfill_manifest_only: bool,
    pub continue_without_patches: bool,

    /// Overrides the render's notion of "now", in Unix milliseconds.
    /// `None` uses the real clock.
    pub now_ms_override: Option<i64>,
}

/// What a completed render reports back to its caller.
#[derive(Debug, Clone, Default)]
pub struct RenderResult {
    pub included_from_dest: Vec<String>,
    pub manifest_path: Option<PathBuf>,
    pub download_metadata: DownloadMetadata,
    /// The scratch and backup directories, when `keep_temp_dirs` was set
    /// (otherwise both are removed before `render` returns and this is
    /// `None`). Backs the CLI's `--debug-scratch-contents` flag.
    pub scratch_dir: Option<PathBuf>,
    pub backup_dir: Option<PathBuf>,
}

/// Runs one full render: download, parse, resolve inputs, execute steps,
/// commit, write manifest, clean up. Implements `spec.md` §4.6 end to end.
pub fn render(params: &mut Params) -> Result<RenderResult> {
    let mut tracker = TempDirTracker::new(Arc::clone(&params.fs), params.keep_temp_dirs);
    let system_temp = std::env::temp_dir();

    // Step 1: acquire the template.
    let template_dir = tracker
        .mkdtemp(&system_temp, "abc-template")
        .map_err(Error::Io)?;
    debug!(dir = %template_dir.display(), "downloading template");
    let download_metadata =
        params
            .downloader
            .download(&params.cwd, &template_dir, &params.destination_dir)?;

    // Step 2: parse the spec and derive feature flags.
    let spec_filename = params.spec_filename.as_deref().unwrap_or("spec.yaml");
    let spec_path = template_dir.join(spec_filename);
    let spec_src = String::from_utf8(params.fs.read_file(&spec_path).map_err(Error::Io)?)
        .map_err(|e| Error::SpecParse(format!("spec.yaml is not valid UTF-8: {e}")))?;
    let spec = Spec::parse(&spec_src)?;

    // Built-ins, honoring any test-only overrides.
    let now_ms = params
        .now_ms_override
        .unwrap_or_else(|| current_unix_ms());
    let builtins = build_builtin_vars(&spec, now_ms, &download_metadata, &params.override_builtin_vars)?;

    // Step 3: resolve declared inputs.
    let resolved_inputs = resolve_inputs(&spec, params, &builtins)?;

    // Step 4: evaluate global rules against the full scope.
    let mut scope_bindings = builtins.clone();
    scope_bindings.extend(resolved_inputs.clone());
    let base_scope = Scope::new(scope_bindings);
    for rule in &spec.rules {
        let ok = crate::expr::eval_bool(&rule.rule, &base_scope)?;
        if !ok {
            return Err(Error::RuleFailed(rule.message.clone()));
        }
    }

    // Step 5: scratch dir, optional debug git init.
    let scratch_dir = tracker.mkdtemp(&system_temp, "abc-scratch").map_err(Error::Io)?;
    if params.debug_step_diffs {
        let committer = params.git_committer.ok_or_else(|| {
            Error::SpecParse("debug_step_diffs is set but no git committer was provided".to_string())
        })?;
        committer.init(&scratch_dir)?;
    }

    // Step 6: execute steps.
    let mut included_from_dest: HashMap<String, PathBuf> = HashMap::new();
    let flag_dest = params.destination_dir.display().to_string();
    let flag_source = params.source.clone();
    let ignore_patterns = pathutil::effective_ignore_patterns(&spec.ignore);

    {
        let mut step_params = StepParams {
            fs: params.fs.as_ref(),
            scope: base_scope.clone(),
            scratch_dir: &scratch_dir,
            template_dir: &template_dir,
            destination_dir: Some(&params.destination_dir),
            ignore_patterns: &ignore_patterns,
            features: spec.features,
            included_from_dest: &mut included_from_dest,
            suppress_print: params.backfill_manifest_only,
            stdout: &mut *params.stdout,
            flag_dest: flag_dest.clone(),
            flag_source: flag_source.clone(),
        };

        for step in &spec.steps {
            if let Some(if_expr) = &step.if_expr {
                trace!(line = step.position.line, expr = %if_expr, "evaluating step guard");
            }
            execute_step(step, &mut step_params)?;

            if params.debug_step_diffs {
                let committer = params.git_committer.expect("checked above");
                let message = format!(
                    "action {} at line {}",
                    action_kind(&step.action),
                    step.position.line
                );
                committer.commit_all(&scratch_dir, &message)?;
            }
        }
    }

    // Step 8: two-phase commit.
    let backup_dir = tracker.mkdtemp(&system_temp, "abc-backup").map_err(Error::Io)?;
    commit_dry_run(params, &scratch_dir, &backup_dir, &included_from_dest)?;

    let manifest_timestamp_ms = now_ms;
    let manifest_target_path = manifest::manifest_path(
        &params.destination_dir,
        &download_metadata.canonical_source,
        download_metadata.is_canonical,
        &filename_timestamp(manifest_timestamp_ms),
    );
    if params.write_manifest {
        manifest::check_would_not_overwrite(params.fs.as_ref(), &manifest_target_path)?;
    }

    let real_commit_is_dry_run = params.backfill_manifest_only;
    let output_hashes = commit_real(
        params,
        &scratch_dir,
        &backup_dir,
        &included_from_dest,
        real_commit_is_dry_run,
    )?;

    // Manifest.
    let manifest_path = if params.write_manifest {
        let patches = manifest::compute_patches(
            params.fs.as_ref(),
            &included_from_dest,
            &scratch_dir,
            &backup_dir,
            params.patch_generator,
            params.backfill_manifest_only,
            params.continue_without_patches,
        )?;
        if patches.is_empty() && !included_from_dest.is_empty() {
            warn!("manifest patch generation produced no entries for destination-sourced includes");
        }

        let template_dirhash = manifest::dirhash(params.fs.as_ref(), &template_dir)?;
        let timestamp = rfc3339_nano(manifest_timestamp_ms);
        let manifest_doc = manifest::build(
            &download_metadata,
            template_dirhash,
            &resolved_inputs,
            &output_hashes,
            patches,
            timestamp.clone(),
            timestamp,
        );
        manifest::write(params.fs.as_ref(), &manifest_target_path, &manifest_doc)?;
        Some(manifest_target_path)
    } else {
        None
    };

    // Step 9: clean up temp directories (the tracker also does this on
    // drop, but a successful render tidies up immediately).
    if !params.keep_temp_dirs {
        tracker.cleanup_now();
    }

    let mut included: Vec<String> = included_from_dest.keys().cloned().collect();
    included.sort();

    Ok(RenderResult {
        included_from_dest: included,
        manifest_path,
        download_metadata,
        scratch_dir: params.keep_temp_dirs.then(|| scratch_dir.clone()),
        backup_dir: params.keep_temp_dirs.then(|| backup_dir.clone()),
    })
}

/// Runs the commit's dry-run pass: every check that could fail on the real
/// pass runs here first, with no writes.
fn commit_dry_run(
    params: &Params,
    scratch_dir: &Path,
    backup_dir: &Path,
    included_from_dest: &HashMap<String, PathBuf>,
) -> Result<()> {
    let options = CopyOptions {
        dry_run: true,
        backup_dir: Some(backup_dir),
        hash: true,
    };
    copy_tree(
        params.fs.as_ref(),
        scratch_dir,
        &params.destination_dir,
        &options,
        |rel| commit_visitor(rel, included_from_dest, params),
    )?;
    Ok(())
}

/// Runs the commit's real pass (or a second dry-run pass, in
/// `backfill_manifest_only` mode), returning the per-output-file hashes
/// the manifest records.
fn commit_real(
    params: &Params,
    scratch_dir: &Path,
    backup_dir: &Path,
    included_from_dest: &HashMap<String, PathBuf>,
    dry_run: bool,
) -> Result<HashMap<String, [u8; 32]>> {
    let options = CopyOptions {
        dry_run,
        backup_dir: Some(backup_dir),
        hash: true,
    };
    copy_tree(
        params.fs.as_ref(),
        scratch_dir,
        &params.destination_dir,
        &options,
        |rel| commit_visitor(rel, included_from_dest, params),
    )
}

fn commit_visitor(
    rel: &str,
    included_from_dest: &HashMap<String, PathBuf>,
    params: &Params,
) -> Result<VisitDecision> {
    if is_reserved_commit_path(rel) {
        return Err(Error::ReservedName(rel.to_string()));
    }
    let from_dest = included_from_dest.contains_key(rel);
    let allow_preexisting = from_dest || params.force_overwrite || params.backfill_manifest_only;
    // A destination-sourced file is always backed up before being
    // overwritten, regardless of `backups_enabled`: the backup is the only
    // surviving record of its pre-render content, and the manifest's
    // reverse patch is generated from it.
    let backup_if_exists = from_dest || params.backups_enabled;
    Ok(VisitDecision::copy(allow_preexisting, backup_if_exists))
}

fn is_reserved_commit_path(rel: &str) -> bool {
    rel.split('/')
        .any(|component| RESERVED_ROOT_NAMES.iter().any(|reserved| component.eq_ignore_ascii_case(reserved)))
}

/// Resolves every declared input in priority order (flag > input file >
/// manifest > default > prompt), running per-input validation rules unless
/// `skip_input_validation` is set, and rejects unknown flag-supplied keys
/// unless `ignore_unknown_inputs` is set.
fn resolve_inputs(
    spec: &Spec,
    params: &Params,
    builtins: &HashMap<String, String>,
) -> Result<HashMap<String, String>> {
    let mut resolved: HashMap<String, String> = HashMap::new();

    for decl in &spec.inputs {
        let value = params
            .inputs
            .get(&decl.name)
            .or_else(|| params.input_file_values.get(&decl.name))
            .or_else(|| params.manifest_inputs.get(&decl.name))
            .cloned()
            .or_else(|| decl.default.clone());

        let value = match value {
            Some(v) => v,
            None if params.prompt && !params.accept_defaults => {
                let block = format!(
                    "Input name:   {}\nDescription:  {}\nEnter value: ",
                    decl.name, decl.desc
                );
                params.prompter.prompt(&block)?
            }
            None => return Err(Error::MissingInput(decl.name.clone())),
        };

        resolved.insert(decl.name.clone(), value);

        if !params.skip_input_validation {
            let mut scope_bindings = builtins.clone();
            scope_bindings.extend(resolved.clone());
            let scope = Scope::new(scope_bindings);
            for rule in &decl.rules {
                let ok = crate::expr::eval_bool(&rule.rule, &scope)?;
                if !ok {
                    return Err(Error::RuleFailed(rule.message.clone()));
                }
            }
        }
    }

    if !params.ignore_unknown_inputs {
        let declared: HashSet<&str> = spec.inputs.iter().map(|d| d.name.as_str()).collect();
        for key in params.inputs.keys() {
            if !declared.contains(key.as_str()) {
                return Err(Error::UnknownInput(key.clone()));
            }
        }
    }

    Ok(resolved)
}

/// Builds the always-present and feature-gated built-in variables, merging
/// in any `override_builtin_vars` (validated against the feature set
/// first).
fn build_builtin_vars(
    spec: &Spec,
    now_ms: i64,
    download_metadata: &DownloadMetadata,
    overrides: &HashMap<String, String>,
) -> Result<HashMap<String, String>> {
    validate_override_builtin_vars(spec, overrides)?;

    let mut vars = crate::template_string::built_in_variables(now_ms);
    if !spec.features.skip_git_vars {
        vars.insert("_git_sha".to_string(), download_metadata.git_vars.sha.clone());
        vars.insert(
            "_git_short_sha".to_string(),
            download_metadata.git_vars.short_sha.clone(),
        );
        vars.insert("_git_tag".to_string(), download_metadata.git_vars.tag.clone());
    }
    vars.extend(overrides.clone());
    Ok(vars)
}

/// Rejects an override whose name is not a valid built-in given the
/// spec's feature flags (`spec.md` §4.6: "its keys must all be valid
/// built-in names given the feature flags").
fn validate_override_builtin_vars(spec: &Spec, overrides: &HashMap<String, String>) -> Result<()> {
    let mut allowed: HashSet<&str> = HashSet::from(["_now_ms"]);
    if !spec.features.skip_git_vars {
        allowed.extend(["_git_sha", "_git_short_sha", "_git_tag"]);
    }
    for key in overrides.keys() {
        if !allowed.contains(key.as_str()) {
            return Err(Error::SpecParse(format!(
                "override_builtin_vars: `{key}` is not a valid built-in variable for this template's api_version"
            )));
        }
    }
    Ok(())
}

fn action_kind(action: &Action) -> &'static str {
    match action {
        Action::Include(_) => "include",
        Action::Append(_) => "append",
        Action::StringReplace(_) => "string_replace",
        Action::RegexReplace(_) => "regex_replace",
        Action::RegexNameLookup(_) => "regex_name_lookup",
        Action::GoTemplate(_) => "go_template",
        Action::Print(_) => "print",
        Action::ForEach(_) => "for_each",
    }
}

fn current_unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn rfc3339_nano(unix_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(unix_ms)
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true))
        .unwrap_or_default()
}

/// A filesystem-safe variant of the RFC3339 timestamp (no colons) for use
/// inside a manifest filename.
fn filename_timestamp(unix_ms: i64) -> String {
    rfc3339_nano(unix_ms).replace(':', "-")
}
