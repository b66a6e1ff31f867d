use std::collections::HashMap;
use std::sync::Arc;

use tempfile::tempdir;

use super::*;
use crate::debuggit::RecordingGitCommitter;
use crate::downloader::LocalDirDownloader;
use crate::fs::OsFs;
use crate::patch::RecordingPatchGenerator;
use crate::prompter::NullPrompter;

fn write(dir: &std::path::Path, rel: &str, contents: &str) {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

fn read(dir: &std::path::Path, rel: &str) -> String {
    std::fs::read_to_string(dir.join(rel)).unwrap()
}

struct Harness {
    template: tempfile::TempDir,
    destination: tempfile::TempDir,
    downloader: LocalDirDownloader,
    prompter: NullPrompter,
    patch_generator: RecordingPatchGenerator,
    stdout: Vec<u8>,
}

impl Harness {
    fn new() -> Self {
        let template = tempdir().unwrap();
        let destination = tempdir().unwrap();
        let downloader = LocalDirDownloader::new(template.path());
        Self {
            template,
            destination,
            downloader,
            prompter: NullPrompter,
            patch_generator: RecordingPatchGenerator,
            stdout: Vec::new(),
        }
    }

    fn params(&mut self) -> Params<'_> {
        Params {
            fs: Arc::new(OsFs),
            downloader: &self.downloader,
            prompter: &self.prompter,
            git_committer: None,
            patch_generator: &self.patch_generator,
            stdout: &mut self.stdout,
            cwd: std::env::temp_dir(),
            source: "local".to_string(),
            destination_dir: self.destination.path().to_path_buf(),
            spec_filename: None,
            inputs: HashMap::new(),
            input_file_values: HashMap::new(),
            manifest_inputs: HashMap::new(),
            override_builtin_vars: HashMap::new(),
            accept_defaults: false,
            prompt: false,
            skip_input_validation: false,
            ignore_unknown_inputs: false,
            force_overwrite: false,
            backups_enabled: true,
            keep_temp_dirs: false,
            write_manifest: true,
            debug_step_diffs: false,
            backfill_manifest_only: false,
            continue_without_patches: false,
            now_ms_override: Some(1_700_000_000_000),
        }
    }
}

#[test]
fn test_scenario_simple_string_replacement() {
    let mut h = Harness::new();
    write(h.template.path(), "file1.txt", "my favorite color is blue");
    write(
        h.template.path(),
        "spec.yaml",
        r#"
api_version: v1beta3
kind: Template
steps:
  - action: include
    params:
      paths:
        - paths: ["file1.txt"]
  - action: string_replace
    params:
      paths: ["file1.txt"]
      replacements:
        - to_replace: "blue"
          with: "red"
"#,
    );

    let mut params = h.params();
    let result = render(&mut params).unwrap();

    assert_eq!(
        read(h.destination.path(), "file1.txt"),
        "my favorite color is red"
    );
    assert!(result.included_from_dest.is_empty());
    assert!(result.manifest_path.unwrap().starts_with(h.destination.path().join(".abc")));
}

#[test]
fn test_scenario_for_each_over_cel_derived_list() {
    let mut h = Harness::new();
    write(h.template.path(), "spec.yaml", r#"
api_version: v1beta3
kind: Template
inputs:
  - name: environments
    desc: comma separated environments
steps:
  - action: for_each
    params:
      iterator:
        key: env
        values_from: 'environments.split(",")'
      steps:
        - action: print
          params:
            message: "{{.env}}"
"#);

    let mut params = h.params();
    params.inputs.insert("environments".to_string(), "production,dev".to_string());
    params.write_manifest = false;

    render(&mut params).unwrap();
    assert_eq!(String::from_utf8(h.stdout).unwrap(), "production\ndev\n");
}

#[test]
fn test_scenario_include_from_destination_and_modify_in_place() {
    let mut h = Harness::new();
    write(h.destination.path(), "myfile.txt", "purple is my favorite color");
    write(h.template.path(), "spec.yaml", r#"
api_version: v1beta3
kind: Template
steps:
  - action: include
    params:
      paths:
        - paths: ["myfile.txt"]
          from: destination
  - action: string_replace
    params:
      paths: ["myfile.txt"]
      replacements:
        - to_replace: "purple"
          with: "red"
"#);

    let mut params = h.params();
    let result = render(&mut params).unwrap();

    assert_eq!(
        read(h.destination.path(), "myfile.txt"),
        "red is my favorite color"
    );
    assert_eq!(result.included_from_dest, vec!["myfile.txt".to_string()]);

    let manifest_contents = std::fs::read_to_string(result.manifest_path.unwrap()).unwrap();
    assert!(manifest_contents.contains("myfile.txt"));
    assert!(manifest_contents.contains("patch"));
}

#[test]
fn test_scenario_reserved_name_rejection() {
    let mut h = Harness::new();
    write(h.template.path(), "file1.txt", "hello");
    write(h.template.path(), "spec.yaml", r#"
api_version: v1beta3
kind: Template
steps:
  - action: include
    params:
      paths:
        - paths: ["file1.txt"]
          as: [".abc_internal"]
"#);

    let mut params = h.params();
    let err = render(&mut params).unwrap_err();
    assert!(matches!(err, Error::ReservedName(_)));
    assert!(!h.destination.path().join(".abc_internal").exists());
}

#[test]
fn test_scenario_overwrite_without_flag_fails_and_leaves_destination_unchanged() {
    let mut h = Harness::new();
    write(h.destination.path(), "file1.txt", "original contents");
    write(h.template.path(), "file1.txt", "new contents");
    write(h.template.path(), "spec.yaml", r#"
api_version: v1beta3
kind: Template
steps:
  - action: include
    params:
      paths:
        - paths: ["file1.txt"]
"#);

    let mut params = h.params();
    let err = render(&mut params).unwrap_err();
    assert!(matches!(err, Error::Overwrite(_)));
    assert_eq!(read(h.destination.path(), "file1.txt"), "original contents");
}

#[test]
fn test_manifest_determinism_up_to_timestamps() {
    let mut h = Harness::new();
    write(h.template.path(), "file1.txt", "hello");
    write(h.template.path(), "spec.yaml", r#"
api_version: v1beta3
kind: Template
steps:
  - action: include
    params:
      paths:
        - paths: ["file1.txt"]
"#);

    let mut params = h.params();
    let result1 = render(&mut params).unwrap();
    let manifest1 = std::fs::read_to_string(result1.manifest_path.unwrap()).unwrap();
    std::fs::remove_dir_all(h.destination.path().join(".abc")).unwrap();
    std::fs::remove_file(h.destination.path().join("file1.txt")).unwrap();

    let mut params2 = h.params();
    let result2 = render(&mut params2).unwrap();
    let manifest2 = std::fs::read_to_string(result2.manifest_path.unwrap()).unwrap();

    assert_eq!(manifest1, manifest2);
}

#[test]
fn test_debug_step_diffs_commits_once_per_step() {
    let mut h = Harness::new();
    write(h.template.path(), "file1.txt", "blue");
    write(h.template.path(), "spec.yaml", r#"
api_version: v1beta3
kind: Template
steps:
  - action: include
    params:
      paths:
        - paths: ["file1.txt"]
  - action: string_replace
    params:
      paths: ["file1.txt"]
      replacements:
        - to_replace: "blue"
          with: "red"
"#);

    let committer = RecordingGitCommitter::default();
    let mut params = h.params();
    params.debug_step_diffs = true;
    params.git_committer = Some(&committer);
    render(&mut params).unwrap();

    let calls = committer.calls.lock().unwrap();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0], "init");
    assert!(calls[1].contains("include"));
    assert!(calls[2].contains("string_replace"));
}

#[test]
fn test_missing_required_input_without_prompt_or_default_errors() {
    let mut h = Harness::new();
    write(h.template.path(), "spec.yaml", r#"
api_version: v1beta3
kind: Template
inputs:
  - name: name
    desc: a name
steps: []
"#);

    let mut params = h.params();
    let err = render(&mut params).unwrap_err();
    assert!(matches!(err, Error::MissingInput(_)));
}

#[test]
fn test_unknown_input_flag_rejected_unless_ignored() {
    let mut h = Harness::new();
    write(h.template.path(), "spec.yaml", r#"
api_version: v1beta3
kind: Template
steps: []
"#);

    let mut params = h.params();
    params.inputs.insert("nonexistent".to_string(), "x".to_string());
    let err = render(&mut params).unwrap_err();
    assert!(matches!(err, Error::UnknownInput(_)));

    let mut params2 = h.params();
    params2.inputs.insert("nonexistent".to_string(), "x".to_string());
    params2.ignore_unknown_inputs = true;
    render(&mut params2).unwrap();
}

#[test]
fn test_input_validation_rule_failure_surfaces_message() {
    let mut h = Harness::new();
    write(h.template.path(), "spec.yaml", r#"
api_version: v1beta3
kind: Template
inputs:
  - name: env
    desc: environment
    rules:
      - rule: 'env == "prod" || env == "dev"'
        message: "env must be prod or dev"
steps: []
"#);

    let mut params = h.params();
    params.inputs.insert("env".to_string(), "staging".to_string());
    let err = render(&mut params).unwrap_err();
    match err {
        Error::RuleFailed(msg) => assert_eq!(msg, "env must be prod or dev"),
        other => panic!("expected RuleFailed, got {other:?}"),
    }
}

#[test]
fn test_template_directory_is_not_mutated() {
    let mut h = Harness::new();
    write(h.template.path(), "file1.txt", "original");
    write(h.template.path(), "spec.yaml", r#"
api_version: v1beta3
kind: Template
steps:
  - action: include
    params:
      paths:
        - paths: ["file1.txt"]
  - action: string_replace
    params:
      paths: ["file1.txt"]
      replacements:
        - to_replace: "original"
          with: "changed"
"#);

    let mut params = h.params();
    render(&mut params).unwrap();

    assert_eq!(read(h.template.path(), "file1.txt"), "original");
}

#[test]
fn test_keep_temp_dirs_exposes_scratch_and_backup_dirs() {
    let mut h = Harness::new();
    write(h.destination.path(), "file1.txt", "old");
    write(h.template.path(), "file1.txt", "new");
    write(h.template.path(), "spec.yaml", r#"
api_version: v1beta3
kind: Template
steps:
  - action: include
    params:
      paths:
        - paths: ["file1.txt"]
          from: destination
"#);

    let mut params = h.params();
    params.keep_temp_dirs = true;
    let result = render(&mut params).unwrap();

    let scratch_dir = result.scratch_dir.unwrap();
    assert_eq!(read(&scratch_dir, "file1.txt"), "old");

    std::fs::remove_dir_all(&scratch_dir).ok();
    std::fs::remove_dir_all(result.backup_dir.unwrap()).ok();
}
