use super::*;
use crate::fs::OsFs;
use crate::spec::AppendParams;
use std::collections::HashMap;
use std::fs;

fn base_params<'a>(
    scratch: &'a std::path::Path,
    template: &'a std::path::Path,
    included_from_dest: &'a mut HashMap<String, std::path::PathBuf>,
    stdout: &'a mut Vec<u8>,
    fs_impl: &'a OsFs,
) -> StepParams<'a> {
    StepParams {
        fs: fs_impl,
        scope: crate::scope::Scope::empty(),
        scratch_dir: scratch,
        template_dir: template,
        destination_dir: None,
        ignore_patterns: &[],
        features: crate::spec::Features::default(),
        included_from_dest,
        suppress_print: false,
        stdout,
        flag_dest: String::new(),
        flag_source: String::new(),
    }
}

#[test]
fn test_append_adds_newline_by_default() {
    let scratch = tempfile::tempdir().unwrap();
    fs::write(scratch.path().join("a.txt"), "hello").unwrap();

    let fs_impl = OsFs;
    let mut included = HashMap::new();
    let mut out = Vec::new();
    let mut params = base_params(scratch.path(), scratch.path(), &mut included, &mut out, &fs_impl);

    let action = AppendParams {
        paths: vec!["a.txt".to_string()],
        with: "world".to_string(),
        skip_ensure_newline: false,
    };
    execute(&mut params, &action).unwrap();

    assert_eq!(fs::read_to_string(scratch.path().join("a.txt")).unwrap(), "helloworld\n");
}

#[test]
fn test_append_skip_ensure_newline() {
    let scratch = tempfile::tempdir().unwrap();
    fs::write(scratch.path().join("a.txt"), "hello").unwrap();

    let fs_impl = OsFs;
    let mut included = HashMap::new();
    let mut out = Vec::new();
    let mut params = base_params(scratch.path(), scratch.path(), &mut included, &mut out, &fs_impl);

    let action = AppendParams {
        paths: vec!["a.txt".to_string()],
        with: "world".to_string(),
        skip_ensure_newline: true,
    };
    execute(&mut params, &action).unwrap();

    assert_eq!(fs::read_to_string(scratch.path().join("a.txt")).unwrap(), "helloworld");
}

#[test]
fn test_append_on_empty_file_is_valid() {
    let scratch = tempfile::tempdir().unwrap();
    fs::write(scratch.path().join("empty.txt"), "").unwrap();

    let fs_impl = OsFs;
    let mut included = HashMap::new();
    let mut out = Vec::new();
    let mut params = base_params(scratch.path(), scratch.path(), &mut included, &mut out, &fs_impl);

    let action = AppendParams {
        paths: vec!["empty.txt".to_string()],
        with: "content".to_string(),
        skip_ensure_newline: false,
    };
    execute(&mut params, &action).unwrap();

    assert_eq!(fs::read_to_string(scratch.path().join("empty.txt")).unwrap(), "content\n");
}

#[test]
fn test_append_expands_template_in_with() {
    let scratch = tempfile::tempdir().unwrap();
    fs::write(scratch.path().join("a.txt"), "x").unwrap();

    let fs_impl = OsFs;
    let mut included = HashMap::new();
    let mut out = Vec::new();
    let mut map = HashMap::new();
    map.insert("name".to_string(), "widget".to_string());
    let mut params = base_params(scratch.path(), scratch.path(), &mut included, &mut out, &fs_impl);
    params.scope = crate::scope::Scope::new(map);

    let action = AppendParams {
        paths: vec!["a.txt".to_string()],
        with: "{{.name}}".to_string(),
        skip_ensure_newline: false,
    };
    execute(&mut params, &action).unwrap();

    assert_eq!(fs::read_to_string(scratch.path().join("a.txt")).unwrap(), "xwidget\n");
}
