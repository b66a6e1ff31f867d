use super::*;
use crate::fs::OsFs;
use crate::spec::PrintParams;
use std::collections::HashMap;

fn params<'a>(
    included_from_dest: &'a mut HashMap<String, std::path::PathBuf>,
    stdout: &'a mut Vec<u8>,
    fs_impl: &'a OsFs,
    scratch: &'a std::path::Path,
) -> StepParams<'a> {
    StepParams {
        fs: fs_impl,
        scope: crate::scope::Scope::empty(),
        scratch_dir: scratch,
        template_dir: scratch,
        destination_dir: None,
        ignore_patterns: &[],
        features: crate::spec::Features::default(),
        included_from_dest,
        suppress_print: false,
        stdout,
        flag_dest: "/dest".to_string(),
        flag_source: "github.com/org/repo".to_string(),
    }
}

#[test]
fn test_print_appends_newline_and_expands_scope() {
    let scratch = tempfile::tempdir().unwrap();
    let fs_impl = OsFs;
    let mut included = HashMap::new();
    let mut out = Vec::new();

    let mut vars = HashMap::new();
    vars.insert("env".to_string(), "production".to_string());
    let mut p = params(&mut included, &mut out, &fs_impl, scratch.path());
    p.scope = crate::scope::Scope::new(vars);

    execute(&mut p, &PrintParams { message: "{{.env}}".to_string() }).unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), "production\n");
}

#[test]
fn test_print_exposes_flag_dest_and_flag_source() {
    let scratch = tempfile::tempdir().unwrap();
    let fs_impl = OsFs;
    let mut included = HashMap::new();
    let mut out = Vec::new();
    let mut p = params(&mut included, &mut out, &fs_impl, scratch.path());

    execute(
        &mut p,
        &PrintParams {
            message: "{{._flag_dest}} from {{._flag_source}}".to_string(),
        },
    )
    .unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), "/dest from github.com/org/repo\n");
}

#[test]
fn test_print_suppressed_writes_nothing() {
    let scratch = tempfile::tempdir().unwrap();
    let fs_impl = OsFs;
    let mut included = HashMap::new();
    let mut out = Vec::new();
    let mut p = params(&mut included, &mut out, &fs_impl, scratch.path());
    p.suppress_print = true;

    execute(&mut p, &PrintParams { message: "hello".to_string() }).unwrap();

    assert!(out.is_empty());
}

#[test]
fn test_print_does_not_double_newline() {
    let scratch = tempfile::tempdir().unwrap();
    let fs_impl = OsFs;
    let mut included = HashMap::new();
    let mut out = Vec::new();
    let mut p = params(&mut included, &mut out, &fs_impl, scratch.path());

    execute(&mut p, &PrintParams { message: "hello\n".to_string() }).unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), "hello\n");
}
