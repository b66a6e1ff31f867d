use super::*;
use crate::fs::OsFs;
use crate::spec::{StringReplaceParams, StringReplacement};
use std::collections::HashMap;
use std::fs;

fn params<'a>(
    scratch: &'a std::path::Path,
    included_from_dest: &'a mut HashMap<String, std::path::PathBuf>,
    stdout: &'a mut Vec<u8>,
    fs_impl: &'a OsFs,
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
        flag_dest: String::new(),
        flag_source: String::new(),
    }
}

#[test]
fn test_simple_replacement_matches_scenario_1() {
    let scratch = tempfile::tempdir().unwrap();
    fs::write(scratch.path().join("file1.txt"), "my favorite color is blue").unwrap();

    let fs_impl = OsFs;
    let mut included = HashMap::new();
    let mut out = Vec::new();
    let mut p = params(scratch.path(), &mut included, &mut out, &fs_impl);

    let action = StringReplaceParams {
        paths: vec!["file1.txt".to_string()],
        replacements: vec![StringReplacement {
            to_replace: "blue".to_string(),
            with: "red".to_string(),
        }],
    };
    execute(&mut p, &action).unwrap();

    assert_eq!(
        fs::read_to_string(scratch.path().join("file1.txt")).unwrap(),
        "my favorite color is red"
    );
}

#[test]
fn test_replacements_apply_in_list_order() {
    let scratch = tempfile::tempdir().unwrap();
    fs::write(scratch.path().join("a.txt"), "aaa").unwrap();

    let fs_impl = OsFs;
    let mut included = HashMap::new();
    let mut out = Vec::new();
    let mut p = params(scratch.path(), &mut included, &mut out, &fs_impl);

    let action = StringReplaceParams {
        paths: vec!["a.txt".to_string()],
        replacements: vec![
            StringReplacement {
                to_replace: "a".to_string(),
                with: "b".to_string(),
            },
            StringReplacement {
                to_replace: "b".to_string(),
                with: "c".to_string(),
            },
        ],
    };
    execute(&mut p, &action).unwrap();

    assert_eq!(fs::read_to_string(scratch.path().join("a.txt")).unwrap(), "ccc");
}

#[test]
fn test_no_match_leaves_file_unwritten() {
    let scratch = tempfile::tempdir().unwrap();
    fs::write(scratch.path().join("a.txt"), "hello").unwrap();

    let fs_impl = OsFs;
    let mut included = HashMap::new();
    let mut out = Vec::new();
    let mut p = params(scratch.path(), &mut included, &mut out, &fs_impl);

    let action = StringReplaceParams {
        paths: vec!["a.txt".to_string()],
        replacements: vec![StringReplacement {
            to_replace: "nope".to_string(),
            with: "x".to_string(),
        }],
    };
    execute(&mut p, &action).unwrap();

    assert_eq!(fs::read_to_string(scratch.path().join("a.txt")).unwrap(), "hello");
}
