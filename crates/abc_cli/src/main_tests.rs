use super::*;

#[test]
fn test_parse_key_val_splits_on_first_equals() {
    assert_eq!(
        parse_key_val("name=value").unwrap(),
        ("name".to_string(), "value".to_string())
    );
    assert_eq!(
        parse_key_val("url=https://example.com/a=b").unwrap(),
        ("url".to_string(), "https://example.com/a=b".to_string())
    );
}

#[test]
fn test_parse_key_val_rejects_missing_equals() {
    assert!(parse_key_val("noequals").is_err());
}

#[test]
fn test_load_input_files_merges_and_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.yaml");
    let b = dir.path().join("b.yaml");
    std::fs::write(&a, "name: alice\ncolor: blue\n").unwrap();
    std::fs::write(&b, "color: red\n").unwrap();

    let merged = load_input_files(&[a, b]).unwrap();
    assert_eq!(merged.get("name").map(String::as_str), Some("alice"));
    assert_eq!(merged.get("color").map(String::as_str), Some("red"));
}
