use super::*;

#[test]
fn test_null_prompter_always_errors() {
    let err = NullPrompter.prompt("name: ").unwrap_err();
    assert!(matches!(err, Error::MissingInput(_)));
}
