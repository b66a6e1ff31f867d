use super::*;
use std::collections::HashMap;

fn scope_with(pairs: &[(&str, &str)]) -> Scope {
    let mut map = HashMap::new();
    for (k, v) in pairs {
        map.insert(k.to_string(), v.to_string());
    }
    Scope::new(map)
}

#[test]
fn test_string_equality() {
    let scope = scope_with(&[("env", "production")]);
    assert!(eval_bool(r#"env == "production""#, &scope).unwrap());
    assert!(!eval_bool(r#"env == "dev""#, &scope).unwrap());
}

#[test]
fn test_string_containment_via_in() {
    let scope = scope_with(&[("name", "my-awesome-repo")]);
    assert!(eval_bool(r#""awesome" in name"#, &scope).unwrap());
    assert!(!eval_bool(r#""nope" in name"#, &scope).unwrap());
}

#[test]
fn test_integer_comparison() {
    let scope = scope_with(&[("count", "5")]);
    assert!(eval_bool("count > 3", &scope).unwrap());
    assert!(!eval_bool("count > 10", &scope).unwrap());
    assert!(eval_bool("count >= 5 && count <= 5", &scope).unwrap());
}

#[test]
fn test_boolean_operators() {
    let scope = scope_with(&[("a", "1"), ("b", "2")]);
    assert!(eval_bool("(a == \"1\") && (b == \"2\")", &scope).unwrap());
    assert!(eval_bool("(a == \"9\") || (b == \"2\")", &scope).unwrap());
    assert!(eval_bool("!(a == \"9\")", &scope).unwrap());
}

#[test]
fn test_bool_coercion() {
    let scope = Scope::empty();
    assert!(eval_bool(r#"bool("true")"#, &scope).unwrap());
    assert!(!eval_bool(r#"bool("")"#, &scope).unwrap());
}

#[test]
fn test_list_literal_and_in() {
    let scope = Scope::empty();
    assert!(eval_bool(r#""a" in ["a", "b", "c"]"#, &scope).unwrap());
    assert!(!eval_bool(r#""z" in ["a", "b", "c"]"#, &scope).unwrap());
}

#[test]
fn test_split_returns_list() {
    let scope = scope_with(&[("environments", "production,dev")]);
    let list = eval_list(r#"environments.split(",")"#, &scope).unwrap();
    assert_eq!(list, vec!["production".to_string(), "dev".to_string()]);
}

#[test]
fn test_undefined_variable_is_unknown_var() {
    let scope = Scope::empty();
    let err = eval_bool("missing == \"x\"", &scope).unwrap_err();
    assert!(matches!(err, Error::UnknownVar(name) if name == "missing"));
}

#[test]
fn test_non_bool_result_for_if_is_spec_parse_error() {
    let scope = scope_with(&[("x", "hello")]);
    let err = eval_bool("x", &scope).unwrap_err();
    assert!(matches!(err, Error::SpecParse(_)));
}
