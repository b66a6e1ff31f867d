use super::*;

const SAMPLE: &str = r#"
api_version: v1beta2
kind: Template
desc: "a sample template"
inputs:
  - name: project_name
    desc: "name of the project"
    default: "widget"
rules:
  - rule: 'project_name != ""'
    message: "project_name must not be empty"
ignore:
  - ".DS_Store"
steps:
  - desc: "bring in the skeleton"
    action: include
    params:
      paths:
        - paths: ["**/*"]
  - desc: "greet"
    action: print
    params:
      message: "hello {{.project_name}}"
  - desc: "loop"
    action: for_each
    params:
      iterator:
        key: env
        values_from: 'environments.split(",")'
      steps:
        - desc: "inner print"
          action: print
          params:
            message: "{{.env}}"
"#;

#[test]
fn test_parse_derives_features_from_api_version() {
    let spec = Spec::parse(SAMPLE).unwrap();
    assert_eq!(spec.api_version, "v1beta2");
    assert!(!spec.features.skip_globs);
    assert!(!spec.features.skip_git_vars);
    assert!(!spec.features.skip_time);
}

#[test]
fn test_parse_builds_input_and_rule_lists() {
    let spec = Spec::parse(SAMPLE).unwrap();
    assert_eq!(spec.inputs.len(), 1);
    assert_eq!(spec.inputs[0].name, "project_name");
    assert_eq!(spec.inputs[0].default.as_deref(), Some("widget"));
    assert_eq!(spec.rules.len(), 1);
}

#[test]
fn test_parse_dispatches_action_variants() {
    let spec = Spec::parse(SAMPLE).unwrap();
    assert_eq!(spec.steps.len(), 3);
    assert!(matches!(spec.steps[0].action, Action::Include(_)));
    assert!(matches!(spec.steps[1].action, Action::Print(_)));
    assert!(matches!(spec.steps[2].action, Action::ForEach(_)));
}

#[test]
fn test_parse_assigns_positions_in_document_order_including_nested_steps() {
    let spec = Spec::parse(SAMPLE).unwrap();
    assert!(spec.steps[0].position.line < spec.steps[1].position.line);
    assert!(spec.steps[1].position.line < spec.steps[2].position.line);

    let Action::ForEach(params) = &spec.steps[2].action else {
        panic!("expected for_each");
    };
    assert_eq!(params.steps.len(), 1);
    assert!(params.steps[0].position.line > spec.steps[2].position.line);
}

#[test]
fn test_parse_rejects_reserved_input_name() {
    let src = r#"
api_version: v1beta2
inputs:
  - name: _now_ms
    desc: "shadowing a built-in"
steps: []
"#;
    let err = Spec::parse(src).unwrap_err();
    assert!(matches!(err, Error::SpecParse(_)));
}

#[test]
fn test_parse_rejects_unknown_api_version() {
    let src = "api_version: v999\nsteps: []\n";
    let err = Spec::parse(src).unwrap_err();
    assert!(matches!(err, Error::SpecParse(_)));
}

#[test]
fn test_older_api_version_skips_globs_and_git_vars_and_time() {
    let src = "api_version: v1alpha1\nsteps: []\n";
    let spec = Spec::parse(src).unwrap();
    assert!(spec.features.skip_globs);
    assert!(spec.features.skip_git_vars);
    assert!(spec.features.skip_time);
}

#[test]
fn test_for_each_iterator_validate_requires_exactly_one_source() {
    let both = ForEachIterator {
        key: "x".to_string(),
        values: Some(vec!["a".to_string()]),
        values_from: Some("expr".to_string()),
    };
    assert!(both.validate().is_err());

    let neither = ForEachIterator {
        key: "x".to_string(),
        values: None,
        values_from: None,
    };
    assert!(neither.validate().is_err());

    let values_only = ForEachIterator {
        key: "x".to_string(),
        values: Some(vec!["a".to_string()]),
        values_from: None,
    };
    assert!(values_only.validate().is_ok());
}

#[test]
fn test_include_entry_defaults_from_template_and_empty_as_skip() {
    let src = r#"
api_version: v1beta2
steps:
  - action: include
    params:
      paths:
        - paths: ["a.txt"]
"#;
    let spec = Spec::parse(src).unwrap();
    let Action::Include(params) = &spec.steps[0].action else {
        panic!("expected include");
    };
    assert_eq!(params.paths[0].from, FromSource::Template);
    assert!(params.paths[0].as_.is_empty());
    assert!(params.paths[0].skip.is_empty());
}
