use super::*;

#[test]
fn test_render_error_displays_inner_message() {
    let inner = template_engine::Error::MissingInput("name".to_string());
    let err: Error = inner.into();
    assert!(err.to_string().contains("render failed"));
}
