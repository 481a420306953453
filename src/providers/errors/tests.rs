use super::*;

#[test]
fn parse_api_error_extracts_type_and_message() {
    let body = r#"{"error": {"type": "invalid_request", "message": "bad request"}}"#;
    let err = ProviderErrorHandler::parse_api_error(400, body);
    match err {
        FederationError::Upstream { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("invalid_request"));
            assert!(body.contains("bad request"));
        }
        other => panic!("expected Upstream, got {other:?}"),
    }
    assert!(!err_retryable(400, body));
}

fn err_retryable(status: u16, body: &str) -> bool {
    ProviderErrorHandler::parse_api_error(status, body).is_retryable()
}

#[test]
fn parse_api_error_5xx_is_retryable() {
    let body = r#"{"error": {"type": "server_error", "message": "internal"}}"#;
    assert!(err_retryable(500, body));
    assert!(err_retryable(502, body));
    assert!(err_retryable(503, body));
}

#[test]
fn parse_api_error_400_is_not_retryable() {
    let body = r#"{"error": {"type": "bad_request", "message": "invalid"}}"#;
    assert!(!err_retryable(400, body));
}

#[test]
fn parse_api_error_non_json_body_falls_back_to_raw_text() {
    let err = ProviderErrorHandler::parse_api_error(500, "plain text error");
    match err {
        FederationError::Upstream { status, body } => {
            assert_eq!(status, 500);
            assert!(body.contains("plain text error"));
        }
        other => panic!("expected Upstream, got {other:?}"),
    }
}

#[test]
fn log_and_handle_error_does_not_alter_the_error() {
    let err = FederationError::Upstream { status: 500, body: "down".into() };
    ProviderErrorHandler::log_and_handle_error(&err, "test-provider", "send_json");
    assert!(matches!(err, FederationError::Upstream { status: 500, .. }));
}
