use super::*;
use serde_json::json;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn stdio_transport_round_trips_a_message_via_cat() {
    // `cat` with no args echoes each stdin line back on stdout, which is
    // enough to exercise send/receive framing without a real MCP server.
    let mut transport = StdioTransport::spawn("cat", &[], &HashMap::new()).unwrap();
    let message = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"});

    transport.send(&message).await.unwrap();
    let reply = transport.receive().await.unwrap();

    assert_eq!(reply, message);
    assert!(transport.is_connected());
}

#[tokio::test]
async fn stdio_transport_close_marks_disconnected() {
    let mut transport = StdioTransport::spawn("cat", &[], &HashMap::new()).unwrap();
    transport.close().await.unwrap();
    assert!(!transport.is_connected());
}

#[tokio::test]
async fn stdio_transport_receive_errors_on_malformed_line() {
    // `echo` writes one non-JSON line then exits, closing stdout.
    let mut transport = StdioTransport::spawn("sh", &["-c".into(), "echo not-json".into()], &HashMap::new()).unwrap();
    let err = transport.receive().await.unwrap_err();
    assert!(matches!(err, FederationError::Protocol(_)));
}

#[tokio::test]
async fn http_transport_send_then_receive_returns_posted_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": {}})))
        .mount(&server)
        .await;

    let mut transport = HttpTransport::new(server.uri());
    let message = json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"});
    transport.send(&message).await.unwrap();
    let reply = transport.receive().await.unwrap();

    assert_eq!(reply["result"], json!({}));
    assert!(transport.is_connected());
}

#[tokio::test]
async fn http_transport_receive_without_send_is_a_protocol_error() {
    let mut transport = HttpTransport::new("http://127.0.0.1:0".to_string());
    let err = transport.receive().await.unwrap_err();
    assert!(matches!(err, FederationError::Protocol(_)));
}

#[tokio::test]
async fn http_transport_non_success_status_disconnects() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(500)).mount(&server).await;

    let mut transport = HttpTransport::new(server.uri());
    let err = transport.send(&json!({"jsonrpc": "2.0"})).await.unwrap_err();
    assert!(matches!(err, FederationError::Upstream { status: 500, .. }));
    assert!(!transport.is_connected());
}
