use super::*;
use crate::mcp::model::TransportConfig;
use std::time::Duration;

fn echo_server_config(name: &str) -> MCPServerConfig {
    MCPServerConfig {
        name: name.to_string(),
        transport: TransportConfig::Stdio {
            command: "sh".into(),
            args: vec![
                "-c".into(),
                "read line; echo '{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}'; cat".into(),
            ],
            env: HashMap::new(),
        },
        enabled: true,
    }
}

fn fast_retry() -> RetryConfig {
    RetryConfig { max_retries: 0, initial_delay: Duration::from_millis(1), max_delay: Duration::from_millis(5), multiplier: 2.0 }
}

#[tokio::test]
async fn register_then_duplicate_is_a_configuration_error() {
    let pool = McpPool::new(fast_retry());
    pool.register_server(echo_server_config("fetch")).await.unwrap();
    let err = pool.register_server(echo_server_config("fetch")).await.unwrap_err();
    assert!(matches!(err, FederationError::Configuration(_)));
}

#[tokio::test]
async fn ensure_connected_drives_the_handshake_to_completion() {
    let pool = McpPool::new(fast_retry());
    pool.register_server(echo_server_config("fetch")).await.unwrap();
    let cancel = CancellationToken::new();

    pool.ensure_connected(&cancel, "fetch").await.unwrap();

    assert_eq!(pool.server_status("fetch").await.unwrap(), ConnectionState::Connected);
    assert_eq!(pool.metrics.snapshot().active_connections, 1);
}

#[tokio::test]
async fn unregistered_name_is_a_configuration_error() {
    let pool = McpPool::new(fast_retry());
    let cancel = CancellationToken::new();
    let err = pool.ensure_connected(&cancel, "nope").await.unwrap_err();
    assert!(matches!(err, FederationError::Configuration(_)));
}

#[tokio::test]
async fn failing_server_transitions_to_failed_and_reports_last_error() {
    let pool = McpPool::new(fast_retry());
    pool.register_server(MCPServerConfig {
        name: "broken".into(),
        transport: TransportConfig::Stdio { command: "false".into(), args: vec![], env: HashMap::new() },
        enabled: true,
    })
    .await
    .unwrap();
    let cancel = CancellationToken::new();

    let err = pool.ensure_connected(&cancel, "broken").await.unwrap_err();
    assert!(matches!(err, FederationError::ExhaustedRetries { .. }));
    assert!(matches!(pool.server_status("broken").await.unwrap(), ConnectionState::Failed(_)));
    assert_eq!(pool.metrics.snapshot().failed_connections, 1);
}

#[tokio::test]
async fn call_round_trips_a_message_after_connecting() {
    let pool = McpPool::new(fast_retry());
    pool.register_server(echo_server_config("fetch")).await.unwrap();
    let cancel = CancellationToken::new();

    let reply = pool.call(&cancel, "fetch", json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"})).await.unwrap();

    assert_eq!(reply["id"], 2);
    assert_eq!(pool.metrics.snapshot().total_requests, 1);
    assert_eq!(pool.metrics.snapshot().successful_requests, 1);
}

#[tokio::test]
async fn warm_up_connects_every_registered_server() {
    let pool = McpPool::new(fast_retry());
    pool.register_server(echo_server_config("fetch")).await.unwrap();
    pool.register_server(echo_server_config("git")).await.unwrap();
    let cancel = CancellationToken::new();

    pool.warm_up(&cancel, None).await.unwrap();

    let health = pool.health_check().await;
    assert_eq!(health.get("fetch"), Some(&true));
    assert_eq!(health.get("git"), Some(&true));
}

#[tokio::test]
async fn close_connection_can_be_reconnected_by_a_later_acquisition() {
    let pool = McpPool::new(fast_retry());
    pool.register_server(echo_server_config("fetch")).await.unwrap();
    let cancel = CancellationToken::new();
    pool.ensure_connected(&cancel, "fetch").await.unwrap();

    pool.close_connection("fetch").await.unwrap();
    assert_eq!(pool.server_status("fetch").await.unwrap(), ConnectionState::Closed);

    pool.ensure_connected(&cancel, "fetch").await.unwrap();
    assert_eq!(pool.server_status("fetch").await.unwrap(), ConnectionState::Connected);
}

#[tokio::test]
async fn pool_close_marks_closed_and_rejects_registration_attempts_to_reconnect() {
    let pool = McpPool::new(fast_retry());
    pool.register_server(echo_server_config("fetch")).await.unwrap();
    let cancel = CancellationToken::new();
    pool.ensure_connected(&cancel, "fetch").await.unwrap();

    pool.close().await.unwrap();

    let err = pool.ensure_connected(&cancel, "fetch").await.unwrap_err();
    assert!(matches!(err, FederationError::Configuration(_)));
}

#[tokio::test]
async fn call_cancelled_mid_flight_aborts_and_closes_the_connection() {
    let pool = McpPool::new(fast_retry());
    pool.register_server(MCPServerConfig {
        name: "slow".into(),
        transport: TransportConfig::Stdio {
            command: "sh".into(),
            args: vec!["-c".into(), "read line; sleep 5; echo '{}'".into()],
            env: HashMap::new(),
        },
        enabled: true,
    })
    .await
    .unwrap();
    let cancel = CancellationToken::new();
    pool.ensure_connected(&cancel, "slow").await.unwrap();

    let call_fut = pool.call(&cancel, "slow", json!({"jsonrpc": "2.0", "id": 5, "method": "x"}));
    let canceller_fut = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
    };
    let (result, ()) = tokio::join!(call_fut, canceller_fut);

    assert!(matches!(result.unwrap_err(), FederationError::Cancelled));
    assert_eq!(pool.server_status("slow").await.unwrap(), ConnectionState::Closed);
}

#[tokio::test]
async fn drive_connect_cancelled_mid_handshake_returns_cancelled() {
    let pool = McpPool::new(RetryConfig { max_retries: 2, ..fast_retry() });
    pool.register_server(MCPServerConfig {
        name: "hangs".into(),
        transport: TransportConfig::Stdio { command: "sh".into(), args: vec!["-c".into(), "sleep 5".into()], env: HashMap::new() },
        enabled: true,
    })
    .await
    .unwrap();
    let cancel = CancellationToken::new();

    let connect_fut = pool.ensure_connected(&cancel, "hangs");
    let canceller_fut = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
    };
    let (result, ()) = tokio::join!(connect_fut, canceller_fut);

    assert!(matches!(result.unwrap_err(), FederationError::Cancelled));
}

#[tokio::test]
async fn list_servers_reflects_registrations() {
    let pool = McpPool::new(fast_retry());
    pool.register_server(echo_server_config("fetch")).await.unwrap();
    pool.register_server(echo_server_config("git")).await.unwrap();
    let mut names = pool.list_servers().await;
    names.sort();
    assert_eq!(names, vec!["fetch".to_string(), "git".to_string()]);
}
