//! End-to-end HTTP tests over a loopback server.

mod common;

use common::{Event, MockDriver, Script, mock_config, row, send, spawn_server};
use serde_json::json;
use sql_gateway::error::DbError;
use sql_gateway::gateway::Gateway;
use sql_gateway::transport::HttpTransport;
use std::net::SocketAddr;
use std::sync::Arc;

async fn serve(script: Script, base_path: &str) -> (SocketAddr, MockDriver) {
    let driver = MockDriver::new(script);
    let gateway = Arc::new(Gateway::new(mock_config(), driver.clone()));
    let transport = HttpTransport::new(gateway, "127.0.0.1", 0, base_path);
    (spawn_server(transport.router()).await, driver)
}

#[tokio::test]
async fn test_query_returns_rows() {
    let (addr, driver) = serve(
        Script {
            rows: vec![row(&[("ID", json!(1)), ("NAME", json!("a"))])],
            ..Default::default()
        },
        "/api",
    )
    .await;

    let (status, body) = send(
        addr,
        "POST",
        "/api/query",
        Some(r#"{"sql": "SELECT 1 FROM RDB$DATABASE"}"#),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["rowCount"], 1);
    assert_eq!(body["data"], json!([{"ID": 1, "NAME": "a"}]));
    assert!(body["executedAt"].as_str().unwrap().ends_with('Z'));
    assert_eq!(driver.count(&Event::Detach), 1);
}

#[tokio::test]
async fn test_query_rejects_delete() {
    let (addr, driver) = serve(Script::default(), "/api").await;

    let (status, body) = send(addr, "POST", "/api/query", Some(r#"{"sql": "DELETE FROM T"}"#)).await;

    assert_eq!(status, 403);
    assert_eq!(body["status"], "ERROR");
    assert_eq!(body["kind"], "PermissionError");
    assert!(driver.events().is_empty());
}

#[tokio::test]
async fn test_execute_ddl_has_no_affected_rows() {
    let (addr, driver) = serve(Script::default(), "/api").await;

    let (status, body) = send(
        addr,
        "POST",
        "/api/execute",
        Some(r#"{"sql": "CREATE TABLE T (ID INT)"}"#),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "OK");
    assert!(body.get("message").is_some());
    assert!(body.get("affectedRows").is_none());
    assert_eq!(driver.count(&Event::Commit), 0);
}

#[tokio::test]
async fn test_execute_write_reports_affected_rows() {
    let (addr, _driver) = serve(
        Script {
            rows_affected: Some(2),
            ..Default::default()
        },
        "/api",
    )
    .await;

    let (status, body) = send(
        addr,
        "POST",
        "/api/execute",
        Some(r#"{"sql": "DELETE FROM T WHERE ID < ?", "params": [10]}"#),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["affectedRows"], 2);
}

#[tokio::test]
async fn test_execute_commit_failure() {
    let (addr, driver) = serve(
        Script {
            commit_error: Some(DbError::database("deadlock", Some("40001".to_string()))),
            ..Default::default()
        },
        "/api",
    )
    .await;

    let (status, body) = send(addr, "POST", "/api/execute", Some(r#"{"sql": "UPDATE T SET X=1"}"#)).await;

    assert_eq!(status, 500);
    assert_eq!(body["status"], "ERROR");
    assert_eq!(body["kind"], "CommitError");
    assert_eq!(body["error"], "deadlock");
    assert_eq!(body["context"]["sqlState"], "40001");
    assert_eq!(driver.count(&Event::Detach), 1);
}

#[tokio::test]
async fn test_missing_sql_is_bad_request() {
    let (addr, driver) = serve(Script::default(), "/api").await;

    for path in ["/api/query", "/api/execute"] {
        let (status, body) = send(addr, "POST", path, Some(r#"{"params": []}"#)).await;
        assert_eq!(status, 400, "{}", path);
        assert_eq!(body["kind"], "ValidationError");
        assert_eq!(body["message"], "SQL query is required");
    }
    assert!(driver.events().is_empty());
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let (addr, driver) = serve(Script::default(), "/api").await;

    let (status, body) = send(addr, "POST", "/api/query", Some("{not json")).await;
    assert_eq!(status, 400);
    assert_eq!(body["kind"], "ValidationError");

    let (status, _) = send(addr, "POST", "/api/execute", Some(r#"{"sql": 42}"#)).await;
    assert_eq!(status, 400);

    assert!(driver.events().is_empty());
}

#[tokio::test]
async fn test_connection_failure_is_server_error() {
    let (addr, _driver) = serve(
        Script {
            attach_error: Some(DbError::connection("connection refused")),
            ..Default::default()
        },
        "/api",
    )
    .await;

    let (status, body) = send(addr, "POST", "/api/query", Some(r#"{"sql": "SELECT 1"}"#)).await;

    assert_eq!(status, 500);
    assert_eq!(body["kind"], "ConnectionError");
    assert_eq!(body["error"], "connection refused");
}

#[tokio::test]
async fn test_health() {
    let (addr, driver) = serve(Script::default(), "/api").await;

    let (status, body) = send(addr, "GET", "/api/health", None).await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["timestamp"].is_string());
    assert!(!driver.attached());
}

#[tokio::test]
async fn test_info_lists_endpoints() {
    let (addr, _driver) = serve(Script::default(), "/api").await;

    let (status, body) = send(addr, "GET", "/api/info", None).await;

    assert_eq!(status, 200);
    assert_eq!(body["endpoints"]["query"], "POST /api/query");
    assert_eq!(body["endpoints"]["testConnection"], "GET /api/test-connection");
}

#[tokio::test]
async fn test_test_connection_echoes_config_without_password() {
    let (addr, driver) = serve(
        Script {
            rows: vec![row(&[("server_time", json!("2025-01-02 03:04:05"))])],
            ..Default::default()
        },
        "/api",
    )
    .await;

    let (status, body) = send(addr, "GET", "/api/test-connection", None).await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["serverTime"], "2025-01-02 03:04:05");
    assert_eq!(body["config"]["database"], "mock.db");
    assert!(body["config"].get("password").is_none());
    assert_eq!(driver.count(&Event::Detach), 1);
}

#[tokio::test]
async fn test_unknown_route_lists_available_endpoints() {
    let (addr, _driver) = serve(Script::default(), "/api").await;

    let (status, body) = send(addr, "GET", "/api/nope", None).await;

    assert_eq!(status, 404);
    assert_eq!(body["status"], "ERROR");
    let endpoints = body["availableEndpoints"].as_array().unwrap();
    assert_eq!(endpoints.len(), 5);
    assert!(endpoints.contains(&json!("POST /api/execute")));

    let (status, _) = send(addr, "GET", "/elsewhere", None).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_root_base_path() {
    let (addr, _driver) = serve(Script::default(), "/").await;

    let (status, _) = send(addr, "GET", "/health", None).await;
    assert_eq!(status, 200);

    let (status, body) = send(addr, "GET", "/api/health", None).await;
    assert_eq!(status, 404);
    assert!(body["availableEndpoints"]
        .as_array()
        .unwrap()
        .contains(&json!("GET /health")));
}
