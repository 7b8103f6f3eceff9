//! Integration tests for MCP protocol handling.
//!
//! These tests drive the protocol engine and the HTTP transport through the
//! public API, covering envelope classification, lifecycle, tool dispatch
//! and the catalog's behaviour with a disabled bridge.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use serde_json::{json, Map, Value};
use tower::ServiceExt;

use mcp_host_bridge::bridge::{Command, IpcBridge};
use mcp_host_bridge::catalog;
use mcp_host_bridge::config::BridgeConfig;
use mcp_host_bridge::error::{BridgeError, ToolError};
use mcp_host_bridge::mcp::http::{router, HttpState};
use mcp_host_bridge::mcp::protocol::{parse_envelope, EnvelopeKind, Message, RequestId};
use mcp_host_bridge::mcp::registry::{FnTool, Tool, ToolCallResult};
use mcp_host_bridge::mcp::McpServer;

async fn post_mcp(server: Arc<McpServer>, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/mcp")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = router(HttpState::new(server, None))
        .oneshot(request)
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn call(server: &McpServer, body: Value) -> Value {
    let response = server
        .handle_message(&body.to_string())
        .await
        .expect("request should produce a response");
    serde_json::to_value(response).unwrap()
}

fn disabled_bridge() -> Arc<IpcBridge> {
    let config = BridgeConfig {
        enabled: false,
        ..BridgeConfig::default()
    };
    Arc::new(IpcBridge::new(&config).unwrap())
}

// =============================================================================
// Envelope Classification Tests
// =============================================================================

#[test]
fn test_classification_is_exhaustive_and_exclusive() {
    let cases = [
        (r#"{"jsonrpc":"2.0","id":1,"method":"a"}"#, EnvelopeKind::Request),
        (r#"{"jsonrpc":"2.0","id":null,"method":"a"}"#, EnvelopeKind::Request),
        (r#"{"jsonrpc":"2.0","method":"a"}"#, EnvelopeKind::Notification),
        (r#"{"jsonrpc":"2.0","id":1,"result":{}}"#, EnvelopeKind::Response),
        (r#"{"jsonrpc":"2.0","id":1,"error":{"code":1,"message":"x"}}"#, EnvelopeKind::Response),
        (r#"{"jsonrpc":"2.0","id":1,"result":{},"error":{}}"#, EnvelopeKind::Invalid),
        (r#"{"jsonrpc":"2.0","id":1}"#, EnvelopeKind::Invalid),
        (r#"{"jsonrpc":"1.0","id":1,"method":"a"}"#, EnvelopeKind::Invalid),
        (r#"{"id":1,"method":"a"}"#, EnvelopeKind::Invalid),
    ];

    for (json, expected) in cases {
        let envelope = parse_envelope(json).unwrap();
        assert_eq!(envelope.kind(), expected, "{json}");
        assert_eq!(envelope.classify().kind(), expected, "{json}");
    }
}

#[test]
fn test_explicit_null_id_is_a_request() {
    let envelope = parse_envelope(r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#).unwrap();
    match envelope.classify() {
        Message::Request(request) => assert_eq!(request.id, RequestId::Null),
        other => panic!("Expected Request, got {other:?}"),
    }
}

#[test]
fn test_parse_invalid_json() {
    let error = parse_envelope("not valid json").unwrap_err();
    assert_eq!(error.error_object().unwrap().code, -32700);
    assert_eq!(error.id, RequestId::Null);
}

// =============================================================================
// End-to-End Scenarios
// =============================================================================

#[tokio::test]
async fn test_empty_tools_list_over_http() {
    let server = Arc::new(McpServer::default());
    let (status, body) = post_mcp(
        server,
        r#"{"jsonrpc":"2.0","id":1,"method":"tools/list","params":{}}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"jsonrpc":"2.0","id":1,"result":{"tools":[]}}));
}

#[tokio::test]
async fn test_registered_ping_tool_is_called() {
    let server = McpServer::default();
    server.tools().register(Tool::new(
        "ping",
        "Liveness check",
        json!({"type": "object", "properties": {}}),
        FnTool(|_: Map<String, Value>| {
            Ok::<_, ToolError>(ToolCallResult::text("pong"))
        }),
    ));

    let response = call(
        &server,
        json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": {"name": "ping", "arguments": {}}
        }),
    )
    .await;

    assert_eq!(response["result"]["isError"], false);
    assert_eq!(response["result"]["content"][0]["type"], "text");
    assert_eq!(response["result"]["content"][0]["text"], "pong");
}

#[tokio::test]
async fn test_unknown_method_is_not_found() {
    let server = Arc::new(McpServer::default());
    let (status, body) = post_mcp(
        server,
        r#"{"jsonrpc":"2.0","id":3,"method":"foo/bar"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 3);
    assert_eq!(body["error"]["code"], -32601);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("foo/bar"));
}

#[tokio::test]
async fn test_disabled_bridge_fails_fast() {
    let bridge = disabled_bridge();
    bridge.initialize(9876);

    let err = bridge.send(Command::new("ping")).await.unwrap_err();
    assert!(matches!(err, BridgeError::Disabled));

    let stats = bridge.statistics();
    assert!(!stats.initialized);
    assert_eq!(stats.request_count, 0);
    assert_eq!(stats.endpoint, "not-set");
}

#[tokio::test]
async fn test_catalog_tool_with_disabled_bridge_reports_domain_error() {
    let server = McpServer::default();
    catalog::register(&server, &disabled_bridge());

    let response = call(
        &server,
        json!({
            "jsonrpc": "2.0",
            "id": "call-1",
            "method": "tools/call",
            "params": {"name": "getWorkspaceStats", "arguments": {}}
        }),
    )
    .await;

    assert_eq!(response["id"], "call-1");
    assert!(response.get("error").is_none());
    assert_eq!(response["result"]["isError"], true);
    assert!(response["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("disabled"));
}

#[tokio::test]
async fn test_catalog_tool_validates_arguments_before_sending() {
    let server = McpServer::default();
    let bridge = disabled_bridge();
    catalog::register(&server, &bridge);

    let response = call(
        &server,
        json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "tools/call",
            "params": {"name": "deleteElement", "arguments": {"elementName": ""}}
        }),
    )
    .await;

    assert_eq!(response["result"]["isError"], true);
    assert!(response["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("elementName is required"));
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_initialize_handshake_over_http() {
    let server = Arc::new(McpServer::default());
    let (_, body) = post_mcp(
        Arc::clone(&server),
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"test-client","version":"1.0.0"}}}"#,
    )
    .await;

    assert_eq!(body["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(body["result"]["capabilities"]["tools"]["listChanged"], true);
    assert_eq!(body["result"]["serverInfo"]["name"], "mcp-host-bridge");
    assert!(server.is_initialized());

    let (status, body) = post_mcp(
        Arc::clone(&server),
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn test_catalog_listing_over_http() {
    let server = Arc::new(McpServer::default());
    catalog::register(&server, &disabled_bridge());

    let (_, body) = post_mcp(
        Arc::clone(&server),
        r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#,
    )
    .await;
    let tools = body["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), catalog::TOOLS.len());
    assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));

    let (_, body) = post_mcp(
        server,
        r#"{"jsonrpc":"2.0","id":2,"method":"resources/list"}"#,
    )
    .await;
    let uris: Vec<&str> = body["result"]["resources"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["uri"].as_str().unwrap())
        .collect();
    assert!(uris.contains(&"workspace://overview"));
}
