//! HTTP transports for the MCP server.
//!
//! # Endpoints
//!
//! - `POST /mcp` - one envelope in, at most one out (`204` for notifications)
//! - `POST /mcp/sse` - same, with the response wrapped in a single SSE event
//! - `GET /health` - static status snapshot
//! - `GET /health/ready` - readiness, including an IPC availability probe
//!
//! Other methods on the MCP paths get `405 Method Not Allowed`. Malformed
//! JSON answers `400` with a `-32700` envelope as the body.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, Sse},
        IntoResponse, Json, Response,
    },
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::bridge::IpcBridge;
use crate::error::ServeError;
use crate::mcp::protocol::{ErrorCode, JsonRpcResponse};
use crate::mcp::server::McpServer;

/// Shared state for the HTTP transports.
#[derive(Clone)]
pub struct HttpState {
    /// The protocol engine shared with every other transport.
    pub server: Arc<McpServer>,
    /// Bridge probed by the readiness endpoint.
    pub bridge: Option<Arc<IpcBridge>>,
}

impl HttpState {
    /// Creates HTTP state around an engine.
    #[must_use]
    pub const fn new(server: Arc<McpServer>, bridge: Option<Arc<IpcBridge>>) -> Self {
        Self { server, bridge }
    }

    /// Runs one body through the engine.
    async fn dispatch(&self, body: &Bytes) -> Option<JsonRpcResponse> {
        match std::str::from_utf8(body) {
            Ok(text) => self.server.handle_message(text).await,
            Err(_) => Some(JsonRpcResponse::parse_error()),
        }
    }
}

/// Creates the MCP HTTP router.
pub fn router(state: HttpState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/mcp", post(mcp_post))
        .route("/mcp/sse", post(mcp_sse))
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Binds a TCP listener.
///
/// # Errors
///
/// Returns [`ServeError::Bind`] if the address is unavailable.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener, ServeError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })
}

/// Serves `router` until `shutdown` fires, then drains open connections.
///
/// # Errors
///
/// Returns an error if the server fails while accepting connections.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> Result<(), ServeError> {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "HTTP transport listening");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}

/// Status code for a response envelope: `400` for unparseable input.
fn status_for(response: &JsonRpcResponse) -> StatusCode {
    match response.error_object() {
        Some(error) if error.code == ErrorCode::ParseError.code() => StatusCode::BAD_REQUEST,
        _ => StatusCode::OK,
    }
}

/// Request/response endpoint.
async fn mcp_post(State(state): State<HttpState>, body: Bytes) -> Response {
    match state.dispatch(&body).await {
        Some(response) => (status_for(&response), Json(response)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Legacy streaming endpoint: the response becomes exactly one `data:` event.
///
/// Always `200` when there is a response; stream clients drop non-200
/// replies before reading the error event.
async fn mcp_sse(State(state): State<HttpState>, body: Bytes) -> Response {
    let Some(response) = state.dispatch(&body).await else {
        return StatusCode::NO_CONTENT.into_response();
    };

    let event = match Event::default().json_data(&response) {
        Ok(event) => event,
        Err(e) => {
            debug!(error = %e, "Failed to encode SSE event");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let stream = futures::stream::iter([Ok::<_, Infallible>(event)]);
    Sse::new(stream).into_response()
}

/// Static status snapshot.
async fn health(State(state): State<HttpState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": state.server.info().name,
        "version": state.server.info().version,
        "initialized": state.server.is_initialized(),
        "tools": state.server.tools().len(),
        "resources": state.server.resources().len(),
    }))
}

/// Readiness: healthy only when the host IPC endpoint answers.
async fn readiness(State(state): State<HttpState>) -> (StatusCode, Json<Value>) {
    let ipc_available = match &state.bridge {
        Some(bridge) => bridge.is_available().await,
        None => false,
    };

    let status = if ipc_available {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if ipc_available { "ready" } else { "degraded" },
            "ipcAvailable": ipc_available,
            "tools": state.server.tools().count_by_category(),
            "bridge": state.bridge.as_ref().map(|b| b.statistics()),
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use tower::ServiceExt;

    fn test_router() -> Router {
        router(HttpState::new(Arc::new(McpServer::default()), None))
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn post_request_returns_envelope() {
        let response = test_router()
            .oneshot(post_json("/mcp", r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body, json!({"jsonrpc": "2.0", "id": 1, "result": {"tools": []}}));
    }

    #[tokio::test]
    async fn post_notification_returns_no_content() {
        let response = test_router()
            .oneshot(post_json(
                "/mcp",
                r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn post_malformed_json_is_bad_request() {
        let response = test_router()
            .oneshot(post_json("/mcp", "{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn get_on_mcp_is_method_not_allowed() {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/mcp")
            .body(Body::empty())
            .unwrap();
        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn sse_wraps_response_in_one_event() {
        let response = test_router()
            .oneshot(post_json("/mcp/sse", r#"{"jsonrpc":"2.0","id":"a","method":"ping"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );

        let text = body_text(response).await;
        assert_eq!(text.matches("data: ").count(), 1);
        assert!(text.ends_with("\n\n"));
        let payload: Value = serde_json::from_str(
            text.trim_end()
                .strip_prefix("data: ")
                .unwrap(),
        )
        .unwrap();
        assert_eq!(payload["id"], "a");
        assert_eq!(payload["result"], json!({}));
    }

    #[tokio::test]
    async fn sse_parse_error_keeps_status_ok() {
        let response = test_router()
            .oneshot(post_json("/mcp/sse", "{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let text = body_text(response).await;
        assert_eq!(text.matches("data: ").count(), 1);
        let payload: Value = serde_json::from_str(
            text.trim_end()
                .strip_prefix("data: ")
                .unwrap(),
        )
        .unwrap();
        assert_eq!(payload["id"], Value::Null);
        assert_eq!(payload["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn health_reports_snapshot() {
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["initialized"], false);
    }

    #[tokio::test]
    async fn readiness_without_bridge_is_degraded() {
        let request = Request::builder()
            .uri("/health/ready")
            .body(Body::empty())
            .unwrap();
        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["ipcAvailable"], false);
    }

    #[tokio::test]
    async fn cors_preflight_allows_any_origin() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/mcp")
            .header(header::ORIGIN, "http://example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();
        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
    }
}
