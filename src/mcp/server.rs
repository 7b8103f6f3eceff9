//! MCP protocol engine.
//!
//! The engine owns the tool and resource registries and a method table. It
//! is transport-agnostic: every adapter hands it raw text or a parsed
//! envelope and writes back whatever response (if any) it returns.
//!
//! # Lifecycle
//!
//! The server starts uninitialised and flips to initialised on the first
//! `initialize` request. Requests are dispatched in either state; clients
//! that skip the handshake still get answers.
//!
//! # Errors
//!
//! Handler failures never escape: they become `-32602`/`-32603` error
//! responses, or `isError` tool results for `tools/call`.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::error::HandlerError;
use crate::mcp::protocol::{
    negotiate_protocol_version, parse_envelope, Envelope, JsonRpcResponse, Message, Notification,
    Request, RequestId, SERVER_NAME,
};
use crate::mcp::registry::{ResourceRegistry, ToolCallResult, ToolRegistry};

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, Serialize)]
pub struct ServerCapabilities {
    /// Tool-related capabilities.
    pub tools: ToolCapabilities,
    /// Resource-related capabilities.
    pub resources: ResourceCapabilities,
}

impl Default for ServerCapabilities {
    fn default() -> Self {
        Self {
            tools: ToolCapabilities { list_changed: true },
            resources: ResourceCapabilities {
                subscribe: false,
                list_changed: true,
            },
        }
    }
}

/// Tool-specific capabilities.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCapabilities {
    /// Whether the tool list can change during the session.
    pub list_changed: bool,
}

/// Resource-specific capabilities.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCapabilities {
    /// Whether clients may subscribe to resource updates.
    pub subscribe: bool,
    /// Whether the resource list can change during the session.
    pub list_changed: bool,
}

/// Server information for initialisation response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl ServerInfo {
    /// Creates server information with the crate version.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self::named(SERVER_NAME)
    }
}

/// Client information received during initialisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    #[serde(default)]
    pub version: Option<String>,
}

/// Parameters for the initialize request. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeParams {
    #[serde(default)]
    protocol_version: Option<String>,
    #[serde(default)]
    capabilities: Option<Value>,
    #[serde(default)]
    client_info: Option<ClientInfo>,
}

/// What the client told us during `initialize`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientSession {
    /// Protocol version agreed with the client.
    pub protocol_version: String,
    /// Capabilities the client advertised.
    pub capabilities: Option<Value>,
    /// Client name and version.
    pub client_info: Option<ClientInfo>,
}

/// Parameters for tools/call request.
#[derive(Debug, Clone, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Map<String, Value>>,
}

/// Parameters for resources/read request.
#[derive(Debug, Clone, Deserialize)]
struct ResourceReadParams {
    uri: String,
}

/// A custom request or notification handler.
///
/// Notification handlers run for side effects; their return value is
/// discarded.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Handles the call. `params` is always an object (`{}` when absent).
    ///
    /// # Errors
    ///
    /// [`HandlerError::InvalidParams`] maps to `-32602`,
    /// [`HandlerError::Internal`] to `-32603`.
    async fn handle(&self, params: Map<String, Value>) -> Result<Value, HandlerError>;
}

/// Methods answered by the engine itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    Initialize,
    Initialized,
    Ping,
    ToolsList,
    ToolsCall,
    ResourcesList,
    ResourcesRead,
}

/// An entry in the method table.
#[derive(Clone)]
enum Method {
    Builtin(Builtin),
    Custom(Arc<dyn MethodHandler>),
}

/// The transport-agnostic MCP protocol engine.
pub struct McpServer {
    /// Identity reported in `initialize`.
    info: ServerInfo,
    /// Registered tools.
    tools: ToolRegistry,
    /// Registered resources.
    resources: ResourceRegistry,
    /// Set by the first `initialize`.
    initialized: AtomicBool,
    /// Data recorded from the most recent `initialize`.
    session: RwLock<Option<ClientSession>>,
    /// Method name to handler.
    methods: RwLock<HashMap<String, Method>>,
}

impl McpServer {
    /// Creates a server with the built-in MCP methods registered.
    #[must_use]
    pub fn new(info: ServerInfo) -> Self {
        let methods = [
            ("initialize", Builtin::Initialize),
            ("initialized", Builtin::Initialized),
            ("notifications/initialized", Builtin::Initialized),
            ("ping", Builtin::Ping),
            ("tools/list", Builtin::ToolsList),
            ("tools/call", Builtin::ToolsCall),
            ("resources/list", Builtin::ResourcesList),
            ("resources/read", Builtin::ResourcesRead),
        ]
        .into_iter()
        .map(|(name, builtin)| (name.to_string(), Method::Builtin(builtin)))
        .collect();

        Self {
            info,
            tools: ToolRegistry::new(),
            resources: ResourceRegistry::new(),
            initialized: AtomicBool::new(false),
            session: RwLock::new(None),
            methods: RwLock::new(methods),
        }
    }

    /// Server identity.
    #[must_use]
    pub const fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// The tool catalog.
    #[must_use]
    pub const fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// The resource catalog.
    #[must_use]
    pub const fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    /// Whether `initialize` has been received.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Data recorded from the most recent `initialize`.
    #[must_use]
    pub fn session(&self) -> Option<ClientSession> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Adds or replaces a handler in the method table.
    ///
    /// Replacing a built-in method is allowed and logged.
    pub fn register_handler(&self, method: impl Into<String>, handler: impl MethodHandler + 'static) {
        let method = method.into();
        let previous = self
            .methods
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(method.clone(), Method::Custom(Arc::new(handler)));
        if previous.is_some() {
            warn!(method = %method, "Replacing existing method handler");
        } else {
            debug!(method = %method, "Registered method handler");
        }
    }

    fn lookup(&self, method: &str) -> Option<Method> {
        self.methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(method)
            .cloned()
    }

    /// Handles one line or body of raw text.
    ///
    /// Returns `None` when no response must be sent (notifications and
    /// client responses).
    pub async fn handle_message(&self, text: &str) -> Option<JsonRpcResponse> {
        match parse_envelope(text) {
            Ok(envelope) => self.handle_envelope(envelope).await,
            Err(response) => {
                debug!("Rejected malformed message");
                Some(response)
            }
        }
    }

    /// Handles an already parsed envelope.
    pub async fn handle_envelope(&self, envelope: Envelope) -> Option<JsonRpcResponse> {
        match envelope.classify() {
            Message::Request(request) => Some(self.handle_request(request).await),
            Message::Notification(notification) => {
                self.handle_notification(notification).await;
                None
            }
            Message::Response(id) => {
                debug!(id = ?id, "Ignoring response from client");
                None
            }
            Message::Invalid(id) => Some(JsonRpcResponse::invalid_request(
                id.unwrap_or(RequestId::Null),
            )),
        }
    }

    /// Handles an incoming request.
    async fn handle_request(&self, request: Request) -> JsonRpcResponse {
        let Request { id, method, params } = request;
        debug!(method = %method, id = %id, "Handling request");

        let Some(handler) = self.lookup(&method) else {
            return JsonRpcResponse::method_not_found(id, &method);
        };

        let outcome = match normalize_params(params) {
            Ok(params) => self.dispatch(handler, params).await,
            Err(error) => Err(error),
        };

        match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(HandlerError::InvalidParams(message)) => {
                JsonRpcResponse::invalid_params(id, message)
            }
            Err(HandlerError::Internal(message)) => {
                warn!(method = %method, error = %message, "Request handler failed");
                JsonRpcResponse::internal_error(id, message)
            }
        }
    }

    /// Handles an incoming notification. Unknown methods are ignored.
    async fn handle_notification(&self, notification: Notification) {
        let Notification { method, params } = notification;
        let Some(handler) = self.lookup(&method) else {
            debug!(method = %method, "Ignoring unknown notification");
            return;
        };

        let Ok(params) = normalize_params(params) else {
            debug!(method = %method, "Ignoring notification with non-object params");
            return;
        };

        if let Err(error) = self.dispatch(handler, params).await {
            warn!(method = %method, error = %error, "Notification handler failed");
        }
    }

    async fn dispatch(
        &self,
        handler: Method,
        params: Map<String, Value>,
    ) -> Result<Value, HandlerError> {
        match handler {
            Method::Builtin(builtin) => self.dispatch_builtin(builtin, params).await,
            Method::Custom(handler) => AssertUnwindSafe(handler.handle(params))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(HandlerError::Internal("handler panicked".to_string()))),
        }
    }

    async fn dispatch_builtin(
        &self,
        builtin: Builtin,
        params: Map<String, Value>,
    ) -> Result<Value, HandlerError> {
        match builtin {
            Builtin::Initialize => self.handle_initialize(params),
            Builtin::Initialized => {
                debug!("Client acknowledged initialisation");
                Ok(Value::Null)
            }
            Builtin::Ping => Ok(json!({})),
            Builtin::ToolsList => Ok(self.handle_tools_list()),
            Builtin::ToolsCall => self.handle_tools_call(params).await,
            Builtin::ResourcesList => Ok(self.handle_resources_list()),
            Builtin::ResourcesRead => self.handle_resources_read(params).await,
        }
    }

    /// Handles the initialize request. Idempotent.
    fn handle_initialize(&self, params: Map<String, Value>) -> Result<Value, HandlerError> {
        let params: InitializeParams = parse_params(params)?;
        let protocol_version = negotiate_protocol_version(params.protocol_version.as_deref());

        let client_name = params.client_info.as_ref().map(|c| c.name.clone());
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(ClientSession {
            protocol_version: protocol_version.to_string(),
            capabilities: params.capabilities,
            client_info: params.client_info,
        });

        if !self.initialized.swap(true, Ordering::AcqRel) {
            info!(
                client = client_name.as_deref().unwrap_or("unknown"),
                protocol_version,
                "Client initialised"
            );
        }

        Ok(json!({
            "protocolVersion": protocol_version,
            "capabilities": ServerCapabilities::default(),
            "serverInfo": self.info,
        }))
    }

    fn handle_tools_list(&self) -> Value {
        let tools: Vec<_> = self
            .tools
            .list()
            .iter()
            .map(|tool| tool.definition.clone())
            .collect();
        json!({ "tools": tools })
    }

    /// Handles `tools/call`. Tool-level failures become `isError` results.
    async fn handle_tools_call(&self, params: Map<String, Value>) -> Result<Value, HandlerError> {
        let params: ToolCallParams = parse_params(params)?;
        let arguments = params.arguments.unwrap_or_default();

        let result = match self.tools.get(&params.name) {
            None => ToolCallResult::error(format!("Unknown tool: {}", params.name)),
            Some(tool) => {
                debug!(tool = %params.name, "Calling tool");
                match AssertUnwindSafe(tool.handler.call(arguments))
                    .catch_unwind()
                    .await
                {
                    Ok(Ok(result)) => result,
                    Ok(Err(error)) => {
                        warn!(tool = %params.name, error = %error, "Tool failed");
                        ToolCallResult::error(error.to_string())
                    }
                    Err(_) => {
                        warn!(tool = %params.name, "Tool panicked");
                        ToolCallResult::error(format!("Tool '{}' failed unexpectedly", params.name))
                    }
                }
            }
        };

        serde_json::to_value(result).map_err(|e| HandlerError::Internal(e.to_string()))
    }

    fn handle_resources_list(&self) -> Value {
        let resources: Vec<_> = self
            .resources
            .list()
            .iter()
            .map(|resource| resource.descriptor.clone())
            .collect();
        json!({ "resources": resources })
    }

    /// Handles `resources/read`. Unknown URIs and reader failures are internal errors.
    async fn handle_resources_read(&self, params: Map<String, Value>) -> Result<Value, HandlerError> {
        let params: ResourceReadParams = parse_params(params)?;

        let resource = self
            .resources
            .get(&params.uri)
            .ok_or_else(|| HandlerError::Internal(format!("Resource not found: {}", params.uri)))?;

        let contents = AssertUnwindSafe(resource.reader.read(&params.uri))
            .catch_unwind()
            .await
            .map_err(|_| HandlerError::Internal(format!("Resource reader panicked: {}", params.uri)))?
            .map_err(|e| HandlerError::Internal(e.to_string()))?;

        Ok(json!({ "contents": [contents] }))
    }
}

impl Default for McpServer {
    fn default() -> Self {
        Self::new(ServerInfo::default())
    }
}

/// Turns absent or `null` params into an empty object.
fn normalize_params(params: Option<Value>) -> Result<Map<String, Value>, HandlerError> {
    match params {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(HandlerError::InvalidParams(
            "params must be an object".to_string(),
        )),
    }
}

fn parse_params<T: for<'de> Deserialize<'de>>(params: Map<String, Value>) -> Result<T, HandlerError> {
    serde_json::from_value(Value::Object(params))
        .map_err(|e| HandlerError::InvalidParams(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use crate::mcp::protocol::ErrorCode;
    use crate::mcp::registry::{
        FnResource, FnTool, Resource, ResourceContents, ResourceDescriptor, Tool,
    };

    async fn call(server: &McpServer, json: &str) -> JsonRpcResponse {
        server.handle_message(json).await.expect("expected a response")
    }

    fn error_code(response: &JsonRpcResponse) -> i32 {
        response.error_object().expect("expected an error").code
    }

    #[tokio::test]
    async fn initialize_reports_capabilities() {
        let server = McpServer::default();
        assert!(!server.is_initialized());

        let response = call(
            &server,
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{"roots":{}},"clientInfo":{"name":"test-client","version":"1.0"}}}"#,
        )
        .await;

        let result = response.result().unwrap();
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["capabilities"]["tools"]["listChanged"], true);
        assert_eq!(result["capabilities"]["resources"]["subscribe"], false);
        assert_eq!(result["capabilities"]["resources"]["listChanged"], true);
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert!(server.is_initialized());

        let session = server.session().unwrap();
        assert_eq!(session.client_info.unwrap().name, "test-client");
        assert_eq!(session.capabilities, Some(json!({"roots": {}})));
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let server = McpServer::default();
        let request = r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#;
        let first = call(&server, request).await;
        let second = call(&server, request).await;
        assert_eq!(first, second);
        assert!(server.is_initialized());
    }

    #[tokio::test]
    async fn initialize_rejects_malformed_client_info() {
        let server = McpServer::default();
        let response = call(
            &server,
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"clientInfo":"nope"}}"#,
        )
        .await;
        assert_eq!(error_code(&response), ErrorCode::InvalidParams.code());
    }

    #[tokio::test]
    async fn notifications_get_no_response() {
        let server = McpServer::default();
        for method in ["initialized", "notifications/initialized", "notifications/unknown"] {
            let json = format!(r#"{{"jsonrpc":"2.0","method":"{method}"}}"#);
            assert!(server.handle_message(&json).await.is_none(), "{method}");
        }
    }

    #[tokio::test]
    async fn client_responses_are_ignored() {
        let server = McpServer::default();
        let json = r#"{"jsonrpc":"2.0","id":9,"result":{}}"#;
        assert!(server.handle_message(json).await.is_none());
    }

    #[tokio::test]
    async fn invalid_envelope_is_rejected() {
        let server = McpServer::default();
        let response = call(&server, r#"{"jsonrpc":"2.0","id":3,"result":1,"error":{}}"#).await;
        assert_eq!(error_code(&response), ErrorCode::InvalidRequest.code());
        assert_eq!(response.id, RequestId::from(3));
    }

    #[tokio::test]
    async fn unknown_method_is_not_found() {
        let server = McpServer::default();
        let response = call(&server, r#"{"jsonrpc":"2.0","id":3,"method":"foo/bar"}"#).await;
        let error = response.error_object().unwrap();
        assert_eq!(error.code, ErrorCode::MethodNotFound.code());
        assert!(error.message.contains("foo/bar"));
        assert_eq!(response.id, RequestId::from(3));
    }

    #[tokio::test]
    async fn ids_round_trip_unchanged() {
        let server = McpServer::default();
        for (raw, expected) in [
            ("7", RequestId::from(7)),
            ("18446744073709551615", RequestId::Number(u64::MAX.into())),
            ("1.5", serde_json::from_str("1.5").unwrap()),
            (r#""abc""#, RequestId::String("abc".into())),
            ("null", RequestId::Null),
        ] {
            let json = format!(r#"{{"jsonrpc":"2.0","id":{raw},"method":"ping"}}"#);
            let response = call(&server, &json).await;
            assert_eq!(response.id, expected);
            assert_eq!(response.result(), Some(&json!({})));
        }
    }

    #[tokio::test]
    async fn tools_call_unknown_tool_is_domain_error() {
        let server = McpServer::default();
        let response = call(
            &server,
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"nope","arguments":{}}}"#,
        )
        .await;
        let result: ToolCallResult = serde_json::from_value(response.result().unwrap().clone()).unwrap();
        assert!(result.is_error);
        assert!(result.joined_text().contains("nope"));
    }

    #[tokio::test]
    async fn tools_call_missing_name_is_invalid_params() {
        let server = McpServer::default();
        let response = call(&server, r#"{"jsonrpc":"2.0","id":4,"method":"tools/call"}"#).await;
        assert_eq!(error_code(&response), ErrorCode::InvalidParams.code());
    }

    #[tokio::test]
    async fn non_object_params_are_invalid() {
        let server = McpServer::default();
        let response = call(&server, r#"{"jsonrpc":"2.0","id":4,"method":"ping","params":[1]}"#).await;
        assert_eq!(error_code(&response), ErrorCode::InvalidParams.code());
    }

    #[tokio::test]
    async fn tools_call_runs_handler_and_maps_failures() {
        let server = McpServer::default();
        server.tools().register(Tool::new(
            "echo",
            "Echo the input",
            json!({"type": "object"}),
            FnTool(|args: Map<String, Value>| {
                args.get("message")
                    .and_then(Value::as_str)
                    .map(ToolCallResult::text)
                    .ok_or_else(|| ToolError::InvalidArguments("message is required".into()))
            }),
        ));

        let ok = call(
            &server,
            r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"echo","arguments":{"message":"hello"}}}"#,
        )
        .await;
        let ok: ToolCallResult = serde_json::from_value(ok.result().unwrap().clone()).unwrap();
        assert!(!ok.is_error);
        assert_eq!(ok.joined_text(), "hello");

        let failed = call(
            &server,
            r#"{"jsonrpc":"2.0","id":6,"method":"tools/call","params":{"name":"echo"}}"#,
        )
        .await;
        let failed: ToolCallResult =
            serde_json::from_value(failed.result().unwrap().clone()).unwrap();
        assert!(failed.is_error);
        assert_eq!(failed.joined_text(), "message is required");
    }

    #[tokio::test]
    async fn tools_list_snapshot() {
        let server = McpServer::default();
        let empty = call(&server, r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#).await;
        assert_eq!(empty.result(), Some(&json!({"tools": []})));

        server.tools().register(Tool::new(
            "a",
            "A tool",
            json!({"type": "object"}),
            FnTool(|_| Ok(ToolCallResult::text(""))),
        ));
        let listed = call(&server, r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#).await;
        let tools = &listed.result().unwrap()["tools"];
        assert_eq!(tools[0]["name"], "a");
        assert_eq!(tools[0]["inputSchema"]["type"], "object");
        assert!(tools[0].get("category").is_none());
    }

    #[tokio::test]
    async fn resources_read_and_unknown_uri() {
        let server = McpServer::default();
        server.resources().register(Resource::new(
            ResourceDescriptor {
                uri: "mem://greeting".into(),
                name: "greeting".into(),
                title: None,
                description: Some("A greeting".into()),
                mime_type: "text/plain".into(),
            },
            FnResource(|uri: &str| Ok(ResourceContents::text(uri, "text/plain", "hello"))),
        ));

        let listed = call(&server, r#"{"jsonrpc":"2.0","id":1,"method":"resources/list"}"#).await;
        assert_eq!(listed.result().unwrap()["resources"][0]["mimeType"], "text/plain");

        let read = call(
            &server,
            r#"{"jsonrpc":"2.0","id":2,"method":"resources/read","params":{"uri":"mem://greeting"}}"#,
        )
        .await;
        assert_eq!(read.result().unwrap()["contents"][0]["text"], "hello");

        let missing = call(
            &server,
            r#"{"jsonrpc":"2.0","id":3,"method":"resources/read","params":{"uri":"mem://nope"}}"#,
        )
        .await;
        let error = missing.error_object().unwrap();
        assert_eq!(error.code, ErrorCode::InternalError.code());
        assert_eq!(error.data, Some(json!("Resource not found: mem://nope")));
    }

    struct Sum;

    #[async_trait]
    impl MethodHandler for Sum {
        async fn handle(&self, params: Map<String, Value>) -> Result<Value, HandlerError> {
            let values = params
                .get("values")
                .and_then(Value::as_array)
                .ok_or_else(|| HandlerError::InvalidParams("values must be an array".into()))?;
            if values.is_empty() {
                return Err(HandlerError::Internal("nothing to sum".into()));
            }
            Ok(json!(values.iter().filter_map(Value::as_i64).sum::<i64>()))
        }
    }

    #[tokio::test]
    async fn custom_handlers_share_the_dispatch_table() {
        let server = McpServer::default();
        server.register_handler("math/sum", Sum);

        let ok = call(
            &server,
            r#"{"jsonrpc":"2.0","id":1,"method":"math/sum","params":{"values":[1,2,3]}}"#,
        )
        .await;
        assert_eq!(ok.result(), Some(&json!(6)));

        let bad = call(&server, r#"{"jsonrpc":"2.0","id":2,"method":"math/sum"}"#).await;
        assert_eq!(error_code(&bad), ErrorCode::InvalidParams.code());

        let failed = call(
            &server,
            r#"{"jsonrpc":"2.0","id":3,"method":"math/sum","params":{"values":[]}}"#,
        )
        .await;
        let error = failed.error_object().unwrap();
        assert_eq!(error.code, ErrorCode::InternalError.code());
        assert_eq!(error.data, Some(json!("nothing to sum")));
    }
}
