//! JSON-RPC 2.0 message types for the MCP protocol.
//!
//! Every message on the wire is an [`Envelope`]. Its shape is decided
//! structurally by [`Envelope::classify`]:
//!
//! - **Request**: `method` and `id` present, no `result`/`error`
//! - **Notification**: `method` present, `id` absent
//! - **Response**: `method` absent, exactly one of `result`/`error`
//! - anything else is **Invalid**
//!
//! An explicit `"id": null` counts as a present identifier. Responses echo
//! the request identifier unchanged, including `null`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// The JSON-RPC version string carried by every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// The newest MCP protocol version this implementation speaks.
pub const LATEST_PROTOCOL_VERSION: &str = "2025-06-18";

/// Every protocol version accepted during `initialize`, newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

/// Default server name for capability negotiation.
pub const SERVER_NAME: &str = "mcp-host-bridge";

/// Picks the protocol version to answer `initialize` with.
///
/// The client's version is echoed when supported, otherwise the latest
/// version is offered.
#[must_use]
pub fn negotiate_protocol_version(requested: Option<&str>) -> &'static str {
    requested
        .and_then(|v| SUPPORTED_PROTOCOL_VERSIONS.iter().find(|s| **s == v))
        .copied()
        .unwrap_or(LATEST_PROTOCOL_VERSION)
}

/// A JSON-RPC 2.0 request ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric request ID, kept exactly as received (integer, unsigned or
    /// fractional).
    Number(serde_json::Number),
    /// String request ID.
    String(String),
    /// Explicit `null` ID.
    Null,
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Null => f.write_str("null"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

/// Deserialises a field so that an explicit `null` is `Some`.
///
/// Used with `#[serde(default)]`, an absent field stays `None`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// A raw JSON-RPC envelope as received from a transport.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Envelope {
    /// Must be "2.0".
    #[serde(default)]
    pub jsonrpc: Option<String>,

    /// Request identifier; `Some(RequestId::Null)` for an explicit `null`.
    #[serde(default, deserialize_with = "present")]
    pub id: Option<RequestId>,

    /// Method name.
    #[serde(default)]
    pub method: Option<String>,

    /// Method parameters.
    #[serde(default)]
    pub params: Option<Value>,

    /// Success payload of a response; `Some(Value::Null)` for `"result": null`.
    #[serde(default, deserialize_with = "present")]
    pub result: Option<Value>,

    /// Error payload of a response.
    #[serde(default, deserialize_with = "present")]
    pub error: Option<Value>,
}

/// The logical form of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    /// Expects a response.
    Request,
    /// One-way message.
    Notification,
    /// Reply to an earlier request.
    Response,
    /// Matches none of the above.
    Invalid,
}

/// An incoming request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Identifier echoed in the response.
    pub id: RequestId,
    /// Method to invoke.
    pub method: String,
    /// Raw parameters.
    pub params: Option<Value>,
}

/// An incoming notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Notification method.
    pub method: String,
    /// Raw parameters.
    pub params: Option<Value>,
}

/// A classified envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A request expecting a response.
    Request(Request),
    /// A notification (no response expected).
    Notification(Notification),
    /// A response from the peer, carrying its ID if any.
    Response(Option<RequestId>),
    /// A malformed envelope, carrying its ID if one could be read.
    Invalid(Option<RequestId>),
}

impl Message {
    /// Returns the logical form of this message.
    #[must_use]
    pub const fn kind(&self) -> EnvelopeKind {
        match self {
            Self::Request(_) => EnvelopeKind::Request,
            Self::Notification(_) => EnvelopeKind::Notification,
            Self::Response(_) => EnvelopeKind::Response,
            Self::Invalid(_) => EnvelopeKind::Invalid,
        }
    }
}

impl Envelope {
    /// Returns the logical form of this envelope without consuming it.
    #[must_use]
    pub fn kind(&self) -> EnvelopeKind {
        if self.jsonrpc.as_deref() != Some(JSONRPC_VERSION) {
            return EnvelopeKind::Invalid;
        }
        match (
            self.method.is_some(),
            self.id.is_some(),
            self.result.is_some(),
            self.error.is_some(),
        ) {
            (true, true, false, false) => EnvelopeKind::Request,
            (true, false, false, false) => EnvelopeKind::Notification,
            (false, _, true, false) | (false, _, false, true) => EnvelopeKind::Response,
            _ => EnvelopeKind::Invalid,
        }
    }

    /// Classifies the envelope into its typed form.
    #[must_use]
    pub fn classify(self) -> Message {
        match (self.kind(), self.method) {
            (EnvelopeKind::Request, Some(method)) => Message::Request(Request {
                id: self.id.unwrap_or(RequestId::Null),
                method,
                params: self.params,
            }),
            (EnvelopeKind::Notification, Some(method)) => Message::Notification(Notification {
                method,
                params: self.params,
            }),
            (EnvelopeKind::Response, _) => Message::Response(self.id),
            _ => Message::Invalid(self.id),
        }
    }
}

/// Standard JSON-RPC 2.0 error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid JSON was received by the server.
    ParseError,
    /// The JSON sent is not a valid envelope.
    InvalidRequest,
    /// The method does not exist or is not available.
    MethodNotFound,
    /// Invalid method parameters.
    InvalidParams,
    /// Internal JSON-RPC error.
    InternalError,
}

impl ErrorCode {
    /// Returns the numeric code for this error.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
        }
    }

    /// Returns the default message for this error code.
    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// The error code.
    pub code: i32,

    /// A short description of the error.
    pub message: String,

    /// Additional information about the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorObject {
    /// Creates a new error from an error code.
    #[must_use]
    pub fn from_code(code: ErrorCode) -> Self {
        Self::with_message(code, code.default_message())
    }

    /// Creates a new error with a custom message.
    #[must_use]
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    /// Adds additional data to the error.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// The outcome carried by a response: a result or an error, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Successful result.
    Result(Value),
    /// Error details.
    Error(ErrorObject),
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Always "2.0".
    pub jsonrpc: String,

    /// The request ID this response corresponds to (`null` when unknown).
    pub id: RequestId,

    /// Result or error.
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl JsonRpcResponse {
    /// Creates a new success response.
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            outcome: Outcome::Result(result),
        }
    }

    /// Creates a new error response.
    #[must_use]
    pub fn error(id: RequestId, error: ErrorObject) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            outcome: Outcome::Error(error),
        }
    }

    /// Creates a parse error response (ID cannot be determined).
    #[must_use]
    pub fn parse_error() -> Self {
        Self::error(RequestId::Null, ErrorObject::from_code(ErrorCode::ParseError))
    }

    /// Creates an invalid request error response.
    #[must_use]
    pub fn invalid_request(id: RequestId) -> Self {
        Self::error(id, ErrorObject::from_code(ErrorCode::InvalidRequest))
    }

    /// Creates a method not found error response.
    #[must_use]
    pub fn method_not_found(id: RequestId, method: &str) -> Self {
        Self::error(
            id,
            ErrorObject::with_message(
                ErrorCode::MethodNotFound,
                format!("Method not found: {method}"),
            ),
        )
    }

    /// Creates an invalid params error response.
    #[must_use]
    pub fn invalid_params(id: RequestId, message: impl Into<String>) -> Self {
        Self::error(id, ErrorObject::with_message(ErrorCode::InvalidParams, message))
    }

    /// Creates an internal error response; the failure message travels in `data`.
    #[must_use]
    pub fn internal_error(id: RequestId, message: impl Into<String>) -> Self {
        Self::error(
            id,
            ErrorObject::from_code(ErrorCode::InternalError).with_data(Value::String(message.into())),
        )
    }

    /// Returns the result payload, if this is a success response.
    #[must_use]
    pub const fn result(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Result(value) => Some(value),
            Outcome::Error(_) => None,
        }
    }

    /// Returns the error object, if this is an error response.
    #[must_use]
    pub const fn error_object(&self) -> Option<&ErrorObject> {
        match &self.outcome {
            Outcome::Result(_) => None,
            Outcome::Error(error) => Some(error),
        }
    }
}

/// Parses a JSON string into an envelope.
///
/// # Errors
///
/// Returns a ready-to-send error response: `-32700` when the text is not
/// JSON, `-32600` when it is JSON but not an envelope object.
pub fn parse_envelope(json: &str) -> Result<Envelope, JsonRpcResponse> {
    let value: Value = serde_json::from_str(json).map_err(|_| JsonRpcResponse::parse_error())?;

    let Value::Object(object) = value else {
        return Err(JsonRpcResponse::invalid_request(RequestId::Null));
    };

    let id = recover_id(&object);
    serde_json::from_value(Value::Object(object))
        .map_err(|_| JsonRpcResponse::invalid_request(id))
}

/// Best-effort ID extraction from an object that failed to deserialise.
fn recover_id(object: &Map<String, Value>) -> RequestId {
    object
        .get("id")
        .cloned()
        .and_then(|id| serde_json::from_value(id).ok())
        .unwrap_or(RequestId::Null)
}
