//! Wire units exchanged with the host process.
//!
//! A [`Command`] names an `action` and carries free-form fields. On the wire
//! every attempt is stamped with `requestId`, `timestamp` and `source`.
//! The reply is an open map; the presence of an `error` key is the only
//! failure signal.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Value of the `source` field on every outgoing command.
pub const COMMAND_SOURCE: &str = "mcp-server";

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn epoch_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A command to forward to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    action: String,
    fields: Map<String, Value>,
}

impl Command {
    /// Creates a command with no fields.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            fields: Map::new(),
        }
    }

    /// Adds one field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Adds every field of `fields`.
    #[must_use]
    pub fn with_fields(mut self, fields: Map<String, Value>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// The action name.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// The free-form fields.
    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Builds the wire payload. Metadata keys override same-named fields.
    #[must_use]
    pub fn payload(&self, request_id: i64, timestamp: i64) -> Map<String, Value> {
        let mut payload = self.fields.clone();
        payload.insert("action".into(), Value::String(self.action.clone()));
        payload.insert("requestId".into(), Value::from(request_id));
        payload.insert("timestamp".into(), Value::from(timestamp));
        payload.insert("source".into(), Value::String(COMMAND_SOURCE.into()));
        payload
    }
}

/// A reply from the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandResponse(Map<String, Value>);

impl CommandResponse {
    /// Wraps a response map.
    #[must_use]
    pub const fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// A response carrying only an `error` message.
    pub fn failure(message: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("error".into(), Value::String(message.into()));
        Self(map)
    }

    /// Whether the response signals failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.0.contains_key("error")
    }

    /// The failure message, if any. Non-string errors are rendered as JSON.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.0.get("error").map(|error| match error {
            Value::String(message) => message.clone(),
            other => other.to_string(),
        })
    }

    /// Looks up a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Sets the `timestamp` field.
    pub fn stamp_timestamp(&mut self, timestamp: i64) {
        self.0.insert("timestamp".into(), Value::from(timestamp));
    }

    /// Borrows the underlying map.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Unwraps the underlying map.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for CommandResponse {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
