//! IPC host endpoint.
//!
//! Receives commands forwarded by the bridge and runs them against the host
//! operation table. The endpoint only ever binds to the loopback interface.
//!
//! | Request | Response |
//! |---|---|
//! | non-POST | `405` `{"error":"Method not allowed"}` |
//! | body not a JSON object with a string `action` | `400` `{"error": ...}` |
//! | unknown action | `200` `{"error":"Unknown action: <a>"}` |
//! | operation failure | `200` `{"error": <message>}` |
//! | operation panic | `200` `{"error":"Command execution failed: ..."}` |
//! | success | `200` with the operation's map |
//!
//! Every response body gets a `timestamp` (epoch ms) just before it is sent.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use serde_json::{Map, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bridge::command::{epoch_millis, CommandResponse};
use crate::error::ServeError;
use crate::host::affinity::{run_caught, AffinityExecutor};

/// Where an operation must run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    /// On the blocking worker serving the request.
    Any,
    /// On the host's designated thread.
    HostThread,
}

/// Result of a host operation: a response map or an error message.
pub type OperationResult = Result<Map<String, Value>, String>;

type OperationFn = dyn Fn(&Map<String, Value>) -> OperationResult + Send + Sync;

/// A host operation bound to an action name.
#[derive(Clone)]
pub struct HostOperation {
    affinity: Affinity,
    run: Arc<OperationFn>,
}

impl HostOperation {
    /// An operation that may run on any thread.
    pub fn any<F>(run: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> OperationResult + Send + Sync + 'static,
    {
        Self {
            affinity: Affinity::Any,
            run: Arc::new(run),
        }
    }

    /// An operation that must run on the host thread.
    pub fn host_thread<F>(run: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> OperationResult + Send + Sync + 'static,
    {
        Self {
            affinity: Affinity::HostThread,
            run: Arc::new(run),
        }
    }

    /// Declared affinity.
    #[must_use]
    pub const fn affinity(&self) -> Affinity {
        self.affinity
    }
}

/// Action name to operation.
#[derive(Clone, Default)]
pub struct OperationTable {
    operations: HashMap<String, HostOperation>,
}

impl OperationTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `action` to `operation`, replacing any previous binding.
    pub fn register(&mut self, action: impl Into<String>, operation: HostOperation) {
        self.operations.insert(action.into(), operation);
    }

    /// Looks up an action.
    #[must_use]
    pub fn get(&self, action: &str) -> Option<&HostOperation> {
        self.operations.get(action)
    }

    /// Registered action names, sorted.
    #[must_use]
    pub fn actions(&self) -> Vec<&str> {
        let mut actions: Vec<_> = self.operations.keys().map(String::as_str).collect();
        actions.sort_unstable();
        actions
    }
}

/// Dispatches host commands with the right execution affinity.
pub struct HostEndpoint {
    table: OperationTable,
    executor: Arc<AffinityExecutor>,
}

impl HostEndpoint {
    /// Creates an endpoint over an operation table and affinity executor.
    #[must_use]
    pub const fn new(table: OperationTable, executor: Arc<AffinityExecutor>) -> Self {
        Self { table, executor }
    }

    /// The operation table.
    #[must_use]
    pub const fn table(&self) -> &OperationTable {
        &self.table
    }

    /// Runs one command. Blocks while a host-thread operation runs.
    #[must_use]
    pub fn process(&self, command: &Map<String, Value>) -> CommandResponse {
        let Some(action) = command.get("action").and_then(Value::as_str) else {
            return CommandResponse::failure("Missing action");
        };

        let Some(operation) = self.table.get(action) else {
            debug!(action, "Unknown host action");
            return CommandResponse::failure(format!("Unknown action: {action}"));
        };

        debug!(action, affinity = ?operation.affinity, "Executing host action");
        let outcome = match operation.affinity {
            Affinity::Any => run_caught(|| (operation.run)(command))
                .unwrap_or_else(|e| Err(format!("Command execution failed: {e}"))),
            Affinity::HostThread => {
                let run = Arc::clone(&operation.run);
                let command = command.clone();
                self.executor
                    .invoke_and_wait(move || run(&command))
                    .unwrap_or_else(|e| Err(format!("Operation failed: {e}")))
            }
        };

        match outcome {
            Ok(map) => CommandResponse::new(map),
            Err(message) => {
                warn!(action, error = %message, "Host action failed");
                CommandResponse::failure(message)
            }
        }
    }

    /// Builds the HTTP router serving `path`.
    pub fn router(self: Arc<Self>, path: &str) -> Router {
        Router::new()
            .route(path, post(submit).fallback(method_not_allowed))
            .with_state(self)
    }
}

/// Binds the endpoint on `127.0.0.1:<port>`.
///
/// # Errors
///
/// Returns [`ServeError::Bind`] if the port is unavailable.
pub async fn bind(port: u16) -> Result<TcpListener, ServeError> {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })
}

/// Serves the endpoint until `shutdown` fires.
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
        info!(addr = %addr, "Host IPC endpoint listening");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}

fn respond(status: StatusCode, mut response: CommandResponse) -> Response {
    response.stamp_timestamp(epoch_millis());
    (status, Json(response)).into_response()
}

async fn submit(State(endpoint): State<Arc<HostEndpoint>>, body: Bytes) -> Response {
    let command: Map<String, Value> = match serde_json::from_slice(&body) {
        Ok(command) => command,
        Err(e) => {
            return respond(
                StatusCode::BAD_REQUEST,
                CommandResponse::failure(format!("Invalid command body: {e}")),
            )
        }
    };

    if !command.get("action").is_some_and(Value::is_string) {
        return respond(
            StatusCode::BAD_REQUEST,
            CommandResponse::failure("Missing action"),
        );
    }

    match tokio::task::spawn_blocking(move || endpoint.process(&command)).await {
        Ok(response) => respond(StatusCode::OK, response),
        Err(e) => respond(
            StatusCode::INTERNAL_SERVER_ERROR,
            CommandResponse::failure(format!("Internal server error: {e}")),
        ),
    }
}

async fn method_not_allowed() -> Response {
    respond(
        StatusCode::METHOD_NOT_ALLOWED,
        CommandResponse::failure("Method not allowed"),
    )
}
