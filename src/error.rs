//! Error types for mcp-host-bridge.
//!
//! Protocol errors (JSON-RPC error responses) are not represented here; they
//! are built directly as [`crate::mcp::protocol::JsonRpcResponse`] values.
//! The types below cover configuration, the IPC bridge, handler failures and
//! the host side.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// Errors raised by the IPC bridge before or instead of a host response.
///
/// Failures reported by the host itself (connection refused, timeouts,
/// non-2xx statuses) are not errors at this level: they come back as a
/// response map carrying an `error` key.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The bridge is disabled by configuration.
    #[error("IPC bridge is disabled")]
    Disabled,

    /// `initialize` has not been called yet.
    #[error("IPC bridge is not initialized")]
    NotInitialized,

    /// The bridge has stopped accepting work.
    #[error("IPC bridge is shutting down")]
    ShutDown,

    /// A backoff sleep was cancelled; the remaining attempts were abandoned.
    #[error("IPC request interrupted after attempt {attempt}")]
    Interrupted {
        /// The last attempt that completed.
        attempt: u32,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build IPC HTTP client")]
    Client(#[source] reqwest::Error),
}

/// Failures returned by tool and resource handlers.
///
/// The protocol engine turns these into `isError` tool results or internal
/// errors; they never reach a transport directly.
#[derive(Error, Debug)]
pub enum ToolError {
    /// Arguments were missing or malformed.
    #[error("{0}")]
    InvalidArguments(String),

    /// The IPC bridge refused the command.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// The operation ran and failed.
    #[error("{0}")]
    Failed(String),
}

/// Failures returned by custom method handlers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// Parameters did not match what the method expects (`-32602`).
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// The handler failed (`-32603`, message carried as `data`).
    #[error("{0}")]
    Internal(String),
}

/// Errors from the host affinity executor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AffinityError {
    /// The affinity thread is no longer running.
    #[error("affinity thread has stopped")]
    Stopped,

    /// The submitted job panicked.
    #[error("operation panicked: {0}")]
    Panicked(String),
}

/// Errors that stop a server or host process.
#[derive(Error, Debug)]
pub enum ServeError {
    /// A listener could not be bound.
    #[error("failed to bind {addr}")]
    Bind {
        /// Address that was requested.
        addr: SocketAddr,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Transport I/O failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The IPC bridge could not be constructed.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// No transport is enabled.
    #[error("no transport enabled; enable server.http or server.stdio")]
    NoTransport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let error = ConfigError::NotFound {
            path: PathBuf::from("/path/to/config.json"),
        };
        let msg = error.to_string();
        assert!(msg.contains("not found"));
        assert!(msg.contains("config.json"));
    }

    #[test]
    fn validation_error_display() {
        let error = ConfigError::ValidationError {
            message: "invalid setting".to_string(),
        };
        assert!(error.to_string().contains("invalid setting"));
    }

    #[test]
    fn bridge_error_display() {
        assert_eq!(BridgeError::Disabled.to_string(), "IPC bridge is disabled");
        assert!(BridgeError::Interrupted { attempt: 2 }
            .to_string()
            .contains("attempt 2"));
    }

    #[test]
    fn tool_error_wraps_bridge_error() {
        let error = ToolError::from(BridgeError::NotInitialized);
        assert_eq!(error.to_string(), "IPC bridge is not initialized");
    }
}
