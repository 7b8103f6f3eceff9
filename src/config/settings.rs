//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.
//! Every section and field is optional; missing values take the defaults
//! documented on each field.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use serde::Deserialize;

use crate::bridge::RetryPolicy;
use crate::error::ConfigError;
use crate::mcp::protocol::SERVER_NAME;

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// MCP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// IPC bridge client settings.
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Reference host endpoint settings.
    #[serde(default)]
    pub host: HostConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.name.trim().is_empty() {
            return Err(invalid("server.name must not be empty"));
        }
        if self.server.http.enabled && self.server.http.port == 0 {
            return Err(invalid("server.http.port must be non-zero"));
        }
        if self.bridge.port == 0 {
            return Err(invalid("bridge.port must be non-zero"));
        }
        if self.bridge.max_attempts == 0 {
            return Err(invalid("bridge.max_attempts must be at least 1"));
        }
        if self.bridge.timeout_secs == 0 {
            return Err(invalid("bridge.timeout_secs must be at least 1"));
        }
        validate_path("bridge.path", &self.bridge.path)?;
        if self.host.port == 0 {
            return Err(invalid("host.port must be non-zero"));
        }
        validate_path("host.path", &self.host.path)?;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(invalid(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        message: message.into(),
    }
}

fn validate_path(field: &str, path: &str) -> Result<(), ConfigError> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(invalid(format!("{field} must start with '/', got '{path}'")))
    }
}

/// MCP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Name reported in `serverInfo`.
    /// Default: "mcp-host-bridge"
    #[serde(default = "default_server_name")]
    pub name: String,

    /// HTTP and SSE transport.
    #[serde(default)]
    pub http: HttpConfig,

    /// stdio transport.
    #[serde(default)]
    pub stdio: StdioConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            http: HttpConfig::default(),
            stdio: StdioConfig::default(),
        }
    }
}

fn default_server_name() -> String {
    SERVER_NAME.to_string()
}

/// HTTP transport configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    /// Serve `/mcp`, `/mcp/sse` and `/health`.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bind address. Default: 127.0.0.1
    #[serde(default = "default_bind")]
    pub bind: IpAddr,

    /// Listen port. Default: 5175
    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl HttpConfig {
    /// Socket address to listen on.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            bind: default_bind(),
            port: default_http_port(),
        }
    }
}

const fn default_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

const fn default_http_port() -> u16 {
    5175
}

/// stdio transport configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StdioConfig {
    /// Read envelopes from stdin and answer on stdout.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for StdioConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
        }
    }
}

/// IPC bridge client configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Forward commands to the host. When false every command fails fast.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Host endpoint port. Default: 9876
    #[serde(default = "default_ipc_port")]
    pub port: u16,

    /// Host endpoint path. Default: "/mcp-ipc"
    #[serde(default = "default_ipc_path")]
    pub path: String,

    /// Connect and read timeout in seconds. Default: 30
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per command, including the first. Default: 3
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay after the first failed attempt in ms; doubles each retry. Default: 500
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Time allowed for in-flight commands at shutdown. Default: 5
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Delay before the startup reachability probe in ms. Default: 2000
    #[serde(default = "default_startup_probe_delay_ms")]
    pub startup_probe_delay_ms: u64,
}

impl BridgeConfig {
    /// Connect and read timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Grace period for in-flight commands at shutdown.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Delay before the startup reachability probe.
    #[must_use]
    pub const fn startup_probe_delay(&self) -> Duration {
        Duration::from_millis(self.startup_probe_delay_ms)
    }

    /// Retry policy built from the attempt budget and initial delay.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.initial_delay_ms),
        )
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            port: default_ipc_port(),
            path: default_ipc_path(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            startup_probe_delay_ms: default_startup_probe_delay_ms(),
        }
    }
}

const fn default_ipc_port() -> u16 {
    9876
}

fn default_ipc_path() -> String {
    "/mcp-ipc".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_initial_delay_ms() -> u64 {
    500
}

const fn default_shutdown_grace_secs() -> u64 {
    5
}

const fn default_startup_probe_delay_ms() -> u64 {
    2000
}

/// Reference host endpoint configuration (`host` subcommand).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    /// Listen port on 127.0.0.1. Default: 9876
    #[serde(default = "default_ipc_port")]
    pub port: u16,

    /// Endpoint path. Default: "/mcp-ipc"
    #[serde(default = "default_ipc_path")]
    pub path: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            port: default_ipc_port(),
            path: default_ipc_path(),
        }
    }
}

const fn default_true() -> bool {
    true
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
