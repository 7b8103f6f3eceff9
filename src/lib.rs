//! mcp-host-bridge: MCP server exposing a host application's tools and resources
//!
//! The server speaks JSON-RPC 2.0 over HTTP, a single-event SSE endpoint and
//! line-delimited stdio. Tool calls and resource reads are forwarded to the
//! host application over a private loopback IPC channel.
//!
//! # Architecture
//!
//! ```text
//!   MCP client ──▶ transport ──▶ McpServer ──▶ catalog tool
//!                                                  │
//!                                              IpcBridge ──POST──▶ HostEndpoint
//!                                                                      │
//!                                                              AffinityExecutor
//! ```
//!
//! - The protocol engine never touches host state itself.
//! - Host operations that mutate state run on one designated thread.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading and validation
//! - [`error`]: Error types
//! - [`mcp`]: MCP protocol engine, registries and transports
//! - [`bridge`]: IPC client with retry and graceful shutdown
//! - [`host`]: IPC host endpoint and reference workspace
//! - [`catalog`]: Tools and resources registered at startup

pub mod bridge;
pub mod catalog;
pub mod config;
pub mod error;
pub mod host;
pub mod mcp;
