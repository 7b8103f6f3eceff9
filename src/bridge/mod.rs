//! IPC bridge from the MCP server to the host process.
//!
//! ```text
//!   tool handler ──▶ IpcBridge::send ──▶ RetryPolicy ──▶ POST /mcp-ipc ──▶ host
//!                         │                   │
//!                   fail fast when      backoff d, 2d, 4d ...
//!                   disabled / not      cancelled by shutdown
//!                   initialised / shut
//!                   down
//! ```

pub mod client;
pub mod command;
pub mod retry;

pub use client::{BridgeStatistics, IpcBridge};
pub use command::{Command, CommandResponse};
pub use retry::RetryPolicy;
