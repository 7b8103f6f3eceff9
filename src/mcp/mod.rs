//! Model Context Protocol (MCP) server implementation.
//!
//! One protocol engine serves every transport. Transports only frame
//! messages; classification, dispatch and error mapping live in
//! [`McpServer`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          MCP Server                          │
//! │                                                              │
//! │   ┌─────────────┐    ┌─────────────┐    ┌───────────────┐    │
//! │   │  Transports │───▶│   Engine    │───▶│  Registries   │    │
//! │   │ stdio / http│    │ (dispatch)  │    │ tools / res.  │    │
//! │   │    / sse    │    └─────────────┘    └───────────────┘    │
//! │   └─────────────┘           │                   │            │
//! │          │                  ▼                   ▼            │
//! │   ┌──────────────────────────────────────────────────────┐   │
//! │   │               JSON-RPC 2.0 envelopes                 │   │
//! │   └──────────────────────────────────────────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol Version
//!
//! Clients may request any of [`protocol::SUPPORTED_PROTOCOL_VERSIONS`];
//! anything else is answered with [`protocol::LATEST_PROTOCOL_VERSION`].

pub mod http;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod transport;

pub use protocol::{JsonRpcResponse, Message, RequestId, LATEST_PROTOCOL_VERSION};
pub use registry::{Resource, ResourceRegistry, Tool, ToolRegistry};
pub use server::{McpServer, MethodHandler, ServerInfo};
pub use transport::StdioTransport;
