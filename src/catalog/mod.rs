//! Static catalog of bridge-backed tools and resources.
//!
//! Each tool forwards its string arguments to the host action of the same
//! name and reports the host's answer as pretty-printed JSON text. Each
//! resource reads a host action live on every request.

pub mod resources;
pub mod tools;

use std::sync::Arc;

use tracing::info;

use crate::bridge::IpcBridge;
use crate::mcp::McpServer;

pub use resources::{ResourceSpec, RESOURCES};
pub use tools::{ParamSpec, ToolSpec, TOOLS};

/// Registers every catalog tool and resource on `server`.
pub fn register(server: &McpServer, bridge: &Arc<IpcBridge>) {
    for spec in TOOLS {
        server.tools().register(spec.to_tool(bridge));
    }
    for spec in RESOURCES {
        server.resources().register(spec.to_resource(bridge));
    }
    info!(
        tools = TOOLS.len(),
        resources = RESOURCES.len(),
        "Catalog registered"
    );
}
