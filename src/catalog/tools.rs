//! Tool manifest and the bridge-backed tool handler.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::bridge::command::epoch_millis;
use crate::bridge::{Command, IpcBridge};
use crate::error::ToolError;
use crate::mcp::registry::{Tool, ToolCallResult, ToolHandler};

/// A string parameter accepted by a tool.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    /// Argument name.
    pub name: &'static str,
    /// Schema description.
    pub description: &'static str,
    /// Whether a non-blank value must be supplied.
    pub required: bool,
}

/// A tool in the manifest.
#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    /// Tool name advertised to clients.
    pub name: &'static str,
    /// Host action the tool forwards to.
    pub action: &'static str,
    /// Grouping reported by `count_by_category`.
    pub category: &'static str,
    /// Description advertised to clients.
    pub description: &'static str,
    /// Accepted arguments; anything else is dropped before forwarding.
    pub params: &'static [ParamSpec],
    /// Message reported with a successful result.
    pub success_message: &'static str,
    /// Prefix for failure messages.
    pub failure_prefix: &'static str,
}

const fn required(name: &'static str, description: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        description,
        required: true,
    }
}

const fn optional(name: &'static str, description: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        description,
        required: false,
    }
}

/// Every tool the server exposes.
pub const TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "buildWorkspace",
        action: "buildWorkspace",
        category: "workspace",
        description: "Build the current workspace, including code generation and compilation",
        params: &[],
        success_message: "Workspace build started",
        failure_prefix: "Build failed",
    },
    ToolSpec {
        name: "getWorkspaceStats",
        action: "getWorkspaceStats",
        category: "workspace",
        description: "Get workspace statistics: element, variable and language counts",
        params: &[],
        success_message: "Workspace statistics retrieved",
        failure_prefix: "Failed to get workspace statistics",
    },
    ToolSpec {
        name: "getWorkspaceSettings",
        action: "getWorkspaceSettings",
        category: "workspace",
        description: "Get the workspace settings (name, id, version, author, license)",
        params: &[],
        success_message: "Workspace settings retrieved",
        failure_prefix: "Failed to get workspace settings",
    },
    ToolSpec {
        name: "regenerateCode",
        action: "regenerateCode",
        category: "generation",
        description: "Regenerate workspace code without building",
        params: &[],
        success_message: "Code regeneration completed",
        failure_prefix: "Code regeneration failed",
    },
    ToolSpec {
        name: "listModElements",
        action: "listModElements",
        category: "elements",
        description: "List all elements in the workspace",
        params: &[optional("elementType", "Optional element type filter")],
        success_message: "Elements retrieved",
        failure_prefix: "Failed to list elements",
    },
    ToolSpec {
        name: "openElement",
        action: "openElement",
        category: "elements",
        description: "Open an element in the host application's editor",
        params: &[required("elementName", "Name of the element to open")],
        success_message: "Element opened",
        failure_prefix: "Failed to open element",
    },
    ToolSpec {
        name: "createElement",
        action: "createElement",
        category: "elements",
        description: "Create a new workspace element",
        params: &[
            required("elementType", "Type of element to create"),
            required("elementName", "Name for the new element"),
        ],
        success_message: "Element created",
        failure_prefix: "Failed to create element",
    },
    ToolSpec {
        name: "deleteElement",
        action: "deleteElement",
        category: "elements",
        description: "Delete an element from the workspace",
        params: &[required("elementName", "Name of the element to delete")],
        success_message: "Element deleted",
        failure_prefix: "Failed to delete element",
    },
    ToolSpec {
        name: "listSounds",
        action: "listSounds",
        category: "resources",
        description: "List the sounds registered in the workspace",
        params: &[],
        success_message: "Sounds retrieved",
        failure_prefix: "Failed to list sounds",
    },
    ToolSpec {
        name: "listVariables",
        action: "listVariables",
        category: "variables",
        description: "List all variables defined in the workspace",
        params: &[],
        success_message: "Variables retrieved",
        failure_prefix: "Failed to list variables",
    },
    ToolSpec {
        name: "createVariable",
        action: "createVariable",
        category: "variables",
        description: "Create a new workspace variable",
        params: &[
            required("name", "Variable name"),
            required(
                "type",
                "Variable type (number, logic, string, itemstack, blockstate, direction)",
            ),
            required(
                "scope",
                "Variable scope (GLOBAL_SESSION, GLOBAL_WORLD, GLOBAL_MAP, PLAYER_LIFETIME, PLAYER_PERSISTENT)",
            ),
        ],
        success_message: "Variable created",
        failure_prefix: "Failed to create variable",
    },
    ToolSpec {
        name: "getLocalizations",
        action: "getLocalizations",
        category: "localization",
        description: "Get workspace localization entries",
        params: &[optional("language", "Language code (e.g. 'en_us')")],
        success_message: "Localizations retrieved",
        failure_prefix: "Failed to get localizations",
    },
    ToolSpec {
        name: "runClient",
        action: "runClient",
        category: "testing",
        description: "Start the game client with the workspace loaded",
        params: &[],
        success_message: "Client started",
        failure_prefix: "Failed to start client",
    },
    ToolSpec {
        name: "runServer",
        action: "runServer",
        category: "testing",
        description: "Start a dedicated server with the workspace loaded",
        params: &[],
        success_message: "Server started",
        failure_prefix: "Failed to start server",
    },
    ToolSpec {
        name: "ping",
        action: "ping",
        category: "testing",
        description: "Check that the host application answers over the IPC bridge",
        params: &[],
        success_message: "Host reachable",
        failure_prefix: "Host unreachable",
    },
];

impl ToolSpec {
    /// JSON Schema for the tool's arguments.
    #[must_use]
    pub fn input_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| {
                (
                    p.name.to_string(),
                    json!({ "type": "string", "description": p.description }),
                )
            })
            .collect();
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Builds the registrable tool, forwarding calls through `bridge`.
    #[must_use]
    pub fn to_tool(&'static self, bridge: &Arc<IpcBridge>) -> Tool {
        Tool::new(
            self.name,
            self.description,
            self.input_schema(),
            BridgeTool {
                spec: self,
                bridge: Arc::clone(bridge),
            },
        )
        .with_category(self.category)
    }
}

/// Forwards a tool call to the host as a bridge command.
pub struct BridgeTool {
    spec: &'static ToolSpec,
    bridge: Arc<IpcBridge>,
}

impl BridgeTool {
    /// Checks required parameters and builds the command. Only declared
    /// parameters are forwarded.
    fn command(&self, arguments: &Map<String, Value>) -> Result<Command, ToolError> {
        let mut command = Command::new(self.spec.action);
        for param in self.spec.params {
            let value = arguments
                .get(param.name)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|v| !v.is_empty());
            match value {
                Some(value) => command = command.with_field(param.name, value),
                None if param.required => {
                    return Err(ToolError::InvalidArguments(format!(
                        "{} is required",
                        param.name
                    )))
                }
                None => {}
            }
        }
        Ok(command)
    }
}

#[async_trait]
impl ToolHandler for BridgeTool {
    async fn call(&self, arguments: Map<String, Value>) -> Result<ToolCallResult, ToolError> {
        let command = self.command(&arguments)?;
        debug!(tool = self.spec.name, action = self.spec.action, "Forwarding tool call");

        let response = match self.bridge.send(command).await {
            Ok(response) => response,
            Err(e) => {
                warn!(tool = self.spec.name, error = %e, "Bridge refused tool call");
                return Ok(ToolCallResult::error(format!(
                    "{}: {e}",
                    self.spec.failure_prefix
                )));
            }
        };

        if let Some(message) = response.error_message() {
            return Ok(ToolCallResult::error(format!(
                "{}: {message}",
                self.spec.failure_prefix
            )));
        }

        let body = json!({
            "success": true,
            "message": self.spec.success_message,
            "timestamp": epoch_millis(),
            "data": response.into_map(),
        });
        let text = serde_json::to_string_pretty(&body).map_err(|e| ToolError::Failed(e.to_string()))?;
        Ok(ToolCallResult::text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use std::collections::HashSet;

    fn spec(name: &str) -> &'static ToolSpec {
        TOOLS.iter().find(|t| t.name == name).unwrap()
    }

    fn disabled_bridge() -> Arc<IpcBridge> {
        let config = BridgeConfig {
            enabled: false,
            ..BridgeConfig::default()
        };
        Arc::new(IpcBridge::new(&config).unwrap())
    }

    #[test]
    fn tool_names_are_unique() {
        let names: HashSet<_> = TOOLS.iter().map(|t| t.name).collect();
        assert_eq!(names.len(), TOOLS.len());
    }

    #[test]
    fn schema_lists_required_parameters() {
        let schema = spec("createElement").input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["elementType", "elementName"]));
        assert_eq!(schema["properties"]["elementName"]["type"], "string");

        let schema = spec("listModElements").input_schema();
        assert_eq!(schema["required"], json!([]));
        assert!(schema["properties"]["elementType"].is_object());
    }

    #[test]
    fn command_carries_declared_parameters_only() {
        let tool = BridgeTool {
            spec: spec("deleteElement"),
            bridge: disabled_bridge(),
        };
        let mut arguments = Map::new();
        arguments.insert("elementName".into(), json!("  RubyOre "));
        arguments.insert("extra".into(), json!("ignored"));

        let command = tool.command(&arguments).unwrap();
        assert_eq!(command.action(), "deleteElement");
        assert_eq!(command.fields().get("elementName"), Some(&json!("RubyOre")));
        assert!(!command.fields().contains_key("extra"));
    }

    #[tokio::test]
    async fn blank_required_parameter_is_rejected() {
        let tool = BridgeTool {
            spec: spec("createVariable"),
            bridge: disabled_bridge(),
        };
        let mut arguments = Map::new();
        arguments.insert("name".into(), json!("   "));

        let err = tool.call(arguments).await.unwrap_err();
        assert_eq!(err.to_string(), "name is required");
    }

    #[tokio::test]
    async fn disabled_bridge_yields_error_result() {
        let tool = spec("ping").to_tool(&disabled_bridge());
        assert_eq!(tool.category, "testing");

        let result = tool.handler.call(Map::new()).await.unwrap();
        assert!(result.is_error);
        assert_eq!(
            result.joined_text(),
            "Host unreachable: IPC bridge is disabled"
        );
    }
}
