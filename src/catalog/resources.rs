//! Workspace resources read live through the bridge.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::bridge::{Command, IpcBridge};
use crate::error::ToolError;
use crate::mcp::registry::{Resource, ResourceContents, ResourceDescriptor, ResourceReader};

const JSON_MIME: &str = "application/json";

/// A resource in the manifest.
#[derive(Debug, Clone, Copy)]
pub struct ResourceSpec {
    /// Address clients read.
    pub uri: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Description advertised to clients.
    pub description: &'static str,
    /// Host action whose response becomes the resource body.
    pub action: &'static str,
    /// Key that holds the listing when the host reports an error.
    pub empty_key: Option<&'static str>,
}

/// Every resource the server exposes.
pub const RESOURCES: &[ResourceSpec] = &[
    ResourceSpec {
        uri: "workspace://overview",
        name: "Workspace Overview",
        description: "Live workspace statistics",
        action: "getWorkspaceStats",
        empty_key: None,
    },
    ResourceSpec {
        uri: "workspace://settings",
        name: "Workspace Settings",
        description: "Workspace metadata: name, id, version, author and license",
        action: "getWorkspaceSettings",
        empty_key: None,
    },
    ResourceSpec {
        uri: "workspace://elements",
        name: "Workspace Elements",
        description: "All elements in the workspace with their types",
        action: "listModElements",
        empty_key: Some("elements"),
    },
    ResourceSpec {
        uri: "workspace://variables",
        name: "Workspace Variables",
        description: "All variables defined in the workspace with their types and scopes",
        action: "listVariables",
        empty_key: Some("variables"),
    },
    ResourceSpec {
        uri: "workspace://sounds",
        name: "Workspace Sounds",
        description: "Sounds registered in the workspace with their categories",
        action: "listSounds",
        empty_key: Some("sounds"),
    },
];

impl ResourceSpec {
    /// Builds the registrable resource, reading through `bridge`.
    #[must_use]
    pub fn to_resource(&'static self, bridge: &Arc<IpcBridge>) -> Resource {
        Resource::new(
            ResourceDescriptor {
                uri: self.uri.to_string(),
                name: self.name.to_string(),
                title: None,
                description: Some(self.description.to_string()),
                mime_type: JSON_MIME.to_string(),
            },
            BridgeResource {
                spec: self,
                bridge: Arc::clone(bridge),
            },
        )
    }
}

/// Reads a resource by sending its action to the host.
pub struct BridgeResource {
    spec: &'static ResourceSpec,
    bridge: Arc<IpcBridge>,
}

#[async_trait]
impl ResourceReader for BridgeResource {
    /// Host-reported errors are embedded in the document; a refused bridge
    /// call fails the read.
    async fn read(&self, uri: &str) -> Result<ResourceContents, ToolError> {
        let response = self.bridge.send(Command::new(self.spec.action)).await?;

        let mut document = json!({
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        if let Value::Object(fields) = &mut document {
            match response.error_message() {
                Some(message) => {
                    fields.insert("error".to_string(), Value::String(message));
                    if let Some(key) = self.spec.empty_key {
                        fields.insert(key.to_string(), json!([]));
                    }
                }
                None => fields.extend(response.into_map()),
            }
        }

        let text =
            serde_json::to_string_pretty(&document).map_err(|e| ToolError::Failed(e.to_string()))?;
        Ok(ResourceContents::text(uri, JSON_MIME, text))
    }
}
