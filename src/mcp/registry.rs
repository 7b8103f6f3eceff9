//! Concurrent catalogs of tools and resources.
//!
//! Both catalogs share one [`Registry`] implementation keyed by tool name or
//! resource URI. Registration replaces an existing entry (last writer wins)
//! and logs a warning. Listing returns a snapshot sorted by key, so callers
//! never hold the lock while a handler runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ToolError;

/// Category assigned to tools registered without one.
pub const DEFAULT_CATEGORY: &str = "general";

/// An entry that can be stored in a [`Registry`].
pub trait RegistryEntry: Send + Sync {
    /// Kind of entry, used in log messages.
    const KIND: &'static str;

    /// Unique key (tool name or resource URI).
    fn key(&self) -> &str;

    /// Grouping used by [`Registry::count_by_category`].
    fn category(&self) -> &str;
}

/// A thread-safe catalog keyed by name.
pub struct Registry<T> {
    entries: RwLock<HashMap<String, Arc<T>>>,
}

impl<T: RegistryEntry> Registry<T> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts an entry, replacing any entry with the same key.
    ///
    /// Returns the replaced entry, if any.
    pub fn register(&self, entry: T) -> Option<Arc<T>> {
        let key = entry.key().to_string();
        let previous = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), Arc::new(entry));

        if previous.is_some() {
            warn!(kind = T::KIND, key = %key, "Overwriting existing registration");
        } else {
            debug!(kind = T::KIND, key = %key, "Registered");
        }
        previous
    }

    /// Looks up an entry by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Returns a snapshot of all entries, sorted by key.
    #[must_use]
    pub fn list(&self) -> Vec<Arc<T>> {
        let mut entries: Vec<_> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.key().cmp(b.key()));
        entries
    }

    /// Removes an entry. Returns `true` if it existed.
    pub fn remove(&self, key: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of registered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counts entries per category.
    #[must_use]
    pub fn count_by_category(&self) -> BTreeMap<String, usize> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut counts = BTreeMap::new();
        for entry in entries.values() {
            *counts.entry(entry.category().to_string()).or_insert(0) += 1;
        }
        counts
    }
}

impl<T: RegistryEntry> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tools
// =============================================================================

/// A tool definition for the `tools/list` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
}

/// Content item in a tool call response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
}

/// Result of a tool call.
///
/// A tool that ran but failed is still a successful protocol response, with
/// `isError` set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
    /// Whether the tool call resulted in an error.
    pub is_error: bool,
}

impl ToolCallResult {
    /// Creates a successful text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Creates an error text result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }

    /// Concatenated text of all content items.
    #[must_use]
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .map(|ToolContent::Text { text }| text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Executes a tool call.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Runs the tool with the given arguments.
    ///
    /// # Errors
    ///
    /// Any error is reported to the client as an `isError` result.
    async fn call(&self, arguments: Map<String, Value>) -> Result<ToolCallResult, ToolError>;
}

/// Adapts a synchronous closure into a [`ToolHandler`].
pub struct FnTool<F>(pub F);

#[async_trait]
impl<F> ToolHandler for FnTool<F>
where
    F: Fn(Map<String, Value>) -> Result<ToolCallResult, ToolError> + Send + Sync,
{
    async fn call(&self, arguments: Map<String, Value>) -> Result<ToolCallResult, ToolError> {
        (self.0)(arguments)
    }
}

/// A registered tool: its definition, category and handler.
#[derive(Clone)]
pub struct Tool {
    /// Definition advertised in `tools/list`.
    pub definition: ToolDefinition,
    /// Category for statistics.
    pub category: String,
    /// Handler invoked by `tools/call`.
    pub handler: Arc<dyn ToolHandler>,
}

impl Tool {
    /// Creates a tool in the default category.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: impl ToolHandler + 'static,
    ) -> Self {
        Self {
            definition: ToolDefinition {
                name: name.into(),
                description: description.into(),
                input_schema,
            },
            category: DEFAULT_CATEGORY.to_string(),
            handler: Arc::new(handler),
        }
    }

    /// Sets the category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("definition", &self.definition)
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

impl RegistryEntry for Tool {
    const KIND: &'static str = "tool";

    fn key(&self) -> &str {
        &self.definition.name
    }

    fn category(&self) -> &str {
        &self.category
    }
}

/// Catalog of tools keyed by name.
pub type ToolRegistry = Registry<Tool>;

// =============================================================================
// Resources
// =============================================================================

/// A resource descriptor for the `resources/list` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    /// Unique resource URI.
    pub uri: String,
    /// Short name.
    pub name: String,
    /// Display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// MIME type of the content.
    pub mime_type: String,
}

/// Body of a resource read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceBody {
    /// UTF-8 text.
    Text(String),
    /// Base64-encoded binary.
    Blob(String),
}

/// One item of a `resources/read` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContents {
    /// URI that was read.
    pub uri: String,
    /// MIME type of the content.
    pub mime_type: String,
    /// Text or blob.
    #[serde(flatten)]
    pub body: ResourceBody,
}

impl ResourceContents {
    /// Creates text contents.
    #[must_use]
    pub fn text(uri: impl Into<String>, mime_type: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            mime_type: mime_type.into(),
            body: ResourceBody::Text(text.into()),
        }
    }
}

/// Produces a resource's contents. Called on every read; nothing is cached.
#[async_trait]
pub trait ResourceReader: Send + Sync {
    /// Reads the resource.
    ///
    /// # Errors
    ///
    /// Any error is reported to the client as an internal error.
    async fn read(&self, uri: &str) -> Result<ResourceContents, ToolError>;
}

/// Adapts a synchronous closure into a [`ResourceReader`].
pub struct FnResource<F>(pub F);

#[async_trait]
impl<F> ResourceReader for FnResource<F>
where
    F: Fn(&str) -> Result<ResourceContents, ToolError> + Send + Sync,
{
    async fn read(&self, uri: &str) -> Result<ResourceContents, ToolError> {
        (self.0)(uri)
    }
}

/// A registered resource: its descriptor and reader.
#[derive(Clone)]
pub struct Resource {
    /// Descriptor advertised in `resources/list`.
    pub descriptor: ResourceDescriptor,
    /// Reader invoked by `resources/read`.
    pub reader: Arc<dyn ResourceReader>,
}

impl Resource {
    /// Creates a resource.
    pub fn new(descriptor: ResourceDescriptor, reader: impl ResourceReader + 'static) -> Self {
        Self {
            descriptor,
            reader: Arc::new(reader),
        }
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl RegistryEntry for Resource {
    const KIND: &'static str = "resource";

    fn key(&self) -> &str {
        &self.descriptor.uri
    }

    fn category(&self) -> &str {
        &self.descriptor.mime_type
    }
}

/// Catalog of resources keyed by URI.
pub type ResourceRegistry = Registry<Resource>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_tool(name: &str, category: &str) -> Tool {
        Tool::new(
            name,
            "echo",
            json!({"type": "object"}),
            FnTool(|_args| Ok(ToolCallResult::text("ok"))),
        )
        .with_category(category)
    }

    #[test]
    fn register_and_get() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.register(echo_tool("a", "x")).is_none());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("a").unwrap().category, "x");
        assert!(registry.get("b").is_none());
    }

    #[test]
    fn overwrite_replaces_entry() {
        let registry = ToolRegistry::new();
        registry.register(echo_tool("a", "first"));
        let previous = registry.register(echo_tool("a", "second"));
        assert_eq!(previous.unwrap().category, "first");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("a").unwrap().category, "second");
    }

    #[test]
    fn default_category_is_general() {
        let tool = Tool::new("t", "d", json!({}), FnTool(|_| Ok(ToolCallResult::text(""))));
        assert_eq!(tool.category, DEFAULT_CATEGORY);
    }

    #[test]
    fn list_is_sorted_snapshot() {
        let registry = ToolRegistry::new();
        registry.register(echo_tool("zeta", "x"));
        registry.register(echo_tool("alpha", "x"));
        let names: Vec<_> = registry
            .list()
            .iter()
            .map(|t| t.definition.name.clone())
            .collect();
        assert_eq!(names, ["alpha", "zeta"]);
    }

    #[test]
    fn remove_and_clear() {
        let registry = ToolRegistry::new();
        registry.register(echo_tool("a", "x"));
        registry.register(echo_tool("b", "x"));
        assert!(registry.remove("a"));
        assert!(!registry.remove("a"));
        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn count_by_category() {
        let registry = ToolRegistry::new();
        registry.register(echo_tool("a", "workspace"));
        registry.register(echo_tool("b", "workspace"));
        registry.register(echo_tool("c", "elements"));
        let counts = registry.count_by_category();
        assert_eq!(counts.get("workspace"), Some(&2));
        assert_eq!(counts.get("elements"), Some(&1));
    }

    #[test]
    fn concurrent_registration_is_consistent() {
        let registry = Arc::new(ToolRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|thread| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let category = if i % 2 == 0 { "even" } else { "odd" };
                        registry.register(echo_tool(&format!("t{thread}-{i}"), category));
                        // Shared keys race between threads; last writer wins.
                        registry.register(echo_tool(&format!("shared-{i}"), category));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 8 * 50 + 50);
        let counts = registry.count_by_category();
        assert_eq!(counts.values().sum::<usize>(), registry.len());
        assert_eq!(counts.get("even"), Some(&(8 * 25 + 25)));
    }

    #[tokio::test]
    async fn fn_tool_invokes_closure() {
        let handler = FnTool(|args: Map<String, Value>| {
            let message = args
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("none")
                .to_string();
            Ok(ToolCallResult::text(message))
        });
        let mut args = Map::new();
        args.insert("message".into(), json!("hi"));
        let result = handler.call(args).await.unwrap();
        assert_eq!(result.joined_text(), "hi");
        assert!(!result.is_error);
    }

    #[test]
    fn resource_category_is_mime_type() {
        let registry = ResourceRegistry::new();
        registry.register(Resource::new(
            ResourceDescriptor {
                uri: "mem://a".into(),
                name: "a".into(),
                title: None,
                description: None,
                mime_type: "application/json".into(),
            },
            FnResource(|uri: &str| Ok(ResourceContents::text(uri, "application/json", "{}"))),
        ));
        assert_eq!(registry.count_by_category().get("application/json"), Some(&1));
    }

    #[test]
    fn serialise_tool_result_always_has_is_error() {
        let json = serde_json::to_value(ToolCallResult::text("x")).unwrap();
        assert_eq!(json["isError"], json!(false));
        assert_eq!(json["content"][0]["type"], "text");
    }

    #[test]
    fn serialise_resource_contents() {
        let json = serde_json::to_value(ResourceContents::text("u", "text/plain", "hello")).unwrap();
        assert_eq!(json, json!({"uri": "u", "mimeType": "text/plain", "text": "hello"}));
    }
}
