//! In-memory reference workspace served by `mcp-host-bridge host`.
//!
//! The workspace stands in for a real host application so the bridge and
//! catalog can be exercised end to end. Reads run on any worker; mutations
//! and long-running actions are declared [`Affinity::HostThread`] so they
//! are serialised through the affinity executor.
//!
//! [`Affinity::HostThread`]: crate::host::endpoint::Affinity::HostThread

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::info;
use uuid::Uuid;

use crate::host::endpoint::{HostOperation, OperationResult, OperationTable};

/// Element types the workspace accepts.
pub const ELEMENT_TYPES: &[&str] = &[
    "block",
    "item",
    "tool",
    "armor",
    "food",
    "plant",
    "recipe",
    "procedure",
    "entity",
    "biome",
    "dimension",
    "enchantment",
    "fluid",
    "particle",
    "potion",
    "structure",
    "gui",
    "overlay",
    "command",
    "keybind",
    "tab",
];

/// Workspace metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSettings {
    /// Display name.
    pub mod_name: String,
    /// Machine identifier.
    pub mod_id: String,
    /// Project version.
    pub version: String,
    /// Free-form description.
    pub description: String,
    /// Author credit.
    pub author: String,
    /// Project homepage.
    #[serde(rename = "websiteURL")]
    pub website_url: String,
    /// License name.
    pub license: String,
    /// Version of the code generator the workspace targets.
    pub generator_version: String,
}

/// A workspace element.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    /// Unique element name.
    pub name: String,
    /// One of [`ELEMENT_TYPES`].
    #[serde(rename = "type")]
    pub element_type: String,
    /// Whether the element is locked against edits.
    pub is_locked: bool,
}

/// Value type of a workspace variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    /// Numeric value.
    Number,
    /// Boolean value.
    Logic,
    /// Text value.
    String,
    /// Item stack reference.
    Itemstack,
    /// Block state reference.
    Blockstate,
    /// Facing direction.
    Direction,
}

impl FromStr for VariableType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "number" => Ok(Self::Number),
            "logic" => Ok(Self::Logic),
            "string" => Ok(Self::String),
            "itemstack" => Ok(Self::Itemstack),
            "blockstate" => Ok(Self::Blockstate),
            "direction" => Ok(Self::Direction),
            _ => Err(format!("Invalid variable type: {s}")),
        }
    }
}

/// Lifetime of a workspace variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariableScope {
    /// Lives until the session ends.
    GlobalSession,
    /// Saved with the world.
    GlobalWorld,
    /// Saved with the map.
    GlobalMap,
    /// Per player, reset on death.
    PlayerLifetime,
    /// Per player, kept across deaths.
    PlayerPersistent,
}

impl FromStr for VariableScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GLOBAL_SESSION" => Ok(Self::GlobalSession),
            "GLOBAL_WORLD" => Ok(Self::GlobalWorld),
            "GLOBAL_MAP" => Ok(Self::GlobalMap),
            "PLAYER_LIFETIME" => Ok(Self::PlayerLifetime),
            "PLAYER_PERSISTENT" => Ok(Self::PlayerPersistent),
            _ => Err(format!("Invalid variable scope: {s}")),
        }
    }
}

impl fmt::Display for VariableScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::GlobalSession => "GLOBAL_SESSION",
            Self::GlobalWorld => "GLOBAL_WORLD",
            Self::GlobalMap => "GLOBAL_MAP",
            Self::PlayerLifetime => "PLAYER_LIFETIME",
            Self::PlayerPersistent => "PLAYER_PERSISTENT",
        };
        f.write_str(name)
    }
}

/// A workspace variable.
#[derive(Debug, Clone, Serialize)]
pub struct Variable {
    /// Unique variable name.
    pub name: String,
    /// Value type.
    #[serde(rename = "type")]
    pub variable_type: VariableType,
    /// Storage scope.
    pub scope: VariableScope,
}

/// A sound registered in the workspace.
#[derive(Debug, Clone, Serialize)]
pub struct Sound {
    /// Sound event name.
    pub name: String,
    /// Playback category (`block`, `ambient`, ...).
    pub category: String,
}

/// Something the host can launch for testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunTarget {
    /// Game client.
    Client,
    /// Dedicated server.
    Server,
}

/// Host workspace state.
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Project metadata.
    pub settings: WorkspaceSettings,
    /// Elements in creation order.
    pub elements: Vec<Element>,
    /// Variables in creation order.
    pub variables: Vec<Variable>,
    /// Registered sounds.
    pub sounds: Vec<Sound>,
    /// Language code to translation key to text.
    pub languages: BTreeMap<String, BTreeMap<String, String>>,
    /// Set by mutations, cleared by code regeneration.
    pub dirty: bool,
    /// Element currently open in the editor.
    pub open_element: Option<String>,
    /// Launched test targets.
    pub running: BTreeSet<RunTarget>,
}

impl Workspace {
    /// An empty workspace with the given settings.
    #[must_use]
    pub const fn new(settings: WorkspaceSettings) -> Self {
        Self {
            settings,
            elements: Vec::new(),
            variables: Vec::new(),
            sounds: Vec::new(),
            languages: BTreeMap::new(),
            dirty: false,
            open_element: None,
            running: BTreeSet::new(),
        }
    }

    /// A small populated workspace.
    #[must_use]
    pub fn sample() -> Self {
        let mut workspace = Self::new(WorkspaceSettings {
            mod_name: "Example Workspace".to_string(),
            mod_id: "example_workspace".to_string(),
            version: "1.0.0".to_string(),
            description: "Reference workspace served over the IPC bridge".to_string(),
            author: "mcp-host-bridge".to_string(),
            website_url: String::new(),
            license: "GPL-3.0-or-later".to_string(),
            generator_version: env!("CARGO_PKG_VERSION").to_string(),
        });

        for (name, element_type) in [
            ("RubyOre", "block"),
            ("RubyGem", "item"),
            ("RubyPickaxe", "tool"),
            ("OnRubyMined", "procedure"),
        ] {
            workspace.elements.push(Element {
                name: name.to_string(),
                element_type: element_type.to_string(),
                is_locked: false,
            });
        }

        workspace.variables.push(Variable {
            name: "rubiesMined".to_string(),
            variable_type: VariableType::Number,
            scope: VariableScope::PlayerPersistent,
        });

        for (name, category) in [("ruby_ore_break", "block"), ("cave_hum", "ambient")] {
            workspace.sounds.push(Sound {
                name: name.to_string(),
                category: category.to_string(),
            });
        }

        let en = BTreeMap::from([
            ("block.example_workspace.ruby_ore".to_string(), "Ruby Ore".to_string()),
            ("item.example_workspace.ruby_gem".to_string(), "Ruby".to_string()),
        ]);
        workspace.languages.insert("en_us".to_string(), en);
        workspace
    }

    fn element(&self, name: &str) -> Option<usize> {
        self.elements.iter().position(|e| e.name == name)
    }

    fn elements_by_type(&self) -> BTreeMap<&str, u64> {
        let mut counts = BTreeMap::new();
        for element in &self.elements {
            *counts.entry(element.element_type.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

/// Shared handle to the workspace.
pub type SharedWorkspace = Arc<RwLock<Workspace>>;

/// Builds the host operation table over `workspace`.
#[must_use]
pub fn operations(workspace: &SharedWorkspace) -> OperationTable {
    let mut table = OperationTable::new();

    table.register(
        "ping",
        HostOperation::any(|_| {
            Ok(object(json!({
                "pong": true,
                "hostVersion": env!("CARGO_PKG_VERSION"),
            })))
        }),
    );

    let ws = Arc::clone(workspace);
    table.register("getWorkspaceStats", HostOperation::any(move |_| read(&ws, stats)));

    let ws = Arc::clone(workspace);
    table.register(
        "getWorkspaceSettings",
        HostOperation::any(move |_| {
            read(&ws, |w| {
                serde_json::to_value(&w.settings)
                    .map(object)
                    .map_err(|e| e.to_string())
            })
        }),
    );

    let ws = Arc::clone(workspace);
    table.register(
        "listModElements",
        HostOperation::any(move |command| read(&ws, |w| list_elements(w, command))),
    );

    let ws = Arc::clone(workspace);
    table.register(
        "openElement",
        HostOperation::host_thread(move |command| write(&ws, |w| open_element(w, command))),
    );

    let ws = Arc::clone(workspace);
    table.register(
        "createElement",
        HostOperation::host_thread(move |command| write(&ws, |w| create_element(w, command))),
    );

    let ws = Arc::clone(workspace);
    table.register(
        "deleteElement",
        HostOperation::host_thread(move |command| write(&ws, |w| delete_element(w, command))),
    );

    let ws = Arc::clone(workspace);
    table.register(
        "listVariables",
        HostOperation::any(move |_| {
            read(&ws, |w| {
                Ok(object(json!({
                    "variables": w.variables,
                    "count": w.variables.len(),
                })))
            })
        }),
    );

    let ws = Arc::clone(workspace);
    table.register(
        "listSounds",
        HostOperation::any(move |_| {
            read(&ws, |w| {
                Ok(object(json!({
                    "sounds": w.sounds,
                    "count": w.sounds.len(),
                })))
            })
        }),
    );

    let ws = Arc::clone(workspace);
    table.register(
        "createVariable",
        HostOperation::host_thread(move |command| write(&ws, |w| create_variable(w, command))),
    );

    let ws = Arc::clone(workspace);
    table.register(
        "getLocalizations",
        HostOperation::any(move |command| read(&ws, |w| localizations(w, command))),
    );

    table.register(
        "buildWorkspace",
        HostOperation::host_thread(|_| {
            let build_id = Uuid::new_v4().to_string();
            info!(build_id = %build_id, "Workspace build started");
            Ok(object(json!({
                "success": true,
                "message": "Build started",
                "buildId": build_id,
            })))
        }),
    );

    let ws = Arc::clone(workspace);
    table.register(
        "regenerateCode",
        HostOperation::host_thread(move |_| {
            write(&ws, |w| {
                w.dirty = false;
                Ok(object(json!({
                    "success": true,
                    "message": "Code regeneration started",
                })))
            })
        }),
    );

    for (action, target, message) in [
        ("runClient", RunTarget::Client, "Client started"),
        ("runServer", RunTarget::Server, "Server started"),
    ] {
        let ws = Arc::clone(workspace);
        table.register(
            action,
            HostOperation::host_thread(move |_| {
                write(&ws, |w| {
                    w.running.insert(target);
                    info!(launched = ?target, "Test target launched");
                    Ok(object(json!({ "success": true, "message": message })))
                })
            }),
        );
    }

    table
}

fn read<F>(workspace: &SharedWorkspace, f: F) -> OperationResult
where
    F: FnOnce(&Workspace) -> OperationResult,
{
    f(&workspace.read().unwrap_or_else(PoisonError::into_inner))
}

fn write<F>(workspace: &SharedWorkspace, f: F) -> OperationResult
where
    F: FnOnce(&mut Workspace) -> OperationResult,
{
    f(&mut workspace.write().unwrap_or_else(PoisonError::into_inner))
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn required<'a>(command: &'a Map<String, Value>, key: &str) -> Result<&'a str, String> {
    command
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required field: {key}"))
}

fn optional<'a>(command: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    command
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[allow(clippy::unnecessary_wraps)]
fn stats(w: &Workspace) -> OperationResult {
    Ok(object(json!({
        "modElementCount": w.elements.len(),
        "variableCount": w.variables.len(),
        "languageCount": w.languages.len(),
        "soundCount": w.sounds.len(),
        "elementsByType": w.elements_by_type(),
        "workspaceName": w.settings.mod_name,
        "workspaceVersion": w.settings.version,
        "dirty": w.dirty,
        "openElement": w.open_element,
        "running": w.running,
    })))
}

#[allow(clippy::unnecessary_wraps)]
fn list_elements(w: &Workspace, command: &Map<String, Value>) -> OperationResult {
    let filter = optional(command, "elementType");
    let elements: Vec<&Element> = w
        .elements
        .iter()
        .filter(|e| filter.map_or(true, |f| e.element_type.eq_ignore_ascii_case(f)))
        .collect();

    Ok(object(json!({
        "totalCount": elements.len(),
        "elements": elements,
        "filter": filter,
    })))
}

fn create_element(w: &mut Workspace, command: &Map<String, Value>) -> OperationResult {
    let element_type = required(command, "elementType")?.to_ascii_lowercase();
    let name = required(command, "elementName")?;

    if !ELEMENT_TYPES.contains(&element_type.as_str()) {
        return Err(format!("Unknown element type: {element_type}"));
    }
    if w.element(name).is_some() {
        return Err(format!("Element already exists: {name}"));
    }

    w.elements.push(Element {
        name: name.to_string(),
        element_type: element_type.clone(),
        is_locked: false,
    });
    w.dirty = true;
    info!(name, element_type = %element_type, "Element created");

    Ok(object(json!({
        "success": true,
        "message": format!("Element created: {name}"),
        "elementType": element_type,
    })))
}

fn open_element(w: &mut Workspace, command: &Map<String, Value>) -> OperationResult {
    let name = required(command, "elementName")?;
    if w.element(name).is_none() {
        return Err(format!("Element not found: {name}"));
    }

    w.open_element = Some(name.to_string());
    Ok(object(json!({
        "success": true,
        "message": format!("Element opened: {name}"),
    })))
}

fn delete_element(w: &mut Workspace, command: &Map<String, Value>) -> OperationResult {
    let name = required(command, "elementName")?;
    let index = w
        .element(name)
        .ok_or_else(|| format!("Element not found: {name}"))?;

    w.elements.remove(index);
    if w.open_element.as_deref() == Some(name) {
        w.open_element = None;
    }
    w.dirty = true;
    info!(name, "Element deleted");

    Ok(object(json!({
        "success": true,
        "message": format!("Element deleted: {name}"),
    })))
}

fn create_variable(w: &mut Workspace, command: &Map<String, Value>) -> OperationResult {
    let name = required(command, "name")?;
    let variable_type: VariableType = required(command, "type")?.parse()?;
    let scope: VariableScope = required(command, "scope")?.parse()?;

    if w.variables.iter().any(|v| v.name == name) {
        return Err(format!("Variable already exists: {name}"));
    }

    let variable = Variable {
        name: name.to_string(),
        variable_type,
        scope,
    };
    let mut response = object(json!({
        "success": true,
        "message": format!("Variable created: {name}"),
        "scope": scope.to_string(),
    }));
    response.insert("name".to_string(), json!(variable.name));
    response.insert("type".to_string(), json!(variable.variable_type));

    w.variables.push(variable);
    w.dirty = true;
    Ok(response)
}

fn localizations(w: &Workspace, command: &Map<String, Value>) -> OperationResult {
    match optional(command, "language") {
        Some(language) => {
            let entries = w
                .languages
                .get(language)
                .ok_or_else(|| format!("Language not found: {language}"))?;
            Ok(object(json!({
                "language": language,
                "entries": entries,
                "count": entries.len(),
            })))
        }
        None => Ok(object(json!({
            "languages": w.languages,
            "availableLanguages": w.languages.keys().collect::<Vec<_>>(),
        }))),
    }
}
