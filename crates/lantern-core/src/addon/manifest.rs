//! `package.json` as far as addon discovery cares.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::fs::FileSystem;

use super::AddonError;

/// Keyword marking a package as an addon.
pub const ADDON_KEYWORD: &str = "ember-addon";

/// Entry script assumed when `main` is absent.
pub const DEFAULT_ENTRY: &str = "index.js";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub main: Option<String>,
    #[serde(default, deserialize_with = "string_list")]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub dependencies: IndexMap<String, Value>,
    #[serde(default)]
    pub peer_dependencies: IndexMap<String, Value>,
    #[serde(default)]
    pub dev_dependencies: IndexMap<String, Value>,
    #[serde(default, rename = "ember-addon")]
    pub ember_addon: Option<EmberAddonBlock>,
    /// Absent when the block is missing, malformed or has no `entry`.
    #[serde(default, rename = "ember-language-server", deserialize_with = "extension_block")]
    pub extension: Option<ExtensionBlock>,
}

/// The `ember-addon` block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmberAddonBlock {
    #[serde(default)]
    pub version: Option<Value>,
    /// Extra in-repo addon directories, relative to the package root.
    #[serde(default, deserialize_with = "string_list")]
    pub paths: Vec<String>,
}

/// The `ember-language-server` extension block.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ExtensionBlock {
    pub entry: String,
    #[serde(default)]
    pub capabilities: Capabilities,
    /// Packages this one must run before.
    #[serde(default, deserialize_with = "string_list")]
    pub before: Vec<String>,
    /// Packages this one must run after.
    #[serde(default, deserialize_with = "string_list")]
    pub after: Vec<String>,
    #[serde(default, deserialize_with = "truthy")]
    pub debug: bool,
}

/// Capability flags declared by an extension. Any truthy value enables a
/// flag, so option objects such as `{"triggerCharacters": ["."]}` count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    #[serde(default, deserialize_with = "truthy")]
    pub completion_provider: bool,
    #[serde(default, deserialize_with = "truthy")]
    pub definition_provider: bool,
    #[serde(default, deserialize_with = "truthy")]
    pub hover_provider: bool,
    #[serde(default, deserialize_with = "truthy")]
    pub code_action_provider: bool,
    #[serde(default, deserialize_with = "references_capability")]
    pub references_provider: ReferencesCapability,
}

/// `referencesProvider` is either a flag or `{ "components": bool }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReferencesCapability {
    Flag(bool),
    Scoped { components: bool },
}

impl Default for ReferencesCapability {
    fn default() -> Self {
        ReferencesCapability::Flag(false)
    }
}

impl ReferencesCapability {
    pub fn enabled(self) -> bool {
        match self {
            ReferencesCapability::Flag(flag) => flag,
            ReferencesCapability::Scoped { components } => components,
        }
    }
}

/// What the rest of the system knows about a discovered package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonMeta {
    pub name: String,
    pub root: PathBuf,
    /// `None` for packages that are not addons.
    pub version: Option<u8>,
}

impl PackageManifest {
    pub fn parse(path: &Path, text: &str) -> Result<Self, AddonError> {
        serde_json::from_str(text).map_err(|source| AddonError::ManifestParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read `<root>/package.json`.
    pub async fn read(fs: &dyn FileSystem, root: &Path) -> Result<Self, AddonError> {
        let path = root.join("package.json");
        let text = fs
            .read_file(&path)
            .await
            .map_err(|source| AddonError::ManifestRead {
                path: path.clone(),
                source,
            })?;
        Self::parse(&path, &text)
    }

    pub fn is_addon(&self) -> bool {
        self.keywords.iter().any(|k| k == ADDON_KEYWORD)
    }

    /// `2` when `ember-addon.version` says so, `1` for other addons, `None`
    /// for plain packages.
    pub fn addon_version(&self) -> Option<u8> {
        if !self.is_addon() {
            return None;
        }
        let declared = self
            .ember_addon
            .as_ref()
            .and_then(|block| block.version.as_ref());
        let is_v2 = match declared {
            Some(Value::Number(n)) => n.as_u64() == Some(2),
            Some(Value::String(s)) => s.trim() == "2",
            _ => false,
        };
        Some(if is_v2 { 2 } else { 1 })
    }

    /// Script a package is entered through.
    pub fn entry_script(&self) -> &str {
        self.main.as_deref().unwrap_or(DEFAULT_ENTRY)
    }

    pub fn in_repo_paths(&self) -> &[String] {
        self.ember_addon
            .as_ref()
            .map(|block| block.paths.as_slice())
            .unwrap_or_default()
    }

    pub fn meta(&self, root: &Path) -> AddonMeta {
        AddonMeta {
            name: self.name.clone(),
            root: root.to_path_buf(),
            version: self.addon_version(),
        }
    }
}

/// Accept a string, a list of strings, or null. Non-string list items are
/// dropped.
fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => vec![s],
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

fn extension_block<'de, D>(deserializer: D) -> Result<Option<ExtensionBlock>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|value| serde_json::from_value::<ExtensionBlock>(value).ok())
        .filter(|block| !block.entry.trim().is_empty()))
}

fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(is_truthy(&Value::deserialize(deserializer)?))
}

fn references_capability<'de, D>(deserializer: D) -> Result<ReferencesCapability, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => ReferencesCapability::Scoped {
            components: map.get("components").is_some_and(is_truthy),
        },
        other => ReferencesCapability::Flag(is_truthy(&other)),
    })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
