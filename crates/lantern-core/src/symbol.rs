//! Symbol vocabulary shared by the path matchers and the registry.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Registry kind of a file-system-located symbol.
///
/// This is a closed set: every classification that reaches the registry is
/// folded into one of these seven kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SymbolKind {
    Transform,
    Helper,
    Component,
    RoutePath,
    Model,
    Service,
    Modifier,
}

impl SymbolKind {
    /// All kinds, in declaration order.
    pub const ALL: [SymbolKind; 7] = [
        SymbolKind::Transform,
        SymbolKind::Helper,
        SymbolKind::Component,
        SymbolKind::RoutePath,
        SymbolKind::Model,
        SymbolKind::Service,
        SymbolKind::Modifier,
    ];

    /// The wire name (`routePath`, `component`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Transform => "transform",
            SymbolKind::Helper => "helper",
            SymbolKind::Component => "component",
            SymbolKind::RoutePath => "routePath",
            SymbolKind::Model => "model",
            SymbolKind::Service => "service",
            SymbolKind::Modifier => "modifier",
        }
    }

    /// Map a classification onto its registry `(kind, name)` pair.
    ///
    /// Routes, controllers and route templates collapse into
    /// [`SymbolKind::RoutePath`] with a dotted name. Adapters, serializers
    /// and utils are not registry kinds.
    pub fn from_match(result: &MatchResult) -> Option<(SymbolKind, String)> {
        let kind = match result.symbol_type {
            SymbolType::Transform => SymbolKind::Transform,
            SymbolType::Helper => SymbolKind::Helper,
            SymbolType::Component => SymbolKind::Component,
            SymbolType::Model => SymbolKind::Model,
            SymbolType::Service => SymbolKind::Service,
            SymbolType::Modifier => SymbolKind::Modifier,
            SymbolType::Route | SymbolType::Controller | SymbolType::Template => {
                return Some((SymbolKind::RoutePath, route_name(&result.name)));
            }
            SymbolType::Adapter | SymbolType::Serializer | SymbolType::Util => return None,
        };
        Some((kind, result.name.clone()))
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SymbolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SymbolKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown symbol kind: {s}"))
    }
}

/// Turn a slash-separated route file name into a dotted route name.
///
/// `foo/index` → `foo.index`, `posts/post/edit` → `posts.post.edit`.
pub fn route_name(name: &str) -> String {
    name.trim_matches('/').replace('/', ".")
}

/// Type reported by a layout matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SymbolType {
    Adapter,
    Serializer,
    Controller,
    Helper,
    Model,
    Transform,
    Service,
    Component,
    Modifier,
    Template,
    Route,
    Util,
}

impl fmt::Display for SymbolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SymbolType::Adapter => "adapter",
            SymbolType::Serializer => "serializer",
            SymbolType::Controller => "controller",
            SymbolType::Helper => "helper",
            SymbolType::Model => "model",
            SymbolType::Transform => "transform",
            SymbolType::Service => "service",
            SymbolType::Component => "component",
            SymbolType::Modifier => "modifier",
            SymbolType::Template => "template",
            SymbolType::Route => "route",
            SymbolType::Util => "util",
        };
        f.write_str(name)
    }
}

/// Whether a file belongs to the application or to an addon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Addon,
    Application,
}

/// What sort of file was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Test,
    Script,
    Template,
    Style,
}

/// Classification of a single path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    #[serde(rename = "type")]
    pub symbol_type: SymbolType,
    pub name: String,
    pub scope: Scope,
    pub kind: FileKind,
}
