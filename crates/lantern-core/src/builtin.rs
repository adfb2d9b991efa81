//! Registry-backed completion and definition, run ahead of addon chains.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use lsp_types::{CompletionItem, CompletionItemKind, Location, Range};

use crate::BoxFuture;
use crate::addon::{AddonError, AddonHandler, Capabilities, Hook, LoadedAddon, ProviderRequest};
use crate::symbol::SymbolKind;
use crate::tokens::dasherize_component;

/// Package name reported for the builtin link in provider chains.
pub const BUILTIN_PACKAGE: &str = "lantern:builtin";

/// Kinds a mustache or sub-expression head can refer to, in lookup order.
const HEAD_KINDS: [SymbolKind; 3] = [SymbolKind::Helper, SymbolKind::Component, SymbolKind::Modifier];
const TAG_KINDS: [SymbolKind; 1] = [SymbolKind::Component];
const ROUTE_KINDS: [SymbolKind; 1] = [SymbolKind::RoutePath];

/// File URI for a path.
pub fn uri_from_path(path: &Path) -> Option<lsp_types::Uri> {
    let url = url::Url::from_file_path(path).ok()?;
    lsp_types::Uri::from_str(url.as_str()).ok()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinProvider;

impl BuiltinProvider {
    /// Wrap as a chain link with completion and definition enabled.
    pub fn loaded() -> Arc<LoadedAddon> {
        let capabilities = Capabilities {
            completion_provider: true,
            definition_provider: true,
            ..Capabilities::default()
        };
        Arc::new(LoadedAddon::from_handler(
            BUILTIN_PACKAGE,
            Default::default(),
            capabilities,
            Arc::new(BuiltinProvider),
        ))
    }
}

/// The symbol name under the cursor and the kinds it may refer to.
fn focused_symbol(request: &ProviderRequest) -> Option<(String, &'static [SymbolKind])> {
    let focus = request.focus.as_ref()?;
    let node = focus.tree().node(focus.node());
    match node.kind.as_str() {
        "ElementNode" => {
            let tag = node.str_field("tag")?;
            let angle = tag.starts_with(|c: char| c.is_ascii_uppercase()) || tag.contains("::");
            angle.then(|| (dasherize_component(tag), &TAG_KINDS[..]))
        }
        "PathExpression" => {
            let original = node.str_field("original")?;
            if original.starts_with("this.") || original.starts_with('@') || focus.is_local(original) {
                return None;
            }
            Some((original.to_string(), &HEAD_KINDS[..]))
        }
        "StringLiteral" => {
            let value = node.str_field("value")?;
            Some((value.to_string(), &ROUTE_KINDS[..]))
        }
        _ => None,
    }
}

fn definitions(request: &ProviderRequest) -> Vec<Location> {
    let Some((name, kinds)) = focused_symbol(request) else {
        return Vec::new();
    };
    kinds
        .iter()
        .filter_map(|kind| request.registry.get(kind)?.get(&name))
        .flatten()
        .filter_map(|path| {
            Some(Location {
                uri: uri_from_path(path)?,
                range: Range::default(),
            })
        })
        .collect()
}

fn completion_kind(kind: SymbolKind) -> CompletionItemKind {
    match kind {
        SymbolKind::Component => CompletionItemKind::CLASS,
        SymbolKind::Helper | SymbolKind::Modifier => CompletionItemKind::FUNCTION,
        SymbolKind::RoutePath => CompletionItemKind::FILE,
        _ => CompletionItemKind::REFERENCE,
    }
}

fn completions(request: &ProviderRequest) -> Vec<CompletionItem> {
    let prefix = match focused_symbol(request) {
        Some((name, _)) => name,
        None => return Vec::new(),
    };
    let mut items = Vec::new();
    for kind in [SymbolKind::Component, SymbolKind::Helper, SymbolKind::Modifier] {
        let Some(names) = request.registry.get(&kind) else {
            continue;
        };
        items.extend(
            names
                .keys()
                .filter(|name| name.starts_with(&prefix) && **name != prefix)
                .map(|name| CompletionItem {
                    label: name.clone(),
                    kind: Some(completion_kind(kind)),
                    detail: Some(kind.to_string()),
                    ..CompletionItem::default()
                }),
        );
    }
    items
}

impl AddonHandler for BuiltinProvider {
    fn implements(&self, hook: Hook) -> bool {
        matches!(hook, Hook::Complete | Hook::Definition)
    }

    fn on_complete<'a>(
        &'a self,
        request: &'a ProviderRequest,
        mut results: Vec<CompletionItem>,
    ) -> BoxFuture<'a, Result<Vec<CompletionItem>, AddonError>> {
        Box::pin(async move {
            results.extend(completions(request));
            Ok(results)
        })
    }

    fn on_definition<'a>(
        &'a self,
        request: &'a ProviderRequest,
        mut results: Vec<Location>,
    ) -> BoxFuture<'a, Result<Vec<Location>, AddonError>> {
        Box::pin(async move {
            results.extend(definitions(request));
            Ok(results)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::focus::FocusPath;
    use crate::registry::{RegistryView, SymbolRegistry};
    use crate::syntax::{Field, Node, Position, SyntaxTree};
    use serde_json::Value;
    use std::path::PathBuf;

    fn request(tree: SyntaxTree, at: Position, registry: RegistryView) -> ProviderRequest {
        ProviderRequest {
            project_root: PathBuf::from("/p"),
            document: PathBuf::from("/p/app/templates/index.hbs"),
            position: lsp_types::Position::new(at.line - 1, at.column),
            focus: FocusPath::resolve(Arc::new(tree), at, None),
            registry: Arc::new(registry),
        }
    }

    fn registry() -> RegistryView {
        let registry = SymbolRegistry::new();
        registry.set_token_collection(false);
        registry.add("ui/fancy-button", SymbolKind::Component, ["/p/app/components/ui/fancy-button.js"]);
        registry.add("ui/fancy-list", SymbolKind::Component, ["/p/app/components/ui/fancy-list.js"]);
        registry.add("format-date", SymbolKind::Helper, ["/p/app/helpers/format-date.js"]);
        registry.add("posts.index", SymbolKind::RoutePath, ["/p/app/routes/posts/index.js"]);
        registry.snapshot()
    }

    fn element(tag: &str) -> SyntaxTree {
        let mut tree = SyntaxTree::new();
        let root = tree.add(Node::new("Template").with_loc(Position::new(1, 0), Position::new(1, 40)));
        let el = tree.add(
            Node::new("ElementNode")
                .with_loc(Position::new(1, 0), Position::new(1, 30))
                .with_field("tag", Field::Scalar(Value::from(tag))),
        );
        tree.push_field(root, "body", Field::List(vec![el]));
        tree
    }

    fn path_expression(original: &str) -> SyntaxTree {
        let mut tree = SyntaxTree::new();
        let root = tree.add(Node::new("Template").with_loc(Position::new(1, 0), Position::new(1, 40)));
        let path = tree.add(
            Node::new("PathExpression")
                .with_loc(Position::new(1, 2), Position::new(1, 15))
                .with_field("original", Field::Scalar(Value::from(original))),
        );
        tree.push_field(root, "body", Field::List(vec![path]));
        tree
    }

    #[tokio::test]
    async fn test_angle_bracket_definition() {
        let request = request(element("Ui::FancyButton"), Position::new(1, 3), registry());
        let found = BuiltinProvider.on_definition(&request, Vec::new()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].uri.as_str().ends_with("/p/app/components/ui/fancy-button.js"));
    }

    #[tokio::test]
    async fn test_plain_html_tag_has_no_definition() {
        let request = request(element("div"), Position::new(1, 3), registry());
        let found = BuiltinProvider.on_definition(&request, Vec::new()).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_helper_definition_keeps_prior_results() {
        let prior = Location {
            uri: uri_from_path(Path::new("/p/elsewhere.js")).unwrap(),
            range: Range::default(),
        };
        let request = request(path_expression("format-date"), Position::new(1, 4), registry());
        let found = BuiltinProvider
            .on_definition(&request, vec![prior.clone()])
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0], prior);
    }

    #[tokio::test]
    async fn test_this_paths_are_skipped() {
        let request = request(path_expression("this.formatDate"), Position::new(1, 4), registry());
        assert!(BuiltinProvider.on_definition(&request, Vec::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_completion_by_prefix() {
        let request = request(path_expression("ui/fancy"), Position::new(1, 4), registry());
        let items = BuiltinProvider.on_complete(&request, Vec::new()).await.unwrap();
        let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["ui/fancy-button", "ui/fancy-list"]);
        assert_eq!(items[0].kind, Some(CompletionItemKind::CLASS));
    }

    #[tokio::test]
    async fn test_no_focus_passes_through() {
        let request = ProviderRequest {
            project_root: PathBuf::from("/p"),
            document: PathBuf::from("/p/app/templates/index.hbs"),
            position: lsp_types::Position::new(0, 0),
            focus: None,
            registry: Arc::new(registry()),
        };
        assert!(BuiltinProvider.on_complete(&request, Vec::new()).await.unwrap().is_empty());
    }

    #[test]
    fn test_loaded_link() {
        let link = BuiltinProvider::loaded();
        assert_eq!(link.package, BUILTIN_PACKAGE);
        assert!(link.implements(Hook::Definition));
        assert!(!link.implements(Hook::Hover));
    }
}
