//! Handler trait and the per-capability provider chains.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use lsp_types::{CodeActionOrCommand, CompletionItem, Hover, Location};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::BoxFuture;
use crate::focus::FocusPath;
use crate::registry::RegistryView;

use super::manifest::{AddonMeta, Capabilities};
use super::{AddonError, LoadedAddon};

/// Hooks a handler can implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Hook {
    Init,
    Complete,
    Definition,
    References,
    Hover,
    CodeAction,
}

/// Request kinds served by provider chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    Completion,
    Definition,
    Hover,
    References,
    CodeAction,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::Completion,
        Capability::Definition,
        Capability::Hover,
        Capability::References,
        Capability::CodeAction,
    ];

    pub fn hook(self) -> Hook {
        match self {
            Capability::Completion => Hook::Complete,
            Capability::Definition => Hook::Definition,
            Capability::Hover => Hook::Hover,
            Capability::References => Hook::References,
            Capability::CodeAction => Hook::CodeAction,
        }
    }

    /// Whether the declared flags turn this capability on.
    pub fn enabled_in(self, capabilities: &Capabilities) -> bool {
        match self {
            Capability::Completion => capabilities.completion_provider,
            Capability::Definition => capabilities.definition_provider,
            Capability::Hover => capabilities.hover_provider,
            Capability::References => capabilities.references_provider.enabled(),
            Capability::CodeAction => capabilities.code_action_provider,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Completion => "completion",
            Capability::Definition => "definition",
            Capability::Hover => "hover",
            Capability::References => "references",
            Capability::CodeAction => "codeAction",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .into_iter()
            .find(|c| c.to_string() == s)
            .ok_or_else(|| format!("unknown capability: {s}"))
    }
}

/// Cleanup returned by `on_init`, run when the project unloads.
pub type Destructor = Box<dyn FnOnce() -> Result<(), AddonError> + Send>;

/// What a handler sees when its project initializes.
#[derive(Debug, Clone)]
pub struct InitContext {
    pub root: PathBuf,
    pub pod_prefix: Option<String>,
    pub addons: Vec<AddonMeta>,
}

/// Everything a provider needs to answer one request.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub project_root: PathBuf,
    pub document: PathBuf,
    pub position: lsp_types::Position,
    pub focus: Option<FocusPath>,
    pub registry: Arc<RegistryView>,
}

impl ProviderRequest {
    /// Text of the focused node, when source was supplied.
    pub fn focused_text(&self) -> Option<String> {
        let focus = self.focus.as_ref()?;
        focus.source_for_node(focus.node())
    }
}

/// Extension code contributed by an addon.
///
/// Every hook has a pass-through default. Each provider receives the
/// results accumulated so far and returns the new list.
pub trait AddonHandler: Send + Sync {
    /// Whether this handler provides `hook`. Chains only include handlers
    /// that say yes.
    fn implements(&self, hook: Hook) -> bool;

    fn on_init<'a>(
        &'a self,
        _context: &'a InitContext,
    ) -> BoxFuture<'a, Result<Option<Destructor>, AddonError>> {
        Box::pin(async { Ok(None) })
    }

    fn on_complete<'a>(
        &'a self,
        _request: &'a ProviderRequest,
        results: Vec<CompletionItem>,
    ) -> BoxFuture<'a, Result<Vec<CompletionItem>, AddonError>> {
        Box::pin(async move { Ok(results) })
    }

    fn on_definition<'a>(
        &'a self,
        _request: &'a ProviderRequest,
        results: Vec<Location>,
    ) -> BoxFuture<'a, Result<Vec<Location>, AddonError>> {
        Box::pin(async move { Ok(results) })
    }

    fn on_references<'a>(
        &'a self,
        _request: &'a ProviderRequest,
        results: Vec<Location>,
    ) -> BoxFuture<'a, Result<Vec<Location>, AddonError>> {
        Box::pin(async move { Ok(results) })
    }

    fn on_hover<'a>(
        &'a self,
        _request: &'a ProviderRequest,
        results: Vec<Hover>,
    ) -> BoxFuture<'a, Result<Vec<Hover>, AddonError>> {
        Box::pin(async move { Ok(results) })
    }

    fn on_code_action<'a>(
        &'a self,
        _request: &'a ProviderRequest,
        results: Vec<CodeActionOrCommand>,
    ) -> BoxFuture<'a, Result<Vec<CodeActionOrCommand>, AddonError>> {
        Box::pin(async move { Ok(results) })
    }
}

/// Static dispatch from a chain runner to one handler method.
pub trait ChainHook {
    type Item: Clone + Send + 'static;
    const CAPABILITY: Capability;

    fn call<'a>(
        handler: &'a dyn AddonHandler,
        request: &'a ProviderRequest,
        results: Vec<Self::Item>,
    ) -> BoxFuture<'a, Result<Vec<Self::Item>, AddonError>>;
}

macro_rules! chain_hook {
    ($name:ident, $item:ty, $capability:expr, $method:ident) => {
        pub struct $name;

        impl ChainHook for $name {
            type Item = $item;
            const CAPABILITY: Capability = $capability;

            fn call<'a>(
                handler: &'a dyn AddonHandler,
                request: &'a ProviderRequest,
                results: Vec<Self::Item>,
            ) -> BoxFuture<'a, Result<Vec<Self::Item>, AddonError>> {
                handler.$method(request, results)
            }
        }
    };
}

chain_hook!(CompletionHook, CompletionItem, Capability::Completion, on_complete);
chain_hook!(DefinitionHook, Location, Capability::Definition, on_definition);
chain_hook!(ReferencesHook, Location, Capability::References, on_references);
chain_hook!(HoverHook, Hover, Capability::Hover, on_hover);
chain_hook!(CodeActionHook, CodeActionOrCommand, Capability::CodeAction, on_code_action);

/// Run `links` in order, threading the accumulated results through. A
/// failing provider is logged and skipped; the results it received pass on
/// unchanged.
pub async fn run_chain<H: ChainHook>(
    links: &[Arc<LoadedAddon>],
    request: &ProviderRequest,
) -> Vec<H::Item> {
    let mut results = Vec::new();
    for link in links {
        let handler = link.handler();
        let prior = results.clone();
        match H::call(handler.as_ref(), request, results).await {
            Ok(next) => results = next,
            Err(e) => {
                warn!(
                    addon = %link.package,
                    capability = %H::CAPABILITY,
                    error = %e,
                    "Provider failed, keeping prior results"
                );
                results = prior;
            }
        }
    }
    results
}

/// Ordered provider chains for one project.
#[derive(Default)]
pub struct ProjectProviders {
    pub completion: Vec<Arc<LoadedAddon>>,
    pub definition: Vec<Arc<LoadedAddon>>,
    pub hover: Vec<Arc<LoadedAddon>>,
    pub references: Vec<Arc<LoadedAddon>>,
    pub code_action: Vec<Arc<LoadedAddon>>,
    /// Addons whose `on_init` runs when the project loads.
    pub init_functions: Vec<Arc<LoadedAddon>>,
    /// One human-readable line per loaded extension.
    pub info: Vec<String>,
    pub addons_meta: Vec<AddonMeta>,
}

impl fmt::Debug for ProjectProviders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectProviders")
            .field("summary", &self.summary())
            .finish()
    }
}

/// Serializable view of the chains.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvidersSummary {
    pub completion: Vec<String>,
    pub definition: Vec<String>,
    pub hover: Vec<String>,
    pub references: Vec<String>,
    pub code_action: Vec<String>,
    pub init_functions: Vec<String>,
    pub info: Vec<String>,
    pub addons_meta: Vec<AddonMeta>,
}

fn names(links: &[Arc<LoadedAddon>]) -> Vec<String> {
    links.iter().map(|link| link.package.clone()).collect()
}

impl ProjectProviders {
    pub fn chain(&self, capability: Capability) -> &[Arc<LoadedAddon>] {
        match capability {
            Capability::Completion => &self.completion,
            Capability::Definition => &self.definition,
            Capability::Hover => &self.hover,
            Capability::References => &self.references,
            Capability::CodeAction => &self.code_action,
        }
    }

    fn chain_mut(&mut self, capability: Capability) -> &mut Vec<Arc<LoadedAddon>> {
        match capability {
            Capability::Completion => &mut self.completion,
            Capability::Definition => &mut self.definition,
            Capability::Hover => &mut self.hover,
            Capability::References => &mut self.references,
            Capability::CodeAction => &mut self.code_action,
        }
    }

    pub fn summary(&self) -> ProvidersSummary {
        ProvidersSummary {
            completion: names(&self.completion),
            definition: names(&self.definition),
            hover: names(&self.hover),
            references: names(&self.references),
            code_action: names(&self.code_action),
            init_functions: names(&self.init_functions),
            info: self.info.clone(),
            addons_meta: self.addons_meta.clone(),
        }
    }
}

/// Assemble chains from addons already in dependency order.
pub fn build_providers(ordered: Vec<Arc<LoadedAddon>>, addons_meta: Vec<AddonMeta>) -> ProjectProviders {
    let mut providers = ProjectProviders {
        addons_meta,
        ..ProjectProviders::default()
    };

    for addon in ordered {
        providers.info.push(format!(
            "{} ({}){}",
            addon.package,
            addon.root.display(),
            if addon.debug { " [debug]" } else { "" }
        ));
        if addon.implements(Hook::Init) {
            providers.init_functions.push(Arc::clone(&addon));
        }
        for capability in Capability::ALL {
            if capability.enabled_in(&addon.capabilities) && addon.implements(capability.hook()) {
                providers.chain_mut(capability).push(Arc::clone(&addon));
            }
        }
        debug!(addon = %addon.package, "Provider chains updated");
    }
    providers
}
