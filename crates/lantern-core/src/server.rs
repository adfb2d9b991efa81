//! The language-server backend: loaded projects over one shared registry.
//!
//! Editor requests arrive as [`DocumentRequest`]s. The server finds the
//! owning project, resolves the focus path when a tree is supplied, and runs
//! the capability's provider chain with builtins first.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lsp_types::{CodeActionOrCommand, CompletionItem, Hover, Location};
use tracing::{debug, info, warn};

use lantern_config::AppConfig;

use crate::addon::providers::{
    ChainHook, CodeActionHook, CompletionHook, DefinitionHook, HoverHook, ProvidersSummary,
    ReferencesHook, run_chain,
};
use crate::addon::{AddonCatalog, ProviderRequest};
use crate::builtin::BuiltinProvider;
use crate::focus::FocusPath;
use crate::fs::FileSystem;
use crate::indexer::{IndexReport, index_project};
use crate::project::{
    FileChange, Project, ProjectError, ProjectOptions, ProjectRoots, ProjectStatus,
    detect_pod_prefix,
};
use crate::registry::{RegistryView, SymbolRegistry};
use crate::symbol::MatchResult;
use crate::syntax::{Position, SyntaxTree};

/// One editor request against a document.
#[derive(Debug, Clone)]
pub struct DocumentRequest {
    pub document: PathBuf,
    /// Zero-based editor position.
    pub position: lsp_types::Position,
    /// Parsed tree of the document, if the caller has one.
    pub tree: Option<Arc<SyntaxTree>>,
    pub source: Option<String>,
}

impl DocumentRequest {
    pub fn new(document: impl Into<PathBuf>, position: lsp_types::Position) -> Self {
        Self {
            document: document.into(),
            position,
            tree: None,
            source: None,
        }
    }

    pub fn with_tree(mut self, tree: Arc<SyntaxTree>, source: Option<String>) -> Self {
        self.tree = Some(tree);
        self.source = source;
        self
    }
}

pub struct Server {
    config: AppConfig,
    fs: Arc<dyn FileSystem>,
    catalog: Arc<AddonCatalog>,
    registry: Arc<SymbolRegistry>,
    projects: ProjectRoots,
}

impl Server {
    pub fn new(config: AppConfig, fs: Arc<dyn FileSystem>, catalog: AddonCatalog) -> Self {
        let registry = Arc::new(SymbolRegistry::new());
        registry.set_token_collection(config.server.collect_template_tokens);
        let projects = ProjectRoots::new().with_ignored(&config.server.ignored_projects);
        Self {
            config,
            fs,
            catalog: Arc::new(catalog),
            registry,
            projects,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SymbolRegistry> {
        &self.registry
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    pub fn catalog(&self) -> &AddonCatalog {
        &self.catalog
    }

    pub fn projects(&self) -> &ProjectRoots {
        &self.projects
    }

    // ── Project lifecycle ───────────────────────────────────────────────

    /// Load, initialize and index a project.
    ///
    /// With eager indexing, addon discovery, init hooks and the registry
    /// walk (plus queued template tokens) finish before this returns.
    /// Otherwise the project is registered right away and discovery and
    /// indexing run in the background; callers that need the provider
    /// chains can await [`Project::wait_initialized`].
    pub async fn load_project(
        &self,
        root: &Path,
        pod_prefix: Option<&str>,
    ) -> Result<Arc<Project>, ProjectError> {
        if self.projects.is_ignored(root) {
            return Err(ProjectError::Ignored(root.to_path_buf()));
        }
        if self.projects.get(root).is_some() {
            return Err(ProjectError::AlreadyLoaded(root.to_path_buf()));
        }
        if !self.fs.exists(root).await {
            return Err(ProjectError::MissingRoot(root.to_path_buf()));
        }

        let pod_prefix = match pod_prefix {
            Some(prefix) => Some(prefix.to_string()),
            None => detect_pod_prefix(self.fs.as_ref(), root).await,
        };
        let options = ProjectOptions {
            pod_prefix,
            max_tracked_files: self.config.server.max_tracked_files,
            extra_addons: self.config.server.addons.iter().map(PathBuf::from).collect(),
        };
        let builtins = if self.config.server.builtin_providers {
            vec![BuiltinProvider::loaded()]
        } else {
            Vec::new()
        };
        let project = Arc::new(
            Project::new(root, options, Arc::clone(&self.registry)).with_builtin_providers(builtins),
        );

        if self.config.server.eager_indexing {
            project.initialize(self.fs.as_ref(), &self.catalog).await;
            let project = self.projects.add(project)?;
            index_project(self.fs.as_ref(), &project).await;
            let processed = self.registry.process_pending(self.fs.as_ref()).await;
            debug!(root = %project.root().display(), processed, "Template tokens collected");
            return Ok(project);
        }

        let project = self.projects.add(project)?;
        let fs = Arc::clone(&self.fs);
        let catalog = Arc::clone(&self.catalog);
        let background = Arc::clone(&project);
        tokio::spawn(async move {
            background.initialize(fs.as_ref(), &catalog).await;
            index_project(fs.as_ref(), &background).await;
        });
        Ok(project)
    }

    /// Load every `[[projects]]` entry. Failures are logged and skipped.
    pub async fn load_configured_projects(&self) -> usize {
        let mut loaded = 0;
        for entry in &self.config.projects {
            let root = PathBuf::from(&entry.root);
            if self.config.is_ignored(&root) {
                debug!(root = %root.display(), "Skipping ignored project");
                continue;
            }
            match self.load_project(&root, entry.pod_prefix.as_deref()).await {
                Ok(_) => loaded += 1,
                Err(e) => warn!(root = %root.display(), error = %e, "Failed to load project"),
            }
        }
        info!(loaded, configured = self.config.projects.len(), "Configured projects loaded");
        loaded
    }

    /// Run destructors and rebuild the project from disk.
    pub async fn reload_project(&self, root: &Path) -> Result<Arc<Project>, ProjectError> {
        let previous = self.projects.remove(root)?;
        let pod_prefix = previous.pod_prefix().map(str::to_string);
        info!(root = %root.display(), "Reloading project");
        self.load_project(previous.root(), pod_prefix.as_deref()).await
    }

    pub fn unload_project(&self, root: &Path) -> Result<(), ProjectError> {
        self.projects.remove(root).map(|_| ())
    }

    /// Unload every project.
    pub fn shutdown(&self) {
        for project in self.projects.list() {
            if let Err(e) = self.projects.remove(project.root()) {
                warn!(error = %e, "Failed to unload project");
            }
        }
    }

    /// Re-run the indexer for a loaded project.
    pub async fn index(&self, root: &Path) -> Result<IndexReport, ProjectError> {
        let project = self
            .projects
            .get(root)
            .ok_or_else(|| ProjectError::NotFound(root.to_path_buf()))?;
        Ok(index_project(self.fs.as_ref(), &project).await)
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn project_for_path(&self, path: &Path) -> Option<Arc<Project>> {
        self.projects.project_for_path(path)
    }

    pub fn classify(&self, path: &Path) -> Option<MatchResult> {
        self.project_for_path(path)?.classify(path)
    }

    /// The shared registry restricted to one root.
    pub fn registry_view_for_root(&self, root: &Path) -> RegistryView {
        self.registry.view_for_root(root)
    }

    pub fn statuses(&self) -> Vec<ProjectStatus> {
        self.projects.list().iter().map(|p| p.status()).collect()
    }

    pub fn addons(&self, root: &Path) -> Option<ProvidersSummary> {
        Some(self.projects.get(root)?.providers().summary())
    }

    /// Forward a file-system change to the owning project. Returns whether
    /// a project took it.
    pub fn track_change(&self, path: &Path, change: FileChange) -> bool {
        match self.project_for_path(path) {
            Some(project) => {
                project.track_change(path, change);
                true
            }
            None => {
                debug!(path = %path.display(), "Change outside any project");
                false
            }
        }
    }

    // ── Editor requests ─────────────────────────────────────────────────

    async fn run<H: ChainHook>(&self, request: DocumentRequest) -> Vec<H::Item> {
        let Some(project) = self.project_for_path(&request.document) else {
            debug!(document = %request.document.display(), "No project for document");
            return Vec::new();
        };
        let focus = request.tree.and_then(|tree| {
            let at = Position::from_editor(request.position.line, request.position.character);
            FocusPath::resolve(tree, at, request.source.as_deref())
        });
        let provider_request = ProviderRequest {
            project_root: project.root().to_path_buf(),
            document: request.document,
            position: request.position,
            focus,
            registry: project.registry_view(),
        };
        let links = project.providers_for(H::CAPABILITY);
        run_chain::<H>(&links, &provider_request).await
    }

    pub async fn complete(&self, request: DocumentRequest) -> Vec<CompletionItem> {
        self.run::<CompletionHook>(request).await
    }

    pub async fn definition(&self, request: DocumentRequest) -> Vec<Location> {
        self.run::<DefinitionHook>(request).await
    }

    pub async fn references(&self, request: DocumentRequest) -> Vec<Location> {
        self.run::<ReferencesHook>(request).await
    }

    pub async fn hover(&self, request: DocumentRequest) -> Vec<Hover> {
        self.run::<HoverHook>(request).await
    }

    pub async fn code_action(&self, request: DocumentRequest) -> Vec<CodeActionOrCommand> {
        self.run::<CodeActionHook>(request).await
    }
}
