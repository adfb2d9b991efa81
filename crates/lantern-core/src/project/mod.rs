//! A project: one root, its addons, its provider chains and a cached view
//! of the shared registry.
//!
//! Every tracked change that classifies to a known symbol bumps
//! `registry_version`. The cached view is rebuilt on the first read after
//! a bump, so readers may briefly see stale data.

pub mod roots;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::addon::{
    AddonCatalog, Capability, Destructor, InitContext, LoadedAddon, ProjectProviders, discover,
};
use crate::fs::FileSystem;
use crate::matcher::LayoutMatcher;
use crate::registry::{RegistryView, SymbolRegistry, normalize_path};
use crate::symbol::{MatchResult, SymbolKind};

pub use roots::ProjectRoots;

/// Default ceiling on tracked files before tracking state is reset.
pub const DEFAULT_MAX_TRACKED_FILES: usize = 10_000;

/// Errors from project lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("project root does not exist: {0}")]
    MissingRoot(PathBuf),

    #[error("project root is ignored by configuration: {0}")]
    Ignored(PathBuf),

    #[error("project already loaded: {0}")]
    AlreadyLoaded(PathBuf),

    #[error("no project at {0}")]
    NotFound(PathBuf),
}

/// Kind of file-system change reported to [`Project::track_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileChange {
    Created,
    Changed,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedFile {
    pub version: u64,
}

/// Construction options.
#[derive(Debug, Clone)]
pub struct ProjectOptions {
    pub pod_prefix: Option<String>,
    pub max_tracked_files: usize,
    /// Addon roots supplied from configuration.
    pub extra_addons: Vec<PathBuf>,
}

impl Default for ProjectOptions {
    fn default() -> Self {
        Self {
            pod_prefix: None,
            max_tracked_files: DEFAULT_MAX_TRACKED_FILES,
            extra_addons: Vec::new(),
        }
    }
}

/// Serializable summary for the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStatus {
    pub root: PathBuf,
    pub pod_prefix: Option<String>,
    pub roots: Vec<PathBuf>,
    pub registry_version: u64,
    pub tracked_files: usize,
    pub initialized: bool,
    pub init_issues: Vec<String>,
}

struct ProjectState {
    roots: Vec<PathBuf>,
    addon_roots: Vec<PathBuf>,
    providers: Arc<ProjectProviders>,
    registry_version: u64,
    cached_registry_version: Option<u64>,
    cached_view: Arc<RegistryView>,
    tracked_files: HashMap<PathBuf, TrackedFile>,
    init_issues: Vec<String>,
    destructors: Vec<(String, Destructor)>,
    initialized: bool,
    unloaded: bool,
}

pub struct Project {
    root: PathBuf,
    matcher: LayoutMatcher,
    max_tracked_files: usize,
    extra_addons: Vec<PathBuf>,
    builtin_providers: Vec<Arc<LoadedAddon>>,
    registry: Arc<SymbolRegistry>,
    state: Mutex<ProjectState>,
    ready: watch::Sender<bool>,
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("root", &self.root)
            .field("pod_prefix", &self.pod_prefix())
            .finish_non_exhaustive()
    }
}

impl Project {
    pub fn new(root: &Path, options: ProjectOptions, registry: Arc<SymbolRegistry>) -> Self {
        let root = normalize_path(root);
        Self {
            matcher: LayoutMatcher::new(options.pod_prefix.as_deref()),
            max_tracked_files: options.max_tracked_files.max(1),
            extra_addons: options.extra_addons,
            builtin_providers: Vec::new(),
            registry,
            state: Mutex::new(ProjectState {
                roots: vec![root.clone()],
                addon_roots: Vec::new(),
                providers: Arc::new(ProjectProviders::default()),
                registry_version: 0,
                cached_registry_version: None,
                cached_view: Arc::new(RegistryView::new()),
                tracked_files: HashMap::new(),
                init_issues: Vec::new(),
                destructors: Vec::new(),
                initialized: false,
                unloaded: false,
            }),
            ready: watch::Sender::new(false),
            root,
        }
    }

    /// Providers that run ahead of every addon chain.
    pub fn with_builtin_providers(mut self, builtins: Vec<Arc<LoadedAddon>>) -> Self {
        self.builtin_providers = builtins;
        self
    }

    fn state(&self) -> MutexGuard<'_, ProjectState> {
        // A panic while holding the lock leaves plain data behind; keep serving it.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pod_prefix(&self) -> Option<&str> {
        self.matcher.pod_prefix()
    }

    pub fn matcher(&self) -> &LayoutMatcher {
        &self.matcher
    }

    pub fn registry(&self) -> &Arc<SymbolRegistry> {
        &self.registry
    }

    /// The project root plus addon roots outside it.
    pub fn roots(&self) -> Vec<PathBuf> {
        self.state().roots.clone()
    }

    /// Every discovered addon root, inside the project or not.
    pub fn addon_roots(&self) -> Vec<PathBuf> {
        self.state().addon_roots.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.state().initialized
    }

    /// Wait until [`initialize`](Self::initialize) has finished.
    pub async fn wait_initialized(&self) {
        let mut ready = self.ready.subscribe();
        // The sender lives as long as `self`, so this only ends on `true`.
        let _ = ready.wait_for(|done| *done).await;
    }

    /// Discover addons, build the provider chains and run every `on_init`.
    ///
    /// Init failures are logged and collected in
    /// [`init_issues`](Self::init_issues); the remaining addons still
    /// initialize. Destructors returned after the project was unloaded run
    /// right away.
    pub async fn initialize(&self, fs: &dyn FileSystem, catalog: &AddonCatalog) {
        let discovery = discover(fs, &self.root, &self.extra_addons).await;
        let providers = Arc::new(discovery.providers(catalog));
        let context = InitContext {
            root: self.root.clone(),
            pod_prefix: self.pod_prefix().map(str::to_string),
            addons: providers.addons_meta.clone(),
        };

        let mut issues = Vec::new();
        let mut destructors = Vec::new();
        for addon in &providers.init_functions {
            let handler = addon.handler();
            match handler.on_init(&context).await {
                Ok(Some(destructor)) => destructors.push((addon.package.clone(), destructor)),
                Ok(None) => {}
                Err(e) => {
                    warn!(addon = %addon.package, error = %e, "Addon init failed");
                    issues.push(e.to_string());
                }
            }
        }

        let late = {
            let mut state = self.state();
            state.roots = discovery.project_roots();
            state.addon_roots = discovery.addon_roots();
            state.providers = providers;
            state.init_issues.extend(issues);
            state.destructors.extend(destructors);
            state.initialized = true;
            state.registry_version += 1;
            info!(
                root = %self.root.display(),
                roots = state.roots.len(),
                issues = state.init_issues.len(),
                "Project initialized"
            );
            if state.unloaded {
                std::mem::take(&mut state.destructors)
            } else {
                Vec::new()
            }
        };
        self.ready.send_replace(true);
        run_destructors(late);
    }

    pub fn providers(&self) -> Arc<ProjectProviders> {
        Arc::clone(&self.state().providers)
    }

    /// Builtin providers followed by the addon chain for `capability`.
    pub fn providers_for(&self, capability: Capability) -> Vec<Arc<LoadedAddon>> {
        let providers = self.providers();
        self.builtin_providers
            .iter()
            .filter(|p| {
                capability.enabled_in(&p.capabilities) && p.implements(capability.hook())
            })
            .chain(providers.chain(capability))
            .cloned()
            .collect()
    }

    pub fn init_issues(&self) -> Vec<String> {
        self.state().init_issues.clone()
    }

    pub fn registry_version(&self) -> u64 {
        self.state().registry_version
    }

    pub fn tracked_file_count(&self) -> usize {
        self.state().tracked_files.len()
    }

    pub fn tracked_file(&self, path: &Path) -> Option<TrackedFile> {
        self.state().tracked_files.get(&normalize_path(path)).copied()
    }

    /// Force the next [`registry_view`](Self::registry_view) to rebuild.
    pub fn invalidate(&self) {
        self.state().registry_version += 1;
    }

    /// Whether `path` is under one of this project's roots.
    pub fn contains(&self, path: &Path) -> bool {
        let path = normalize_path(path);
        self.state().roots.iter().any(|root| path.starts_with(root))
    }

    /// Classify an absolute path against the root (or addon root) that holds
    /// it, deepest first.
    pub fn classify(&self, path: &Path) -> Option<MatchResult> {
        let path = normalize_path(path);
        let base = {
            let state = self.state();
            state
                .addon_roots
                .iter()
                .chain(std::iter::once(&self.root))
                .filter(|root| path.starts_with(root))
                .max_by_key(|root| root.components().count())
                .cloned()
        }?;
        self.matcher.classify_under(&base, &path)
    }

    /// Record a file-system change.
    ///
    /// Paths that classify to a registry kind are added to or removed from
    /// the shared registry and bump the version. Exceeding the tracked-file
    /// ceiling clears the tracking map and bumps the version.
    pub fn track_change(&self, path: &Path, change: FileChange) {
        let path = normalize_path(path);
        let symbol = self
            .classify(&path)
            .and_then(|result| SymbolKind::from_match(&result));

        if let Some((kind, name)) = &symbol {
            match change {
                FileChange::Created | FileChange::Changed => {
                    self.registry.add(name, *kind, [&path])
                }
                FileChange::Deleted => self.registry.remove(name, *kind, [&path]),
            }
        }

        let mut state = self.state();
        if symbol.is_some() {
            state.registry_version += 1;
        }
        match change {
            FileChange::Deleted => {
                state.tracked_files.remove(&path);
            }
            FileChange::Created | FileChange::Changed => {
                state
                    .tracked_files
                    .entry(path.clone())
                    .and_modify(|f| f.version += 1)
                    .or_insert(TrackedFile { version: 1 });
            }
        }

        if state.tracked_files.len() > self.max_tracked_files {
            warn!(
                root = %self.root.display(),
                limit = self.max_tracked_files,
                "Tracked file limit exceeded, resetting"
            );
            state.tracked_files.clear();
            state.registry_version += 1;
        }
        debug!(path = %path.display(), ?change, version = state.registry_version, "Tracked change");
    }

    /// The registry restricted to this project's roots. Rebuilt lazily after
    /// a version bump.
    pub fn registry_view(&self) -> Arc<RegistryView> {
        let (version, roots) = {
            let state = self.state();
            if state.cached_registry_version == Some(state.registry_version) {
                return Arc::clone(&state.cached_view);
            }
            (state.registry_version, state.roots.clone())
        };

        let mut merged = RegistryView::new();
        for root in &roots {
            merge_view(&mut merged, self.registry.view_for_root(root));
        }
        let view = Arc::new(merged);

        let mut state = self.state();
        // A bump that raced the rebuild wins; don't mark this view current.
        if state.registry_version == version {
            state.cached_registry_version = Some(version);
            state.cached_view = Arc::clone(&view);
        }
        view
    }

    pub fn status(&self) -> ProjectStatus {
        let state = self.state();
        ProjectStatus {
            root: self.root.clone(),
            pod_prefix: self.pod_prefix().map(str::to_string),
            roots: state.roots.clone(),
            registry_version: state.registry_version,
            tracked_files: state.tracked_files.len(),
            initialized: state.initialized,
            init_issues: state.init_issues.clone(),
        }
    }

    /// Run addon destructors. Failures are logged; the rest still run.
    pub fn unload(&self) {
        let destructors = {
            let mut state = self.state();
            state.unloaded = true;
            std::mem::take(&mut state.destructors)
        };
        run_destructors(destructors);
        info!(root = %self.root.display(), "Project unloaded");
    }
}

fn run_destructors(destructors: Vec<(String, Destructor)>) {
    for (package, destructor) in destructors {
        if let Err(e) = destructor() {
            warn!(addon = %package, error = %e, "Addon destructor failed");
        }
    }
}

fn merge_view(into: &mut RegistryView, from: RegistryView) {
    for (kind, names) in from {
        let target = into.entry(kind).or_default();
        for (name, paths) in names {
            let list = target.entry(name).or_default();
            for path in paths {
                if !list.contains(&path) {
                    list.push(path);
                }
            }
        }
    }
}

static POD_MODULE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"podModulePrefix\s*:\s*['"`]([^'"`]+)['"`]"#).expect("valid pattern")
});

/// Read the pod prefix from `config/environment.js`.
///
/// `podModulePrefix: 'my-app/pods'` becomes `app/pods`: the module prefix
/// names the `app` directory on disk.
pub async fn detect_pod_prefix(fs: &dyn FileSystem, root: &Path) -> Option<String> {
    let source = fs
        .read_file(&root.join("config").join("environment.js"))
        .await
        .ok()?;
    let declared = POD_MODULE_PREFIX.captures(&source)?.get(1)?.as_str();
    let rest = declared.split_once('/').map(|(_, rest)| rest);
    match rest {
        Some(rest) if !rest.is_empty() => Some(format!("app/{}", rest.trim_matches('/'))),
        _ => Some("app".to_string()),
    }
}
