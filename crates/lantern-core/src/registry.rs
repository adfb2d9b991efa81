//! Global symbol registry.
//!
//! One registry is shared by every project a server hosts. It maps
//! `(kind, name)` to the set of absolute paths contributing that symbol and
//! keeps template usage tokens extracted by a background FIFO queue.
//!
//! Locks are held for short critical sections only and never across an
//! `.await`.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::fs::FileSystem;
use crate::symbol::SymbolKind;
use crate::tokens::{self, TemplateTokens};

/// Per-kind map of symbol names to their contributing paths.
pub type RegistryView = BTreeMap<SymbolKind, BTreeMap<String, Vec<PathBuf>>>;

type Entries = BTreeMap<SymbolKind, BTreeMap<String, BTreeSet<PathBuf>>>;

/// A queued usage-token extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenJob {
    pub kind: SymbolKind,
    pub name: String,
    pub path: PathBuf,
}

/// Name counts per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub names: BTreeMap<SymbolKind, usize>,
    pub paths: usize,
    pub token_entries: usize,
    pub pending_jobs: usize,
}

#[derive(Debug)]
pub struct SymbolRegistry {
    entries: RwLock<Entries>,
    tokens: RwLock<HashMap<(SymbolKind, String), TemplateTokens>>,
    queue: Mutex<VecDeque<TokenJob>>,
    notify: Notify,
    collect_tokens: AtomicBool,
}

impl Default for SymbolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            tokens: RwLock::new(HashMap::new()),
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            collect_tokens: AtomicBool::new(true),
        }
    }

    /// Turn template token collection on or off. Jobs already queued stay
    /// queued.
    pub fn set_token_collection(&self, enabled: bool) {
        self.collect_tokens.store(enabled, Ordering::Relaxed);
    }

    /// Record `paths` as contributing `(kind, name)`.
    ///
    /// Paths are stored in absolute, lexically normalized form. Adding a
    /// template for a component or route queues a token extraction.
    pub fn add<I, P>(&self, name: &str, kind: SymbolKind, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let paths: Vec<PathBuf> = paths
            .into_iter()
            .map(|p| normalize_path(p.as_ref()))
            .collect();
        if paths.is_empty() {
            return;
        }

        if let Ok(mut entries) = self.entries.write() {
            entries
                .entry(kind)
                .or_default()
                .entry(name.to_string())
                .or_default()
                .extend(paths.iter().cloned());
        }
        trace!(kind = %kind, name, count = paths.len(), "Registry add");

        if !self.collect_tokens.load(Ordering::Relaxed) || !tracks_tokens(kind) {
            return;
        }
        let jobs: Vec<TokenJob> = paths
            .into_iter()
            .filter(|p| is_template(p))
            .map(|path| TokenJob {
                kind,
                name: name.to_string(),
                path,
            })
            .collect();
        if jobs.is_empty() {
            return;
        }
        if let Ok(mut queue) = self.queue.lock() {
            queue.extend(jobs);
        }
        self.notify.notify_one();
    }

    /// Remove `paths` from `(kind, name)`; the entry goes away once its set
    /// is empty. Removing a template clears that name's usage tokens.
    pub fn remove<I, P>(&self, name: &str, kind: SymbolKind, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let paths: Vec<PathBuf> = paths
            .into_iter()
            .map(|p| normalize_path(p.as_ref()))
            .collect();

        if let Ok(mut entries) = self.entries.write()
            && let Some(names) = entries.get_mut(&kind)
        {
            if let Some(set) = names.get_mut(name) {
                for path in &paths {
                    set.remove(path);
                }
                if set.is_empty() {
                    names.remove(name);
                }
            }
            if names.is_empty() {
                entries.remove(&kind);
            }
        }
        trace!(kind = %kind, name, count = paths.len(), "Registry remove");

        // Entries go first so a job already running sees the path gone.
        if !paths.iter().any(|p| is_template(p)) {
            return;
        }
        if let Ok(mut queue) = self.queue.lock() {
            queue.retain(|job| {
                job.kind != kind || job.name != name || !paths.contains(&job.path)
            });
        }
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.remove(&(kind, name.to_string()));
        }
    }

    /// Registry entries whose paths live under `root`.
    ///
    /// Comparison is case-insensitive and stops at path-segment boundaries:
    /// `/r` covers `/r/a.hbs` but not `/rx/a.hbs`. Kinds left without names
    /// are omitted.
    pub fn view_for_root(&self, root: &Path) -> RegistryView {
        let root = lowercase(&normalize_path(root));
        let Ok(entries) = self.entries.read() else {
            return RegistryView::new();
        };

        let mut view = RegistryView::new();
        for (kind, names) in entries.iter() {
            let filtered: BTreeMap<String, Vec<PathBuf>> = names
                .iter()
                .filter_map(|(name, paths)| {
                    let kept: Vec<PathBuf> = paths
                        .iter()
                        .filter(|p| is_under(&lowercase(p), &root))
                        .cloned()
                        .collect();
                    (!kept.is_empty()).then(|| (name.clone(), kept))
                })
                .collect();
            if !filtered.is_empty() {
                view.insert(*kind, filtered);
            }
        }
        view
    }

    /// Everything the registry holds.
    pub fn snapshot(&self) -> RegistryView {
        let Ok(entries) = self.entries.read() else {
            return RegistryView::new();
        };
        entries
            .iter()
            .map(|(kind, names)| {
                let names = names
                    .iter()
                    .map(|(name, paths)| (name.clone(), paths.iter().cloned().collect()))
                    .collect();
                (*kind, names)
            })
            .collect()
    }

    /// Paths for one symbol, if registered.
    pub fn paths_for(&self, kind: SymbolKind, name: &str) -> Vec<PathBuf> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| {
                entries
                    .get(&kind)
                    .and_then(|names| names.get(name))
                    .map(|set| set.iter().cloned().collect())
            })
            .unwrap_or_default()
    }

    pub fn tokens_for(&self, kind: SymbolKind, name: &str) -> Option<TemplateTokens> {
        self.tokens
            .read()
            .ok()?
            .get(&(kind, name.to_string()))
            .cloned()
    }

    pub fn pending_jobs(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats {
            pending_jobs: self.pending_jobs(),
            token_entries: self.tokens.read().map(|t| t.len()).unwrap_or(0),
            ..RegistryStats::default()
        };
        if let Ok(entries) = self.entries.read() {
            for (kind, names) in entries.iter() {
                stats.names.insert(*kind, names.len());
                stats.paths += names.values().map(BTreeSet::len).sum::<usize>();
            }
        }
        stats
    }

    /// Drop every entry, token and queued job.
    pub fn reset(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.clear();
        }
        if let Ok(mut queue) = self.queue.lock() {
            queue.clear();
        }
        info!("Symbol registry reset");
    }

    fn pop_job(&self) -> Option<TokenJob> {
        self.queue.lock().ok()?.pop_front()
    }

    /// Wait until a job is queued and take it.
    async fn next_job(&self) -> TokenJob {
        loop {
            if let Some(job) = self.pop_job() {
                return job;
            }
            self.notify.notified().await;
        }
    }

    /// Read and scan one template. Failures store an empty entry so the
    /// name is not retried on every read. Nothing is stored once the path
    /// is no longer registered under the job's name.
    pub async fn run_job(&self, fs: &dyn FileSystem, job: TokenJob) {
        let extracted = match fs.read_file(&job.path).await {
            Ok(source) => tokens::extract(&source),
            Err(e) => {
                debug!(path = %job.path.display(), error = %e, "Token extraction read failed");
                TemplateTokens::default()
            }
        };
        let Ok(entries) = self.entries.read() else {
            return;
        };
        let registered = entries
            .get(&job.kind)
            .and_then(|names| names.get(&job.name))
            .is_some_and(|set| set.contains(&job.path));
        if !registered {
            trace!(path = %job.path.display(), "Dropping tokens for unregistered template");
            return;
        }
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.insert((job.kind, job.name), extracted);
        }
    }

    /// Drain the queue in order. Returns the number of jobs run.
    pub async fn process_pending(&self, fs: &dyn FileSystem) -> usize {
        let mut processed = 0;
        while let Some(job) = self.pop_job() {
            self.run_job(fs, job).await;
            processed += 1;
        }
        processed
    }

    /// Start the background worker. It runs one job at a time and sleeps
    /// `delay` between jobs until `shutdown` fires.
    pub fn spawn_token_worker<S>(
        self: Arc<Self>,
        fs: Arc<dyn FileSystem>,
        delay: Duration,
        mut shutdown: broadcast::Receiver<S>,
    ) -> JoinHandle<()>
    where
        S: Clone + Send + 'static,
    {
        tokio::spawn(async move {
            debug!(delay_ms = delay.as_millis() as u64, "Token worker started");
            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    job = self.next_job() => {
                        self.run_job(fs.as_ref(), job).await;
                        tokio::time::sleep(delay).await;
                    }
                }
            }
            debug!("Token worker stopped");
        })
    }
}

fn tracks_tokens(kind: SymbolKind) -> bool {
    matches!(kind, SymbolKind::Component | SymbolKind::RoutePath)
}

fn is_template(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "hbs")
}

fn lowercase(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

fn is_under(path: &str, root: &str) -> bool {
    let Some(rest) = path.strip_prefix(root) else {
        return false;
    };
    rest.is_empty()
        || root.ends_with(std::path::MAIN_SEPARATOR)
        || rest.starts_with(std::path::MAIN_SEPARATOR)
}

/// Absolute form of `path` with `.` and `..` resolved lexically.
pub fn normalize_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFs;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_view_for_root_scenario() {
        let registry = SymbolRegistry::new();
        registry.add("foo-bar", SymbolKind::Component, ["/r/a.hbs"]);

        let view = registry.view_for_root(Path::new("/r"));
        let mut expected = RegistryView::new();
        expected.insert(
            SymbolKind::Component,
            BTreeMap::from([("foo-bar".to_string(), vec![PathBuf::from("/r/a.hbs")])]),
        );
        assert_eq!(view, expected);
        assert!(registry.view_for_root(Path::new("/other")).is_empty());
    }

    #[test]
    fn test_add_is_idempotent() {
        let registry = SymbolRegistry::new();
        registry.add("user", SymbolKind::Model, ["/p/app/models/user.js"]);
        registry.add("user", SymbolKind::Model, ["/p/app/models/./user.js"]);
        assert_eq!(registry.paths_for(SymbolKind::Model, "user").len(), 1);
    }

    #[test]
    fn test_add_then_remove() {
        let registry = SymbolRegistry::new();
        registry.add("session", SymbolKind::Service, ["/p/app/services/session.js"]);
        registry.remove("session", SymbolKind::Service, ["/p/app/services/session.js"]);
        assert!(registry.view_for_root(Path::new("/p")).is_empty());
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_remove_keeps_other_paths() {
        let registry = SymbolRegistry::new();
        registry.add(
            "x-button",
            SymbolKind::Component,
            ["/p/app/components/x-button.js", "/p/app/components/x-button.hbs"],
        );
        registry.remove("x-button", SymbolKind::Component, ["/p/app/components/x-button.js"]);
        assert_eq!(
            registry.paths_for(SymbolKind::Component, "x-button"),
            vec![PathBuf::from("/p/app/components/x-button.hbs")]
        );
    }

    #[test]
    fn test_view_respects_segment_boundary_and_case() {
        let registry = SymbolRegistry::new();
        registry.add("a", SymbolKind::Helper, ["/Work/App/app/helpers/a.js"]);
        registry.add("b", SymbolKind::Helper, ["/work/application/app/helpers/b.js"]);

        let view = registry.view_for_root(Path::new("/work/app"));
        let names: Vec<_> = view[&SymbolKind::Helper].keys().cloned().collect();
        assert_eq!(names, vec!["a"]);
    }

    #[test]
    fn test_template_add_queues_job() {
        let registry = SymbolRegistry::new();
        registry.add("foo", SymbolKind::Component, ["/p/app/components/foo.hbs"]);
        registry.add("foo", SymbolKind::Component, ["/p/app/components/foo.js"]);
        registry.add("posts", SymbolKind::RoutePath, ["/p/app/templates/posts.hbs"]);
        registry.add("fmt", SymbolKind::Helper, ["/p/app/helpers/fmt.hbs"]);
        assert_eq!(registry.pending_jobs(), 2);

        registry.set_token_collection(false);
        registry.add("bar", SymbolKind::Component, ["/p/app/components/bar.hbs"]);
        assert_eq!(registry.pending_jobs(), 2);
    }

    #[tokio::test]
    async fn test_process_pending_records_tokens() {
        let fs = MemoryFs::new().with_file("/p/app/components/foo.hbs", "<UserCard />{{yield}}");
        let registry = SymbolRegistry::new();
        registry.add("foo", SymbolKind::Component, ["/p/app/components/foo.hbs"]);
        registry.add("gone", SymbolKind::Component, ["/p/app/components/gone.hbs"]);

        assert_eq!(registry.process_pending(&fs).await, 2);
        assert_eq!(registry.pending_jobs(), 0);

        let tokens = registry.tokens_for(SymbolKind::Component, "foo").unwrap();
        assert_eq!(tokens.tokens, vec!["user-card"]);
        assert_eq!(tokens.yields, vec!["default"]);

        // Unreadable files still get an (empty) entry.
        let missing = registry.tokens_for(SymbolKind::Component, "gone").unwrap();
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn test_later_job_overwrites_earlier() {
        let fs = MemoryFs::new().with_file("/p/app/components/foo.hbs", "<First />");
        let registry = SymbolRegistry::new();
        registry.add("foo", SymbolKind::Component, ["/p/app/components/foo.hbs"]);
        registry.process_pending(&fs).await;

        fs.insert("/p/app/components/foo.hbs", "<Second />");
        registry.add("foo", SymbolKind::Component, ["/p/app/components/foo.hbs"]);
        registry.process_pending(&fs).await;

        let tokens = registry.tokens_for(SymbolKind::Component, "foo").unwrap();
        assert_eq!(tokens.tokens, vec!["second"]);
    }

    #[tokio::test]
    async fn test_removing_template_clears_tokens() {
        let fs = MemoryFs::new().with_file("/p/app/components/foo.hbs", "<Bar />");
        let registry = SymbolRegistry::new();
        registry.add("foo", SymbolKind::Component, ["/p/app/components/foo.hbs"]);
        registry.process_pending(&fs).await;
        assert!(registry.tokens_for(SymbolKind::Component, "foo").is_some());

        registry.remove("foo", SymbolKind::Component, ["/p/app/components/foo.hbs"]);
        assert!(registry.tokens_for(SymbolKind::Component, "foo").is_none());
    }

    #[tokio::test]
    async fn test_removed_template_does_not_get_tokens_back() {
        let fs = MemoryFs::new().with_file("/p/app/components/x-a.hbs", "{{format-date}}");
        let registry = SymbolRegistry::new();
        registry.add("x-a", SymbolKind::Component, ["/p/app/components/x-a.hbs"]);
        registry.remove("x-a", SymbolKind::Component, ["/p/app/components/x-a.hbs"]);

        assert_eq!(registry.pending_jobs(), 0);
        registry.process_pending(&fs).await;
        assert!(registry.tokens_for(SymbolKind::Component, "x-a").is_none());
    }

    #[tokio::test]
    async fn test_job_for_unregistered_path_stores_nothing() {
        let fs = MemoryFs::new()
            .with_file("/p/app/components/x-a.hbs", "<Old />")
            .with_file("/p/app/components/x-a/template.hbs", "<New />");
        let registry = SymbolRegistry::new();
        registry.add("x-a", SymbolKind::Component, ["/p/app/components/x-a/template.hbs"]);
        registry.process_pending(&fs).await;

        // A job that was taken off the queue before its path was removed.
        let stale = TokenJob {
            kind: SymbolKind::Component,
            name: "x-a".to_string(),
            path: PathBuf::from("/p/app/components/x-a.hbs"),
        };
        registry.run_job(&fs, stale).await;

        let tokens = registry.tokens_for(SymbolKind::Component, "x-a").unwrap();
        assert_eq!(tokens.tokens, vec!["new"]);
    }

    #[tokio::test]
    async fn test_removing_one_template_keeps_other_jobs() {
        let registry = SymbolRegistry::new();
        registry.add("a", SymbolKind::Component, ["/p/app/components/a.hbs"]);
        registry.add("b", SymbolKind::Component, ["/p/app/components/b.hbs"]);
        registry.remove("a", SymbolKind::Component, ["/p/app/components/a.hbs"]);
        assert_eq!(registry.pending_jobs(), 1);
    }

    #[tokio::test]
    async fn test_token_worker_drains_queue() {
        let fs: Arc<dyn FileSystem> =
            Arc::new(MemoryFs::new().with_file("/p/app/components/foo.hbs", "{{format-date}}"));
        let registry = Arc::new(SymbolRegistry::new());
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        let worker = Arc::clone(&registry).spawn_token_worker(
            fs,
            Duration::from_millis(1),
            shutdown_rx,
        );

        registry.add("foo", SymbolKind::Component, ["/p/app/components/foo.hbs"]);
        for _ in 0..200 {
            if registry.tokens_for(SymbolKind::Component, "foo").is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(
            registry
                .tokens_for(SymbolKind::Component, "foo")
                .unwrap()
                .tokens,
            vec!["format-date"]
        );

        shutdown_tx.send(()).unwrap();
        worker.await.unwrap();
    }

    #[test]
    fn test_stats_and_reset() {
        let registry = SymbolRegistry::new();
        registry.add("a", SymbolKind::Helper, ["/p/a.js", "/p/a.ts"]);
        registry.add("b", SymbolKind::Helper, ["/p/b.js"]);
        registry.add("c", SymbolKind::Component, ["/p/c.hbs"]);

        let stats = registry.stats();
        assert_eq!(stats.names[&SymbolKind::Helper], 2);
        assert_eq!(stats.paths, 4);
        assert_eq!(stats.pending_jobs, 1);

        registry.reset();
        assert_eq!(registry.stats(), RegistryStats::default());
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
        assert!(normalize_path(Path::new("rel/x")).is_absolute());
    }
}
