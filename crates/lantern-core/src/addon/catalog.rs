//! Compiled-in addon handlers.
//!
//! Handlers register under `(package name, entry)`. Crates linked into the
//! server can register statically:
//!
//! ```ignore
//! inventory::submit! {
//!     AddonRegistration {
//!         package: "ember-fancy",
//!         entry: "lib/els",
//!         factory: || Ok(Arc::new(FancyHandler) as Arc<dyn AddonHandler>),
//!     }
//! }
//! ```
//!
//! Embedders can also call [`AddonCatalog::register`] at runtime.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::BoxFuture;

use super::AddonError;
use super::manifest::{Capabilities, ExtensionBlock};
use super::providers::{AddonHandler, Destructor, Hook, InitContext};

/// Builds a handler instance.
pub type AddonFactory =
    Arc<dyn Fn() -> Result<Arc<dyn AddonHandler>, AddonError> + Send + Sync>;

/// Static registration collected through `inventory`.
pub struct AddonRegistration {
    pub package: &'static str,
    pub entry: &'static str,
    pub factory: fn() -> Result<Arc<dyn AddonHandler>, AddonError>,
}

inventory::collect!(AddonRegistration);

/// `./lib/els.js` and `lib/els` name the same entry.
fn normalize_entry(entry: &str) -> String {
    let entry = entry.trim().trim_start_matches("./");
    entry.strip_suffix(".js").unwrap_or(entry).to_string()
}

#[derive(Clone, Default)]
pub struct AddonCatalog {
    factories: HashMap<(String, String), AddonFactory>,
}

impl fmt::Debug for AddonCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.factories.keys().collect();
        keys.sort();
        f.debug_struct("AddonCatalog").field("entries", &keys).finish()
    }
}

impl AddonCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog holding every `inventory` registration linked into the
    /// binary.
    pub fn with_registered() -> Self {
        let mut catalog = Self::new();
        for reg in inventory::iter::<AddonRegistration> {
            catalog.register(reg.package, reg.entry, reg.factory);
        }
        debug!(count = catalog.len(), "Addon catalog loaded");
        catalog
    }

    pub fn register<F>(&mut self, package: &str, entry: &str, factory: F)
    where
        F: Fn() -> Result<Arc<dyn AddonHandler>, AddonError> + Send + Sync + 'static,
    {
        self.factories.insert(
            (package.to_string(), normalize_entry(entry)),
            Arc::new(factory),
        );
    }

    pub fn get(&self, package: &str, entry: &str) -> Option<AddonFactory> {
        self.factories
            .get(&(package.to_string(), normalize_entry(entry)))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Resolve a package's extension into a loaded addon. Failures turn
    /// into a [`FailedAddon`] rather than an error.
    pub fn load(&self, package: &str, root: PathBuf, extension: &ExtensionBlock) -> LoadedAddon {
        let source = match self.get(package, &extension.entry) {
            None => {
                let error = AddonError::MissingHandler {
                    package: package.to_string(),
                    entry: extension.entry.clone(),
                };
                warn!(addon = %package, error = %error, "Addon handler unavailable");
                HandlerSource::Cached(Arc::new(FailedAddon::new(package, error.to_string())))
            }
            Some(factory) if extension.debug => HandlerSource::Fresh(factory),
            Some(factory) => match factory() {
                Ok(handler) => HandlerSource::Cached(handler),
                Err(e) => {
                    warn!(addon = %package, error = %e, "Addon handler failed to load");
                    HandlerSource::Cached(Arc::new(FailedAddon::new(package, e.to_string())))
                }
            },
        };
        LoadedAddon {
            package: package.to_string(),
            root,
            capabilities: extension.capabilities,
            debug: extension.debug,
            source,
        }
    }
}

enum HandlerSource {
    Cached(Arc<dyn AddonHandler>),
    /// Rebuilt on every use.
    Fresh(AddonFactory),
}

/// An addon with its handler resolved.
pub struct LoadedAddon {
    pub package: String,
    pub root: PathBuf,
    pub capabilities: Capabilities,
    pub debug: bool,
    source: HandlerSource,
}

impl fmt::Debug for LoadedAddon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedAddon")
            .field("package", &self.package)
            .field("root", &self.root)
            .field("capabilities", &self.capabilities)
            .field("debug", &self.debug)
            .finish()
    }
}

impl LoadedAddon {
    /// Wrap an already-built handler, e.g. a builtin provider.
    pub fn from_handler(
        package: impl Into<String>,
        root: PathBuf,
        capabilities: Capabilities,
        handler: Arc<dyn AddonHandler>,
    ) -> Self {
        Self {
            package: package.into(),
            root,
            capabilities,
            debug: false,
            source: HandlerSource::Cached(handler),
        }
    }

    /// The handler to call. Debug addons get a new instance each time.
    pub fn handler(&self) -> Arc<dyn AddonHandler> {
        match &self.source {
            HandlerSource::Cached(handler) => Arc::clone(handler),
            HandlerSource::Fresh(factory) => factory().unwrap_or_else(|e| {
                warn!(addon = %self.package, error = %e, "Addon reload failed");
                Arc::new(FailedAddon::new(&self.package, e.to_string()))
            }),
        }
    }

    pub fn implements(&self, hook: Hook) -> bool {
        self.handler().implements(hook)
    }
}

/// Stand-in for an addon whose handler could not be built. Its `on_init`
/// always fails with the original reason.
#[derive(Debug, Clone)]
pub struct FailedAddon {
    package: String,
    reason: String,
}

impl FailedAddon {
    pub fn new(package: &str, reason: impl Into<String>) -> Self {
        Self {
            package: package.to_string(),
            reason: reason.into(),
        }
    }
}

impl AddonHandler for FailedAddon {
    fn implements(&self, hook: Hook) -> bool {
        hook == Hook::Init
    }

    fn on_init<'a>(
        &'a self,
        _context: &'a InitContext,
    ) -> BoxFuture<'a, Result<Option<Destructor>, AddonError>> {
        Box::pin(async move {
            Err(AddonError::Init {
                package: self.package.clone(),
                reason: self.reason.clone(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting;

    impl AddonHandler for Counting {
        fn implements(&self, hook: Hook) -> bool {
            hook == Hook::Complete
        }
    }

    fn extension(entry: &str, debug: bool) -> ExtensionBlock {
        ExtensionBlock {
            entry: entry.to_string(),
            debug,
            ..ExtensionBlock::default()
        }
    }

    fn context() -> InitContext {
        InitContext {
            root: PathBuf::from("/p"),
            pod_prefix: None,
            addons: Vec::new(),
        }
    }

    #[test]
    fn test_entry_normalization() {
        let mut catalog = AddonCatalog::new();
        catalog.register("a", "./lib/els.js", || Ok(Arc::new(Counting) as Arc<dyn AddonHandler>));
        assert!(catalog.get("a", "lib/els").is_some());
        assert!(catalog.get("a", "./lib/els").is_some());
        assert!(catalog.get("b", "lib/els").is_none());
        assert_eq!(catalog.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_handler_fails_on_init() {
        let catalog = AddonCatalog::new();
        let addon = catalog.load("ghost", PathBuf::from("/p/ghost"), &extension("index", false));
        assert!(addon.implements(Hook::Init));
        assert!(!addon.implements(Hook::Complete));

        let err = addon.handler().on_init(&context()).await.err().unwrap();
        assert!(err.to_string().contains("no handler registered for ghost"));
    }

    #[tokio::test]
    async fn test_factory_error_fails_on_init() {
        let mut catalog = AddonCatalog::new();
        catalog.register("broken", "index", || {
            Err(AddonError::Load {
                package: "broken".to_string(),
                reason: "boom".to_string(),
            })
        });
        let addon = catalog.load("broken", PathBuf::from("/p/broken"), &extension("index", false));
        let err = addon.handler().on_init(&context()).await.err().unwrap();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_debug_rebuilds_per_use() {
        static BUILT: AtomicUsize = AtomicUsize::new(0);
        let mut catalog = AddonCatalog::new();
        catalog.register("live", "index", || {
            BUILT.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Counting) as Arc<dyn AddonHandler>)
        });

        let cached = catalog.load("live", PathBuf::from("/p/live"), &extension("index", false));
        let after_load = BUILT.load(Ordering::SeqCst);
        cached.handler();
        cached.handler();
        assert_eq!(BUILT.load(Ordering::SeqCst), after_load);

        let fresh = catalog.load("live", PathBuf::from("/p/live"), &extension("index", true));
        fresh.handler();
        fresh.handler();
        assert_eq!(BUILT.load(Ordering::SeqCst), after_load + 2);
        assert!(fresh.debug);
    }
}
