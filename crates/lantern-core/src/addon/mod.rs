//! Addon discovery, ordering and provider chains.
//!
//! ```text
//!  package.json ──► discovery ──► candidates ──► catalog ──► LoadedAddon
//!                                     │                          │
//!                                     ▼                          ▼
//!                                AddonMeta               AddonGraph (before/after)
//!                                                                │
//!                                                                ▼
//!                                                  ProjectProviders (per capability)
//! ```
//!
//! Handlers are compiled in. A package's `ember-language-server.entry` is
//! looked up in the [`AddonCatalog`] instead of being loaded at runtime.

pub mod catalog;
pub mod discovery;
pub mod graph;
pub mod manifest;
pub mod providers;

use std::path::PathBuf;

use crate::fs::FsError;

pub use catalog::{AddonCatalog, AddonFactory, AddonRegistration, FailedAddon, LoadedAddon};
pub use discovery::{Discovery, discover};
pub use graph::AddonGraph;
pub use manifest::{AddonMeta, Capabilities, ExtensionBlock, PackageManifest};
pub use providers::{
    AddonHandler, Capability, Destructor, Hook, InitContext, ProjectProviders, ProviderRequest,
    build_providers,
};

/// Errors from addon discovery, loading and invocation.
#[derive(Debug, thiserror::Error)]
pub enum AddonError {
    #[error("failed to read manifest {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: FsError,
    },

    #[error("invalid manifest {path}: {source}")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no handler registered for {package} (entry {entry})")]
    MissingHandler { package: String, entry: String },

    #[error("addon {package} failed to load: {reason}")]
    Load { package: String, reason: String },

    #[error("addon {package} failed to initialize: {reason}")]
    Init { package: String, reason: String },

    #[error("provider failed: {0}")]
    Provider(String),
}
