#![deny(unsafe_code)]

//! Lantern core: the project model behind an Ember-style language server.
//!
//! Classifies files by layout convention, keeps a registry of symbols shared
//! across projects, discovers and orders addon extensions into provider
//! chains, and resolves the syntax node under the cursor.

use std::future::Future;
use std::pin::Pin;

/// Boxed `Send` future for trait methods used through `dyn`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Addon discovery, ordering and provider chains.
pub mod addon;
/// Registry-backed providers run ahead of addons.
pub mod builtin;
/// Daemon process hosting the server and IPC socket.
pub mod daemon;
/// Focus-path resolution over syntax trees.
pub mod focus;
/// File-system abstraction (disk and in-memory).
pub mod fs;
/// Project walker that fills the registry.
pub mod indexer;
/// Unix-socket control plane.
pub mod ipc;
/// Classic and pod layout classification.
pub mod matcher;
/// Projects and the set of loaded roots.
pub mod project;
/// Shared symbol registry and usage-token queue.
pub mod registry;
/// Request dispatch across loaded projects.
pub mod server;
/// Symbol kinds and match results.
pub mod symbol;
/// Arena syntax trees.
pub mod syntax;
/// Template usage-token extraction.
pub mod tokens;

pub use addon::{AddonCatalog, AddonHandler, Capability, LoadedAddon};
pub use daemon::Daemon;
pub use focus::FocusPath;
pub use fs::{FileSystem, LocalFs, MemoryFs};
pub use matcher::{LayoutMatcher, PathMatcher};
pub use project::{FileChange, Project, ProjectRoots};
pub use registry::{RegistryView, SymbolRegistry};
pub use server::{DocumentRequest, Server};
pub use symbol::{MatchResult, SymbolKind, SymbolType};
pub use syntax::{Position, SyntaxTree};
