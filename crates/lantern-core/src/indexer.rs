//! Project indexer: walk roots, classify files and fill the registry.
//!
//! The walk goes through [`FileSystem`] so it runs the same against disk and
//! in-memory trees. Build output and dependency folders are skipped; addon
//! roots inside `node_modules` are walked from their own root instead.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::fs::FileSystem;
use crate::project::Project;
use crate::symbol::SymbolKind;

/// Directory names never descended into.
const SKIPPED_DIRS: [&str; 4] = ["node_modules", ".git", "dist", "tmp"];

/// Outcome of one indexing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexReport {
    pub roots: Vec<PathBuf>,
    /// Files visited.
    pub files: usize,
    /// Files that classified to a registry kind.
    pub symbols: usize,
    pub by_kind: BTreeMap<SymbolKind, usize>,
    /// Directories that could not be listed.
    pub unreadable: Vec<PathBuf>,
}

fn skipped(name: &str) -> bool {
    name.starts_with('.') || SKIPPED_DIRS.contains(&name)
}

/// Index every root of `project` into its registry.
pub async fn index_project(fs: &dyn FileSystem, project: &Project) -> IndexReport {
    let mut roots = project.roots();
    for addon_root in project.addon_roots() {
        if !roots.contains(&addon_root) {
            roots.push(addon_root);
        }
    }

    let mut report = IndexReport {
        roots: roots.clone(),
        ..IndexReport::default()
    };
    let mut seen_dirs: HashSet<PathBuf> = HashSet::new();
    let registry = project.registry();

    for root in roots {
        let mut stack = vec![root];
        while let Some(dir) = stack.pop() {
            if !seen_dirs.insert(dir.clone()) {
                continue;
            }
            let entries = match fs.read_directory(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(dir = %dir.display(), error = %e, "Skipping unreadable directory");
                    report.unreadable.push(dir);
                    continue;
                }
            };
            for entry in entries {
                if entry.is_dir {
                    if !entry.name().is_some_and(skipped) {
                        stack.push(entry.path);
                    }
                    continue;
                }
                report.files += 1;
                let Some((kind, name)) = project
                    .classify(&entry.path)
                    .and_then(|result| SymbolKind::from_match(&result))
                else {
                    continue;
                };
                registry.add(&name, kind, [&entry.path]);
                report.symbols += 1;
                *report.by_kind.entry(kind).or_default() += 1;
            }
        }
    }

    if !report.unreadable.is_empty() {
        warn!(
            root = %project.root().display(),
            count = report.unreadable.len(),
            "Some directories could not be indexed"
        );
    }
    project.invalidate();
    info!(
        root = %project.root().display(),
        files = report.files,
        symbols = report.symbols,
        "Project indexed"
    );
    report
}
