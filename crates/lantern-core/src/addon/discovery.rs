//! Find the packages that can contribute symbols or extensions to a
//! project.
//!
//! Candidates, in order: explicitly configured roots, the project root,
//! resolved dependencies (breadth first), then in-repo addons under `lib/`
//! and `ember-addon.paths`. A path is listed once, at its first position.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info, warn};

use crate::fs::FileSystem;
use crate::registry::normalize_path;

use super::catalog::{AddonCatalog, LoadedAddon};
use super::graph::AddonGraph;
use super::manifest::{AddonMeta, PackageManifest};
use super::providers::{ProjectProviders, build_providers};

/// Conventional directory holding in-repo addons.
pub const IN_REPO_DIR: &str = "lib";

/// Result of walking a project's package tree.
#[derive(Debug, Default)]
pub struct Discovery {
    pub root: PathBuf,
    /// Candidate roots with their manifests, in discovery order. Roots
    /// whose manifest could not be read are left out.
    pub packages: IndexMap<PathBuf, PackageManifest>,
}

impl Discovery {
    /// Metadata for every discovered package.
    pub fn addons_meta(&self) -> Vec<AddonMeta> {
        self.packages
            .iter()
            .map(|(root, manifest)| manifest.meta(root))
            .collect()
    }

    /// Roots whose files belong to this project: the project root plus
    /// addon roots that live outside it.
    pub fn project_roots(&self) -> Vec<PathBuf> {
        let mut roots = vec![self.root.clone()];
        for (path, manifest) in &self.packages {
            if manifest.is_addon() && !path.starts_with(&self.root) && !roots.contains(path) {
                roots.push(path.clone());
            }
        }
        roots
    }

    /// Addon roots (any version) other than the project root.
    pub fn addon_roots(&self) -> Vec<PathBuf> {
        self.packages
            .iter()
            .filter(|(path, manifest)| manifest.is_addon() && **path != self.root)
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Load every declared extension and order the provider chains.
    pub fn providers(&self, catalog: &AddonCatalog) -> ProjectProviders {
        let mut graph = AddonGraph::new();
        let mut loaded: IndexMap<String, Arc<LoadedAddon>> = IndexMap::new();

        for (root, manifest) in &self.packages {
            let Some(extension) = &manifest.extension else {
                continue;
            };
            if manifest.name.is_empty() || loaded.contains_key(&manifest.name) {
                warn!(root = %root.display(), "Skipping unnamed or duplicate extension package");
                continue;
            }
            let addon = catalog.load(&manifest.name, root.clone(), extension);
            graph.add_package(&manifest.name, &extension.before, &extension.after);
            loaded.insert(manifest.name.clone(), Arc::new(addon));
        }

        let ordered: Vec<Arc<LoadedAddon>> = graph
            .order()
            .into_iter()
            .filter_map(|name| loaded.get(&name).cloned())
            .collect();
        info!(
            root = %self.root.display(),
            extensions = ordered.len(),
            packages = self.packages.len(),
            "Addon providers resolved"
        );
        build_providers(ordered, self.addons_meta())
    }
}

/// Walk the package tree of `root`.
pub async fn discover(fs: &dyn FileSystem, root: &Path, explicit: &[PathBuf]) -> Discovery {
    let root = normalize_path(root);
    let mut order: IndexSet<PathBuf> = IndexSet::new();
    let mut packages: IndexMap<PathBuf, PackageManifest> = IndexMap::new();

    for candidate in explicit.iter().map(|p| normalize_path(p)).chain([root.clone()]) {
        if order.insert(candidate.clone()) {
            read_into(fs, &candidate, &mut packages).await;
        }
    }

    // Dependencies, breadth first. Only the top level contributes
    // devDependencies.
    let mut queue: VecDeque<(PathBuf, bool)> = VecDeque::from([(root.clone(), true)]);
    while let Some((dir, top_level)) = queue.pop_front() {
        let Some(manifest) = packages.get(&dir).cloned() else {
            continue;
        };
        let mut names: Vec<&String> = manifest
            .dependencies
            .keys()
            .chain(manifest.peer_dependencies.keys())
            .collect();
        if top_level {
            names.extend(manifest.dev_dependencies.keys());
        }

        for name in names {
            let Some(resolved) = resolve_package(fs, &dir, name).await else {
                debug!(package = %name, from = %dir.display(), "Dependency not installed");
                continue;
            };
            if !order.insert(resolved.clone()) {
                continue;
            }
            if !read_into(fs, &resolved, &mut packages).await {
                continue;
            }
            let recurse = packages
                .get(&resolved)
                .is_some_and(|m| m.is_addon() || m.extension.is_some());
            if recurse {
                queue.push_back((resolved, false));
            }
        }
    }

    for candidate in in_repo_candidates(fs, &root, packages.get(&root)).await {
        if order.contains(&candidate) {
            continue;
        }
        let Ok(manifest) = PackageManifest::read(fs, &candidate).await else {
            continue;
        };
        if !manifest.is_addon() || !fs.exists(&candidate.join(manifest.entry_script())).await {
            debug!(path = %candidate.display(), "Not an in-repo addon");
            continue;
        }
        order.insert(candidate.clone());
        packages.insert(candidate, manifest);
    }

    debug!(root = %root.display(), packages = packages.len(), "Discovery finished");
    Discovery { root, packages }
}

/// Read `<dir>/package.json` into `packages`. Returns whether it parsed.
async fn read_into(
    fs: &dyn FileSystem,
    dir: &Path,
    packages: &mut IndexMap<PathBuf, PackageManifest>,
) -> bool {
    match PackageManifest::read(fs, dir).await {
        Ok(manifest) => {
            packages.insert(dir.to_path_buf(), manifest);
            true
        }
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "Skipping package");
            false
        }
    }
}

/// Find `node_modules/<name>` starting at `from` and walking up.
pub async fn resolve_package(fs: &dyn FileSystem, from: &Path, name: &str) -> Option<PathBuf> {
    for dir in from.ancestors() {
        let candidate = dir.join("node_modules").join(name);
        if fs.exists(&candidate.join("package.json")).await {
            return Some(candidate);
        }
    }
    None
}

async fn in_repo_candidates(
    fs: &dyn FileSystem,
    root: &Path,
    manifest: Option<&PackageManifest>,
) -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Ok(entries) = fs.read_directory(&root.join(IN_REPO_DIR)).await {
        out.extend(entries.into_iter().filter(|e| e.is_dir).map(|e| e.path));
    }
    if let Some(manifest) = manifest {
        out.extend(
            manifest
                .in_repo_paths()
                .iter()
                .map(|p| normalize_path(&root.join(p))),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFs;
    use pretty_assertions::assert_eq;

    fn project() -> MemoryFs {
        MemoryFs::new()
            .with_file(
                "/w/app/package.json",
                r#"{
                    "name": "app",
                    "dependencies": {"ember-ui": "*", "lodash": "*"},
                    "devDependencies": {"ember-test-kit": "*"},
                    "ember-addon": {"paths": ["engines/admin"]}
                }"#,
            )
            .with_file(
                "/w/app/node_modules/ember-ui/package.json",
                r#"{"name": "ember-ui", "keywords": ["ember-addon"], "dependencies": {"ember-icons": "*"}, "devDependencies": {"ember-never": "*"}}"#,
            )
            .with_file(
                "/w/node_modules/ember-icons/package.json",
                r#"{"name": "ember-icons", "keywords": ["ember-addon"], "ember-addon": {"version": 2}}"#,
            )
            .with_file(
                "/w/app/node_modules/ember-never/package.json",
                r#"{"name": "ember-never", "keywords": ["ember-addon"]}"#,
            )
            .with_file(
                "/w/app/node_modules/lodash/package.json",
                r#"{"name": "lodash", "dependencies": {"never-visited": "*"}}"#,
            )
            .with_file(
                "/w/app/node_modules/never-visited/package.json",
                r#"{"name": "never-visited"}"#,
            )
            .with_file(
                "/w/app/node_modules/ember-test-kit/package.json",
                r#"{"name": "ember-test-kit", "keywords": ["ember-addon"]}"#,
            )
            .with_file(
                "/w/app/lib/local-thing/package.json",
                r#"{"name": "local-thing", "keywords": ["ember-addon"]}"#,
            )
            .with_file("/w/app/lib/local-thing/index.js", "")
            .with_file(
                "/w/app/lib/no-entry/package.json",
                r#"{"name": "no-entry", "keywords": ["ember-addon"], "main": "missing.js"}"#,
            )
            .with_file(
                "/w/app/lib/not-addon/package.json",
                r#"{"name": "not-addon"}"#,
            )
            .with_file("/w/app/lib/not-addon/index.js", "")
            .with_file(
                "/w/app/engines/admin/package.json",
                r#"{"name": "admin", "keywords": ["ember-addon"], "main": "main.js"}"#,
            )
            .with_file("/w/app/engines/admin/main.js", "")
    }

    fn names(discovery: &Discovery) -> Vec<String> {
        discovery.packages.values().map(|m| m.name.clone()).collect()
    }

    #[tokio::test]
    async fn test_discovery_order_and_filters() {
        let fs = project();
        let discovery = discover(&fs, Path::new("/w/app"), &[]).await;
        assert_eq!(
            names(&discovery),
            vec![
                "app",
                "ember-ui",
                "lodash",
                "ember-test-kit",
                "ember-icons",
                "local-thing",
                "admin",
            ]
        );
    }

    #[tokio::test]
    async fn test_dependency_lookup_walks_up() {
        let fs = project();
        let found = resolve_package(&fs, Path::new("/w/app/node_modules/ember-ui"), "ember-icons")
            .await
            .unwrap();
        assert_eq!(found, PathBuf::from("/w/node_modules/ember-icons"));
        assert!(resolve_package(&fs, Path::new("/w/app"), "nope").await.is_none());
    }

    #[tokio::test]
    async fn test_meta_and_project_roots() {
        let fs = project();
        let discovery = discover(&fs, Path::new("/w/app"), &[]).await;

        let meta = discovery.addons_meta();
        let icons = meta.iter().find(|m| m.name == "ember-icons").unwrap();
        assert_eq!(icons.version, Some(2));
        let lodash = meta.iter().find(|m| m.name == "lodash").unwrap();
        assert_eq!(lodash.version, None);
        let ui = meta.iter().find(|m| m.name == "ember-ui").unwrap();
        assert_eq!(ui.version, Some(1));

        // node_modules under the root stays covered by the root itself.
        assert_eq!(
            discovery.project_roots(),
            vec![
                PathBuf::from("/w/app"),
                PathBuf::from("/w/node_modules/ember-icons"),
            ]
        );
    }

    #[tokio::test]
    async fn test_explicit_roots_first() {
        let fs = project().with_file(
            "/elsewhere/extra/package.json",
            r#"{"name": "extra", "keywords": ["ember-addon"]}"#,
        );
        let discovery = discover(&fs, Path::new("/w/app"), &[PathBuf::from("/elsewhere/extra")]).await;
        assert_eq!(names(&discovery)[..2].to_vec(), vec!["extra", "app"]);
    }

    #[tokio::test]
    async fn test_loose_extension_blocks_keep_the_package() {
        let fs = MemoryFs::new()
            .with_file(
                "/w/app/package.json",
                r#"{"name": "app", "dependencies": {"ember-typed": "*", "ember-draft": "*"}}"#,
            )
            .with_file(
                "/w/app/node_modules/ember-typed/package.json",
                r#"{
                    "name": "ember-typed",
                    "keywords": ["ember-addon"],
                    "ember-language-server": {
                        "entry": "index",
                        "capabilities": {"completionProvider": {"triggerCharacters": ["."]}}
                    }
                }"#,
            )
            .with_file(
                "/w/app/node_modules/ember-draft/package.json",
                r#"{
                    "name": "ember-draft",
                    "keywords": ["ember-addon"],
                    "dependencies": {"ember-leaf": "*"},
                    "ember-language-server": {"capabilities": {"hoverProvider": true}}
                }"#,
            )
            .with_file(
                "/w/app/node_modules/ember-leaf/package.json",
                r#"{"name": "ember-leaf", "keywords": ["ember-addon"]}"#,
            );
        let discovery = discover(&fs, Path::new("/w/app"), &[]).await;
        assert_eq!(
            names(&discovery),
            vec!["app", "ember-typed", "ember-draft", "ember-leaf"]
        );

        let typed = &discovery.packages[&PathBuf::from("/w/app/node_modules/ember-typed")];
        assert!(typed.extension.as_ref().unwrap().capabilities.completion_provider);
        let draft = &discovery.packages[&PathBuf::from("/w/app/node_modules/ember-draft")];
        assert!(draft.extension.is_none());
        let meta = discovery.addons_meta();
        assert!(meta.iter().any(|m| m.name == "ember-draft" && m.version == Some(1)));
    }

    #[tokio::test]
    async fn test_missing_root_manifest() {
        let fs = MemoryFs::new();
        let discovery = discover(&fs, Path::new("/nothing"), &[]).await;
        assert!(discovery.packages.is_empty());
        assert_eq!(discovery.project_roots(), vec![PathBuf::from("/nothing")]);
    }
}
