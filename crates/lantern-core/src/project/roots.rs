//! The set of loaded projects, keyed by normalized root.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::info;

use crate::registry::normalize_path;

use super::{Project, ProjectError};

#[derive(Debug, Default)]
pub struct ProjectRoots {
    projects: RwLock<BTreeMap<PathBuf, Arc<Project>>>,
    ignored: Vec<PathBuf>,
}

impl ProjectRoots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Roots that [`add`](Self::add) refuses, along with anything under them.
    pub fn with_ignored<I, P>(mut self, ignored: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.ignored = ignored
            .into_iter()
            .map(|p| normalize_path(p.as_ref()))
            .collect();
        self
    }

    pub fn is_ignored(&self, root: &Path) -> bool {
        let root = normalize_path(root);
        self.ignored.iter().any(|ignored| root.starts_with(ignored))
    }

    pub fn add(&self, project: Arc<Project>) -> Result<Arc<Project>, ProjectError> {
        let root = project.root().to_path_buf();
        if self.is_ignored(&root) {
            return Err(ProjectError::Ignored(root));
        }
        let mut projects = self
            .projects
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if projects.contains_key(&root) {
            return Err(ProjectError::AlreadyLoaded(root));
        }
        projects.insert(root.clone(), Arc::clone(&project));
        info!(root = %root.display(), total = projects.len(), "Project added");
        Ok(project)
    }

    /// Drop a project and run its destructors.
    pub fn remove(&self, root: &Path) -> Result<Arc<Project>, ProjectError> {
        let root = normalize_path(root);
        let removed = self
            .projects
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&root)
            .ok_or_else(|| ProjectError::NotFound(root.clone()))?;
        removed.unload();
        Ok(removed)
    }

    pub fn get(&self, root: &Path) -> Option<Arc<Project>> {
        let root = normalize_path(root);
        self.projects
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&root)
            .cloned()
    }

    pub fn list(&self) -> Vec<Arc<Project>> {
        self.projects
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.projects
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The project owning `path`: the deepest project root that contains it,
    /// else a project whose addon roots contain it.
    pub fn project_for_path(&self, path: &Path) -> Option<Arc<Project>> {
        let path = normalize_path(path);
        let projects = self
            .projects
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        projects
            .iter()
            .filter(|(root, _)| path.starts_with(root))
            .max_by_key(|(root, _)| root.components().count())
            .map(|(_, project)| Arc::clone(project))
            .or_else(|| projects.values().find(|p| p.contains(&path)).cloned())
    }
}
