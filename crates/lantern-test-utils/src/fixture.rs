//! On-disk project fixtures.
//!
//! [`FixtureProject`] lays out an app (package manifest, source files,
//! installed addons) in a temp directory that is removed on drop, even when
//! the test panics.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

pub struct FixtureProject {
    root: PathBuf,
    _temp_dir: TempDir,
}

impl FixtureProject {
    /// An empty app named `name` with no dependencies.
    pub fn new(name: &str) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let root = temp_dir.path().join(name);
        std::fs::create_dir_all(&root).expect("failed to create project root");
        let fixture = Self {
            root,
            _temp_dir: temp_dir,
        };
        fixture.with_file("package.json", &format!(r#"{{"name": "{name}"}}"#))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Write `contents` at `relative`, creating parent directories.
    pub fn with_file(self, relative: &str, contents: &str) -> Self {
        self.write(relative, contents);
        self
    }

    pub fn write(&self, relative: &str, contents: &str) {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create fixture directory");
        }
        std::fs::write(&path, contents).expect("failed to write fixture file");
    }

    pub fn remove(&self, relative: &str) {
        std::fs::remove_file(self.root.join(relative)).expect("failed to remove fixture file");
    }

    /// Replace the root manifest.
    pub fn with_manifest(self, manifest: &str) -> Self {
        self.with_file("package.json", manifest)
    }

    /// Install a package under `node_modules/<name>` with the given manifest.
    pub fn with_package(self, name: &str, manifest: &str) -> Self {
        self.with_file(&format!("node_modules/{name}/package.json"), manifest)
    }

    /// Install an addon declaring an extension entry with the given
    /// `ember-language-server` block.
    pub fn with_extension_addon(self, name: &str, extension: &str) -> Self {
        let manifest = format!(
            r#"{{"name": "{name}", "keywords": ["ember-addon"], "ember-language-server": {extension}}}"#
        );
        self.with_package(name, &manifest)
    }
}
