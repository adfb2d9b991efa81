//! Configuration builders for tests.

use std::path::Path;

use lantern_config::{AppConfig, ProjectConfig};

/// Fluent builder for [`AppConfig`] in tests.
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .eager_indexing(true)
///     .project("/work/app", Some("app/pods"))
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn socket_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.daemon.socket_path = Some(path.as_ref().to_string_lossy().into_owned());
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn eager_indexing(mut self, enabled: bool) -> Self {
        self.config.server.eager_indexing = enabled;
        self
    }

    pub fn collect_template_tokens(mut self, enabled: bool) -> Self {
        self.config.server.collect_template_tokens = enabled;
        self
    }

    pub fn builtin_providers(mut self, enabled: bool) -> Self {
        self.config.server.builtin_providers = enabled;
        self
    }

    pub fn max_tracked_files(mut self, limit: usize) -> Self {
        self.config.server.max_tracked_files = limit;
        self
    }

    pub fn addon(mut self, root: impl AsRef<Path>) -> Self {
        self.config
            .server
            .addons
            .push(root.as_ref().to_string_lossy().into_owned());
        self
    }

    pub fn ignore(mut self, root: impl AsRef<Path>) -> Self {
        self.config
            .server
            .ignored_projects
            .push(root.as_ref().to_string_lossy().into_owned());
        self
    }

    pub fn project(mut self, root: impl AsRef<Path>, pod_prefix: Option<&str>) -> Self {
        self.config.projects.push(ProjectConfig {
            root: root.as_ref().to_string_lossy().into_owned(),
            pod_prefix: pod_prefix.map(str::to_string),
        });
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
