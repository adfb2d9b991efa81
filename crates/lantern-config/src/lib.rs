#![deny(unsafe_code)]

//! Configuration loading and validation for Lantern.
//!
//! Loads TOML configuration files and validates them. [`AppConfig`] is the
//! central configuration structure shared by the daemon, the CLI and the
//! server facade in `lantern-core`.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Daemon process configuration.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Indexing and provider behaviour shared by every project.
    #[serde(default)]
    pub server: ServerConfig,

    /// Projects loaded when the daemon starts.
    #[serde(default)]
    pub projects: Vec<ProjectConfig>,
}

/// Configuration for the daemon process.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Unix socket the control plane listens on. Falls back to the
    /// compiled-in default when unset.
    #[serde(default)]
    pub socket_path: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Server-wide indexing and provider settings.
///
/// ## TOML Example
///
/// ```toml
/// [server]
/// eager_indexing = true
/// collect_template_tokens = true
/// token_job_delay_ms = 5
/// max_tracked_files = 10000
/// builtin_providers = true
/// addons = ["/work/shared-addons/my-addon"]
/// ignored_projects = ["/work/legacy-app"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Discover addons and index every project before serving requests.
    /// When false, discovery runs in the background and early requests see
    /// partial results.
    #[serde(default = "default_true")]
    pub eager_indexing: bool,

    /// Extract usage tokens (referenced components/helpers, yields) from
    /// templates as they enter the registry.
    #[serde(default = "default_true")]
    pub collect_template_tokens: bool,

    /// Delay between two usage-token extraction jobs, in milliseconds.
    #[serde(default = "default_token_job_delay_ms")]
    pub token_job_delay_ms: u64,

    /// Tracked-file ceiling per project. Exceeding it clears the tracking
    /// map and forces a full registry rebuild.
    #[serde(default = "default_max_tracked_files")]
    pub max_tracked_files: usize,

    /// Run the registry-backed builtin providers ahead of addon providers.
    #[serde(default = "default_true")]
    pub builtin_providers: bool,

    /// Extra addon roots handed to every project's addon discovery.
    #[serde(default)]
    pub addons: Vec<String>,

    /// Project roots that must never be loaded.
    #[serde(default)]
    pub ignored_projects: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            eager_indexing: true,
            collect_template_tokens: true,
            token_job_delay_ms: default_token_job_delay_ms(),
            max_tracked_files: default_max_tracked_files(),
            builtin_providers: true,
            addons: Vec::new(),
            ignored_projects: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_token_job_delay_ms() -> u64 {
    5
}

fn default_max_tracked_files() -> usize {
    10_000
}

/// A project loaded at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Absolute project root (the directory holding `package.json`).
    pub root: String,

    /// Pod layout prefix relative to the root (e.g. `app/pods`). Detected
    /// from `config/environment.js` when unset.
    #[serde(default)]
    pub pod_prefix: Option<String>,
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        debug!(path = %path.display(), bytes = content.len(), "Loaded config file");
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }

        if let Some(socket) = &self.daemon.socket_path
            && socket.is_empty()
        {
            return Err(ConfigError::Validation(
                "daemon.socket_path must not be empty when set".to_string(),
            ));
        }

        if self.server.max_tracked_files == 0 {
            return Err(ConfigError::Validation(
                "server.max_tracked_files must be at least 1".to_string(),
            ));
        }
        if self.server.token_job_delay_ms > 10_000 {
            return Err(ConfigError::Validation(format!(
                "server.token_job_delay_ms must be at most 10000, got {}",
                self.server.token_job_delay_ms
            )));
        }
        for (i, addon) in self.server.addons.iter().enumerate() {
            if addon.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "server.addons[{i}] must not be empty"
                )));
            }
        }

        let mut seen = HashSet::new();
        for (i, project) in self.projects.iter().enumerate() {
            if project.root.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "projects[{i}].root must not be empty"
                )));
            }
            if !seen.insert(project.root.trim_end_matches('/')) {
                return Err(ConfigError::Validation(format!(
                    "projects[{i}].root {:?} is listed more than once",
                    project.root
                )));
            }
            if let Some(prefix) = &project.pod_prefix
                && (prefix.is_empty() || prefix.starts_with('/') || prefix.ends_with('/'))
            {
                return Err(ConfigError::Validation(format!(
                    "projects[{i}].pod_prefix must be a non-empty relative path without \
                     leading or trailing '/', got {prefix:?}"
                )));
            }
        }

        Ok(())
    }

    /// Whether the given project root is listed in `server.ignored_projects`.
    pub fn is_ignored(&self, root: &Path) -> bool {
        self.server
            .ignored_projects
            .iter()
            .any(|ignored| Path::new(ignored) == root)
    }
}
