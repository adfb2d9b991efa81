//! Request/response bodies shared by the IPC server and client.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::addon::providers::ProvidersSummary;
use crate::project::ProjectStatus;
use crate::registry::{RegistryStats, RegistryView};
use crate::symbol::MatchResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub running: bool,
    pub version: String,
    pub uptime_secs: u64,
    pub socket_path: String,
    pub log_level: String,
    pub projects: usize,
    pub registry: RegistryStats,
    pub pid: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopResponse {
    pub acknowledged: bool,
    pub message: String,
}

/// Configuration as TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub toml: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectsResponse {
    pub projects: Vec<ProjectStatus>,
}

/// Body for requests naming a project or registry root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootRequest {
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryResponse {
    pub root: PathBuf,
    pub registry: RegistryView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyRequest {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyResponse {
    pub path: PathBuf,
    /// Root of the owning project, if any.
    pub project: Option<PathBuf>,
    pub result: Option<MatchResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddonsResponse {
    pub root: PathBuf,
    pub providers: ProvidersSummary,
}

/// Generic error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
