//! IPC client: typed calls to a running daemon over its Unix socket, using
//! `hyper` HTTP/1.1.

use std::path::{Path, PathBuf};

use hyper::body::Bytes;
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::net::UnixStream;
use tracing::debug;

use super::types::*;

/// Errors from the IPC client.
#[derive(Debug, thiserror::Error)]
pub enum IpcClientError {
    #[error("failed to connect to daemon socket at {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("daemon is not running (socket not found at {0})")]
    NotRunning(PathBuf),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("daemon returned error: {0}")]
    DaemonError(String),
}

/// Client for the Lantern daemon.
pub struct IpcClient {
    socket_path: PathBuf,
}

impl IpcClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    /// Whether the daemon socket exists.
    pub fn daemon_available(&self) -> bool {
        self.socket_path.exists()
    }

    async fn request(
        &self,
        method: hyper::Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Bytes, IpcClientError> {
        if !self.daemon_available() {
            return Err(IpcClientError::NotRunning(self.socket_path.clone()));
        }

        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| IpcClientError::Connect {
                path: self.socket_path.clone(),
                source: e,
            })?;

        let (mut sender, conn) = hyper::client::conn::http1::handshake::<
            _,
            http_body_util::Full<Bytes>,
        >(TokioIo::new(stream))
        .await
        .map_err(|e| IpcClientError::Request(format!("HTTP handshake failed: {e}")))?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::warn!(error = %e, "IPC connection error");
            }
        });

        debug!(%method, path, "IPC request");

        let mut builder = hyper::Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let req = builder
            .body(http_body_util::Full::new(Bytes::from(body.unwrap_or_default())))
            .map_err(|e| IpcClientError::Request(format!("failed to build request: {e}")))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| IpcClientError::Request(format!("request failed: {e}")))?;
        let status = resp.status();
        let resp_body = http_body_util::BodyExt::collect(resp.into_body())
            .await
            .map_err(|e| IpcClientError::Request(format!("failed to read response body: {e}")))?
            .to_bytes();

        if !status.is_success() {
            if let Ok(err) = serde_json::from_slice::<ErrorResponse>(&resp_body) {
                return Err(IpcClientError::DaemonError(err.error));
            }
            return Err(IpcClientError::Request(format!("unexpected status: {status}")));
        }
        Ok(resp_body)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, IpcClientError> {
        let body = self.request(hyper::Method::GET, path, None).await?;
        serde_json::from_slice(&body).map_err(|e| IpcClientError::Parse(format!("{path}: {e}")))
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        payload: Option<&B>,
    ) -> Result<T, IpcClientError> {
        let bytes = payload
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| IpcClientError::Parse(format!("failed to serialize request: {e}")))?;
        let body = self.request(hyper::Method::POST, path, bytes).await?;
        serde_json::from_slice(&body).map_err(|e| IpcClientError::Parse(format!("{path}: {e}")))
    }

    // ── Typed API methods ──────────────────────────────────────────────

    pub async fn health(&self) -> Result<HealthResponse, IpcClientError> {
        self.get("/health").await
    }

    pub async fn status(&self) -> Result<StatusResponse, IpcClientError> {
        self.get("/status").await
    }

    /// Request daemon shutdown.
    pub async fn stop(&self) -> Result<StopResponse, IpcClientError> {
        self.post::<(), _>("/stop", None).await
    }

    /// The daemon's current config as TOML.
    pub async fn config(&self) -> Result<ConfigResponse, IpcClientError> {
        self.get("/config").await
    }

    pub async fn projects(&self) -> Result<ProjectsResponse, IpcClientError> {
        self.get("/projects").await
    }

    /// Registry entries under `root`.
    pub async fn registry(&self, root: &Path) -> Result<RegistryResponse, IpcClientError> {
        let req = RootRequest {
            root: root.to_path_buf(),
        };
        self.post("/registry", Some(&req)).await
    }

    pub async fn classify(&self, path: &Path) -> Result<ClassifyResponse, IpcClientError> {
        let req = ClassifyRequest {
            path: path.to_path_buf(),
        };
        self.post("/classify", Some(&req)).await
    }

    /// Addon metadata and provider chains for a loaded project.
    pub async fn addons(&self, root: &Path) -> Result<AddonsResponse, IpcClientError> {
        let req = RootRequest {
            root: root.to_path_buf(),
        };
        self.post("/addons", Some(&req)).await
    }
}
