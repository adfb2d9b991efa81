//! IPC server: axum router over a Unix domain socket.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tokio::net::UnixListener;
use tokio::sync::broadcast;
use tracing::info;

use lantern_config::AppConfig;

use super::types::*;
use crate::daemon::ShutdownSignal;
use crate::server::Server;

/// Shared state accessible to all IPC route handlers.
pub struct IpcState {
    pub server: Arc<Server>,
    pub shutdown_tx: broadcast::Sender<ShutdownSignal>,
    pub started_at: Instant,
}

/// Default Unix socket path for daemon IPC.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/lantern.sock";

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: error.into() }))
}

/// Build the axum router with all IPC routes.
pub fn router(state: Arc<IpcState>) -> axum::Router {
    axum::Router::new()
        .route("/health", get(handle_health))
        .route("/status", get(handle_status))
        .route("/stop", post(handle_stop))
        .route("/config", get(handle_config))
        .route("/projects", get(handle_projects))
        .route("/registry", post(handle_registry))
        .route("/classify", post(handle_classify))
        .route("/addons", post(handle_addons))
        .with_state(state)
}

/// Start the IPC server on the given Unix socket path.
///
/// Removes any stale socket file before binding. Runs until the
/// shutdown signal is received.
pub async fn serve(
    socket_path: &Path,
    state: Arc<IpcState>,
    mut shutdown_rx: broadcast::Receiver<ShutdownSignal>,
) -> Result<(), std::io::Error> {
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let listener = UnixListener::bind(socket_path)?;
    info!(path = %socket_path.display(), "IPC server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("IPC server shutting down");
        })
        .await?;

    std::fs::remove_file(socket_path).ok();
    Ok(())
}

/// Resolve the socket path from config or use the default.
pub fn socket_path_from_config(config: &AppConfig) -> PathBuf {
    config
        .daemon
        .socket_path
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH))
}

// ── Route handlers ──────────────────────────────────────────────────────

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_status(State(state): State<Arc<IpcState>>) -> Json<StatusResponse> {
    let config = state.server.config();
    Json(StatusResponse {
        running: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        socket_path: socket_path_from_config(config).display().to_string(),
        log_level: config.logging.level.clone(),
        projects: state.server.projects().len(),
        registry: state.server.registry().stats(),
        pid: std::process::id(),
    })
}

async fn handle_stop(State(state): State<Arc<IpcState>>) -> (StatusCode, Json<StopResponse>) {
    info!("Stop requested via IPC");
    let _ = state.shutdown_tx.send(ShutdownSignal);
    (
        StatusCode::OK,
        Json(StopResponse {
            acknowledged: true,
            message: "Shutdown initiated".to_string(),
        }),
    )
}

async fn handle_config(State(state): State<Arc<IpcState>>) -> Result<Json<ConfigResponse>, ApiError> {
    toml::to_string_pretty(state.server.config())
        .map(|toml| Json(ConfigResponse { toml }))
        .map_err(|e| {
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to serialize config: {e}"),
            )
        })
}

async fn handle_projects(State(state): State<Arc<IpcState>>) -> Json<ProjectsResponse> {
    Json(ProjectsResponse {
        projects: state.server.statuses(),
    })
}

async fn handle_registry(
    State(state): State<Arc<IpcState>>,
    Json(req): Json<RootRequest>,
) -> Json<RegistryResponse> {
    let registry = state.server.registry_view_for_root(&req.root);
    Json(RegistryResponse {
        root: req.root,
        registry,
    })
}

async fn handle_classify(
    State(state): State<Arc<IpcState>>,
    Json(req): Json<ClassifyRequest>,
) -> Json<ClassifyResponse> {
    let project = state.server.project_for_path(&req.path);
    let result = project.as_ref().and_then(|p| p.classify(&req.path));
    Json(ClassifyResponse {
        project: project.map(|p| p.root().to_path_buf()),
        path: req.path,
        result,
    })
}

async fn handle_addons(
    State(state): State<Arc<IpcState>>,
    Json(req): Json<RootRequest>,
) -> Result<Json<AddonsResponse>, ApiError> {
    let providers = state.server.addons(&req.root).ok_or_else(|| {
        api_error(
            StatusCode::NOT_FOUND,
            format!("no project loaded at {}", req.root.display()),
        )
    })?;
    Ok(Json(AddonsResponse {
        root: req.root,
        providers,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addon::AddonCatalog;
    use crate::fs::MemoryFs;
    use crate::symbol::{SymbolKind, SymbolType};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn test_state() -> Arc<IpcState> {
        let fs = MemoryFs::new()
            .with_file("/p/package.json", r#"{"name": "app"}"#)
            .with_file("/p/app/helpers/format-date.js", "");
        let server = Server::new(AppConfig::default(), Arc::new(fs), AddonCatalog::new());
        server.load_project(Path::new("/p"), None).await.unwrap();
        let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);
        Arc::new(IpcState {
            server: Arc::new(server),
            shutdown_tx,
            started_at: Instant::now(),
        })
    }

    fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_of<T: serde::de::DeserializeOwned>(resp: axum::response::Response) -> T {
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = router(test_state().await);
        let req = Request::get("/health").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let health: HealthResponse = body_of(resp).await;
        assert_eq!(health.status, "ok");
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let app = router(test_state().await);
        let req = Request::get("/status").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let status: StatusResponse = body_of(resp).await;
        assert!(status.running);
        assert_eq!(status.projects, 1);
        assert_eq!(status.socket_path, DEFAULT_SOCKET_PATH);
        assert_eq!(status.registry.names[&SymbolKind::Helper], 1);
    }

    #[tokio::test]
    async fn test_stop_endpoint() {
        let state = test_state().await;
        let mut rx = state.shutdown_tx.subscribe();
        let app = router(state);

        let req = Request::post("/stop").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let stop: StopResponse = body_of(resp).await;
        assert!(stop.acknowledged);
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_config_endpoint() {
        let app = router(test_state().await);
        let req = Request::get("/config").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let config: ConfigResponse = body_of(resp).await;
        assert!(config.toml.contains("max_tracked_files"));
    }

    #[tokio::test]
    async fn test_projects_endpoint() {
        let app = router(test_state().await);
        let req = Request::get("/projects").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let projects: ProjectsResponse = body_of(resp).await;
        assert_eq!(projects.projects.len(), 1);
        assert_eq!(projects.projects[0].root, PathBuf::from("/p"));
        assert!(projects.projects[0].initialized);
    }

    #[tokio::test]
    async fn test_registry_endpoint() {
        let app = router(test_state().await);
        let resp = app
            .oneshot(json_post("/registry", serde_json::json!({"root": "/p"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let registry: RegistryResponse = body_of(resp).await;
        assert!(registry.registry[&SymbolKind::Helper].contains_key("format-date"));
    }

    #[tokio::test]
    async fn test_classify_endpoint() {
        let app = router(test_state().await);
        let resp = app
            .oneshot(json_post(
                "/classify",
                serde_json::json!({"path": "/p/app/helpers/format-date.js"}),
            ))
            .await
            .unwrap();
        let classified: ClassifyResponse = body_of(resp).await;
        assert_eq!(classified.project, Some(PathBuf::from("/p")));
        let result = classified.result.unwrap();
        assert_eq!(result.symbol_type, SymbolType::Helper);
        assert_eq!(result.name, "format-date");
    }

    #[tokio::test]
    async fn test_addons_endpoint_unknown_root() {
        let app = router(test_state().await);
        let resp = app
            .oneshot(json_post("/addons", serde_json::json!({"root": "/nope"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let error: ErrorResponse = body_of(resp).await;
        assert!(error.error.contains("/nope"));
    }

    #[tokio::test]
    async fn test_addons_endpoint() {
        let app = router(test_state().await);
        let resp = app
            .oneshot(json_post("/addons", serde_json::json!({"root": "/p"})))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let addons: AddonsResponse = body_of(resp).await;
        assert_eq!(addons.providers.addons_meta.len(), 1);
        assert!(addons.providers.completion.is_empty());
    }
}
