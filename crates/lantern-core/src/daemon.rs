//! Daemon process: hosts a [`Server`], the token worker and the IPC socket.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{info, warn};

use lantern_config::AppConfig;

use crate::addon::AddonCatalog;
use crate::fs::{FileSystem, LocalFs};
use crate::ipc::server::{self as ipc_server, IpcState, socket_path_from_config};
use crate::server::Server;

/// Shutdown signal sent via broadcast channel.
#[derive(Debug, Clone)]
pub struct ShutdownSignal;

pub struct Daemon {
    server: Arc<Server>,
    shutdown_tx: broadcast::Sender<ShutdownSignal>,
    _shutdown_rx: broadcast::Receiver<ShutdownSignal>,
}

impl Daemon {
    /// A daemon over the local file system with every compiled-in addon.
    pub fn new(config: AppConfig) -> Self {
        let fs: Arc<dyn FileSystem> = Arc::new(LocalFs);
        Self::with_server(Server::new(config, fs, AddonCatalog::with_registered()))
    }

    pub fn with_server(server: Server) -> Self {
        let (shutdown_tx, _shutdown_rx) = broadcast::channel(1);
        Self {
            server: Arc::new(server),
            shutdown_tx,
            _shutdown_rx,
        }
    }

    /// Load configured projects, start the token worker and the IPC server,
    /// then wait for a shutdown signal or Ctrl-C.
    pub async fn run(&self) -> Result<(), DaemonError> {
        let config = self.server.config().clone();
        let socket_path = socket_path_from_config(&config);
        info!(socket = %socket_path.display(), "Lantern daemon starting");

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let worker = Arc::clone(self.server.registry()).spawn_token_worker(
            Arc::clone(self.server.fs()),
            Duration::from_millis(config.server.token_job_delay_ms),
            self.shutdown_tx.subscribe(),
        );

        let state = Arc::new(IpcState {
            server: Arc::clone(&self.server),
            shutdown_tx: self.shutdown_tx.clone(),
            started_at: Instant::now(),
        });
        let ipc_shutdown = self.shutdown_tx.subscribe();
        let ipc = tokio::spawn(async move {
            if let Err(e) = ipc_server::serve(&socket_path, state, ipc_shutdown).await {
                warn!(error = %e, "IPC server failed");
            }
        });

        self.server.load_configured_projects().await;

        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received, stopping daemon");
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Ctrl-C received, initiating graceful shutdown");
                let _ = self.shutdown_tx.send(ShutdownSignal);
            }
        }

        self.server.shutdown();
        if let Err(e) = worker.await {
            warn!(error = %e, "Token worker did not stop cleanly");
        }
        if let Err(e) = ipc.await {
            warn!(error = %e, "IPC task did not stop cleanly");
        }
        info!("Daemon stopped");
        Ok(())
    }

    /// Request a graceful shutdown of the daemon.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(ShutdownSignal);
    }

    pub fn server(&self) -> &Arc<Server> {
        &self.server
    }

    pub fn config(&self) -> &AppConfig {
        self.server.config()
    }
}

/// Errors from the daemon runtime.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("daemon startup failed: {0}")]
    Startup(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
