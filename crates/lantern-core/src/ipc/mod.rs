//! Daemon IPC: HTTP/JSON over a Unix domain socket.
//!
//! The CLI talks to a running daemon through this API to check health,
//! request shutdown, and inspect loaded projects, the registry and addon
//! chains.
//!
//! ```text
//! ┌──────────┐         Unix socket        ┌──────────────┐
//! │   CLI    │───────────────────────────▶│  IPC Server  │
//! │          │  HTTP/1.1 + JSON           │  (axum)      │
//! └──────────┘                            └──────┬───────┘
//!                                                │
//!                                         ┌──────▼───────┐
//!                                         │    Server    │
//!                                         │  (projects)  │
//!                                         └──────────────┘
//! ```

pub mod client;
pub mod server;
pub mod types;

pub use client::IpcClient;
pub use server::{DEFAULT_SOCKET_PATH, IpcState};
pub use types::*;
