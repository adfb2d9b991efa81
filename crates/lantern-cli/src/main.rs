#![deny(unsafe_code)]

//! Lantern CLI: run the daemon, query it, or inspect a project offline.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use lantern_config::AppConfig;
use lantern_core::ipc::IpcClient;
use lantern_core::ipc::server::socket_path_from_config;
use lantern_core::{AddonCatalog, Daemon, LayoutMatcher, LocalFs, PathMatcher, Server, SymbolKind};

/// Lantern: project symbols and addon resolution for Ember-style apps.
#[derive(Debug, Parser)]
#[command(name = "lantern", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "lantern.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the daemon in the foreground.
    Serve,

    /// Stop a running daemon.
    Stop,

    /// Show daemon status.
    Status,

    /// Classify a file by layout convention.
    Classify {
        path: PathBuf,
        /// Project root the path is relative to. Without it, a running
        /// daemon is asked, else the path is classified as given.
        #[arg(long)]
        root: Option<PathBuf>,
        /// Pod layout prefix, e.g. `app/pods`.
        #[arg(long)]
        pod_prefix: Option<String>,
    },

    /// Discover addons, index a project and print registry counts.
    Index {
        root: PathBuf,
        #[arg(long)]
        pod_prefix: Option<String>,
    },

    /// Print a project's ordered addons and provider chains.
    Addons { root: PathBuf },

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config).await?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_filter(cli.verbose, &config))),
        )
        .with_writer(std::io::stderr)
        .init();
    if !cli.config.exists() {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    match cli.command {
        Commands::Serve => cmd_serve(config).await?,
        Commands::Stop => cmd_stop(&config).await?,
        Commands::Status => cmd_status(&config).await?,
        Commands::Classify {
            path,
            root,
            pod_prefix,
        } => {
            let out = cmd_classify(&config, &path, root.as_deref(), pod_prefix.as_deref()).await?;
            println!("{out}");
        }
        Commands::Index { root, pod_prefix } => {
            let out = cmd_index(config, &root, pod_prefix.as_deref()).await?;
            println!("{out}");
        }
        Commands::Addons { root } => {
            let out = cmd_addons(config, &root).await?;
            println!("{out}");
        }
        Commands::Config { show } => cmd_config(&cli.config, &config, show)?,
    }

    Ok(())
}

/// `-v` flags win over the configured `logging.level`.
fn log_filter(verbose: u8, config: &AppConfig) -> &str {
    match verbose {
        0 => &config.logging.level,
        1 => "debug",
        _ => "trace",
    }
}

async fn cmd_serve(config: AppConfig) -> Result<()> {
    info!("Starting Lantern daemon");
    Daemon::new(config).run().await?;
    Ok(())
}

async fn cmd_stop(config: &AppConfig) -> Result<()> {
    let client = IpcClient::new(socket_path_from_config(config));
    let stop = client.stop().await?;
    println!("{}", stop.message);
    Ok(())
}

async fn cmd_status(config: &AppConfig) -> Result<()> {
    let client = IpcClient::new(socket_path_from_config(config));
    let status = client.status().await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

async fn cmd_classify(
    config: &AppConfig,
    path: &Path,
    root: Option<&Path>,
    pod_prefix: Option<&str>,
) -> Result<String> {
    let matcher = LayoutMatcher::new(pod_prefix);
    let result = match root {
        Some(root) => matcher.classify_under(root, path),
        None => {
            let client = IpcClient::new(socket_path_from_config(config));
            if client.daemon_available() {
                client.classify(path).await?.result
            } else {
                matcher.classify(&path.to_string_lossy())
            }
        }
    };
    Ok(serde_json::to_string_pretty(&result)?)
}

/// A one-shot server over the local disk with eager indexing forced on.
fn offline_server(mut config: AppConfig) -> Server {
    config.server.eager_indexing = true;
    Server::new(config, Arc::new(LocalFs), AddonCatalog::with_registered())
}

async fn cmd_index(config: AppConfig, root: &Path, pod_prefix: Option<&str>) -> Result<String> {
    let server = offline_server(config);
    let project = server
        .load_project(root, pod_prefix)
        .await
        .with_context(|| format!("failed to load project at {}", root.display()))?;

    let view = project.registry_view();
    let counts: BTreeMap<SymbolKind, usize> = view
        .iter()
        .map(|(kind, names)| (*kind, names.len()))
        .collect();
    let report = serde_json::json!({
        "root": project.root(),
        "podPrefix": project.pod_prefix(),
        "roots": project.roots(),
        "symbols": counts,
        "initIssues": project.init_issues(),
    });
    server.shutdown();
    Ok(serde_json::to_string_pretty(&report)?)
}

async fn cmd_addons(config: AppConfig, root: &Path) -> Result<String> {
    let mut config = config;
    // Lazy load; only discovery and init are awaited.
    config.server.eager_indexing = false;
    let server = Server::new(config, Arc::new(LocalFs), AddonCatalog::with_registered());
    let project = server
        .load_project(root, None)
        .await
        .with_context(|| format!("failed to load project at {}", root.display()))?;
    project.wait_initialized().await;
    let summary = project.providers().summary();
    server.shutdown();
    Ok(serde_json::to_string_pretty(&summary)?)
}

fn cmd_config(config_path: &Path, config: &AppConfig, show: bool) -> Result<()> {
    if show {
        let toml_str = toml::to_string_pretty(config).context("failed to serialize config")?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

async fn load_config(path: &Path) -> Result<AppConfig> {
    let config = if path.exists() {
        AppConfig::load(path).await?
    } else {
        AppConfig::default()
    };
    config.validate()?;
    Ok(config)
}
