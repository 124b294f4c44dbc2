//! fitmatch-tp (Trainer Profiles) - HTTP service entry point
//!
//! Serves trainer profile resolution, profile patches, and resolution
//! diagnostics over a local SQLite database.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fitmatch_common::config::{resolve_config_path, TomlConfig};
use fitmatch_tp::store::SqliteTrainerStore;
use fitmatch_tp::{build_router, AppState};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for fitmatch-tp
#[derive(Parser, Debug)]
#[command(name = "fitmatch-tp")]
#[command(about = "Trainer profile resolution service for FitMatch")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "FITMATCH_TP_PORT")]
    port: Option<u16>,

    /// SQLite database file (overrides FITMATCH_DATABASE and the config file)
    #[arg(short, long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config problems are reported once tracing is up
    let config_path = resolve_config_path(args.config.as_deref());
    let (config, config_warning) = match config_path.as_deref() {
        Some(path) => match TomlConfig::load(path) {
            Ok(config) => (config, None),
            Err(e) => (TomlConfig::default(), Some(e.to_string())),
        },
        None => (TomlConfig::default(), None),
    };

    // Initialize tracing: RUST_LOG wins over the config file level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting FitMatch Trainer Profiles (fitmatch-tp) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    if let Some(warning) = config_warning {
        warn!("{}; using default configuration", warning);
    }

    let db_path = config.resolve_database_path(args.database.as_deref());
    info!("Database: {}", db_path.display());

    let pool = fitmatch_common::db::init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let state = AppState::new(Arc::new(SqliteTrainerStore::new(pool)));
    let app = build_router(state);

    let port = args.port.unwrap_or(config.port);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("fitmatch-tp listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
