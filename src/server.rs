//! Server module for StreamScene
//!
//! Contains the main server initialization and runtime logic.

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use streamscene_realtime::{
    realtime_ws_handler, CanvasStore, CommentStore, RealtimeService, RealtimeState, ShareStore,
    SnapshotPolicy,
};

use crate::api::{api_router, ApiContext};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://streamscene.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

/// Realtime configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// Minimum milliseconds between persisted draw snapshots per canvas
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval_ms: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            snapshot_interval_ms: default_snapshot_interval(),
        }
    }
}

fn default_snapshot_interval() -> u64 {
    2000
}

/// Embedded default configuration (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Load configuration from files and environment
pub(crate) fn load_config() -> Result<AppConfig> {
    let config = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. External overrides (optional)
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name("config/local").required(false))
        // 3. Environment variables (highest priority)
        // prefix_separator("_") so STREAMSCENE_SERVER__PORT works with a
        // single underscore after the prefix.
        .add_source(
            Environment::with_prefix("STREAMSCENE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

/// Run the server
pub async fn run(config: AppConfig) -> Result<()> {
    info!("Starting StreamScene v{}", env!("CARGO_PKG_VERSION"));

    let connect_options = SqliteConnectOptions::from_str(&config.database.url)
        .context("Invalid database URL")?
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect_with(connect_options)
        .await
        .context("Failed to open SQLite database")?;
    info!("Database connected: {}", config.database.url);

    let canvases = CanvasStore::new(pool.clone());
    canvases.init().await.context("Canvas schema init failed")?;
    let comments = CommentStore::new(pool.clone());
    comments.init().await.context("Comment schema init failed")?;
    let shares = ShareStore::new(pool.clone());
    shares.init().await.context("Share schema init failed")?;
    info!("Database schema initialized");

    let snapshots = SnapshotPolicy::with_min_interval(Duration::from_millis(
        config.realtime.snapshot_interval_ms,
    ));
    let service = Arc::new(RealtimeService::new(canvases, comments).with_snapshot_policy(snapshots));
    let realtime_state = Arc::new(RealtimeState::new(service.clone()));
    info!(
        "Realtime service initialized (snapshot interval: {}ms)",
        config.realtime.snapshot_interval_ms
    );

    let context = ApiContext::new(service, Arc::new(shares));

    let app = Router::new()
        .route("/", get(|| async { "StreamScene" }))
        .merge(api_router(context))
        .merge(
            Router::new()
                .route("/api/v1/realtime/ws", get(realtime_ws_handler))
                .with_state(realtime_state),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    info!("HTTP server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("StreamScene shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
