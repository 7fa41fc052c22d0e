//! StreamScene - Content creation workspace server
//!
//! Entry point for the realtime collaboration and comment API server.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod middleware;
mod server;

/// StreamScene server
#[derive(Debug, Parser)]
#[command(name = "streamscene", version, about)]
struct Cli {
    /// Port override for the HTTP server
    #[arg(long)]
    port: Option<u16>,

    /// Host override for the HTTP server
    #[arg(long)]
    host: Option<String>,

    /// Database URL override
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "streamscene=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = server::load_config()?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }

    server::run(config).await
}
