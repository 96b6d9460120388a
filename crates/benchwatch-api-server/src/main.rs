// ABOUTME: Benchwatch API server entry point
// Connects the historic store, spawns the retention sweeper, and serves the
// dashboard, Grafana and WebSocket surfaces.

use anyhow::Result;
use benchwatch_api_server::config::ApiServerConfig;
use benchwatch_api_server::server::ApiServer;
use benchwatch_api_server::state::AppState;
use benchwatch_core::{HistoricStore, RetentionSweeper};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "benchwatch-api-server", about = "Benchwatch performance observatory API")]
struct Args {
    /// Bind host (overrides BENCHWATCH_API_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides BENCHWATCH_API_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Storage config YAML path (overrides BENCHWATCH_STORAGE_CONFIG)
    #[arg(long)]
    storage_config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    if let Some(path) = &args.storage_config {
        std::env::set_var("BENCHWATCH_STORAGE_CONFIG", path);
    }

    let mut config = ApiServerConfig::from_env()?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    info!("Starting Benchwatch API Server");

    let storage_config = ApiServerConfig::load_storage_config()?;
    let store = HistoricStore::connect(storage_config).await?;
    let state = AppState::new(store, &config);

    let _sweeper = RetentionSweeper::spawn(state.store.clone());

    let server = ApiServer::new(config, state)?;
    if let Err(e) = server.run().await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
