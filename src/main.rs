use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

mod config;
mod db;
mod ingest;
mod query;
mod util;
mod web;

use crate::config::{AppConfig, CliArgs};
use crate::ingest::sales::ChocolateSalesLoader;
use crate::util::logging::init_tracing;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Admin path: bulk-load the chocolate sales CSV and exit
    if let Some(csv_path) = &args.load_chocolate {
        info!("Loading chocolate sales data from {}", csv_path.display());
        let loader = ChocolateSalesLoader::new(config.database.clone());
        let csv_path = csv_path.clone();
        let loaded = tokio::task::spawn_blocking(move || loader.load(&csv_path)).await??;
        info!("Loaded {} rows into {}", loaded, config.database.path);
        return Ok(());
    }

    // Create application state
    let app_state = Arc::new(AppState::new(config.clone()));

    // Start the web server
    info!(
        "Starting sales-scope server on {}:{}",
        config.web.host, config.web.port
    );
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
