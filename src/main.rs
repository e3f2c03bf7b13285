use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use gatekeep::{AuthService, Config, Database, SessionCleanup};

const CONFIG_PATH: &str = "gatekeep.toml";

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env(CONFIG_PATH) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {CONFIG_PATH}: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = gatekeep::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        gatekeep::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("{e}");
        std::process::exit(1);
    }

    let db = match Database::open(&config.storage).await {
        Ok(db) => db,
        Err(e) => {
            error!(error = %e, "Failed to open storage");
            std::process::exit(1);
        }
    };

    let service = match AuthService::from_config(db, &config) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            error!(error = %e, "Failed to build authentication service");
            std::process::exit(1);
        }
    };

    let cleanup = SessionCleanup::spawn(
        Arc::clone(&service),
        Duration::from_secs(config.session.cleanup_interval_secs.max(1)),
    );

    info!(
        session_ttl_secs = service.sessions().ttl().as_secs(),
        "gatekeep ready"
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }

    info!("Shutting down");
    cleanup.shutdown().await;
}
