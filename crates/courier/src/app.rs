use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use courier_core::config::CourierConfig;
use courier_core::store::Store;
use courier_runtime::db::MemoryStore;
use courier_runtime::{Database, PgStore};

/// Load `.env`, then the config file if present, otherwise defaults.
pub fn load_config(path: &str) -> Result<CourierConfig> {
    dotenvy::dotenv().ok();

    if !Path::new(path).exists() {
        tracing::debug!(path, "No configuration file, using defaults");
        return Ok(CourierConfig::default());
    }

    Ok(CourierConfig::from_file(path)?)
}

/// Account store for handlers.
///
/// Without a database URL the store is in-memory and starts empty.
pub async fn connect_store(config: &CourierConfig) -> Result<Arc<dyn Store>> {
    if !config.database.is_configured() {
        tracing::warn!("database.url not set, using an empty in-memory account store");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let db = Database::from_config(&config.database).await?;
    Ok(Arc::new(PgStore::new(db.pool().clone())))
}

/// Resolves on SIGINT or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
