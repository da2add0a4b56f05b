mod memory;
mod postgres;

pub use memory::MemoryBroker;
pub use postgres::PgBroker;

use std::sync::Arc;

use courier_core::config::{BrokerBackend, CourierConfig};
use courier_core::{Broker, CourierError, Result};

use crate::db::Database;

/// Connect to the broker backend selected in configuration.
pub async fn connect(config: &CourierConfig) -> Result<Arc<dyn Broker>> {
    match config.broker.backend {
        BrokerBackend::Memory => Ok(Arc::new(MemoryBroker::new())),
        BrokerBackend::Postgres => {
            let (url, size, timeout_secs) = postgres_pool(config)?;
            let db = Database::connect(url, size, timeout_secs).await?;
            Ok(Arc::new(PgBroker::new(db.pool().clone())))
        }
    }
}

/// URL, pool size and acquire timeout for the postgres broker pool.
fn postgres_pool(config: &CourierConfig) -> Result<(&str, u32, u64)> {
    let url = config.broker.url_or(&config.database);
    if url.trim().is_empty() {
        return Err(CourierError::Config(
            "postgres broker requires broker.url or database.url".to_string(),
        ));
    }
    Ok((
        url,
        config.broker.pool_size,
        config.database.pool_timeout_secs,
    ))
}
