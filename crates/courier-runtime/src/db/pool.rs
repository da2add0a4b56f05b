use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

use courier_core::config::DatabaseConfig;
use courier_core::error::{CourierError, Result};

/// Database connection wrapper providing connection pooling.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection from configuration.
    pub async fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Self::connect(&config.url, config.pool_size, config.pool_timeout_secs).await
    }

    /// Connect with explicit pool parameters.
    pub async fn connect(url: &str, size: u32, timeout_secs: u64) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(size)
            .acquire_timeout(Duration::from_secs(timeout_secs))
            .connect(url)
            .await
            .map_err(|e| CourierError::Database(format!("Failed to connect: {}", e)))?;

        Ok(Self { pool })
    }

    /// Get the pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| CourierError::Database(format!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Close all connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
