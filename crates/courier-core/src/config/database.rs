use serde::{Deserialize, Serialize};

/// Database configuration for the account store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL. Empty selects the in-memory store.
    #[serde(default)]
    pub url: String,

    /// Connection pool size.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Pool checkout timeout in seconds.
    #[serde(default = "default_pool_timeout")]
    pub pool_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            pool_size: default_pool_size(),
            pool_timeout_secs: default_pool_timeout(),
        }
    }
}

impl DatabaseConfig {
    /// Whether a real database is configured.
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

fn default_pool_size() -> u32 {
    10
}

fn default_pool_timeout() -> u64 {
    30
}

/// Broker backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerBackend {
    /// In-process queue; tasks do not outlive the process.
    #[default]
    Memory,
    /// PostgreSQL-backed queue shared between processes.
    Postgres,
}

/// Broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Backend.
    #[serde(default)]
    pub backend: BrokerBackend,

    /// Connection URL. Falls back to the database URL when unset.
    #[serde(default)]
    pub url: Option<String>,

    /// Connection pool size.
    #[serde(default = "default_broker_pool_size")]
    pub pool_size: u32,

    /// Leases older than this are considered abandoned, in seconds.
    #[serde(default = "default_stale_lease")]
    pub stale_lease_secs: u64,

    /// How often abandoned leases are recovered, in seconds.
    #[serde(default = "default_recovery_interval")]
    pub recovery_interval_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            backend: BrokerBackend::default(),
            url: None,
            pool_size: default_broker_pool_size(),
            stale_lease_secs: default_stale_lease(),
            recovery_interval_secs: default_recovery_interval(),
        }
    }
}

impl BrokerConfig {
    /// Resolve the broker URL against the database configuration.
    pub fn url_or<'a>(&'a self, database: &'a DatabaseConfig) -> &'a str {
        self.url.as_deref().unwrap_or(database.url.as_str())
    }
}

fn default_broker_pool_size() -> u32 {
    5
}

fn default_stale_lease() -> u64 {
    3600
}

fn default_recovery_interval() -> u64 {
    60
}
