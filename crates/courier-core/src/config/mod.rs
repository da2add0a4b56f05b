mod database;
mod observability;

pub use database::{BrokerBackend, BrokerConfig, DatabaseConfig};
pub use observability::{LogFormat, ObservabilityConfig};

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CourierError, Result};
use crate::task::{BackoffStrategy, RetryPolicy};

/// Root configuration for courier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourierConfig {
    /// Application metadata.
    #[serde(default)]
    pub app: AppConfig,

    /// Account store database.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Task broker.
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Task processor.
    #[serde(default)]
    pub processor: ProcessorSettings,

    /// Outgoing mail.
    #[serde(default)]
    pub mail: MailConfig,

    /// Logging.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl CourierConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| CourierError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content)?;

        toml::from_str(&content)
            .map_err(|e| CourierError::Config(format!("Failed to parse config: {}", e)))
    }
}

/// Application metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name, attached to log output.
    #[serde(default = "default_app_name")]
    pub name: String,

    /// Deployment environment.
    #[serde(default)]
    pub environment: Environment,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            environment: Environment::default(),
        }
    }
}

fn default_app_name() -> String {
    "courier".to_string()
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// Task processor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorSettings {
    /// Maximum concurrent task executions.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Queue name to relative weight.
    #[serde(default = "default_queues")]
    pub queues: BTreeMap<String, u32>,

    /// Always drain higher-weight queues first.
    #[serde(default)]
    pub strict_priority: bool,

    /// Idle wait between empty dequeues, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// How long shutdown waits for in-flight tasks, in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// How long cancelled handlers get to return after the shutdown timeout, in milliseconds.
    #[serde(default = "default_cancel_grace")]
    pub cancel_grace_ms: u64,

    /// Per-attempt timeout for tasks that do not set one, in seconds.
    #[serde(default = "default_task_timeout")]
    pub task_timeout_secs: u64,

    /// Retry backoff strategy.
    #[serde(default)]
    pub backoff: BackoffStrategy,

    /// Base retry delay, in milliseconds.
    #[serde(default = "default_base_backoff")]
    pub base_backoff_ms: u64,

    /// Maximum retry delay, in seconds.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            queues: default_queues(),
            strict_priority: false,
            poll_interval_ms: default_poll_interval(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            cancel_grace_ms: default_cancel_grace(),
            task_timeout_secs: default_task_timeout(),
            backoff: BackoffStrategy::default(),
            base_backoff_ms: default_base_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

impl ProcessorSettings {
    /// Retry policy described by these settings.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            backoff: self.backoff,
            base: Duration::from_millis(self.base_backoff_ms),
            max_backoff: Duration::from_secs(self.max_backoff_secs),
        }
    }
}

fn default_concurrency() -> usize {
    10
}

fn default_queues() -> BTreeMap<String, u32> {
    BTreeMap::from([("critical".to_string(), 10), ("default".to_string(), 5)])
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_shutdown_timeout() -> u64 {
    8
}

fn default_cancel_grace() -> u64 {
    1000
}

fn default_task_timeout() -> u64 {
    1800 // 30 minutes
}

fn default_base_backoff() -> u64 {
    1000
}

fn default_max_backoff() -> u64 {
    300
}

/// Outgoing mail configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Display name of the sender.
    #[serde(default = "default_sender_name")]
    pub sender_name: String,

    /// Sender address.
    #[serde(default = "default_sender_address")]
    pub sender_address: String,

    /// Base URL of the email verification endpoint.
    #[serde(default = "default_verify_url")]
    pub verify_url: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            sender_name: default_sender_name(),
            sender_address: default_sender_address(),
            verify_url: default_verify_url(),
        }
    }
}

fn default_sender_name() -> String {
    "Simple Bank".to_string()
}

fn default_sender_address() -> String {
    "no-reply@localhost".to_string()
}

fn default_verify_url() -> String {
    "http://localhost:8080/v1/verify_email".to_string()
}

/// Replace `${VAR}` references with environment values. Unknown variables are left as-is.
fn substitute_env_vars(content: &str) -> Result<String> {
    let mut result = content.to_string();
    let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| CourierError::Internal(e.to_string()))?;

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(value) => result = result.replace(&cap[0], &value),
            Err(_) => tracing::warn!(var = var_name, "Config references unset environment variable"),
        }
    }

    Ok(result)
}
