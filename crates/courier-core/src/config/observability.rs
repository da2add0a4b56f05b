use serde::{Deserialize, Serialize};

use super::Environment;

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Default log level filter (overridden by `RUST_LOG`).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Output format. Unset picks JSON in production and text elsewhere.
    #[serde(default)]
    pub format: Option<LogFormat>,

    /// Bytes of payload included in failure reports.
    #[serde(default = "default_payload_preview")]
    pub payload_preview_bytes: usize,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            format: None,
            payload_preview_bytes: default_payload_preview(),
        }
    }
}

impl ObservabilityConfig {
    /// Format to use in the given environment.
    pub fn effective_format(&self, environment: Environment) -> LogFormat {
        self.format.unwrap_or(match environment {
            Environment::Production => LogFormat::Json,
            Environment::Development => LogFormat::Text,
        })
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_payload_preview() -> usize {
    256
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}
