use std::fmt::Display;

use thiserror::Error;

/// Failure returned by a task handler.
///
/// `SkipRetry` marks failures that no amount of retrying can fix; everything
/// else is treated as transient.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("{0}")]
    Retry(String),

    #[error("{0}: skip retry")]
    SkipRetry(String),
}

impl TaskError {
    /// Transient failure.
    pub fn retry(message: impl Display) -> Self {
        Self::Retry(message.to_string())
    }

    /// Terminal failure.
    pub fn skip_retry(message: impl Display) -> Self {
        Self::SkipRetry(message.to_string())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retry(_))
    }
}
