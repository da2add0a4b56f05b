use std::future::Future;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::record::Task;

/// Context available to task handlers.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Task ID.
    pub task_id: Uuid,
    /// Task type tag.
    pub task_type: String,
    /// Queue the task was taken from.
    pub queue: String,
    /// Retries performed before this attempt.
    pub retried: u32,
    /// Retry bound.
    pub max_retry: u32,
    /// Instant by which this attempt must finish.
    pub deadline: DateTime<Utc>,
    cancel: CancellationToken,
}

impl TaskContext {
    /// Create a context for one attempt of `task`.
    pub fn new(task: &Task, deadline: DateTime<Utc>, cancel: CancellationToken) -> Self {
        Self {
            task_id: task.id,
            task_type: task.task_type.clone(),
            queue: task.queue.clone(),
            retried: task.retried,
            max_retry: task.max_retry,
            deadline,
            cancel,
        }
    }

    /// Check if this is a retry attempt.
    pub fn is_retry(&self) -> bool {
        self.retried > 0
    }

    /// Check if this is the last attempt.
    pub fn is_last_attempt(&self) -> bool {
        self.retried >= self.max_retry
    }

    /// Whether the processor asked in-flight handlers to stop.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the processor asks in-flight handlers to stop.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Run `fut` unless cancellation arrives first.
    ///
    /// Returns `None` when cancelled; `fut` is dropped at its current await point.
    pub async fn until_cancelled<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            output = fut => Some(output),
        }
    }

    /// Token for handing cancellation to nested work.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}
