use std::fmt;

use courier_core::task::Task;

/// Why a task ended up dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The handler returned a skip-retry error.
    Terminal,
    /// Transient failures used up every retry.
    RetriesExhausted,
    /// No handler is registered for the task type.
    Unroutable,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Terminal => "terminal",
            Self::RetriesExhausted => "retries_exhausted",
            Self::Unroutable => "unroutable",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A task that will not be attempted again.
#[derive(Debug)]
pub struct TaskFailure<'a> {
    pub task: &'a Task,
    pub error: &'a str,
    pub kind: FailureKind,
}

/// Hook notified of every terminal or exhausted-retry failure.
///
/// Purely observational: the task is already dead when the hook runs.
pub trait ErrorObserver: Send + Sync + 'static {
    fn on_failure(&self, failure: &TaskFailure<'_>);
}

impl<F> ErrorObserver for F
where
    F: Fn(&TaskFailure<'_>) + Send + Sync + 'static,
{
    fn on_failure(&self, failure: &TaskFailure<'_>) {
        self(failure)
    }
}

/// Default observer: one structured `error` record per failure.
#[derive(Debug, Clone)]
pub struct LogObserver {
    preview_bytes: usize,
}

impl LogObserver {
    pub fn new(preview_bytes: usize) -> Self {
        Self { preview_bytes }
    }
}

impl Default for LogObserver {
    fn default() -> Self {
        Self::new(256)
    }
}

impl ErrorObserver for LogObserver {
    fn on_failure(&self, failure: &TaskFailure<'_>) {
        tracing::error!(
            task_id = %failure.task.id,
            task_type = %failure.task.task_type,
            queue = %failure.task.queue,
            retried = failure.task.retried,
            kind = %failure.kind,
            payload = %failure.task.payload_preview(self.preview_bytes),
            error = %failure.error,
            "Task failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use courier_core::task::TaskOptions;

    #[test]
    fn test_closure_observer() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let observer = move |failure: &TaskFailure<'_>| {
            assert_eq!(failure.kind, FailureKind::Unroutable);
            counter.fetch_add(1, Ordering::SeqCst);
        };

        let task = Task::new("task:unknown", b"{}".to_vec(), &TaskOptions::default());
        observer.on_failure(&TaskFailure {
            task: &task,
            error: "no handler",
            kind: FailureKind::Unroutable,
        });
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_kind_display() {
        assert_eq!(FailureKind::RetriesExhausted.to_string(), "retries_exhausted");
    }

    #[test]
    fn test_log_observer_does_not_panic() {
        let task = Task::new("task:x", vec![0xff; 1024], &TaskOptions::default());
        LogObserver::new(8).on_failure(&TaskFailure {
            task: &task,
            error: "boom",
            kind: FailureKind::Terminal,
        });
    }
}
