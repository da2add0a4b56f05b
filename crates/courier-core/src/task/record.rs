use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::error::TaskError;
use super::options::TaskOptions;

/// Lifecycle state of a task as seen by the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Waiting to be dequeued (possibly not yet due).
    Pending,
    /// Leased by a worker.
    Running,
    /// Handler succeeded.
    Done,
    /// Will never be attempted again.
    Dead,
}

impl TaskState {
    /// Convert to storage string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Dead => "dead",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "done" => Ok(Self::Done),
            "dead" => Ok(Self::Dead),
            other => Err(format!("unknown task state '{}'", other)),
        }
    }
}

/// A unit of deferred work.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Unique task ID.
    pub id: Uuid,
    /// Type tag used to route the task to its handler.
    pub task_type: String,
    /// Serialized payload.
    pub payload: Vec<u8>,
    /// Queue the task lives in.
    pub queue: String,
    /// Current state.
    pub state: TaskState,
    /// Retries performed so far.
    pub retried: u32,
    /// Retry bound.
    pub max_retry: u32,
    /// Per-attempt processing bound.
    pub timeout: Option<Duration>,
    /// Absolute processing bound.
    pub deadline: Option<DateTime<Utc>>,
    /// Earliest time the next attempt may start.
    pub process_at: DateTime<Utc>,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
    /// Error from the most recent failed attempt.
    pub last_error: Option<String>,
}

impl Task {
    /// Create a new pending task from resolved options.
    pub fn new(task_type: impl Into<String>, payload: Vec<u8>, options: &TaskOptions) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            task_type: task_type.into(),
            payload,
            queue: options.queue.clone(),
            state: TaskState::Pending,
            retried: 0,
            max_retry: options.max_retry,
            timeout: options.timeout,
            deadline: options.deadline,
            process_at: options
                .schedule
                .resolve(now)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            created_at: now,
            last_error: None,
        }
    }

    /// Decode the payload into its typed form.
    ///
    /// A payload that does not decode will never decode, so the error skips retry.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, TaskError> {
        serde_json::from_slice(&self.payload)
            .map_err(|e| TaskError::skip_retry(format!("failed to unmarshal payload: {}", e)))
    }

    /// Whether the task may be retried once more.
    pub fn can_retry(&self) -> bool {
        self.retried < self.max_retry
    }

    /// Payload rendered for diagnostics, cut at `max_len` bytes.
    pub fn payload_preview(&self, max_len: usize) -> String {
        let text = String::from_utf8_lossy(&self.payload);
        if text.len() <= max_len {
            return text.into_owned();
        }
        let mut end = max_len;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    }

    /// Acknowledgment returned to the enqueuer.
    pub fn enqueue_info(&self) -> EnqueueInfo {
        EnqueueInfo {
            id: self.id,
            task_type: self.task_type.clone(),
            queue: self.queue.clone(),
            max_retry: self.max_retry,
            process_at: self.process_at,
        }
    }
}

/// Enqueue acknowledgment.
#[derive(Debug, Clone, PartialEq)]
pub struct EnqueueInfo {
    /// Broker-assigned task ID.
    pub id: Uuid,
    /// Type tag.
    pub task_type: String,
    /// Queue the task was placed in.
    pub queue: String,
    /// Retry bound.
    pub max_retry: u32,
    /// When the first attempt becomes eligible.
    pub process_at: DateTime<Utc>,
}
