use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{CourierError, Result};

/// Queue used when no queue option is given.
pub const DEFAULT_QUEUE: &str = "default";

/// Retry bound used when no max-retry option is given.
pub const DEFAULT_MAX_RETRY: u32 = 3;

/// When a task becomes eligible for its first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Schedule {
    /// Eligible as soon as the broker accepts it.
    #[default]
    Immediate,
    /// Eligible after the given delay, measured from enqueue time.
    In(Duration),
    /// Eligible at the given instant.
    At(DateTime<Utc>),
}

impl Schedule {
    /// Resolve to an absolute instant relative to `now`.
    ///
    /// Returns `None` when the delay lands outside the representable range.
    pub fn resolve(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Immediate => Some(now),
            Self::In(delay) => chrono::Duration::from_std(*delay)
                .ok()
                .and_then(|delay| now.checked_add_signed(delay)),
            Self::At(at) => Some(*at),
        }
    }
}

/// Per-enqueue scheduling options.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOptions {
    /// Priority bucket the task is placed in.
    pub queue: String,
    /// Number of retries after the first attempt.
    pub max_retry: u32,
    /// Earliest execution time.
    pub schedule: Schedule,
    /// Per-attempt processing bound. `None` uses the processor default.
    pub timeout: Option<Duration>,
    /// Absolute bound on processing.
    pub deadline: Option<DateTime<Utc>>,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            queue: DEFAULT_QUEUE.to_string(),
            max_retry: DEFAULT_MAX_RETRY,
            schedule: Schedule::Immediate,
            timeout: None,
            deadline: None,
        }
    }
}

impl TaskOptions {
    /// Place the task in the named queue.
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    /// Set the retry bound.
    pub fn with_max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }

    /// Delay the first attempt.
    pub fn with_process_in(mut self, delay: Duration) -> Self {
        self.schedule = Schedule::In(delay);
        self
    }

    /// Run no earlier than `at`.
    pub fn with_process_at(mut self, at: DateTime<Utc>) -> Self {
        self.schedule = Schedule::At(at);
        self
    }

    /// Bound each attempt.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Bound processing to an absolute instant.
    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Reject options the broker could never honour.
    pub fn validate(&self) -> Result<()> {
        if self.queue.trim().is_empty() {
            return Err(CourierError::InvalidArgument(
                "queue name must not be empty".to_string(),
            ));
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(CourierError::InvalidArgument(
                "timeout must be greater than zero".to_string(),
            ));
        }
        if self.schedule.resolve(Utc::now()).is_none() {
            return Err(CourierError::InvalidArgument(format!(
                "process delay is out of range: {:?}",
                self.schedule
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = TaskOptions::default();
        assert_eq!(opts.queue, "default");
        assert_eq!(opts.max_retry, DEFAULT_MAX_RETRY);
        assert_eq!(opts.schedule, Schedule::Immediate);
        assert!(opts.timeout.is_none());
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let opts = TaskOptions::default()
            .with_queue("critical")
            .with_max_retry(10)
            .with_process_in(Duration::from_secs(10));

        assert_eq!(opts.queue, "critical");
        assert_eq!(opts.max_retry, 10);
        assert_eq!(opts.schedule, Schedule::In(Duration::from_secs(10)));
    }

    #[test]
    fn test_schedule_resolve() {
        let now = Utc::now();
        assert_eq!(Schedule::Immediate.resolve(now), Some(now));
        assert_eq!(
            Schedule::In(Duration::from_secs(10)).resolve(now),
            Some(now + chrono::Duration::seconds(10))
        );
        let at = now + chrono::Duration::hours(1);
        assert_eq!(Schedule::At(at).resolve(now), Some(at));
    }

    #[test]
    fn test_unrepresentable_delay() {
        let now = Utc::now();
        // Too large for a chrono duration.
        assert_eq!(Schedule::In(Duration::from_secs(u64::MAX)).resolve(now), None);
        // A valid duration that runs past the last representable instant.
        assert_eq!(
            Schedule::In(Duration::from_secs(10_000_000_000_000)).resolve(now),
            None
        );

        for delay in [Duration::from_secs(u64::MAX), Duration::from_secs(10_000_000_000_000)] {
            let opts = TaskOptions::default().with_process_in(delay);
            assert!(matches!(
                opts.validate(),
                Err(CourierError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_validate_rejects_empty_queue() {
        let opts = TaskOptions::default().with_queue("  ");
        assert!(matches!(
            opts.validate(),
            Err(CourierError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let opts = TaskOptions::default().with_timeout(Duration::ZERO);
        assert!(opts.validate().is_err());
    }
}
