use std::collections::HashMap;
use std::sync::Arc;

use courier_core::error::{CourierError, Result};
use courier_core::task::TaskHandler;

/// Mapping from task type to handler.
///
/// Built before the processor is constructed and read-only afterwards.
#[derive(Clone, Default)]
pub struct DispatchTable {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl DispatchTable {
    /// Create a new empty table.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a task type.
    ///
    /// A type can be registered once; a second registration is an error.
    pub fn register(
        &mut self,
        task_type: impl Into<String>,
        handler: Arc<dyn TaskHandler>,
    ) -> Result<()> {
        let task_type = task_type.into();
        if task_type.trim().is_empty() {
            return Err(CourierError::InvalidArgument(
                "task type must not be empty".to_string(),
            ));
        }
        if self.handlers.contains_key(&task_type) {
            return Err(CourierError::InvalidArgument(format!(
                "handler already registered for task type '{}'",
                task_type
            )));
        }
        self.handlers.insert(task_type, handler);
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_handler(
        mut self,
        task_type: impl Into<String>,
        handler: Arc<dyn TaskHandler>,
    ) -> Result<Self> {
        self.register(task_type, handler)?;
        Ok(self)
    }

    /// Get the handler for a task type.
    pub fn get(&self, task_type: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(task_type).cloned()
    }

    /// Check if a task type has a handler.
    pub fn contains(&self, task_type: &str) -> bool {
        self.handlers.contains_key(task_type)
    }

    /// Registered task types, sorted.
    pub fn task_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::task::{Task, TaskContext, TaskError};
    use futures::future::BoxFuture;

    struct Noop;

    impl TaskHandler for Noop {
        fn handle<'a>(
            &'a self,
            _ctx: &'a TaskContext,
            _task: &'a Task,
        ) -> BoxFuture<'a, std::result::Result<(), TaskError>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[test]
    fn test_empty_table() {
        let table = DispatchTable::new();
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
        assert!(table.get("nonexistent").is_none());
    }

    #[test]
    fn test_register_and_lookup() {
        let table = DispatchTable::new()
            .with_handler("task:b", Arc::new(Noop))
            .unwrap()
            .with_handler("task:a", Arc::new(Noop))
            .unwrap();

        assert!(table.contains("task:a"));
        assert!(table.get("task:b").is_some());
        assert_eq!(table.task_types(), vec!["task:a", "task:b"]);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut table = DispatchTable::new();
        table.register("task:a", Arc::new(Noop)).unwrap();

        let err = table.register("task:a", Arc::new(Noop)).unwrap_err();
        assert!(matches!(err, CourierError::InvalidArgument(_)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_empty_type_rejected() {
        let mut table = DispatchTable::new();
        assert!(table.register("  ", Arc::new(Noop)).is_err());
    }
}
