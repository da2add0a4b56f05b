//! In-memory collaborators for tests.
//!
//! `MemoryStore` and `RecordingMailer` stand in for the database and the mail
//! transport so handlers and the processor can be exercised without either.
//! Pair them with [`crate::MemoryBroker`] for a fully in-process setup.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use courier_core::mail::{Email, MailError, Mailer};
use futures::future::BoxFuture;

pub use crate::db::MemoryStore;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

/// Mailer that records every accepted message.
#[derive(Default)]
pub struct RecordingMailer {
    sent: RwLock<Vec<Email>>,
    failures: RwLock<u32>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` sends fail with a transport error.
    pub fn fail_next(&self, count: u32) {
        *write(&self.failures) = count;
    }

    /// Messages accepted so far.
    pub fn sent(&self) -> Vec<Email> {
        read(&self.sent).clone()
    }

    pub fn sent_count(&self) -> usize {
        read(&self.sent).len()
    }

    /// Assert that exactly `expected` messages went to `recipient`.
    pub fn assert_sent_to(&self, recipient: &str, expected: usize) {
        let count = read(&self.sent)
            .iter()
            .filter(|email| email.to.iter().any(|to| to == recipient))
            .count();
        assert_eq!(
            count, expected,
            "Expected {} emails to '{}', found {}",
            expected, recipient, count
        );
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, email: Email) -> BoxFuture<'_, Result<(), MailError>> {
        Box::pin(async move {
            {
                let mut failures = write(&self.failures);
                if *failures > 0 {
                    *failures -= 1;
                    return Err(MailError::Transport("injected failure".to_string()));
                }
            }
            email.validate()?;
            write(&self.sent).push(email);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_mailer_failures() {
        let mailer = RecordingMailer::new();
        mailer.fail_next(1);

        let email = Email::new("Hi", "<p>hi</p>", vec!["a@b.c".to_string()]);
        assert!(matches!(
            mailer.send(email.clone()).await,
            Err(MailError::Transport(_))
        ));
        assert!(mailer.send(email).await.is_ok());
        mailer.assert_sent_to("a@b.c", 1);
    }
}
