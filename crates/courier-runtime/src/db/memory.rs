use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{Duration, Utc};
use courier_core::store::{CreateVerifyEmailParams, Store, StoreError, User, VerifyEmail};
use futures::future::BoxFuture;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

/// In-memory account store.
///
/// Used by the worker when no database is configured, and by tests.
///
/// # Example
///
/// ```ignore
/// let store = MemoryStore::new();
/// store.add_user("alice", "Alice Liddell", "alice@example.com");
///
/// // ... run the handler ...
///
/// assert_eq!(store.verify_emails().len(), 1);
/// ```
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, User>>,
    verify_emails: RwLock<Vec<VerifyEmail>>,
    fail_next: RwLock<Option<StoreError>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user.
    pub fn add_user(&self, username: &str, full_name: &str, email: &str) -> User {
        let user = User {
            username: username.to_string(),
            full_name: full_name.to_string(),
            email: email.to_string(),
            is_email_verified: false,
            created_at: Utc::now(),
        };
        write(&self.users).insert(username.to_string(), user.clone());
        user
    }

    /// Make the next store call fail with `error`.
    pub fn fail_next(&self, error: StoreError) {
        *write(&self.fail_next) = Some(error);
    }

    /// All verify-email records created so far.
    pub fn verify_emails(&self) -> Vec<VerifyEmail> {
        read(&self.verify_emails).clone()
    }

    fn take_failure(&self) -> Result<(), StoreError> {
        match write(&self.fail_next).take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Store for MemoryStore {
    fn get_user<'a>(&'a self, username: &'a str) -> BoxFuture<'a, Result<User, StoreError>> {
        Box::pin(async move {
            self.take_failure()?;
            read(&self.users)
                .get(username)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(username.to_string()))
        })
    }

    fn create_verify_email(
        &self,
        params: CreateVerifyEmailParams,
    ) -> BoxFuture<'_, Result<VerifyEmail, StoreError>> {
        Box::pin(async move {
            self.take_failure()?;
            let mut records = write(&self.verify_emails);
            let now = Utc::now();
            let record = VerifyEmail {
                id: records.len() as i64 + 1,
                username: params.username,
                email: params.email,
                secret_code: params.secret_code,
                is_used: false,
                created_at: now,
                expired_at: now + Duration::minutes(15),
            };
            records.push(record.clone());
            Ok(record)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_lookup() {
        let store = MemoryStore::new();
        store.add_user("alice", "Alice", "alice@example.com");

        let user = store.get_user("alice").await.unwrap();
        assert_eq!(user.email, "alice@example.com");

        let missing = store.get_user("bob").await.unwrap_err();
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn test_memory_store_failure_injection() {
        let store = MemoryStore::new();
        store.add_user("alice", "Alice", "alice@example.com");
        store.fail_next(StoreError::Database("connection reset".to_string()));

        assert!(!store.get_user("alice").await.unwrap_err().is_not_found());
        assert!(store.get_user("alice").await.is_ok());
    }

    #[tokio::test]
    async fn test_verify_email_ids_increment() {
        let store = MemoryStore::new();
        for _ in 0..2 {
            store
                .create_verify_email(CreateVerifyEmailParams {
                    username: "alice".to_string(),
                    email: "alice@example.com".to_string(),
                    secret_code: "abc".to_string(),
                })
                .await
                .unwrap();
        }
        let ids: Vec<i64> = store.verify_emails().iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
