use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use thiserror::Error;

/// Store failures. `NotFound` is distinguishable from everything else.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub is_email_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// A pending email verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyEmail {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub secret_code: String,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
}

/// Input for [`Store::create_verify_email`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateVerifyEmailParams {
    pub username: String,
    pub email: String,
    pub secret_code: String,
}

/// Account storage used by task handlers. Shared across workers.
pub trait Store: Send + Sync + 'static {
    fn get_user<'a>(&'a self, username: &'a str) -> BoxFuture<'a, Result<User, StoreError>>;

    fn create_verify_email(
        &self,
        params: CreateVerifyEmailParams,
    ) -> BoxFuture<'_, Result<VerifyEmail, StoreError>>;
}
