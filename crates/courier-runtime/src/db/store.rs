use chrono::{DateTime, Utc};
use courier_core::store::{CreateVerifyEmailParams, Store, StoreError, User, VerifyEmail};
use futures::future::BoxFuture;
use sqlx::PgPool;

/// PostgreSQL account store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type UserRow = (String, String, String, bool, DateTime<Utc>);

type VerifyEmailRow = (i64, String, String, String, bool, DateTime<Utc>, DateTime<Utc>);

fn user_from_row(row: UserRow) -> User {
    let (username, full_name, email, is_email_verified, created_at) = row;
    User {
        username,
        full_name,
        email,
        is_email_verified,
        created_at,
    }
}

fn verify_email_from_row(row: VerifyEmailRow) -> VerifyEmail {
    let (id, username, email, secret_code, is_used, created_at, expired_at) = row;
    VerifyEmail {
        id,
        username,
        email,
        secret_code,
        is_used,
        created_at,
        expired_at,
    }
}

impl Store for PgStore {
    fn get_user<'a>(&'a self, username: &'a str) -> BoxFuture<'a, Result<User, StoreError>> {
        Box::pin(async move {
            let row: UserRow = sqlx::query_as(
                r#"
                SELECT username, full_name, email, is_email_verified, created_at
                FROM users
                WHERE username = $1
                LIMIT 1
                "#,
            )
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_err(e, username))?;

            Ok(user_from_row(row))
        })
    }

    fn create_verify_email(
        &self,
        params: CreateVerifyEmailParams,
    ) -> BoxFuture<'_, Result<VerifyEmail, StoreError>> {
        Box::pin(async move {
            let row: VerifyEmailRow = sqlx::query_as(
                r#"
                INSERT INTO verify_emails (username, email, secret_code)
                VALUES ($1, $2, $3)
                RETURNING id, username, email, secret_code, is_used, created_at, expired_at
                "#,
            )
            .bind(&params.username)
            .bind(&params.email)
            .bind(&params.secret_code)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

            Ok(verify_email_from_row(row))
        })
    }
}

fn store_err(e: sqlx::Error, key: &str) -> StoreError {
    match e {
        sqlx::Error::RowNotFound => StoreError::NotFound(key.to_string()),
        other => StoreError::Database(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_is_not_found() {
        assert!(store_err(sqlx::Error::RowNotFound, "alice").is_not_found());
        assert!(!store_err(sqlx::Error::PoolTimedOut, "alice").is_not_found());
    }
}
