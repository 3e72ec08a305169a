use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::store::{RateLimitInfo, RateLimitStore};
use crate::postgres::interval_secs;
use crate::AuthError;

/// `PostgreSQL`-backed rate limit store shared by every instance.
///
/// Requires the `rate_limits` table from
/// [`migrations::run_rate_limit`](crate::postgres::migrations::run_rate_limit):
///
/// ```sql
/// CREATE TABLE rate_limits (
///     key VARCHAR(255) PRIMARY KEY,
///     attempts INTEGER NOT NULL DEFAULT 1,
///     window_start TIMESTAMPTZ NOT NULL,
///     reset_at TIMESTAMPTZ NOT NULL
/// );
/// ```
#[derive(Clone)]
pub struct PostgresRateLimitStore {
    pool: PgPool,
}

impl PostgresRateLimitStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Deletes rows whose window has elapsed. Returns the number deleted.
    pub async fn cleanup_expired(&self) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM rate_limits WHERE reset_at <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("rate_limit_cleanup", &e))?;

        Ok(result.rows_affected())
    }
}

fn store_error(operation: &str, e: &sqlx::Error) -> AuthError {
    log::error!(target: "sentinel_auth", "msg=\"database error\", operation=\"{operation}\", error=\"{e}\"");
    AuthError::StoreError(e.to_string())
}

#[derive(sqlx::FromRow)]
struct RateLimitRow {
    attempts: i32,
    window_start: DateTime<Utc>,
    reset_at: DateTime<Utc>,
}

impl From<RateLimitRow> for RateLimitInfo {
    fn from(row: RateLimitRow) -> Self {
        Self {
            attempts: u32::try_from(row.attempts).unwrap_or(0),
            window_start: row.window_start,
            reset_at: row.reset_at,
        }
    }
}

#[async_trait]
impl RateLimitStore for PostgresRateLimitStore {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn increment(&self, key: &str, window_secs: u64) -> Result<RateLimitInfo, AuthError> {
        // single-statement upsert: the row lock serialises concurrent attempts
        let row: RateLimitRow = sqlx::query_as(
            r"
            INSERT INTO rate_limits (key, attempts, window_start, reset_at)
            VALUES ($1, 1, NOW(), NOW() + make_interval(secs => $2))
            ON CONFLICT (key) DO UPDATE SET
                attempts = CASE
                    WHEN rate_limits.reset_at <= NOW() THEN 1
                    ELSE rate_limits.attempts + 1
                END,
                window_start = CASE
                    WHEN rate_limits.reset_at <= NOW() THEN NOW()
                    ELSE rate_limits.window_start
                END,
                reset_at = CASE
                    WHEN rate_limits.reset_at <= NOW() THEN NOW() + make_interval(secs => $2)
                    ELSE rate_limits.reset_at
                END
            RETURNING attempts, window_start, reset_at
            ",
        )
        .bind(key)
        .bind(interval_secs(window_secs))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_error("rate_limit_increment", &e))?;

        Ok(row.into())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn get(&self, key: &str) -> Result<Option<RateLimitInfo>, AuthError> {
        let row: Option<RateLimitRow> = sqlx::query_as(
            "SELECT attempts, window_start, reset_at FROM rate_limits WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("rate_limit_get", &e))?;

        Ok(row.map(Into::into))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn reset(&self, key: &str) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM rate_limits WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("rate_limit_reset", &e))?;

        Ok(())
    }
}
