use async_trait::async_trait;
use chrono::Duration;
use sqlx::PgPool;

use super::store::SessionStore;
use crate::postgres::interval_secs;
use crate::AuthError;

/// `PostgreSQL`-backed session store.
///
/// Requires the `sessions` table from
/// [`migrations::run_sessions`](crate::postgres::migrations::run_sessions):
///
/// ```sql
/// CREATE TABLE sessions (
///     key VARCHAR(255) PRIMARY KEY,
///     payload BYTEA NOT NULL,
///     expires_at TIMESTAMPTZ NOT NULL
/// );
/// ```
///
/// Reads filter on `expires_at`, so an expired row is invisible even before
/// [`gc`](SessionStore::gc) deletes it.
#[derive(Clone)]
pub struct PostgresSessionStore {
    pool: PgPool,
}

impl PostgresSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn store_error(operation: &str, e: &sqlx::Error) -> AuthError {
    log::error!(target: "sentinel_auth::session", "msg=\"database error\", operation=\"{operation}\", error=\"{e}\"");
    AuthError::StoreError(e.to_string())
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn read(&self, key: &str) -> Result<Vec<u8>, AuthError> {
        let row: Option<(Vec<u8>,)> =
            sqlx::query_as("SELECT payload FROM sessions WHERE key = $1 AND expires_at > NOW()")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| store_error("session_read", &e))?;

        Ok(row.map(|(payload,)| payload).unwrap_or_default())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, value), err))]
    async fn write(&self, key: &str, value: &[u8], ttl: u64) -> Result<bool, AuthError> {
        let result = sqlx::query(
            r"
            INSERT INTO sessions (key, payload, expires_at)
            VALUES ($1, $2, NOW() + make_interval(secs => $3))
            ON CONFLICT (key) DO UPDATE SET
                payload = EXCLUDED.payload,
                expires_at = EXCLUDED.expires_at
            ",
        )
        .bind(key)
        .bind(value)
        .bind(interval_secs(ttl))
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("session_write", &e))?;

        Ok(result.rows_affected() == 1)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, value), err))]
    async fn update(&self, key: &str, value: &[u8], ttl: u64) -> Result<bool, AuthError> {
        let result = sqlx::query(
            r"
            UPDATE sessions
            SET payload = $2, expires_at = NOW() + make_interval(secs => $3)
            WHERE key = $1 AND expires_at > NOW()
            ",
        )
        .bind(key)
        .bind(value)
        .bind(interval_secs(ttl))
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("session_update", &e))?;

        Ok(result.rows_affected() == 1)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn destroy(&self, key: &str) -> Result<bool, AuthError> {
        // an expired row is deleted too but does not count as destroyed
        let live: Option<(bool,)> =
            sqlx::query_as("DELETE FROM sessions WHERE key = $1 RETURNING expires_at > NOW()")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| store_error("session_destroy", &e))?;

        Ok(live.is_some_and(|(live,)| live))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn gc(&self, _max_lifetime: Duration) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("session_gc", &e))?;

        Ok(result.rows_affected())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, value), err))]
    async fn regenerate(
        &self,
        old_key: &str,
        new_key: &str,
        value: &[u8],
        ttl: u64,
    ) -> Result<bool, AuthError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("session_regenerate", &e))?;

        sqlx::query("DELETE FROM sessions WHERE key = $1")
            .bind(old_key)
            .execute(&mut *tx)
            .await
            .map_err(|e| store_error("session_regenerate", &e))?;

        let result = sqlx::query(
            "INSERT INTO sessions (key, payload, expires_at) VALUES ($1, $2, NOW() + make_interval(secs => $3))",
        )
        .bind(new_key)
        .bind(value)
        .bind(interval_secs(ttl))
        .execute(&mut *tx)
        .await
        .map_err(|e| store_error("session_regenerate", &e))?;

        tx.commit()
            .await
            .map_err(|e| store_error("session_regenerate", &e))?;

        Ok(result.rows_affected() == 1)
    }
}
