//! `PostgreSQL` backends (feature `sqlx_postgres`).

pub mod migrations;

pub use crate::rate_limit::PostgresRateLimitStore;
pub use crate::session::PostgresSessionStore;

use sqlx::PgPool;

/// Longest lifetime stored in an interval column: 100 years, read as "never".
const MAX_INTERVAL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Seconds bound to `make_interval(secs => ..)`. Larger values would overflow
/// the timestamp arithmetic, so they are capped.
pub(crate) fn interval_secs(secs: u64) -> f64 {
    secs.min(MAX_INTERVAL_SECS) as f64
}

/// Creates both stores over one connection pool.
pub fn create_stores(pool: PgPool) -> (PostgresSessionStore, PostgresRateLimitStore) {
    (
        PostgresSessionStore::new(pool.clone()),
        PostgresRateLimitStore::new(pool),
    )
}
