//! Schema migrations for the `PostgreSQL` backends.
//!
//! ```rust,ignore
//! use sentinel::postgres::migrations;
//!
//! migrations::run_all(&pool).await?;
//! ```
//!
//! Each set keeps its own migrator so applications can create only the
//! tables for the backends they use. sqlx tracks applied versions in
//! `_sqlx_migrations`; the version numbers of the two sets do not overlap.

use sqlx::PgPool;

/// Creates the `sessions` table.
pub async fn run_sessions(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    let mut migrator = sqlx::migrate!("./migrations/sessions");
    migrator.set_ignore_missing(true);
    migrator.run(pool).await
}

/// Creates the `rate_limits` table.
pub async fn run_rate_limit(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    let mut migrator = sqlx::migrate!("./migrations/rate_limit");
    migrator.set_ignore_missing(true);
    migrator.run(pool).await
}

pub async fn run_all(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    run_sessions(pool).await?;
    run_rate_limit(pool).await
}
