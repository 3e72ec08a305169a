//! Failed-attempt counting with a decay window.
//!
//! [`RateLimiter`] is the contract the gateway consumes.
//! [`StoreRateLimiter`] implements it over any [`RateLimitStore`]:
//! [`InMemoryStore`] for one process, `PostgresRateLimitStore`
//! (feature `sqlx_postgres`) for a fleet.

mod limit;
mod limiter;
#[cfg(feature = "sqlx_postgres")]
mod postgres_store;
mod store;

pub use limit::KeyStrategy;
pub use limiter::{RateLimiter, StoreRateLimiter};
#[cfg(feature = "sqlx_postgres")]
pub use postgres_store::PostgresRateLimitStore;
pub use store::{InMemoryStore, RateLimitInfo, RateLimitStore};
