use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;

use super::store::RateLimitStore;
use crate::clock::{add_seconds, Clock, SystemClock};
use crate::AuthError;

/// Failed-attempt limiter consumed by the gateway.
///
/// Backends are interchangeable. `Err` means the backend failed, never that
/// the key is blocked.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Records one failed attempt against `key`.
    async fn attempt(&self, key: &str) -> Result<(), AuthError>;

    /// True iff at least `max_attempts` failures were recorded for `key`
    /// within the last `decay_seconds`.
    async fn is_blocked(
        &self,
        key: &str,
        max_attempts: u32,
        decay_seconds: u64,
    ) -> Result<bool, AuthError>;

    /// Forgets all attempts for `key`.
    async fn clear(&self, key: &str) -> Result<(), AuthError>;
}

/// [`RateLimiter`] over a [`RateLimitStore`] with a fixed decay window.
///
/// `attempt` increments the key's counter; the store starts a new window
/// once `decay` has elapsed since the first attempt of the current one, so
/// no scheduled cleanup is needed for correctness.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use chrono::Duration;
/// use sentinel::rate_limit::{InMemoryStore, RateLimiter, StoreRateLimiter};
///
/// # async fn run() -> Result<(), sentinel::AuthError> {
/// let limiter = StoreRateLimiter::new(Arc::new(InMemoryStore::new()), Duration::seconds(300));
///
/// limiter.attempt("login_attempt:a@x.com").await?;
/// assert!(!limiter.is_blocked("login_attempt:a@x.com", 5, 300).await?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct StoreRateLimiter {
    store: Arc<dyn RateLimitStore>,
    decay: Duration,
    clock: Arc<dyn Clock>,
}

impl StoreRateLimiter {
    #[must_use]
    pub fn new(store: Arc<dyn RateLimitStore>, decay: Duration) -> Self {
        Self {
            store,
            decay,
            clock: Arc::new(SystemClock),
        }
    }

    /// The clock must be the same one the store uses.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<dyn RateLimitStore> {
        &self.store
    }

    fn decay_secs(&self) -> u64 {
        u64::try_from(self.decay.num_seconds()).unwrap_or(0)
    }

    /// Attempts left before `key` is blocked.
    pub async fn remaining(&self, key: &str, max_attempts: u32) -> Result<u32, AuthError> {
        let now = self.clock.now();
        Ok(self.store.get(key).await?.map_or(max_attempts, |info| {
            if info.is_expired(now) {
                max_attempts
            } else {
                max_attempts.saturating_sub(info.attempts)
            }
        }))
    }

    /// Seconds until the current window for `key` resets.
    pub async fn available_in(&self, key: &str) -> Result<i64, AuthError> {
        let now = self.clock.now();
        Ok(self
            .store
            .get(key)
            .await?
            .map_or(0, |info| info.available_in(now)))
    }
}

#[async_trait]
impl RateLimiter for StoreRateLimiter {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn attempt(&self, key: &str) -> Result<(), AuthError> {
        let info = self.store.increment(key, self.decay_secs()).await?;
        log::debug!(target: "sentinel_auth::rate_limit", "msg=\"attempt recorded\" attempts={}", info.attempts);
        Ok(())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn is_blocked(
        &self,
        key: &str,
        max_attempts: u32,
        decay_seconds: u64,
    ) -> Result<bool, AuthError> {
        let Some(info) = self.store.get(key).await? else {
            return Ok(false);
        };

        let now = self.clock.now();
        let in_window =
            !info.is_expired(now) && now < add_seconds(info.window_start, decay_seconds);

        Ok(in_window && info.attempts >= max_attempts)
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn clear(&self, key: &str) -> Result<(), AuthError> {
        self.store.reset(key).await
    }
}

impl std::fmt::Debug for StoreRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRateLimiter")
            .field("decay", &self.decay)
            .finish_non_exhaustive()
    }
}
