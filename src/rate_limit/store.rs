use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::clock::{add_seconds, Clock, SystemClock};
use crate::AuthError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub attempts: u32,
    pub window_start: DateTime<Utc>,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitInfo {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.reset_at <= now
    }

    /// Seconds until the window resets, never negative.
    pub fn available_in(&self, now: DateTime<Utc>) -> i64 {
        (self.reset_at - now).num_seconds().max(0)
    }
}

/// implement this trait for custom storage (redis, memcached, ...)
///
/// `increment` must be atomic per key: concurrent callers on the same key may
/// not both observe the same count.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// creates key with 1 attempt if it doesn't exist or its window elapsed
    async fn increment(&self, key: &str, window_secs: u64) -> Result<RateLimitInfo, AuthError>;

    /// expired windows are returned as-is; callers compare against the clock
    async fn get(&self, key: &str) -> Result<Option<RateLimitInfo>, AuthError>;

    async fn reset(&self, key: &str) -> Result<(), AuthError>;
}

/// for distributed systems, use a shared store like postgres
#[derive(Clone)]
pub struct InMemoryStore {
    entries: Arc<RwLock<HashMap<String, RateLimitInfo>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// call periodically in long-running applications to prevent memory growth
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        self.entries.write().map_or(0, |mut entries| {
            let before = entries.len();
            entries.retain(|_, info| !info.is_expired(now));
            before - entries.len()
        })
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore").finish_non_exhaustive()
    }
}

fn lock_error<T>(_: T) -> AuthError {
    AuthError::StoreError("Failed to acquire lock".to_owned())
}

#[async_trait]
#[allow(clippy::significant_drop_tightening)]
impl RateLimitStore for InMemoryStore {
    async fn increment(&self, key: &str, window_secs: u64) -> Result<RateLimitInfo, AuthError> {
        let now = self.clock.now();
        let reset_at = add_seconds(now, window_secs);

        // read-modify-write under one guard
        let mut entries = self.entries.write().map_err(lock_error)?;

        let info = entries
            .entry(key.to_owned())
            .and_modify(|info| {
                if info.is_expired(now) {
                    info.attempts = 1;
                    info.window_start = now;
                    info.reset_at = reset_at;
                } else {
                    info.attempts = info.attempts.saturating_add(1);
                }
            })
            .or_insert_with(|| RateLimitInfo {
                attempts: 1,
                window_start: now,
                reset_at,
            });

        Ok(info.clone())
    }

    async fn get(&self, key: &str) -> Result<Option<RateLimitInfo>, AuthError> {
        let entries = self.entries.read().map_err(lock_error)?;
        Ok(entries.get(key).cloned())
    }

    async fn reset(&self, key: &str) -> Result<(), AuthError> {
        self.entries.write().map_err(lock_error)?.remove(key);
        Ok(())
    }
}
