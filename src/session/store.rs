//! Session storage backend trait.

use async_trait::async_trait;
use chrono::Duration;

use crate::AuthError;

/// Key-value backend with per-key TTL holding encoded session payloads.
///
/// Keys arrive already namespaced (`session:{id}`). Implementations:
/// - [`InMemorySessionStore`](super::InMemorySessionStore): single process, tests
/// - `PostgresSessionStore` (feature `sqlx_postgres`): shared across instances
///
/// Every method returns `Err` only when the backend itself failed. A missing
/// or expired key is not an error.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Called once when a session manager starts.
    async fn open(&self) -> Result<(), AuthError> {
        Ok(())
    }

    /// Called when the request context is done with the store.
    async fn close(&self) -> Result<(), AuthError> {
        Ok(())
    }

    /// Returns the payload for `key`, or an empty vector when the key is
    /// missing or its TTL has elapsed.
    async fn read(&self, key: &str) -> Result<Vec<u8>, AuthError>;

    /// Stores `value` under `key`, expiring after `ttl_secs`.
    async fn write(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<bool, AuthError>;

    /// Replaces the payload of a live record and resets its TTL.
    ///
    /// Returns `false` without writing when `key` is missing or expired, so a
    /// destroyed or regenerated session is never recreated. The default
    /// checks then writes; backends with a conditional update should override.
    async fn update(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<bool, AuthError> {
        if self.read(key).await?.is_empty() {
            return Ok(false);
        }
        self.write(key, value, ttl_secs).await
    }

    /// Removes `key`. Returns whether a live record was removed.
    async fn destroy(&self, key: &str) -> Result<bool, AuthError>;

    /// Removes records whose TTL elapsed. Returns the number removed.
    async fn gc(&self, max_lifetime: Duration) -> Result<u64, AuthError>;

    /// Moves a session to a new key.
    ///
    /// `old_key` must be unreadable before `new_key` becomes readable.
    /// Backends that can do both in one atomic step should override this.
    async fn regenerate(
        &self,
        old_key: &str,
        new_key: &str,
        value: &[u8],
        ttl_secs: u64,
    ) -> Result<bool, AuthError> {
        self.destroy(old_key).await?;
        self.write(new_key, value, ttl_secs).await
    }
}
