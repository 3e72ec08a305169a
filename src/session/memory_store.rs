//! In-memory session storage.
//!
//! Suitable for development, testing, and single-instance deployments.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::store::SessionStore;
use crate::clock::{add_seconds, Clock, SystemClock};
use crate::AuthError;

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: DateTime<Utc>,
}

/// In-memory session storage.
///
/// Payloads live in a `HashMap` behind a `RwLock`; expired entries are
/// invisible to `read` and removed by `gc`.
///
/// # Note
///
/// Sessions are lost when the process restarts and are not shared between
/// instances.
#[derive(Clone)]
pub struct InMemorySessionStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    clock: Arc<dyn Clock>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Number of stored entries, expired ones included until `gc` runs.
    pub fn len(&self) -> usize {
        self.entries.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn expiry(&self, ttl_secs: u64) -> DateTime<Utc> {
        add_seconds(self.clock.now(), ttl_secs)
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> AuthError {
    AuthError::StoreError("Lock poisoned".to_owned())
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn read(&self, key: &str) -> Result<Vec<u8>, AuthError> {
        let now = self.clock.now();
        let entries = self.entries.read().map_err(poisoned)?;

        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone())
            .unwrap_or_default())
    }

    async fn write(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<bool, AuthError> {
        let entry = Entry {
            value: value.to_vec(),
            expires_at: self.expiry(ttl_secs),
        };

        self.entries
            .write()
            .map_err(poisoned)?
            .insert(key.to_owned(), entry);

        Ok(true)
    }

    async fn update(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<bool, AuthError> {
        let now = self.clock.now();
        let expires_at = self.expiry(ttl_secs);
        let mut entries = self.entries.write().map_err(poisoned)?;

        match entries.get_mut(key) {
            Some(entry) if entry.expires_at > now => {
                entry.value = value.to_vec();
                entry.expires_at = expires_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn destroy(&self, key: &str) -> Result<bool, AuthError> {
        let now = self.clock.now();
        let removed = self.entries.write().map_err(poisoned)?.remove(key);

        Ok(removed.is_some_and(|entry| entry.expires_at > now))
    }

    #[allow(clippy::significant_drop_tightening)]
    async fn gc(&self, _max_lifetime: Duration) -> Result<u64, AuthError> {
        let now = self.clock.now();
        let mut entries = self.entries.write().map_err(poisoned)?;

        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);

        let pruned = before.saturating_sub(entries.len());
        Ok(u64::try_from(pruned).unwrap_or(u64::MAX))
    }

    async fn regenerate(
        &self,
        old_key: &str,
        new_key: &str,
        value: &[u8],
        ttl_secs: u64,
    ) -> Result<bool, AuthError> {
        let entry = Entry {
            value: value.to_vec(),
            expires_at: self.expiry(ttl_secs),
        };

        // one write guard: no reader sees both keys
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.remove(old_key);
        entries.insert(new_key.to_owned(), entry);
        drop(entries);

        Ok(true)
    }
}
