//! Per-request session lifecycle.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::config::SessionConfig;
use super::store::SessionStore;
use super::{is_valid_session_id, ClientInfo, Session, SessionData};
use crate::clock::{Clock, SystemClock};
use crate::crypto::generate_token;
use crate::events::{dispatch, AuthEvent};
use crate::AuthError;

/// Session key holding the authenticated user's id.
pub const USER_ID_KEY: &str = "user_id";

/// Server-side session for one request-handling context.
///
/// Build one per request with the session id from the cookie (if any) and
/// the client's attributes, call [`start`](Self::start), use the accessors,
/// then [`save`](Self::save) before responding and emit
/// [`cookie`](Self::cookie).
///
/// ```rust
/// # use std::sync::Arc;
/// # use sentinel::session::{ClientInfo, InMemorySessionStore, SessionConfig, SessionManager};
/// # async fn run() -> Result<(), sentinel::AuthError> {
/// let store = Arc::new(InMemorySessionStore::new());
/// let client = ClientInfo::new("203.0.113.7", "Mozilla/5.0");
///
/// let mut session = SessionManager::new(store, SessionConfig::default(), client, None);
/// session.start().await?;
/// session.set("theme", "dark")?;
/// session.save().await?;
///
/// let set_cookie = session.cookie();
/// assert!(set_cookie.is_some());
/// # Ok(())
/// # }
/// ```
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
    client: ClientInfo,
    clock: Arc<dyn Clock>,
    id: Option<String>,
    data: SessionData,
    started: bool,
    dirty: bool,
}

impl SessionManager {
    /// `session_id` is the raw cookie value, if the client sent one.
    pub fn new(
        store: Arc<dyn SessionStore>,
        config: SessionConfig,
        client: ClientInfo,
        session_id: Option<String>,
    ) -> Self {
        Self {
            store,
            config,
            client,
            clock: Arc::new(SystemClock),
            id: session_id,
            data: SessionData::default(),
            started: false,
            dirty: false,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Resumes the session named by the cookie and checks its fingerprint.
    ///
    /// Repeated calls are no-ops. An unknown, expired or malformed id yields
    /// a fresh anonymous session; a fingerprint mismatch destroys the stored
    /// session before returning.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreError` if the backend fails.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "session_start", skip_all, err)
    )]
    pub async fn start(&mut self) -> Result<(), AuthError> {
        if self.started {
            return Ok(());
        }

        self.store.open().await?;
        self.started = true;

        let Some(id) = self.id.take() else {
            return Ok(());
        };

        if !is_valid_session_id(&id) {
            log::debug!(target: "sentinel_auth::session", "msg=\"malformed session id ignored\"");
            return Ok(());
        }

        let key = self.config.store_key(&id);
        let bytes = self.store.read(&key).await?;
        if bytes.is_empty() {
            return Ok(());
        }

        self.data = match SessionData::decode(&bytes) {
            Ok(data) => data,
            Err(e) => {
                log::warn!(target: "sentinel_auth::session", "msg=\"discarding unreadable session\" error=\"{e}\"");
                self.store.destroy(&key).await?;
                return Ok(());
            }
        };
        self.id = Some(id);

        self.validate_fingerprint().await
    }

    async fn validate_fingerprint(&mut self) -> Result<(), AuthError> {
        let Some(stored) = self.data.fingerprint.as_deref() else {
            return Ok(());
        };

        if stored == self.client.fingerprint() {
            return Ok(());
        }

        let user_id = self.user_id();
        log::warn!(
            target: "sentinel_auth::session",
            "msg=\"session fingerprint mismatch, destroying session\" user_id={user_id:?}"
        );
        self.destroy().await?;

        dispatch(AuthEvent::SessionHijackSuspected {
            user_id,
            ip_address: self.client.ip_address.clone(),
            at: self.clock.now(),
        })
        .await;

        Ok(())
    }

    /// Starts an authenticated session for `user_id` under a new id.
    ///
    /// Existing values carry over. The previous id is removed from the store
    /// before the new one is written, so a pre-planted id cannot be reused.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreError` if the backend fails.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "session_create", skip_all, err)
    )]
    pub async fn create(&mut self, user_id: i64) -> Result<(), AuthError> {
        self.start().await?;

        self.data
            .values
            .insert(USER_ID_KEY.to_owned(), serde_json::Value::from(user_id));
        self.data.fingerprint = Some(self.client.fingerprint());
        self.data.created_at = Some(self.clock.now());

        let new_id = generate_token();
        let new_key = self.config.store_key(&new_id);
        let payload = self.data.encode()?;
        let ttl = self.config.max_lifetime_secs();

        let written = match self.id.take() {
            Some(old_id) => {
                let old_key = self.config.store_key(&old_id);
                self.store
                    .regenerate(&old_key, &new_key, &payload, ttl)
                    .await?
            }
            None => self.store.write(&new_key, &payload, ttl).await?,
        };

        if !written {
            return Err(AuthError::StoreError("session write rejected".to_owned()));
        }

        self.id = Some(new_id);
        self.dirty = false;

        log::debug!(target: "sentinel_auth::session", "msg=\"session regenerated\" user_id={user_id}");
        Ok(())
    }

    /// Typed read; `None` when absent or not decodable as `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .values
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// # Errors
    ///
    /// Returns `AuthError::SerializationError` if `value` cannot be encoded.
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), AuthError> {
        let value =
            serde_json::to_value(value).map_err(|e| AuthError::SerializationError(e.to_string()))?;
        self.data.values.insert(key.to_owned(), value);
        self.dirty = true;
        Ok(())
    }

    pub fn has(&self, key: &str) -> bool {
        self.data.values.get(key).is_some_and(|v| !v.is_null())
    }

    pub fn forget(&mut self, key: &str) {
        if self.data.values.remove(key).is_some() {
            self.dirty = true;
        }
    }

    /// Clears all data and removes the backend record.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreError` if the backend fails.
    pub async fn destroy(&mut self) -> Result<(), AuthError> {
        self.data = SessionData::default();
        self.dirty = false;

        if let Some(id) = self.id.take() {
            self.store.destroy(&self.config.store_key(&id)).await?;
        }

        Ok(())
    }

    /// Writes the session back with TTL = configured max lifetime.
    ///
    /// Call once per request: an existing session is rewritten even when
    /// unchanged, so its expiry slides while the client stays active. An
    /// existing id is only ever updated, never recreated; if another request
    /// destroyed or regenerated it meanwhile, this session becomes anonymous
    /// and its changes are dropped. A session with no id gets one on its first
    /// non-empty save.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreError` if the backend fails or rejects the write.
    pub async fn save(&mut self) -> Result<(), AuthError> {
        if !self.started {
            return Ok(());
        }

        let ttl = self.config.max_lifetime_secs();

        if let Some(id) = self.id.as_deref() {
            let payload = self.data.encode()?;
            let key = self.config.store_key(id);

            if !self.store.update(&key, &payload, ttl).await? {
                log::info!(target: "sentinel_auth::session", "msg=\"session ended by another request, discarding changes\"");
                self.id = None;
                self.data = SessionData::default();
            }

            self.dirty = false;
            return Ok(());
        }

        if !self.dirty || self.data.is_empty() {
            self.dirty = false;
            return Ok(());
        }

        let id = generate_token();
        let payload = self.data.encode()?;
        if !self.store.write(&self.config.store_key(&id), &payload, ttl).await? {
            return Err(AuthError::StoreError("session write rejected".to_owned()));
        }

        self.id = Some(id);
        self.dirty = false;
        Ok(())
    }

    /// Saves and releases the backend.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreError` if the backend fails.
    pub async fn close(&mut self) -> Result<(), AuthError> {
        self.save().await?;
        self.store.close().await
    }

    pub fn user_id(&self) -> Option<i64> {
        self.get(USER_ID_KEY)
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn client(&self) -> &ClientInfo {
        &self.client
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Snapshot of the current session, if it has an id.
    pub fn current(&self) -> Option<Session> {
        self.id
            .as_ref()
            .map(|id| Session::new(id.clone(), self.data.clone()))
    }

    /// `Set-Cookie` value for the current session id, if there is one.
    pub fn cookie(&self) -> Option<String> {
        self.id.as_deref().map(|id| self.config.cookie(id))
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("started", &self.started)
            .field("has_id", &self.id.is_some())
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::clock::MockClock;
    use crate::session::InMemorySessionStore;

    fn browser() -> ClientInfo {
        ClientInfo::new("203.0.113.7", "Mozilla/5.0 (X11; Linux x86_64)")
    }

    fn manager(store: &Arc<InMemorySessionStore>, client: ClientInfo, id: Option<String>) -> SessionManager {
        SessionManager::new(store.clone(), SessionConfig::default(), client, id)
    }

    async fn logged_in(store: &Arc<InMemorySessionStore>, user_id: i64) -> String {
        let mut session = manager(store, browser(), None);
        session.start().await.unwrap();
        session.create(user_id).await.unwrap();
        session.id().unwrap().to_owned()
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut session = manager(&store, browser(), None);

        session.start().await.unwrap();
        session.set("k", 1).unwrap();
        session.start().await.unwrap();

        assert!(session.is_started());
        assert_eq!(session.get::<i32>("k"), Some(1));
    }

    #[tokio::test]
    async fn test_create_stores_user_and_fingerprint() {
        let store = Arc::new(InMemorySessionStore::new());
        let id = logged_in(&store, 7).await;

        let mut resumed = manager(&store, browser(), Some(id.clone()));
        resumed.start().await.unwrap();

        assert_eq!(resumed.id(), Some(id.as_str()));
        assert_eq!(resumed.user_id(), Some(7));
        let current = resumed.current().unwrap();
        assert_eq!(current.data.fingerprint, Some(browser().fingerprint()));
        assert!(current.data.created_at.is_some());
    }

    #[tokio::test]
    async fn test_create_twice_regenerates_and_invalidates_old_id() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut session = manager(&store, browser(), None);
        session.start().await.unwrap();

        session.create(1).await.unwrap();
        let first = session.id().unwrap().to_owned();
        session.create(1).await.unwrap();
        let second = session.id().unwrap().to_owned();

        assert_ne!(first, second);
        assert!(store.read(&format!("session:{first}")).await.unwrap().is_empty());
        assert!(!store.read(&format!("session:{second}")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_keeps_existing_values() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut session = manager(&store, browser(), None);
        session.start().await.unwrap();
        session.set("cart", vec![1, 2, 3]).unwrap();
        session.save().await.unwrap();
        let anonymous_id = session.id().unwrap().to_owned();

        session.create(3).await.unwrap();

        assert_ne!(session.id(), Some(anonymous_id.as_str()));
        assert_eq!(session.get::<Vec<i32>>("cart"), Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_fingerprint_mismatch_destroys_session() {
        let store = Arc::new(InMemorySessionStore::new());
        let id = logged_in(&store, 7).await;

        let thief = ClientInfo::new("198.51.100.23", "curl/8.0");
        let mut hijacked = manager(&store, thief, Some(id.clone()));
        hijacked.start().await.unwrap();

        assert_eq!(hijacked.id(), None);
        assert_eq!(hijacked.user_id(), None);
        assert!(store.read(&format!("session:{id}")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_id_starts_fresh() {
        let store = Arc::new(InMemorySessionStore::new());
        let planted = "ab".repeat(32);
        let mut session = manager(&store, browser(), Some(planted.clone()));
        session.start().await.unwrap();

        assert_eq!(session.id(), None);

        session.set("k", "v").unwrap();
        session.save().await.unwrap();
        assert_ne!(session.id(), Some(planted.as_str()));
    }

    #[tokio::test]
    async fn test_malformed_id_ignored() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut session = manager(&store, browser(), Some("../../etc/passwd".to_owned()));
        session.start().await.unwrap();
        assert_eq!(session.id(), None);
    }

    #[tokio::test]
    async fn test_unreadable_payload_discarded() {
        let store = Arc::new(InMemorySessionStore::new());
        let id = "cd".repeat(32);
        store
            .write(&format!("session:{id}"), b"{broken", 60)
            .await
            .unwrap();

        let mut session = manager(&store, browser(), Some(id.clone()));
        session.start().await.unwrap();

        assert_eq!(session.id(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_accessors() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut session = manager(&store, browser(), None);
        session.start().await.unwrap();

        assert!(!session.has("flash"));
        assert_eq!(session.get_or("flash", "none".to_owned()), "none");

        session.set("flash", "saved").unwrap();
        assert!(session.has("flash"));
        assert_eq!(session.get::<String>("flash").as_deref(), Some("saved"));
        assert_eq!(session.get::<i64>("flash"), None);

        session.forget("flash");
        assert!(!session.has("flash"));
    }

    #[tokio::test]
    async fn test_values_survive_save_and_resume() {
        let store = Arc::new(InMemorySessionStore::new());
        let id = logged_in(&store, 9).await;

        let mut session = manager(&store, browser(), Some(id.clone()));
        session.start().await.unwrap();
        session.set("locale", "pt-PT").unwrap();
        session.close().await.unwrap();

        let mut next = manager(&store, browser(), Some(id));
        next.start().await.unwrap();
        assert_eq!(next.get::<String>("locale").as_deref(), Some("pt-PT"));
        assert_eq!(next.user_id(), Some(9));
    }

    #[tokio::test]
    async fn test_active_session_expiry_slides() {
        let clock = MockClock::new();
        let store = Arc::new(InMemorySessionStore::with_clock(Arc::new(clock.clone())));
        let id = logged_in(&store, 1).await;

        for _ in 0..5 {
            clock.advance(Duration::seconds(600));

            let mut request = manager(&store, browser(), Some(id.clone()));
            request.start().await.unwrap();
            assert_eq!(request.user_id(), Some(1));
            request.close().await.unwrap();
        }

        clock.advance(Duration::seconds(1441));
        let mut idle = manager(&store, browser(), Some(id));
        idle.start().await.unwrap();
        assert_eq!(idle.user_id(), None);
    }

    #[tokio::test]
    async fn test_stale_save_does_not_revive_destroyed_session() {
        let store = Arc::new(InMemorySessionStore::new());
        let id = logged_in(&store, 1).await;

        let mut tab_a = manager(&store, browser(), Some(id.clone()));
        tab_a.start().await.unwrap();

        let mut tab_b = manager(&store, browser(), Some(id.clone()));
        tab_b.start().await.unwrap();
        tab_b.destroy().await.unwrap();

        tab_a.set("theme", "dark").unwrap();
        tab_a.save().await.unwrap();

        assert_eq!(tab_a.id(), None);
        assert_eq!(tab_a.user_id(), None);
        assert!(store.read(&format!("session:{id}")).await.unwrap().is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_stale_save_does_not_revive_regenerated_id() {
        let store = Arc::new(InMemorySessionStore::new());
        let old = logged_in(&store, 1).await;

        let mut tab_a = manager(&store, browser(), Some(old.clone()));
        tab_a.start().await.unwrap();

        let mut tab_b = manager(&store, browser(), Some(old.clone()));
        tab_b.create(1).await.unwrap();
        let new = tab_b.id().unwrap().to_owned();

        tab_a.set("theme", "dark").unwrap();
        tab_a.save().await.unwrap();

        assert!(store.read(&format!("session:{old}")).await.unwrap().is_empty());
        assert!(!store.read(&format!("session:{new}")).await.unwrap().is_empty());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_save_before_start_writes_nothing() {
        let store = Arc::new(InMemorySessionStore::new());
        let id = logged_in(&store, 1).await;

        let mut session = manager(&store, browser(), Some(id.clone()));
        session.save().await.unwrap();

        let mut resumed = manager(&store, browser(), Some(id));
        resumed.start().await.unwrap();
        assert_eq!(resumed.user_id(), Some(1));
    }

    #[tokio::test]
    async fn test_empty_anonymous_session_not_persisted() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut session = manager(&store, browser(), None);
        session.start().await.unwrap();
        session.set("k", 1).unwrap();
        session.forget("k");
        session.save().await.unwrap();

        assert_eq!(session.id(), None);
        assert!(session.cookie().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_destroy_clears_everything() {
        let store = Arc::new(InMemorySessionStore::new());
        let id = logged_in(&store, 7).await;

        let mut session = manager(&store, browser(), Some(id.clone()));
        session.start().await.unwrap();
        session.destroy().await.unwrap();

        assert_eq!(session.user_id(), None);
        assert_eq!(session.id(), None);
        assert!(session.current().is_none());
        assert!(store.read(&format!("session:{id}")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cookie_uses_current_id() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut session = manager(&store, browser(), None);
        session.create(1).await.unwrap();

        let cookie = session.cookie().unwrap();
        assert!(cookie.starts_with(&format!("sentinel_session={}", session.id().unwrap())));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
    }
}
