mod config;
mod manager;
mod memory_store;
#[cfg(feature = "sqlx_postgres")]
mod postgres_store;
mod store;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
pub use config::{SameSite, SessionConfig};
pub use manager::{SessionManager, USER_ID_KEY};
pub use memory_store::InMemorySessionStore;
#[cfg(feature = "sqlx_postgres")]
pub use postgres_store::PostgresSessionStore;
use serde::{Deserialize, Serialize};
pub use store::SessionStore;

use crate::crypto::sha256_hex;
use crate::AuthError;

/// Client-identifying request attributes.
///
/// Supplied by the caller for every request; nothing here is read from
/// ambient state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip_address: String,
    pub user_agent: String,
}

impl ClientInfo {
    pub fn new(ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip_address: ip_address.into(),
            user_agent: user_agent.into(),
        }
    }

    /// Hex SHA-256 of the client IP followed by the user agent.
    ///
    /// This is a heuristic hijacking check, not a guarantee: both inputs are
    /// attacker-influenceable, and clients behind a shared NAT with the same
    /// browser build produce the same fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut material = String::with_capacity(self.ip_address.len() + self.user_agent.len());
        material.push_str(&self.ip_address);
        material.push_str(&self.user_agent);
        sha256_hex(material.as_bytes())
    }
}

/// Payload persisted in the session store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub values: BTreeMap<String, serde_json::Value>,
}

impl SessionData {
    pub fn is_empty(&self) -> bool {
        self.fingerprint.is_none() && self.values.is_empty()
    }

    pub(crate) fn encode(&self) -> Result<Vec<u8>, AuthError> {
        serde_json::to_vec(self).map_err(|e| AuthError::SerializationError(e.to_string()))
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, AuthError> {
        serde_json::from_slice(bytes).map_err(|e| AuthError::SerializationError(e.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub data: SessionData,
}

impl Session {
    pub fn new(id: String, data: SessionData) -> Self {
        Self { id, data }
    }
}

/// Session ids are 64 lowercase hex characters; anything else from a cookie
/// is ignored rather than looked up.
pub(crate) fn is_valid_session_id(id: &str) -> bool {
    id.len() == 64 && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
