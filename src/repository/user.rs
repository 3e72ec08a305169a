use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::AuthError;

/// Role given to identities created without an explicit role set.
pub const DEFAULT_ROLE: &str = "user";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub roles: BTreeSet<String>,
}

impl UserIdentity {
    /// Identity holding only [`DEFAULT_ROLE`].
    pub fn new(id: i64, email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            password_hash: password_hash.into(),
            roles: BTreeSet::from([DEFAULT_ROLE.to_owned()]),
        }
    }

    /// Replaces the role set. An empty iterator falls back to [`DEFAULT_ROLE`].
    #[must_use]
    pub fn with_roles<I, R>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        if self.roles.is_empty() {
            self.roles.insert(DEFAULT_ROLE.to_owned());
        }
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Lookups the gateway needs. `Ok(None)` means "no such user"; `Err` means
/// the backing store failed.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserIdentity>, AuthError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<UserIdentity>, AuthError>;
}
