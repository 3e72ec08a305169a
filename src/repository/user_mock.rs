#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::AuthError;

use super::user::{UserIdentity, UserRepository};

/// In-memory users. Clones share the same list.
#[derive(Clone, Default)]
pub struct MockUserRepository {
    pub users: Arc<Mutex<Vec<UserIdentity>>>,
    /// When set, every lookup fails with `AuthError::StoreError`.
    pub unavailable: Arc<Mutex<bool>>,
}

impl MockUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: Vec<UserIdentity>) -> Self {
        Self {
            users: Arc::new(Mutex::new(users)),
            unavailable: Arc::default(),
        }
    }

    pub fn insert(&self, user: UserIdentity) {
        self.users.lock().unwrap().push(user);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    fn check_available(&self) -> Result<(), AuthError> {
        if *self.unavailable.lock().unwrap() {
            return Err(AuthError::StoreError("user store unavailable".to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MockUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserIdentity>, AuthError> {
        self.check_available()?;
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserIdentity>, AuthError> {
        self.check_available()?;
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.id == id).cloned())
    }
}
