//! Login, logout and role checks over a [`SessionManager`].

use std::sync::Arc;

use crate::config::RateLimitConfig;
use crate::crypto::{Argon2Verifier, PasswordVerifier};
use crate::events::{dispatch, AuthEvent};
use crate::rate_limit::RateLimiter;
use crate::repository::{UserIdentity, UserRepository};
use crate::session::SessionManager;
use crate::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticated { user_id: i64 },
}

/// Authentication entry point for one request-handling context.
///
/// `login` returns `Ok(false)` alike for an unknown email, a wrong password
/// and a throttled key. Only backend failures are `Err`.
pub struct AuthGateway<U: UserRepository, L: RateLimiter> {
    users: U,
    limiter: L,
    session: SessionManager,
    verifier: Arc<dyn PasswordVerifier>,
    config: RateLimitConfig,
}

impl<U: UserRepository, L: RateLimiter> AuthGateway<U, L> {
    pub fn new(users: U, limiter: L, session: SessionManager) -> Self {
        Self {
            users,
            limiter,
            session,
            verifier: Arc::new(Argon2Verifier),
            config: RateLimitConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: RateLimitConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the default Argon2 check, for applications storing another
    /// hash format.
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn PasswordVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Attempts to authenticate `email` with `password`.
    ///
    /// A throttled key is refused before the user is looked up. On success the
    /// session id is regenerated and the key's failure count cleared; on
    /// failure one attempt is recorded.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreError` if the session store, the rate limiter
    /// or the user repository fails.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "login", skip_all, err)
    )]
    pub async fn login(&mut self, email: &str, password: &str) -> Result<bool, AuthError> {
        self.session.start().await?;

        let key = self
            .config
            .key_strategy
            .login_key(&self.config.key_prefix, email, self.session.client());
        let now = self.session.clock().now();

        if self
            .limiter
            .is_blocked(&key, self.config.max_attempts, self.config.decay_seconds())
            .await?
        {
            log::warn!(target: "sentinel_auth::gateway", "msg=\"login blocked\" email=\"{email}\"");
            dispatch(AuthEvent::LoginBlocked {
                email: email.to_owned(),
                at: now,
            })
            .await;
            return Ok(false);
        }

        let user = match self.users.find_by_email(email).await? {
            Some(user) if self.verify(&user, password) => user,
            _ => {
                self.limiter.attempt(&key).await?;
                log::info!(target: "sentinel_auth::gateway", "msg=\"login failed\" email=\"{email}\"");
                dispatch(AuthEvent::LoginFailed {
                    email: email.to_owned(),
                    at: now,
                })
                .await;
                return Ok(false);
            }
        };

        self.session.create(user.id).await?;
        self.limiter.clear(&key).await?;

        log::info!(target: "sentinel_auth::gateway", "msg=\"login succeeded\" user_id={}", user.id);
        dispatch(AuthEvent::LoginSuccess {
            user_id: user.id,
            email: user.email,
            at: now,
        })
        .await;

        Ok(true)
    }

    fn verify(&self, user: &UserIdentity, password: &str) -> bool {
        match self.verifier.verify(password, &user.password_hash) {
            Ok(valid) => valid,
            Err(e) => {
                log::error!(target: "sentinel_auth::gateway", "msg=\"stored password hash unusable\" user_id={} error=\"{e}\"", user.id);
                false
            }
        }
    }

    /// Destroys the session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreError` if the session store fails.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "logout", skip_all, err)
    )]
    pub async fn logout(&mut self) -> Result<(), AuthError> {
        self.session.start().await?;
        let user_id = self.session.user_id();

        self.session.destroy().await?;

        log::info!(target: "sentinel_auth::gateway", "msg=\"logout\" user_id={user_id:?}");
        dispatch(AuthEvent::LogoutSuccess {
            user_id,
            at: self.session.clock().now(),
        })
        .await;
        Ok(())
    }

    /// The signed-in user, looked up by the id held in the session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::StoreError` if the session store or user repository
    /// fails.
    pub async fn user(&mut self) -> Result<Option<UserIdentity>, AuthError> {
        self.session.start().await?;
        match self.session.user_id() {
            Some(id) => self.users.find_by_id(id).await,
            None => Ok(None),
        }
    }

    /// True iff a user is signed in and holds `role`.
    ///
    /// # Errors
    ///
    /// Same as [`user`](Self::user).
    pub async fn authorize(&mut self, role: &str) -> Result<bool, AuthError> {
        Ok(self.user().await?.is_some_and(|user| user.has_role(role)))
    }

    pub fn state(&self) -> AuthState {
        match self.session.user_id() {
            Some(user_id) => AuthState::Authenticated { user_id },
            None => AuthState::Anonymous,
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionManager {
        &mut self.session
    }

    pub fn into_session(self) -> SessionManager {
        self.session
    }
}
