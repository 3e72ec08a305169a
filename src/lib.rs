//! Session security toolkit for server-rendered web applications.
//!
//! `sentinel` keeps the security state of a request-handling context:
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`SessionManager`](session::SessionManager) | Server-side session bound to a client fingerprint |
//! | [`RateLimiter`](rate_limit::RateLimiter) | Failed-attempt counters with a decay window |
//! | [`CsrfTokenService`](csrf::CsrfTokenService) | Per-session anti-forgery tokens |
//! | [`UrlSigner`](signed_url::UrlSigner) | HMAC-SHA256 signed, expiring URLs |
//! | [`AuthGateway`](gateway::AuthGateway) | Login, logout and role checks |
//!
//! Security failures (blocked login, bad credentials, hijacked session,
//! forged token, tampered URL) are reported as plain booleans. Only backend
//! failures surface as [`AuthError`], so a store outage is never mistaken for
//! an anonymous visitor.

pub mod clock;
pub mod config;
pub mod crypto;
pub mod csrf;
pub mod events;
pub mod gateway;
#[cfg(feature = "sqlx_postgres")]
pub mod postgres;
pub mod rate_limit;
pub mod repository;
mod secret;
pub mod session;
pub mod signed_url;

pub use clock::{Clock, SystemClock};
pub use config::{Environment, SentinelConfig};
pub use csrf::CsrfTokenService;
pub use events::register_event_listeners;
pub use gateway::{AuthGateway, AuthState};
pub use rate_limit::RateLimiter;
pub use repository::{UserIdentity, UserRepository};
pub use secret::SecretString;
pub use session::{ClientInfo, SessionManager, SessionStore};
pub use signed_url::UrlSigner;

#[cfg(any(test, feature = "mocks"))]
pub use clock::MockClock;
#[cfg(any(test, feature = "mocks"))]
pub use repository::MockUserRepository;

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum AuthError {
    /// The session or rate-limit backend failed (unreachable, poisoned, query error).
    StoreError(String),
    /// A session payload could not be encoded or decoded.
    SerializationError(String),
    /// A stored password hash could not be parsed.
    PasswordHashError,
    /// The supplied configuration failed validation.
    ConfigurationError(String),
}

impl std::error::Error for AuthError {}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::StoreError(msg) => write!(f, "Store error: {msg}"),
            AuthError::SerializationError(msg) => write!(f, "Serialization error: {msg}"),
            AuthError::PasswordHashError => write!(f, "Malformed password hash"),
            AuthError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}
