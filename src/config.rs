//! Configuration for the sentinel toolkit.
//!
//! Configuration is plain data. Reading it from the process environment or a
//! file is left to the application; [`Environment::from_app_env`] only parses
//! a value the caller already holds.
//!
//! # Example
//!
//! ```rust
//! use sentinel::config::{Environment, RateLimitConfig, SentinelConfig};
//! use sentinel::SecretString;
//! use chrono::Duration;
//!
//! let config = SentinelConfig {
//!     rate_limit: RateLimitConfig {
//!         max_attempts: 3,
//!         decay: Duration::minutes(10),
//!         ..Default::default()
//!     },
//!     ..SentinelConfig::production(SecretString::new("0123456789abcdef0123456789abcdef"))
//! };
//!
//! assert_eq!(config.environment, Environment::Production);
//! assert!(config.session.cookie_secure);
//! assert!(config.validate().is_ok());
//! ```

use chrono::Duration;

use crate::rate_limit::KeyStrategy;
use crate::session::SessionConfig;
use crate::{AuthError, SecretString};

/// Minimum accepted length of the application key, in bytes.
pub const MIN_APP_KEY_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// `"production"` (case-insensitive) selects production, anything else
    /// is development.
    pub fn from_app_env(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("production") {
            Self::Production
        } else {
            Self::Development
        }
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

#[derive(Debug, Clone)]
pub struct SentinelConfig {
    pub environment: Environment,

    pub session: SessionConfig,

    pub rate_limit: RateLimitConfig,

    pub signed_url: SignedUrlConfig,

    /// Process-wide key for URL signatures. Never derived from request data.
    pub app_key: SecretString,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            session: SessionConfig::for_environment(Environment::Development),
            rate_limit: RateLimitConfig::default(),
            signed_url: SignedUrlConfig::default(),
            app_key: SecretString::new(""),
        }
    }
}

impl SentinelConfig {
    /// Development preset: cookies without the `Secure` flag so plain-HTTP
    /// localhost works.
    pub fn development(app_key: SecretString) -> Self {
        Self {
            app_key,
            ..Self::default()
        }
    }

    /// Production preset: `Secure` session cookies.
    pub fn production(app_key: SecretString) -> Self {
        Self {
            environment: Environment::Production,
            session: SessionConfig::for_environment(Environment::Production),
            app_key,
            ..Self::default()
        }
    }

    /// # Errors
    ///
    /// Returns `AuthError::ConfigurationError` describing the first problem found.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.app_key.is_empty() {
            return Err(AuthError::ConfigurationError(
                "app_key must not be empty".to_owned(),
            ));
        }
        if self.app_key.len() < MIN_APP_KEY_LEN {
            return Err(AuthError::ConfigurationError(format!(
                "app_key should be at least {MIN_APP_KEY_LEN} bytes"
            )));
        }
        if self.environment.is_production() && !self.session.cookie_secure {
            return Err(AuthError::ConfigurationError(
                "session cookies must be Secure in production".to_owned(),
            ));
        }
        if self.rate_limit.max_attempts == 0 {
            return Err(AuthError::ConfigurationError(
                "rate_limit.max_attempts must be at least 1".to_owned(),
            ));
        }
        if self.rate_limit.decay <= Duration::zero() {
            return Err(AuthError::ConfigurationError(
                "rate_limit.decay must be positive".to_owned(),
            ));
        }
        self.session.validate()
    }
}

/// Login throttling policy.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Failed attempts tolerated inside one decay window.
    ///
    /// Default: 5
    pub max_attempts: u32,

    /// Length of the decay window.
    ///
    /// Default: 300 seconds
    pub decay: Duration,

    /// Prefix of limiter keys.
    ///
    /// Default: `login_attempt:`
    pub key_prefix: String,

    /// Which request attributes identify a throttled login.
    ///
    /// Default: [`KeyStrategy::Email`]
    pub key_strategy: KeyStrategy,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            decay: Duration::seconds(300),
            key_prefix: "login_attempt:".to_owned(),
            key_strategy: KeyStrategy::Email,
        }
    }
}

impl RateLimitConfig {
    #[inline]
    pub fn decay_seconds(&self) -> u64 {
        u64::try_from(self.decay.num_seconds()).unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub struct SignedUrlConfig {
    /// Lifetime used by [`UrlSigner::sign_default`](crate::UrlSigner::sign_default).
    ///
    /// Default: 1 hour
    pub default_ttl: Duration,
}

impl Default for SignedUrlConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::hours(1),
        }
    }
}
