use chrono::Duration;

use crate::config::Environment;
use crate::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    None,
    #[default]
    Lax,
    Strict,
}

impl SameSite {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Lax => "Lax",
            Self::Strict => "Strict",
        }
    }
}

/// Cookie policy and backend lifetime of server-side sessions.
///
/// The cookie carries no `Max-Age`/`Expires`: it lives as long as the
/// browser session, unless the backend TTL (`max_lifetime`) elapses first.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub cookie_path: String,
    pub cookie_domain: Option<String>,
    pub cookie_secure: bool,
    pub cookie_http_only: bool,
    pub cookie_same_site: SameSite,
    /// TTL applied to every backend write.
    pub max_lifetime: Duration,
    /// Namespace for backend keys, `session:{id}`.
    pub key_prefix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "sentinel_session".to_owned(),
            cookie_path: "/".to_owned(),
            cookie_domain: None,
            cookie_secure: false,
            cookie_http_only: true,
            cookie_same_site: SameSite::Lax,
            max_lifetime: Duration::seconds(1440),
            key_prefix: "session:".to_owned(),
        }
    }
}

impl SessionConfig {
    /// `Secure` is set iff the environment is production.
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            cookie_secure: environment.is_production(),
            ..Self::default()
        }
    }

    /// Backend TTL in whole seconds.
    pub fn max_lifetime_secs(&self) -> u64 {
        u64::try_from(self.max_lifetime.num_seconds()).unwrap_or(0)
    }

    pub fn store_key(&self, session_id: &str) -> String {
        format!("{}{session_id}", self.key_prefix)
    }

    /// `Set-Cookie` value carrying `session_id`.
    pub fn cookie(&self, session_id: &str) -> String {
        let mut cookie = format!("{}={session_id}", self.cookie_name);
        self.push_attributes(&mut cookie);
        cookie
    }

    /// `Set-Cookie` value that makes the browser drop the session cookie.
    pub fn removal_cookie(&self) -> String {
        let mut cookie = format!("{}=", self.cookie_name);
        self.push_attributes(&mut cookie);
        cookie.push_str("; Max-Age=0");
        cookie
    }

    fn push_attributes(&self, cookie: &mut String) {
        cookie.push_str("; Path=");
        cookie.push_str(&self.cookie_path);
        if let Some(domain) = &self.cookie_domain {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        if self.cookie_http_only {
            cookie.push_str("; HttpOnly");
        }
        cookie.push_str("; SameSite=");
        cookie.push_str(self.cookie_same_site.as_str());
    }

    /// # Errors
    ///
    /// Returns `AuthError::ConfigurationError` for an unusable cookie policy.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.cookie_name.is_empty() {
            return Err(AuthError::ConfigurationError(
                "session cookie_name must not be empty".to_owned(),
            ));
        }
        if self.max_lifetime <= Duration::zero() {
            return Err(AuthError::ConfigurationError(
                "session max_lifetime must be positive".to_owned(),
            ));
        }
        // Browsers discard SameSite=None cookies that are not Secure.
        if self.cookie_same_site == SameSite::None && !self.cookie_secure {
            return Err(AuthError::ConfigurationError(
                "SameSite=None requires a Secure cookie".to_owned(),
            ));
        }
        Ok(())
    }
}
