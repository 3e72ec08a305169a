//! Synchronizer-token CSRF protection.
//!
//! One token lives in the session at a time. Forms carry it in a hidden
//! `_csrf` field, scripts in an `X-CSRF-TOKEN` header; both are compared
//! against the session copy in constant time.

use crate::crypto::{constant_time_eq, generate_token};
use crate::session::SessionManager;
use crate::AuthError;

/// Session key holding the current token.
pub const SESSION_KEY: &str = "_csrf_token";
/// Conventional form field name.
pub const FORM_FIELD: &str = "_csrf";
/// Conventional request header name.
pub const HEADER_NAME: &str = "X-CSRF-TOKEN";

/// Issues and checks anti-forgery tokens bound to a [`SessionManager`].
///
/// Tokens last for the session, they are not single-use. Calling
/// [`generate_token`](Self::generate_token) again invalidates the previous one.
#[derive(Debug, Clone, Default)]
pub struct CsrfTokenService;

impl CsrfTokenService {
    pub fn new() -> Self {
        Self
    }

    /// New 256-bit token, hex encoded, stored in `session` over any previous one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SerializationError` if the session rejects the value.
    pub fn generate_token(&self, session: &mut SessionManager) -> Result<String, AuthError> {
        let token = generate_token();
        session.set(SESSION_KEY, &token)?;
        Ok(token)
    }

    /// The session's token, generating one if none exists yet.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SerializationError` if the session rejects the value.
    pub fn token(&self, session: &mut SessionManager) -> Result<String, AuthError> {
        match session.get::<String>(SESSION_KEY) {
            Some(token) if !token.is_empty() => Ok(token),
            _ => self.generate_token(session),
        }
    }

    /// True iff the session holds a token and `submitted` is a non-empty
    /// exact match. Never errors.
    pub fn validate_token(&self, session: &SessionManager, submitted: Option<&str>) -> bool {
        let Some(expected) = session.get::<String>(SESSION_KEY) else {
            log::debug!(target: "sentinel_auth::csrf", "msg=\"no csrf token in session\"");
            return false;
        };

        let submitted = match submitted {
            Some(token) if !token.is_empty() => token,
            _ => return false,
        };

        if expected.is_empty() {
            return false;
        }

        let valid = constant_time_eq(expected.as_bytes(), submitted.as_bytes());
        if !valid {
            log::warn!(target: "sentinel_auth::csrf", "msg=\"csrf token mismatch\"");
        }
        valid
    }

    /// Picks the submitted token: the form field wins over the header.
    pub fn submitted_token<'a>(form_field: Option<&'a str>, header: Option<&'a str>) -> Option<&'a str> {
        form_field
            .filter(|value| !value.is_empty())
            .or_else(|| header.filter(|value| !value.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::session::{ClientInfo, InMemorySessionStore, SessionConfig};

    async fn session() -> SessionManager {
        let mut session = SessionManager::new(
            Arc::new(InMemorySessionStore::new()),
            SessionConfig::default(),
            ClientInfo::new("203.0.113.7", "Mozilla/5.0"),
            None,
        );
        session.start().await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_generated_token_validates() {
        let mut session = session().await;
        let csrf = CsrfTokenService::new();

        let token = csrf.generate_token(&mut session).unwrap();

        assert_eq!(token.len(), 64);
        assert!(csrf.validate_token(&session, Some(&token)));
    }

    #[tokio::test]
    async fn test_other_strings_rejected() {
        let mut session = session().await;
        let csrf = CsrfTokenService::new();
        let token = csrf.generate_token(&mut session).unwrap();

        assert!(!csrf.validate_token(&session, None));
        assert!(!csrf.validate_token(&session, Some("")));
        assert!(!csrf.validate_token(&session, Some("deadbeef")));
        assert!(!csrf.validate_token(&session, Some(&token.to_uppercase())));
        assert!(!csrf.validate_token(&session, Some(&token[..63])));
    }

    #[tokio::test]
    async fn test_no_token_in_session() {
        let session = session().await;
        assert!(!CsrfTokenService::new().validate_token(&session, Some("anything")));
    }

    #[tokio::test]
    async fn test_regenerating_invalidates_previous() {
        let mut session = session().await;
        let csrf = CsrfTokenService::new();

        let first = csrf.generate_token(&mut session).unwrap();
        let second = csrf.generate_token(&mut session).unwrap();

        assert_ne!(first, second);
        assert!(!csrf.validate_token(&session, Some(&first)));
        assert!(csrf.validate_token(&session, Some(&second)));
    }

    #[tokio::test]
    async fn test_token_is_reusable_within_session() {
        let mut session = session().await;
        let csrf = CsrfTokenService::new();

        let token = csrf.token(&mut session).unwrap();
        assert_eq!(csrf.token(&mut session).unwrap(), token);
        assert!(csrf.validate_token(&session, Some(&token)));
        assert!(csrf.validate_token(&session, Some(&token)));
    }

    #[tokio::test]
    async fn test_token_gone_after_destroy() {
        let mut session = session().await;
        let csrf = CsrfTokenService::new();
        let token = csrf.generate_token(&mut session).unwrap();

        session.destroy().await.unwrap();

        assert!(!csrf.validate_token(&session, Some(&token)));
    }

    #[test]
    fn test_submitted_token_prefers_form_field() {
        assert_eq!(
            CsrfTokenService::submitted_token(Some("form"), Some("header")),
            Some("form")
        );
        assert_eq!(
            CsrfTokenService::submitted_token(Some(""), Some("header")),
            Some("header")
        );
        assert_eq!(CsrfTokenService::submitted_token(None, None), None);
    }
}
