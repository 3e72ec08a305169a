//! Security properties across components.
//!
//! Run with: `cargo test --features mocks --test security`

#![cfg(feature = "mocks")]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::sync::Arc;

use chrono::Duration;
use sentinel::crypto::PasswordVerifier;
use sentinel::rate_limit::{InMemoryStore, RateLimiter, StoreRateLimiter};
use sentinel::session::{InMemorySessionStore, SessionConfig};
use sentinel::{
    AuthError, AuthGateway, AuthState, ClientInfo, CsrfTokenService, MockClock,
    MockUserRepository, SecretString, SessionManager, UrlSigner, UserIdentity,
};

const APP_KEY: &str = "base64:c2VudGluZWwtdGVzdC1rZXktMzItYnl0ZXMhIQ==";

/// Plaintext comparison keeps the suite fast; Argon2 has its own unit tests.
struct PlainVerifier;

impl PasswordVerifier for PlainVerifier {
    fn verify(&self, password: &str, password_hash: &str) -> Result<bool, AuthError> {
        Ok(password == password_hash)
    }
}

struct World {
    clock: MockClock,
    sessions: Arc<InMemorySessionStore>,
    limiter: StoreRateLimiter,
    users: MockUserRepository,
}

impl World {
    fn new() -> Self {
        let clock = MockClock::new();
        Self {
            sessions: Arc::new(InMemorySessionStore::with_clock(Arc::new(clock.clone()))),
            limiter: StoreRateLimiter::new(
                Arc::new(InMemoryStore::with_clock(Arc::new(clock.clone()))),
                Duration::seconds(300),
            )
            .with_clock(Arc::new(clock.clone())),
            users: MockUserRepository::with_users(vec![UserIdentity::new(1, "a@x.com", "hunter22")]),
            clock,
        }
    }

    fn session(&self, client: ClientInfo, id: Option<String>) -> SessionManager {
        SessionManager::new(self.sessions.clone(), SessionConfig::default(), client, id)
            .with_clock(Arc::new(self.clock.clone()))
    }

    fn gateway(
        &self,
        client: ClientInfo,
        id: Option<String>,
    ) -> AuthGateway<MockUserRepository, StoreRateLimiter> {
        AuthGateway::new(self.users.clone(), self.limiter.clone(), self.session(client, id))
            .with_verifier(Arc::new(PlainVerifier))
    }
}

fn laptop() -> ClientInfo {
    ClientInfo::new("203.0.113.7", "Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0")
}

fn attacker() -> ClientInfo {
    ClientInfo::new("198.51.100.23", "curl/8.5.0")
}

// =============================================================================
// Session fixation and hijacking
// =============================================================================

#[tokio::test]
async fn stolen_session_id_is_destroyed_for_a_different_client() {
    let world = World::new();
    let mut victim = world.gateway(laptop(), None);
    assert!(victim.login("a@x.com", "hunter22").await.unwrap());
    let stolen = victim.session().id().unwrap().to_owned();

    let mut thief = world.gateway(attacker(), Some(stolen.clone()));
    assert_eq!(thief.user().await.unwrap(), None);
    assert_eq!(thief.state(), AuthState::Anonymous);

    // the victim's next request finds nothing either
    let mut victim_again = world.gateway(laptop(), Some(stolen));
    assert_eq!(victim_again.user().await.unwrap(), None);
}

#[tokio::test]
async fn consecutive_creates_invalidate_previous_ids() {
    let world = World::new();
    let mut session = world.session(laptop(), None);
    session.start().await.unwrap();

    session.create(1).await.unwrap();
    let first = session.id().unwrap().to_owned();
    session.create(1).await.unwrap();
    let second = session.id().unwrap().to_owned();

    assert_ne!(first, second);

    let mut stale = world.session(laptop(), Some(first));
    stale.start().await.unwrap();
    assert_eq!(stale.user_id(), None);

    let mut fresh = world.session(laptop(), Some(second));
    fresh.start().await.unwrap();
    assert_eq!(fresh.user_id(), Some(1));
}

#[tokio::test]
async fn session_expires_after_max_lifetime() {
    let world = World::new();
    let mut session = world.session(laptop(), None);
    session.create(1).await.unwrap();
    let id = session.id().unwrap().to_owned();

    world.clock.advance(Duration::seconds(1441));

    let mut resumed = world.session(laptop(), Some(id));
    resumed.start().await.unwrap();
    assert_eq!(resumed.user_id(), None);
}

// =============================================================================
// Login throttling
// =============================================================================

#[tokio::test]
async fn five_failures_block_the_correct_password() {
    let world = World::new();
    let mut gateway = world.gateway(laptop(), None);

    for _ in 0..5 {
        assert!(!gateway.login("a@x.com", "wrong").await.unwrap());
    }

    assert!(!gateway.login("a@x.com", "hunter22").await.unwrap());
    assert_eq!(gateway.state(), AuthState::Anonymous);
}

#[tokio::test]
async fn limiter_threshold_and_clear() {
    let world = World::new();
    let key = "login_attempt:b@x.com";

    for _ in 0..5 {
        assert!(!world.limiter.is_blocked(key, 5, 300).await.unwrap());
        world.limiter.attempt(key).await.unwrap();
    }
    assert!(world.limiter.is_blocked(key, 5, 300).await.unwrap());

    world.limiter.clear(key).await.unwrap();
    assert!(!world.limiter.is_blocked(key, 5, 300).await.unwrap());
}

#[tokio::test]
async fn concurrent_failures_are_all_counted() {
    let world = World::new();
    let limiter = Arc::new(world.limiter.clone());

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.attempt("login_attempt:c@x.com").await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(limiter.remaining("login_attempt:c@x.com", 25).await.unwrap(), 5);
}

#[tokio::test]
async fn user_store_outage_is_an_error_not_a_failed_login() {
    let world = World::new();
    world.users.set_unavailable(true);
    let mut gateway = world.gateway(laptop(), None);

    assert!(gateway.login("a@x.com", "hunter22").await.is_err());
}

// =============================================================================
// CSRF
// =============================================================================

#[tokio::test]
async fn csrf_token_survives_the_request_cycle() {
    let world = World::new();
    let csrf = CsrfTokenService::new();

    let mut form_request = world.session(laptop(), None);
    form_request.start().await.unwrap();
    let token = csrf.token(&mut form_request).unwrap();
    form_request.save().await.unwrap();
    let id = form_request.id().unwrap().to_owned();

    let mut post_request = world.session(laptop(), Some(id));
    post_request.start().await.unwrap();
    let submitted = CsrfTokenService::submitted_token(Some(token.as_str()), None);

    assert!(csrf.validate_token(&post_request, submitted));
    assert!(!csrf.validate_token(&post_request, Some("")));
    assert!(!csrf.validate_token(&post_request, Some(&"0".repeat(64))));
}

#[tokio::test]
async fn csrf_token_is_not_valid_in_another_session() {
    let world = World::new();
    let csrf = CsrfTokenService::new();

    let mut mine = world.session(laptop(), None);
    mine.start().await.unwrap();
    let token = csrf.generate_token(&mut mine).unwrap();

    let mut theirs = world.session(attacker(), None);
    theirs.start().await.unwrap();
    csrf.generate_token(&mut theirs).unwrap();

    assert!(!csrf.validate_token(&theirs, Some(&token)));
}

// =============================================================================
// Signed URLs
// =============================================================================

#[test]
fn signed_url_expires_after_ttl() {
    let clock = MockClock::new();
    let signer = UrlSigner::new(SecretString::new(APP_KEY)).with_clock(Arc::new(clock.clone()));

    let url = signer.sign("https://example.com/reports/7", 60);
    assert!(signer.validate(&url));

    clock.advance(Duration::seconds(61));
    assert!(!signer.validate(&url));
}

#[test]
fn signed_url_rejects_any_single_character_change() {
    let signer = UrlSigner::new(SecretString::new(APP_KEY));
    let url = signer.sign("https://example.com/reports/7?format=csv", 60);

    for i in 0..url.len() {
        let mut bytes = url.clone().into_bytes();
        bytes[i] = if bytes[i] == b'7' { b'8' } else { b'7' };
        let mutated = String::from_utf8(bytes).unwrap();
        assert!(!signer.validate(&mutated), "mutation at {i} accepted: {mutated}");

        let original = url.as_bytes()[i];
        if original.is_ascii_alphabetic() {
            let mut bytes = url.clone().into_bytes();
            bytes[i] = if original.is_ascii_lowercase() {
                original.to_ascii_uppercase()
            } else {
                original.to_ascii_lowercase()
            };
            let flipped = String::from_utf8(bytes).unwrap();
            assert!(!signer.validate(&flipped), "case flip at {i} accepted: {flipped}");
        }
    }
}
