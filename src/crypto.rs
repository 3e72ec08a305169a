//! Cryptographic primitives shared by sessions, CSRF tokens and signed URLs.

use argon2::{Argon2, PasswordVerifier as _};
use hmac::{Hmac, Mac};
use password_hash::PasswordHash;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::AuthError;

pub(crate) type HmacSha256 = Hmac<Sha256>;

/// Number of random bytes in a generated token (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// Generates `bytes` bytes from the OS-seeded thread RNG, hex encoded.
///
/// ```rust
/// use sentinel::crypto::random_hex;
///
/// let token = random_hex(32);
/// assert_eq!(token.len(), 64);
/// ```
pub fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// 256-bit random token, hex encoded (64 characters).
pub fn generate_token() -> String {
    random_hex(TOKEN_BYTES)
}

/// Hex-encoded SHA-256 digest.
pub fn sha256_hex(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hex::encode(hasher.finalize())
}

/// Builds an HMAC-SHA256 instance keyed with `key`.
pub(crate) fn hmac_sha256(key: &[u8]) -> HmacSha256 {
    // HMAC accepts keys of any length, `new_from_slice` cannot fail here.
    #[allow(clippy::expect_used)]
    HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any size")
}

/// Hex-encoded HMAC-SHA256 of `message`.
pub fn hmac_sha256_hex(key: &[u8], message: &[u8]) -> String {
    let mut mac = hmac_sha256(key);
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time comparison. Runtime depends only on the input lengths.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Opaque password check consumed by the gateway.
///
/// The hashing scheme belongs to whoever stores the user records; the
/// gateway only needs a pass/fail answer.
pub trait PasswordVerifier: Send + Sync {
    /// # Errors
    ///
    /// Returns `AuthError::PasswordHashError` if the stored hash is malformed.
    fn verify(&self, password: &str, password_hash: &str) -> Result<bool, AuthError>;
}

/// Verifies PHC-formatted Argon2 hashes. Parameters come from the hash itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Verifier;

impl PasswordVerifier for Argon2Verifier {
    fn verify(&self, password: &str, password_hash: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(password_hash).map_err(|_| AuthError::PasswordHashError)?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}
