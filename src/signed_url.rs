//! Time-limited URLs authenticated with HMAC-SHA256.
//!
//! A signed URL carries two extra query parameters:
//!
//! | Parameter | Value |
//! |-----------|-------|
//! | `expires` | decimal unix timestamp after which the URL is refused |
//! | `signature` | hex HMAC-SHA256 of the URL up to and including `expires` |
//!
//! ```rust
//! use sentinel::{SecretString, UrlSigner};
//!
//! let signer = UrlSigner::new(SecretString::new("0123456789abcdef0123456789abcdef"));
//! let url = signer.sign("https://example.com/invoices/42?download=1", 60);
//!
//! assert!(signer.validate(&url));
//! assert!(!signer.validate(&url.replace("42", "43")));
//! ```

use std::sync::Arc;

use chrono::Duration;
use hmac::Mac;
use url::form_urlencoded;

use crate::clock::{Clock, SystemClock};
use crate::config::SentinelConfig;
use crate::crypto::{constant_time_eq, hmac_sha256};
use crate::{AuthError, SecretString};

pub const EXPIRES_PARAM: &str = "expires";
pub const SIGNATURE_PARAM: &str = "signature";

/// Why a signed URL was refused. Callers of [`UrlSigner::validate`] only see
/// `false`; the reason goes to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingQuery,
    MissingExpires,
    MissingSignature,
    DuplicateParameter,
    MalformedExpires,
    MalformedSignature,
    Expired,
    BadSignature,
}

impl Rejection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingQuery => "missing_query",
            Self::MissingExpires => "missing_expires",
            Self::MissingSignature => "missing_signature",
            Self::DuplicateParameter => "duplicate_parameter",
            Self::MalformedExpires => "malformed_expires",
            Self::MalformedSignature => "malformed_signature",
            Self::Expired => "expired",
            Self::BadSignature => "bad_signature",
        }
    }
}

/// Signs and validates expiring URLs with the process-wide application key.
#[derive(Clone)]
pub struct UrlSigner {
    key: SecretString,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl UrlSigner {
    pub fn new(key: SecretString) -> Self {
        Self {
            key,
            default_ttl: Duration::hours(1),
            clock: Arc::new(SystemClock),
        }
    }

    /// # Errors
    ///
    /// Returns `AuthError::ConfigurationError` if the application key is empty.
    pub fn from_config(config: &SentinelConfig) -> Result<Self, AuthError> {
        if config.app_key.is_empty() {
            return Err(AuthError::ConfigurationError(
                "app_key is required to sign URLs".to_owned(),
            ));
        }
        Ok(Self {
            default_ttl: config.signed_url.default_ttl,
            ..Self::new(config.app_key.clone())
        })
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Appends `expires=<now + ttl_seconds>` and `signature=<hex>` to `url`.
    ///
    /// Trailing `?`/`&` are stripped first. Any `expires` or `signature`
    /// parameters already in `url` are dropped so they cannot shadow the
    /// signed ones. A `#fragment` is kept at the end, outside the signature.
    pub fn sign(&self, url: &str, ttl_seconds: u64) -> String {
        let (url, fragment) = split_fragment(url);
        let url = strip_reserved(url);
        let url = url.trim_end_matches(['?', '&']);

        let ttl = i64::try_from(ttl_seconds).unwrap_or(i64::MAX);
        let expires = self.clock.timestamp().saturating_add(ttl);
        let separator = if url.contains('?') { '&' } else { '?' };
        let to_sign = format!("{url}{separator}{EXPIRES_PARAM}={expires}");

        let signature = self.signature(&to_sign);
        let mut signed = format!("{to_sign}&{SIGNATURE_PARAM}={signature}");
        if let Some(fragment) = fragment {
            signed.push('#');
            signed.push_str(fragment);
        }
        signed
    }

    /// [`sign`](Self::sign) with the configured default lifetime.
    pub fn sign_default(&self, url: &str) -> String {
        self.sign(url, u64::try_from(self.default_ttl.num_seconds()).unwrap_or(0))
    }

    /// True iff `full_url` carries an unexpired `expires` and a `signature`
    /// matching the rest of the URL. Never errors.
    pub fn validate(&self, full_url: &str) -> bool {
        match self.check(full_url) {
            Ok(()) => true,
            Err(rejection) => {
                log::info!(target: "sentinel_auth::signed_url", "msg=\"signed url rejected\" reason={}", rejection.as_str());
                false
            }
        }
    }

    /// Like [`validate`](Self::validate), with the reason for refusal.
    ///
    /// # Errors
    ///
    /// Returns the first [`Rejection`] that applies.
    pub fn check(&self, full_url: &str) -> Result<(), Rejection> {
        let (url, _) = split_fragment(full_url);
        let (base, query) = url.split_once('?').ok_or(Rejection::MissingQuery)?;

        let mut signature = None;
        let mut expires = None;
        let mut unsigned = Vec::new();

        for segment in query.split('&') {
            let (name, value) = decode_pair(segment);
            match name.as_str() {
                SIGNATURE_PARAM => {
                    // compared as sent, so a percent-encoded spelling is not equivalent
                    let raw = segment
                        .strip_prefix("signature=")
                        .ok_or(Rejection::MalformedSignature)?;
                    if signature.replace(raw).is_some() {
                        return Err(Rejection::DuplicateParameter);
                    }
                    continue;
                }
                EXPIRES_PARAM => {
                    if expires.replace(value).is_some() {
                        return Err(Rejection::DuplicateParameter);
                    }
                }
                _ => {}
            }
            unsigned.push(segment);
        }

        let signature = signature
            .filter(|s| !s.is_empty())
            .ok_or(Rejection::MissingSignature)?;
        let expires: i64 = expires
            .ok_or(Rejection::MissingExpires)?
            .parse()
            .map_err(|_| Rejection::MalformedExpires)?;

        if self.clock.timestamp() > expires {
            return Err(Rejection::Expired);
        }

        // signatures are issued as lowercase hex; any other spelling is a mutation
        if !signature
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        {
            return Err(Rejection::MalformedSignature);
        }

        let expected = self.signature(&format!("{base}?{}", unsigned.join("&")));
        if constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
            Ok(())
        } else {
            Err(Rejection::BadSignature)
        }
    }

    fn signature(&self, payload: &str) -> String {
        let mut mac = hmac_sha256(self.key.as_bytes());
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner")
            .field("key", &self.key)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

fn split_fragment(url: &str) -> (&str, Option<&str>) {
    match url.split_once('#') {
        Some((url, fragment)) => (url, Some(fragment)),
        None => (url, None),
    }
}

fn decode_pair(segment: &str) -> (String, String) {
    form_urlencoded::parse(segment.as_bytes())
        .next()
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .unwrap_or_default()
}

/// Removes `expires`/`signature` query parameters, keeping everything else
/// byte for byte.
fn strip_reserved(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_owned();
    };

    let kept: Vec<&str> = query
        .split('&')
        .filter(|segment| {
            let (name, _) = decode_pair(segment);
            name != EXPIRES_PARAM && name != SIGNATURE_PARAM
        })
        .collect();

    format!("{base}?{}", kept.join("&"))
}
