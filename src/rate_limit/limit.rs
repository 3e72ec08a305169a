use crate::session::ClientInfo;

/// How a login attempt is mapped to a limiter key.
///
/// [`KeyStrategy::Email`] counts failures per submitted email. Since the email
/// is not verified, anyone can lock a victim out for one decay window by
/// failing logins with the victim's address. [`KeyStrategy::EmailAndIp`]
/// narrows the lockout to the offending client address, at the cost of
/// letting an attacker who rotates addresses get more guesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyStrategy {
    #[default]
    Email,
    EmailAndIp,
}

impl KeyStrategy {
    /// Limiter key for a login by `email` from `client`.
    pub fn login_key(self, prefix: &str, email: &str, client: &ClientInfo) -> String {
        match self {
            Self::Email => format!("{prefix}{email}"),
            Self::EmailAndIp => format!("{prefix}{email}|{}", client.ip_address),
        }
    }
}
