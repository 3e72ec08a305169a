use chrono::{DateTime, Utc};

/// Security events emitted by the gateway and the session manager.
///
/// Dispatch is a no-op until listeners are registered with
/// [`register_event_listeners`](crate::register_event_listeners).
#[derive(Debug, Clone)]
pub enum AuthEvent {
    LoginSuccess {
        user_id: i64,
        email: String,
        at: DateTime<Utc>,
    },
    /// Unknown email or wrong password. The caller sees the same failure as
    /// for a blocked login.
    LoginFailed {
        email: String,
        at: DateTime<Utc>,
    },
    /// Login refused without checking credentials because the limiter key
    /// is over its threshold.
    LoginBlocked {
        email: String,
        at: DateTime<Utc>,
    },
    LogoutSuccess {
        user_id: Option<i64>,
        at: DateTime<Utc>,
    },
    /// A session was presented by a client whose fingerprint differs from
    /// the one recorded at login. The session has been destroyed.
    SessionHijackSuspected {
        user_id: Option<i64>,
        ip_address: String,
        at: DateTime<Utc>,
    },
}

impl AuthEvent {
    /// Dot-separated event name for logging/tracing.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LoginSuccess { .. } => "auth.login.success",
            Self::LoginFailed { .. } => "auth.login.failed",
            Self::LoginBlocked { .. } => "auth.login.blocked",
            Self::LogoutSuccess { .. } => "auth.logout.success",
            Self::SessionHijackSuspected { .. } => "session.hijack_suspected",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::LoginSuccess { at, .. }
            | Self::LoginFailed { at, .. }
            | Self::LoginBlocked { at, .. }
            | Self::LogoutSuccess { at, .. }
            | Self::SessionHijackSuspected { at, .. } => *at,
        }
    }

    /// True for events that point at an attack rather than a user mistake.
    pub fn is_security_alert(&self) -> bool {
        matches!(
            self,
            Self::LoginBlocked { .. } | Self::SessionHijackSuspected { .. }
        )
    }
}
