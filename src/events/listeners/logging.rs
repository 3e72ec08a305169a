use async_trait::async_trait;

use crate::events::{AuthEvent, Listener};

/// Logs events through the `log` crate.
///
/// Routine events use the configured level; security alerts (blocked logins,
/// suspected hijacking) are always logged at `Warn` or above.
pub struct LoggingListener {
    level: log::Level,
}

impl LoggingListener {
    pub fn new() -> Self {
        Self {
            level: log::Level::Info,
        }
    }

    pub fn with_level(level: log::Level) -> Self {
        Self { level }
    }

    fn level_for(&self, event: &AuthEvent) -> log::Level {
        if event.is_security_alert() {
            self.level.min(log::Level::Warn)
        } else {
            self.level
        }
    }
}

impl Default for LoggingListener {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Listener for LoggingListener {
    async fn handle(&self, event: &AuthEvent) {
        log::log!(
            target: "sentinel_auth::events",
            self.level_for(event),
            "event={} {:?}",
            event.name(),
            event
        );
    }
}
