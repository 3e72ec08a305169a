use async_trait::async_trait;

use crate::events::{AuthEvent, Listener};

/// Emits events as `tracing` events. Requires the `tracing` feature.
pub struct TracingListener;

#[async_trait]
impl Listener for TracingListener {
    async fn handle(&self, event: &AuthEvent) {
        if event.is_security_alert() {
            tracing::warn!(
                target: "sentinel_auth::events",
                event_name = event.name(),
                ?event,
                "security alert"
            );
        } else {
            tracing::info!(
                target: "sentinel_auth::events",
                event_name = event.name(),
                ?event,
                "auth event"
            );
        }
    }
}
