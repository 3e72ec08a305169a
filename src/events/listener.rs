use async_trait::async_trait;

use super::AuthEvent;

/// Receives every dispatched [`AuthEvent`]; match on the variant to filter.
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    async fn handle(&self, event: &AuthEvent);
}
