//! Security event hooks.
//!
//! The gateway and the session manager fire [`AuthEvent`]s. With no
//! listeners registered, dispatch does nothing.
//!
//! ```rust,ignore
//! use sentinel::register_event_listeners;
//! use sentinel::events::listeners::LoggingListener;
//!
//! register_event_listeners(|registry| {
//!     registry.listen(LoggingListener::new());
//! });
//! ```
//!
//! Implement [`Listener`] to forward events elsewhere (metrics, alerting):
//!
//! ```rust,ignore
//! use sentinel::events::{AuthEvent, Listener};
//! use async_trait::async_trait;
//!
//! struct LockoutAlert;
//!
//! #[async_trait]
//! impl Listener for LockoutAlert {
//!     async fn handle(&self, event: &AuthEvent) {
//!         if let AuthEvent::LoginBlocked { email, .. } = event {
//!             // page the on-call
//!         }
//!     }
//! }
//! ```

mod event;
mod listener;
mod registry;

pub mod listeners;

pub use event::AuthEvent;
pub use listener::Listener;
pub use registry::{dispatch, register_event_listeners, EventRegistry};
