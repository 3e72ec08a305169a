//! User lookup contract.
//!
//! Storing users and hashing their passwords belongs to the application.
//! The gateway only needs [`UserRepository`] to find an identity by email or
//! id. Enable the `mocks` feature for [`MockUserRepository`].

mod user;
#[cfg(any(test, feature = "mocks"))]
mod user_mock;

pub use user::{UserIdentity, UserRepository, DEFAULT_ROLE};
#[cfg(any(test, feature = "mocks"))]
pub use user_mock::MockUserRepository;
