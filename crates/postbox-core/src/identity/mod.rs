//! Identity directory: registered users looked up by id or email.
//!
//! The mail core only consumes the read side ([`IdentityDirectory`]);
//! registration and role changes live on [`UserRepository`].

mod model;
mod repository;
mod validation;

use std::future::Future;

pub use model::{NewUser, Role, User, UserId, normalize_email};
pub use repository::UserRepository;
pub use validation::{RegistrationError, RegistrationResult, validate_registration};

use crate::Result;

/// Read access to registered users.
pub trait IdentityDirectory: Send + Sync {
    /// Look up a user by id.
    fn find_by_id(&self, id: UserId) -> impl Future<Output = Result<Option<User>>> + Send;

    /// Look up a user by email. The address is normalized before lookup.
    fn find_by_email(&self, email: &str) -> impl Future<Output = Result<Option<User>>> + Send;

    /// Every registered user, in registration order.
    fn find_all(&self) -> impl Future<Output = Result<Vec<User>>> + Send;
}
