//! Registration validation.

use super::model::NewUser;

/// Validation error for a user registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// Name is empty.
    EmptyName,
    /// Email address is empty.
    EmptyEmail,
    /// Email address format is invalid.
    InvalidEmail,
}

impl RegistrationError {
    /// Get human-readable error message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::EmptyName => "Name is required",
            Self::EmptyEmail => "Email address is required",
            Self::InvalidEmail => "Invalid email address format",
        }
    }

    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyName => "name",
            Self::EmptyEmail | Self::InvalidEmail => "email",
        }
    }
}

impl std::fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for RegistrationError {}

/// Result of validating a registration.
pub type RegistrationResult = Result<(), Vec<RegistrationError>>;

/// Validate a registration.
///
/// Returns `Ok(())` if valid, or `Err(Vec<RegistrationError>)` with all errors.
///
/// # Errors
///
/// Returns a vector of `RegistrationError` if any fields are invalid.
pub fn validate_registration(user: &NewUser) -> RegistrationResult {
    let mut errors = Vec::new();

    if user.name.trim().is_empty() {
        errors.push(RegistrationError::EmptyName);
    }

    if user.email.trim().is_empty() {
        errors.push(RegistrationError::EmptyEmail);
    } else if !is_valid_email(&user.email) {
        errors.push(RegistrationError::InvalidEmail);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Basic email validation.
fn is_valid_email(email: &str) -> bool {
    let email = email.trim();

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.contains('@') || email.contains(char::is_whitespace) {
        return false;
    }

    // Domain must have at least one dot and no empty labels
    domain.contains('.') && domain.split('.').all(|label| !label.is_empty())
}
