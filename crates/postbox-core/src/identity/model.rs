//! User model types.

use serde::{Deserialize, Serialize};

/// Unique identifier for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl UserId {
    /// Create a new user ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Whether this id can refer to a stored user. Stored ids start at 1.
    #[must_use]
    pub const fn is_set(self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role tag carried by every user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Role {
    /// Regular mailbox owner.
    #[default]
    User,
    /// Administrator.
    Admin,
}

impl Role {
    /// Parse from database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "ADMIN" => Self::Admin,
            _ => Self::User,
        }
    }

    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
        }
    }
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier.
    pub id: UserId,
    /// Given name.
    pub name: String,
    /// Family name (may be empty).
    pub last_name: String,
    /// Email address, normalized to lowercase.
    pub email: String,
    /// Role tag.
    pub role: Role,
}

impl User {
    /// Returns "Name Last <email>", or just the email when no name is set.
    #[must_use]
    pub fn display(&self) -> String {
        let full = format!("{} {}", self.name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.email.clone()
        } else {
            format!("{full} <{}>", self.email)
        }
    }

    /// Whether this user carries the admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Registration data for a user that has not been stored yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewUser {
    /// Given name.
    pub name: String,
    /// Family name.
    pub last_name: String,
    /// Email address.
    pub email: String,
    /// Role tag.
    pub role: Role,
}

impl NewUser {
    /// Registration with the default role.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            last_name: last_name.into(),
            email: email.into(),
            role: Role::User,
        }
    }

    /// Override the role.
    #[must_use]
    pub const fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}

/// Trim and lowercase an email address.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
