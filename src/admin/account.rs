//! Bootstrap administrative account.

use crate::admin::password::{hash_password, PasswordError};
use crate::config::BootstrapAdminConfig;

/// A persisted administrative account.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AdminAccount {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
}

/// An account ready to insert. The password is already hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAdmin {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

impl NewAdmin {
    /// Build the bootstrap account from configuration, normalizing the
    /// email and hashing the password.
    pub fn from_config(config: &BootstrapAdminConfig) -> Result<Self, PasswordError> {
        Ok(Self {
            username: config.username.trim().to_string(),
            email: normalize_email(&config.email),
            password_hash: hash_password(&config.password)?,
        })
    }
}

/// Outcome of a create-if-absent call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provisioned {
    /// No account held the email; this one was inserted.
    Created(AdminAccount),
    /// An account already held the email. Nothing was written.
    AlreadyExists,
}

/// Lower-case the domain part of an email address, keeping the local part.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}
