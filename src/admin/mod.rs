//! Administrative identity.
//!
//! # Responsibilities
//! - Describe the bootstrap account (account.rs)
//! - Hash and verify passwords (password.rs)
//!
//! # Design Decisions
//! - Plaintext never leaves this module; stores only see the PHC hash
//! - Email identity follows the framework's normalization rule

pub mod account;
pub mod password;

pub use account::{normalize_email, AdminAccount, NewAdmin, Provisioned};
pub use password::{hash_password, verify_password, PasswordError};
