//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, ports valid)
//! - Check that the bootstrap account is usable when enabled
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GateConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use url::Url;

use crate::config::schema::{BackoffKind, GateConfig, HandoffMode};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a fully merged configuration.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let db = &config.database;
    match &db.url {
        Some(raw) => match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "postgres" | "postgresql") => {}
            Ok(url) => errors.push(ValidationError::new(
                "database.url",
                format!("unsupported scheme '{}'", url.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new("database.url", e.to_string())),
        },
        None => {
            if db.host.trim().is_empty() {
                errors.push(ValidationError::new("database.host", "must not be empty"));
            }
            if db.port == 0 {
                errors.push(ValidationError::new("database.port", "must be non-zero"));
            }
            if db.user.trim().is_empty() {
                errors.push(ValidationError::new("database.user", "must not be empty"));
            }
            if db.name.trim().is_empty() {
                errors.push(ValidationError::new("database.name", "must not be empty"));
            }
        }
    }
    if db.connect_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "database.connect_timeout_secs",
            "must be greater than 0",
        ));
    }

    let readiness = &config.readiness;
    if readiness.interval_ms == 0 {
        errors.push(ValidationError::new(
            "readiness.interval_ms",
            "must be greater than 0",
        ));
    }
    if readiness.backoff == BackoffKind::Exponential
        && readiness.max_interval_ms < readiness.interval_ms
    {
        errors.push(ValidationError::new(
            "readiness.max_interval_ms",
            "must be at least readiness.interval_ms",
        ));
    }
    if readiness.max_attempts == Some(0) {
        errors.push(ValidationError::new(
            "readiness.max_attempts",
            "must be at least 1 when set",
        ));
    }
    if readiness.max_wait_secs == Some(0) {
        errors.push(ValidationError::new(
            "readiness.max_wait_secs",
            "must be greater than 0 when set",
        ));
    }

    let admin = &config.bootstrap_admin;
    if admin.enabled {
        match admin.email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => errors.push(ValidationError::new(
                "bootstrap_admin.email",
                format!("'{}' is not an email address", admin.email),
            )),
        }
        if admin.username.trim().is_empty() {
            errors.push(ValidationError::new(
                "bootstrap_admin.username",
                "must not be empty",
            ));
        }
        if admin.password.is_empty() {
            errors.push(ValidationError::new(
                "bootstrap_admin.password",
                "must not be empty",
            ));
        }
    }

    if config.handoff.mode == HandoffMode::Exec && !cfg!(unix) {
        errors.push(ValidationError::new(
            "handoff.mode",
            "exec is only supported on Unix",
        ));
    }
    if let Some(program) = config.handoff.command.first() {
        if program.trim().is_empty() {
            errors.push(ValidationError::new(
                "handoff.command",
                "program name must not be empty",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
