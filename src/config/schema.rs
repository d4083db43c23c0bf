//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Password the bootstrap account falls back to when nothing overrides it.
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// Root configuration for the startup gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Datastore connection parameters.
    pub database: DatabaseConfig,

    /// Readiness probing policy.
    pub readiness: ReadinessConfig,

    /// Schema migration settings.
    pub migrations: MigrationConfig,

    /// Bootstrap administrative account.
    pub bootstrap_admin: BootstrapAdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// What runs once the gate opens.
    pub handoff: HandoffConfig,
}

/// Datastore connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Datastore host (e.g., "db" inside docker-compose).
    pub host: String,

    /// Datastore port.
    pub port: u16,

    /// Login role.
    pub user: String,

    /// Login password.
    pub password: String,

    /// Database name.
    pub name: String,

    /// Full connection URL. Takes precedence over the discrete fields.
    pub url: Option<String>,

    /// Per-probe connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "db".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            name: "booknest_db".to_string(),
            url: None,
            connect_timeout_secs: 5,
        }
    }
}

/// Interval growth between readiness probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// Same delay every attempt.
    Fixed,
    /// Doubling delay with jitter, capped at `max_interval_ms`.
    Exponential,
}

/// Readiness probing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Delay between probes in milliseconds.
    pub interval_ms: u64,

    /// Fixed or exponential delay growth.
    pub backoff: BackoffKind,

    /// Upper bound on the delay for exponential backoff.
    pub max_interval_ms: u64,

    /// Give up after this many failed probes. Unset waits forever.
    pub max_attempts: Option<u32>,

    /// Give up after this many seconds of waiting. Unset waits forever.
    pub max_wait_secs: Option<u64>,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            backoff: BackoffKind::Fixed,
            max_interval_ms: 30_000,
            max_attempts: None,
            max_wait_secs: None,
        }
    }
}

/// Schema migration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Apply pending migrations before provisioning.
    pub enabled: bool,

    /// Load migrations from this directory instead of the embedded set.
    pub directory: Option<PathBuf>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
        }
    }
}

/// Bootstrap administrative account configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BootstrapAdminConfig {
    /// Provision the account at all.
    pub enabled: bool,

    /// Reserved bootstrap email. Identifies the account.
    pub email: String,

    /// Username for the account.
    pub username: String,

    /// Plaintext password, hashed before it reaches the datastore.
    pub password: String,
}

impl BootstrapAdminConfig {
    /// True while the password is still the shipped default.
    pub fn uses_default_password(&self) -> bool {
        self.password == DEFAULT_ADMIN_PASSWORD
    }
}

impl Default for BootstrapAdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            email: "admin@booknest.com".to_string(),
            username: "admin".to_string(),
            // WARNING: This is a placeholder! Change this in production.
            password: DEFAULT_ADMIN_PASSWORD.to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Full,
    Compact,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Output format for log lines.
    pub format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Full,
        }
    }
}

/// How control is passed to the server once the gate opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HandoffMode {
    /// Replace the current process image (Unix only).
    Exec,
    /// Run the server as a supervised child process.
    Spawn,
}

impl Default for HandoffMode {
    fn default() -> Self {
        if cfg!(unix) {
            HandoffMode::Exec
        } else {
            HandoffMode::Spawn
        }
    }
}

/// Handoff configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HandoffConfig {
    /// Handoff mode.
    pub mode: HandoffMode,

    /// Server command and its arguments. Empty means exit after the gate.
    pub command: Vec<String>,
}
