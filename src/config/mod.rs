//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (overlay DB_* / BOOTSTRAP_ADMIN_* environment)
//!     → caller adjustments (command-line flags)
//!     → validation.rs (semantic checks)
//!     → GateConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the gate runs once per process
//! - All fields have defaults so a bare environment is enough
//! - Environment wins over the file, matching container deployments
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_config_with, ConfigError};
pub use schema::BootstrapAdminConfig;
pub use schema::DatabaseConfig;
pub use schema::GateConfig;
pub use schema::HandoffMode;
pub use schema::ReadinessConfig;
