//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Pick the output format from configuration
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Writes to stderr; stdout belongs to the server after handoff
//! - RUST_LOG wins over the configured level

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::{LogFormat, ObservabilityConfig};

/// Filter used when RUST_LOG is not set.
pub fn default_filter(config: &ObservabilityConfig) -> String {
    format!("booknest_gate={},sqlx=warn", config.log_level)
}

/// Install the global subscriber. Call once, before the gate runs.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(config)));
    let layer = fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Full => registry.with(layer).init(),
        LogFormat::Compact => registry.with(layer.compact()).init(),
        LogFormat::Pretty => registry.with(layer.pretty()).init(),
    }
}
