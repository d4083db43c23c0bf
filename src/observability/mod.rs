//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! StartupGate phases produce:
//!     → logging.rs (structured log events on stderr)
//!     → metrics.rs (counters and phase timings via the metrics facade)
//! ```
//!
//! # Design Decisions
//! - One log line per probe attempt so operators can see a stuck wait
//! - Metrics are cheap and optional; an embedding server may export them

pub mod logging;
pub mod metrics;
