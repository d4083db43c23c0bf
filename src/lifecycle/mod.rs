//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Probe datastore → Migrate → Provision admin → Gate open
//!
//! Handoff (handoff.rs):
//!     Gate open → exec server (Unix) | spawn and supervise server
//!
//! Signals (signals.rs) / Shutdown (shutdown.rs):
//!     SIGTERM/SIGINT → cancel the datastore wait, or stop the child server
//! ```
//!
//! # Design Decisions
//! - Ordered startup: nothing runs until the previous phase succeeded
//! - The gate returns to its caller; starting the server is a separate step

pub mod handoff;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use handoff::{hand_off, HandoffError, ServerCommand};
pub use shutdown::Shutdown;
pub use startup::{AdminOutcome, GateError, GatePhase, GateReport, StartupGate};
