//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Readiness probe against the datastore:
//!     → retries.rs (RetryPolicy: attempt cap, elapsed cap, cancellation)
//!     → backoff.rs (fixed interval or exponential + jitter)
//! ```
//!
//! # Design Decisions
//! - Default policy waits forever at a fixed 1s interval
//! - Caps are opt-in so deployments can bound startup latency
//! - No circuit breaker: the gate has one caller and one dependency

pub mod backoff;
pub mod retries;

pub use retries::{RetryError, RetryPolicy, Retried};
