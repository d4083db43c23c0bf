//! Startup metrics.
//!
//! # Metrics
//! - `gate_probe_attempts_total` (counter): readiness probes by outcome
//! - `gate_migrations_applied_total` (counter): migrations applied
//! - `gate_admin_provisioned_total` (counter): bootstrap account by outcome
//! - `gate_phase_duration_seconds` (histogram): time spent per phase
//!
//! # Design Decisions
//! - Facade only; no exporter is installed by the gate itself
//! - Without a recorder every call is a no-op

use std::time::Duration;

pub const PROBE_ATTEMPTS: &str = "gate_probe_attempts_total";
pub const MIGRATIONS_APPLIED: &str = "gate_migrations_applied_total";
pub const ADMIN_PROVISIONED: &str = "gate_admin_provisioned_total";
pub const PHASE_DURATION: &str = "gate_phase_duration_seconds";

pub fn record_probe(outcome: &'static str) {
    metrics::counter!(PROBE_ATTEMPTS, "outcome" => outcome).increment(1);
}

pub fn record_migrations(applied: usize) {
    metrics::counter!(MIGRATIONS_APPLIED).increment(applied as u64);
}

pub fn record_admin(outcome: &'static str) {
    metrics::counter!(ADMIN_PROVISIONED, "outcome" => outcome).increment(1);
}

pub fn record_phase(phase: &'static str, elapsed: Duration) {
    metrics::histogram!(PHASE_DURATION, "phase" => phase).record(elapsed.as_secs_f64());
}
