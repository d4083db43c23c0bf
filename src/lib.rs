//! BookNest startup gate library.
//!
//! Waits for PostgreSQL, applies migrations, provisions the bootstrap
//! administrator, then returns so the caller can start the server.

pub mod admin;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod store;

pub use config::schema::GateConfig;
pub use lifecycle::{GateError, GateReport, Shutdown, StartupGate};
pub use resilience::RetryPolicy;
pub use store::{Datastore, PostgresStore, StoreError};
