//! Datastore subsystem.
//!
//! # Data Flow
//! ```text
//! StartupGate
//!     → Datastore::probe            (SELECT 1, retried by policy)
//!     → Datastore::migrate          (pending schema changes, once)
//!     → Datastore::create_admin_if_absent (atomic insert-or-skip)
//!     → Datastore::close            (release before handoff)
//! ```
//!
//! # Design Decisions
//! - The gate only talks to the `Datastore` trait; postgres.rs is the
//!   production implementation and tests supply their own
//! - Account creation is one atomic statement, never check-then-write
//! - Errors carry rendered messages so any backend can produce them

pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::admin::{AdminAccount, NewAdmin, Provisioned};

pub use postgres::PostgresStore;

/// Errors raised by a datastore backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection could not be established or the probe query failed.
    #[error("datastore unavailable: {0}")]
    Unavailable(String),

    /// Connection parameters could not be turned into options.
    #[error("invalid connection settings: {0}")]
    Config(String),

    /// A migration failed to apply.
    #[error("migration failed: {0}")]
    Migration(String),

    /// Any other statement failed.
    #[error("query failed: {0}")]
    Query(String),
}

/// Migrations applied by a single `migrate` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationSummary {
    /// Identifiers of the migrations applied, in order.
    pub applied: Vec<String>,
}

impl MigrationSummary {
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Operations the startup gate needs from a relational datastore.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Human-readable endpoint for logs. Must not include secrets.
    fn endpoint(&self) -> String;

    /// Issue a trivial query to check the store accepts connections.
    async fn probe(&self) -> Result<(), StoreError>;

    /// Apply all pending schema migrations.
    async fn migrate(&self) -> Result<MigrationSummary, StoreError>;

    /// Insert `admin` unless an account already holds its email.
    async fn create_admin_if_absent(&self, admin: &NewAdmin) -> Result<Provisioned, StoreError>;

    /// Look up an account by its (normalized) email.
    async fn find_admin(&self, email: &str) -> Result<Option<AdminAccount>, StoreError>;

    /// Release connections before handoff.
    async fn close(&self) {}
}

#[async_trait]
impl<T: Datastore + ?Sized> Datastore for Arc<T> {
    fn endpoint(&self) -> String {
        (**self).endpoint()
    }

    async fn probe(&self) -> Result<(), StoreError> {
        (**self).probe().await
    }

    async fn migrate(&self) -> Result<MigrationSummary, StoreError> {
        (**self).migrate().await
    }

    async fn create_admin_if_absent(&self, admin: &NewAdmin) -> Result<Provisioned, StoreError> {
        (**self).create_admin_if_absent(admin).await
    }

    async fn find_admin(&self, email: &str) -> Result<Option<AdminAccount>, StoreError> {
        (**self).find_admin(email).await
    }

    async fn close(&self) {
        (**self).close().await
    }
}
