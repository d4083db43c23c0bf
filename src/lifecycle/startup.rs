//! Startup gate.
//!
//! # Responsibilities
//! - Block until the datastore answers a probe
//! - Apply pending schema migrations
//! - Ensure the bootstrap administrative account exists
//! - Return to the caller, who starts the server
//!
//! # Phases
//! ```text
//! WaitingForStore → Migrating → ProvisioningAdmin → HandoffComplete
//! ```
//!
//! # Design Decisions
//! - Fail fast: migration and provisioning errors are fatal
//! - Probe failures are transient and governed by a RetryPolicy
//! - Phases run in order, never concurrently

use std::time::Instant;

use thiserror::Error;
use tokio::sync::broadcast;

use crate::admin::{NewAdmin, PasswordError, Provisioned};
use crate::config::{BootstrapAdminConfig, GateConfig};
use crate::observability::metrics;
use crate::resilience::{RetryError, RetryPolicy};
use crate::store::{Datastore, MigrationSummary, StoreError};

/// Where the gate currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GatePhase {
    WaitingForStore,
    Migrating,
    ProvisioningAdmin,
    HandoffComplete,
}

/// What happened to the bootstrap account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminOutcome {
    Created { email: String },
    AlreadyExists { email: String },
    Skipped,
}

/// Summary of a successful gate run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateReport {
    /// Failed probes before the datastore answered.
    pub probe_failures: u32,
    /// `None` when migrations were disabled.
    pub migrations: Option<MigrationSummary>,
    pub admin: AdminOutcome,
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("datastore {endpoint} still unavailable after {attempts} attempts: {source}")]
    StoreUnavailable {
        endpoint: String,
        attempts: u32,
        #[source]
        source: StoreError,
    },

    #[error("startup cancelled while waiting for the datastore after {attempts} failed probes")]
    Cancelled { attempts: u32 },

    #[error("schema migration failed: {0}")]
    Migration(#[source] StoreError),

    #[error("bootstrap admin provisioning failed: {0}")]
    Provisioning(#[source] StoreError),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// Gates server start on datastore readiness, migrations, and the
/// bootstrap account.
pub struct StartupGate<S> {
    store: S,
    policy: RetryPolicy,
    run_migrations: bool,
    admin: Option<BootstrapAdminConfig>,
    phase: GatePhase,
}

impl<S: Datastore> StartupGate<S> {
    /// Gate with migrations on and the default bootstrap account.
    pub fn new(store: S, policy: RetryPolicy) -> Self {
        Self {
            store,
            policy,
            run_migrations: true,
            admin: Some(BootstrapAdminConfig::default()),
            phase: GatePhase::WaitingForStore,
        }
    }

    pub fn from_config(store: S, config: &GateConfig) -> Self {
        let admin = config
            .bootstrap_admin
            .enabled
            .then(|| config.bootstrap_admin.clone());

        Self::new(store, RetryPolicy::from(&config.readiness))
            .with_migrations(config.migrations.enabled)
            .with_bootstrap_admin(admin)
    }

    pub fn with_migrations(mut self, enabled: bool) -> Self {
        self.run_migrations = enabled;
        self
    }

    /// `None` skips provisioning.
    pub fn with_bootstrap_admin(mut self, admin: Option<BootstrapAdminConfig>) -> Self {
        self.admin = admin;
        self
    }

    pub fn phase(&self) -> GatePhase {
        self.phase
    }

    /// Run every phase in order. Returns only once the server may start.
    ///
    /// The store is closed before returning, whether or not the run
    /// succeeded.
    pub async fn run(&mut self, cancel: &mut broadcast::Receiver<()>) -> Result<GateReport, GateError> {
        let result = self.run_phases(cancel).await;
        self.store.close().await;
        result
    }

    async fn run_phases(&mut self, cancel: &mut broadcast::Receiver<()>) -> Result<GateReport, GateError> {
        let probe_failures = self.wait_for_store(cancel).await?;
        let migrations = self.migrate().await?;
        let admin = self.provision_admin().await?;

        self.phase = GatePhase::HandoffComplete;
        tracing::info!("Startup gate open");

        Ok(GateReport {
            probe_failures,
            migrations,
            admin,
        })
    }

    async fn wait_for_store(&mut self, cancel: &mut broadcast::Receiver<()>) -> Result<u32, GateError> {
        self.phase = GatePhase::WaitingForStore;
        let endpoint = self.store.endpoint();
        let started = Instant::now();
        tracing::info!(endpoint = %endpoint, "Waiting for database");

        let store = &self.store;
        let outcome = self
            .policy
            .run(
                || store.probe(),
                cancel,
                |attempt, err, delay| {
                    metrics::record_probe("failure");
                    tracing::warn!(
                        attempt,
                        error = %err,
                        retry_in_ms = delay.as_millis() as u64,
                        "Database unavailable - sleeping"
                    );
                },
            )
            .await;
        metrics::record_phase("waiting_for_store", started.elapsed());

        match outcome {
            Ok(done) => {
                metrics::record_probe("success");
                tracing::info!(failed_probes = done.failures, "Database is up - continuing");
                Ok(done.failures)
            }
            Err(RetryError::Exhausted { attempts, last_error }) => {
                metrics::record_probe("failure");
                tracing::error!(attempts, error = %last_error, "Giving up on database");
                Err(GateError::StoreUnavailable {
                    endpoint,
                    attempts,
                    source: last_error,
                })
            }
            Err(RetryError::Cancelled { attempts }) => {
                tracing::warn!(attempts, "Shutdown requested while waiting for database");
                Err(GateError::Cancelled { attempts })
            }
        }
    }

    async fn migrate(&mut self) -> Result<Option<MigrationSummary>, GateError> {
        self.phase = GatePhase::Migrating;
        if !self.run_migrations {
            tracing::info!("Migrations disabled, skipping");
            return Ok(None);
        }

        let started = Instant::now();
        tracing::info!("Applying database migrations");
        let summary = self.store.migrate().await.map_err(|e| {
            tracing::error!(error = %e, "Migration failed");
            GateError::Migration(e)
        })?;
        metrics::record_phase("migrating", started.elapsed());
        metrics::record_migrations(summary.applied.len());

        if summary.is_empty() {
            tracing::info!("No migrations to apply");
        } else {
            tracing::info!(applied = summary.applied.len(), "Migrations complete");
        }
        Ok(Some(summary))
    }

    async fn provision_admin(&mut self) -> Result<AdminOutcome, GateError> {
        self.phase = GatePhase::ProvisioningAdmin;
        let Some(config) = &self.admin else {
            tracing::info!("Bootstrap admin disabled, skipping");
            metrics::record_admin("skipped");
            return Ok(AdminOutcome::Skipped);
        };

        if config.uses_default_password() {
            tracing::warn!(
                email = %config.email,
                "Bootstrap admin uses the default password; set BOOTSTRAP_ADMIN_PASSWORD"
            );
        }

        let started = Instant::now();
        let admin = NewAdmin::from_config(config)?;
        let provisioned = self
            .store
            .create_admin_if_absent(&admin)
            .await
            .map_err(|e| {
                tracing::error!(email = %admin.email, error = %e, "Superuser provisioning failed");
                GateError::Provisioning(e)
            })?;
        metrics::record_phase("provisioning_admin", started.elapsed());

        Ok(match provisioned {
            Provisioned::Created(account) => {
                metrics::record_admin("created");
                tracing::info!(email = %account.email, id = account.id, "Superuser created");
                AdminOutcome::Created { email: account.email }
            }
            Provisioned::AlreadyExists => {
                metrics::record_admin("exists");
                tracing::info!(email = %admin.email, "Superuser already exists");
                AdminOutcome::AlreadyExists { email: admin.email }
            }
        })
    }
}
