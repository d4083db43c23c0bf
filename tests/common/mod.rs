//! Shared utilities for startup gate integration tests.

#![allow(dead_code)]

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use booknest_gate::admin::{AdminAccount, NewAdmin, Provisioned};
use booknest_gate::store::{Datastore, MigrationSummary, StoreError};
use booknest_gate::RetryPolicy;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

pub const MIGRATIONS: [&str; 2] = ["0001_create accounts", "0002_enable pg_trgm"];

/// Operations observed by the store, in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    ProbeFailed,
    ProbeOk,
    Migrate,
    Provision,
    Close,
}

/// Scriptable in-memory datastore.
pub struct MemoryStore {
    unavailable_for: AtomicU32,
    fail_migrations: AtomicBool,
    pending: Mutex<Vec<String>>,
    accounts: Mutex<Vec<AdminAccount>>,
    ops: Mutex<Vec<Op>>,
    provision_delay: Duration,
}

impl MemoryStore {
    /// Fresh store: reachable, nothing migrated, no accounts.
    pub fn new() -> Self {
        Self {
            unavailable_for: AtomicU32::new(0),
            fail_migrations: AtomicBool::new(false),
            pending: Mutex::new(MIGRATIONS.iter().map(|m| m.to_string()).collect()),
            accounts: Mutex::new(Vec::new()),
            ops: Mutex::new(Vec::new()),
            provision_delay: Duration::ZERO,
        }
    }

    /// Fail the next `probes` probes.
    pub fn unavailable_for(self, probes: u32) -> Self {
        self.unavailable_for.store(probes, Ordering::SeqCst);
        self
    }

    pub fn failing_migrations(self) -> Self {
        self.fail_migrations.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_account(self, account: AdminAccount) -> Self {
        self.accounts.lock().unwrap().push(account);
        self
    }

    /// Yield between the existence check and the insert to widen races.
    pub fn with_provision_delay(mut self, delay: Duration) -> Self {
        self.provision_delay = delay;
        self
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.ops().into_iter().filter(|o| *o == op).count()
    }

    pub fn accounts(&self) -> Vec<AdminAccount> {
        self.accounts.lock().unwrap().clone()
    }

    pub fn accounts_with_email(&self, email: &str) -> Vec<AdminAccount> {
        self.accounts().into_iter().filter(|a| a.email == email).collect()
    }

    pub fn pending_migrations(&self) -> Vec<String> {
        self.pending.lock().unwrap().clone()
    }

    fn record(&self, op: Op) {
        self.ops.lock().unwrap().push(op);
    }
}

#[async_trait]
impl Datastore for MemoryStore {
    fn endpoint(&self) -> String {
        "memory://test".to_string()
    }

    async fn probe(&self) -> Result<(), StoreError> {
        let remaining = self.unavailable_for.load(Ordering::SeqCst);
        if remaining > 0 {
            self.unavailable_for.store(remaining - 1, Ordering::SeqCst);
            self.record(Op::ProbeFailed);
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        self.record(Op::ProbeOk);
        Ok(())
    }

    async fn migrate(&self) -> Result<MigrationSummary, StoreError> {
        self.record(Op::Migrate);
        if self.fail_migrations.load(Ordering::SeqCst) {
            return Err(StoreError::Migration("relation \"accounts\" already exists".into()));
        }
        let applied = std::mem::take(&mut *self.pending.lock().unwrap());
        Ok(MigrationSummary { applied })
    }

    async fn create_admin_if_absent(&self, admin: &NewAdmin) -> Result<Provisioned, StoreError> {
        self.record(Op::Provision);
        if !self.provision_delay.is_zero() {
            tokio::time::sleep(self.provision_delay).await;
        }

        // Single critical section: check and insert are one atomic step.
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.iter().any(|a| a.email == admin.email) {
            return Ok(Provisioned::AlreadyExists);
        }
        if accounts.iter().any(|a| a.username == admin.username) {
            return Err(StoreError::Query(
                "duplicate key value violates unique constraint \"accounts_username_key\"".into(),
            ));
        }

        let account = AdminAccount {
            id: accounts.len() as i64 + 1,
            username: admin.username.clone(),
            email: admin.email.clone(),
            password_hash: admin.password_hash.clone(),
            is_staff: true,
            is_superuser: true,
            is_active: true,
        };
        accounts.push(account.clone());
        Ok(Provisioned::Created(account))
    }

    async fn find_admin(&self, email: &str) -> Result<Option<AdminAccount>, StoreError> {
        Ok(self.accounts().into_iter().find(|a| a.email == email))
    }

    async fn close(&self) {
        self.record(Op::Close);
    }
}

/// A policy fast enough for tests.
pub fn quick_policy() -> RetryPolicy {
    RetryPolicy::unbounded(Duration::from_millis(1))
}

/// Counts log events whose message equals `needle`.
pub struct MessageCounter {
    needle: &'static str,
    hits: Arc<AtomicUsize>,
}

impl MessageCounter {
    pub fn new(needle: &'static str) -> (Self, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        (
            Self {
                needle,
                hits: hits.clone(),
            },
            hits,
        )
    }
}

impl<S: Subscriber> Layer<S> for MessageCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        if visitor.0 == self.needle {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
    }
}

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0 = value.to_string();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        if field.name() == "message" {
            self.0 = format!("{:?}", value);
        }
    }
}
