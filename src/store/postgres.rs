//! PostgreSQL datastore: direct connections for readiness, a lazy sqlx
//! pool for everything else.

use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgPool, PgPoolOptions};
use sqlx::Connection;
use url::Url;

use crate::admin::{AdminAccount, NewAdmin, Provisioned};
use crate::config::DatabaseConfig;
use crate::store::{Datastore, MigrationSummary, StoreError};

const ACCOUNT_COLUMNS: &str = "id, username, email, password_hash, is_staff, is_superuser, is_active";

/// Production datastore.
///
/// Probes open their own short-lived connection so a refused connection
/// surfaces immediately with its real cause; the pool serves migrations
/// and provisioning once the store is up.
pub struct PostgresStore {
    options: PgConnectOptions,
    connect_timeout: Duration,
    pool: PgPool,
    migrator: Migrator,
    endpoint: String,
}

impl PostgresStore {
    /// Build a store from connection settings.
    ///
    /// No connection is opened here; the readiness check dials on its own
    /// and the pool connects on first use after it. Migrations
    /// come from `migrations_dir` when given, otherwise from the set
    /// embedded at build time.
    pub async fn new(db: &DatabaseConfig, migrations_dir: Option<&Path>) -> Result<Self, StoreError> {
        let options = connect_options(db)?;
        let connect_timeout = Duration::from_secs(db.connect_timeout_secs);
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(connect_timeout)
            .connect_lazy_with(options.clone());

        let migrator = match migrations_dir {
            Some(dir) => Migrator::new(dir)
                .await
                .map_err(|e| StoreError::Migration(e.to_string()))?,
            None => sqlx::migrate!("./migrations"),
        };

        Ok(Self {
            options,
            connect_timeout,
            pool,
            migrator,
            endpoint: redacted_endpoint(db),
        })
    }

    /// Versions already recorded in the migration table.
    async fn applied_versions(&self) -> Result<HashSet<i64>, StoreError> {
        let tracked: bool = sqlx::query_scalar("SELECT to_regclass('_sqlx_migrations') IS NOT NULL")
            .fetch_one(&self.pool)
            .await
            .map_err(query_error)?;
        if !tracked {
            return Ok(HashSet::new());
        }

        let versions: Vec<i64> = sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success")
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)?;
        Ok(versions.into_iter().collect())
    }
}

#[async_trait]
impl Datastore for PostgresStore {
    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    async fn probe(&self) -> Result<(), StoreError> {
        let attempt = async {
            let mut conn = PgConnection::connect_with(&self.options).await?;
            sqlx::query("SELECT 1").execute(&mut conn).await?;
            conn.close().await?;
            Ok::<(), sqlx::Error>(())
        };

        match tokio::time::timeout(self.connect_timeout, attempt).await {
            Ok(result) => result.map_err(|e| StoreError::Unavailable(e.to_string())),
            Err(_) => Err(StoreError::Unavailable(format!(
                "no answer within {}s",
                self.connect_timeout.as_secs()
            ))),
        }
    }

    async fn migrate(&self) -> Result<MigrationSummary, StoreError> {
        let done = self.applied_versions().await?;
        let pending: Vec<String> = self
            .migrator
            .iter()
            .filter(|m| !m.migration_type.is_down_migration() && !done.contains(&m.version))
            .map(|m| format!("{:04}_{}", m.version, m.description))
            .collect();

        for name in &pending {
            tracing::info!(migration = %name, "Applying migration");
        }

        self.migrator
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;

        Ok(MigrationSummary { applied: pending })
    }

    async fn create_admin_if_absent(&self, admin: &NewAdmin) -> Result<Provisioned, StoreError> {
        let sql = format!(
            "INSERT INTO accounts (username, email, password_hash, is_staff, is_superuser, is_active) \
             VALUES ($1, $2, $3, TRUE, TRUE, TRUE) \
             ON CONFLICT (email) DO NOTHING \
             RETURNING {ACCOUNT_COLUMNS}"
        );

        let inserted = sqlx::query_as::<_, AdminAccount>(&sql)
            .bind(&admin.username)
            .bind(&admin.email)
            .bind(&admin.password_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)?;

        Ok(match inserted {
            Some(account) => Provisioned::Created(account),
            None => Provisioned::AlreadyExists,
        })
    }

    async fn find_admin(&self, email: &str) -> Result<Option<AdminAccount>, StoreError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1");
        sqlx::query_as::<_, AdminAccount>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn query_error(e: sqlx::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

/// Translate settings into sqlx connect options. A URL wins over the
/// discrete fields.
pub fn connect_options(db: &DatabaseConfig) -> Result<PgConnectOptions, StoreError> {
    match &db.url {
        Some(url) => PgConnectOptions::from_str(url).map_err(|e| StoreError::Config(e.to_string())),
        None => Ok(PgConnectOptions::new()
            .host(&db.host)
            .port(db.port)
            .username(&db.user)
            .password(&db.password)
            .database(&db.name)),
    }
}

/// Endpoint description safe to print: never includes the password.
pub fn redacted_endpoint(db: &DatabaseConfig) -> String {
    match &db.url {
        Some(raw) => match Url::parse(raw) {
            Ok(mut url) => {
                if url.password().is_some() {
                    let _ = url.set_password(Some("***"));
                }
                url.to_string()
            }
            Err(_) => "<unparseable database url>".to_string(),
        },
        None => format!("postgres://{}@{}:{}/{}", db.user, db.host, db.port, db.name),
    }
}
