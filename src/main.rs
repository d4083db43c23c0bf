//! BookNest startup gate.
//!
//! Container entrypoint for the BookNest API server.
//!
//! # Sequence
//!
//! ```text
//!     ┌──────────────────┐   probe fails: log, sleep, retry
//!     │ WaitingForStore  │◀──────────────┐
//!     │   SELECT 1       │───────────────┘
//!     └────────┬─────────┘
//!              │ probe ok
//!              ▼
//!     ┌──────────────────┐   error → exit 1
//!     │    Migrating     │──────────────▶
//!     └────────┬─────────┘
//!              ▼
//!     ┌──────────────────┐   error → exit 1
//!     │ProvisioningAdmin │──────────────▶
//!     │ insert-or-skip   │
//!     └────────┬─────────┘
//!              ▼
//!     ┌──────────────────┐
//!     │ HandoffComplete  │ → exec / spawn server command
//!     └──────────────────┘
//! ```
//!
//! # Usage
//!
//! ```sh
//! booknest-gate --config gate.toml -- gunicorn BookNest.wsgi:application -b 0.0.0.0:8000
//! ```

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::Instrument;

use booknest_gate::config::{load_config_with, HandoffMode};
use booknest_gate::lifecycle::{hand_off, signals, ServerCommand};
use booknest_gate::observability::logging;
use booknest_gate::{PostgresStore, Shutdown, StartupGate};

#[derive(Parser)]
#[command(name = "booknest-gate")]
#[command(about = "Wait for the database, migrate, provision the admin, then start the server", long_about = None)]
struct Cli {
    /// TOML configuration file. Environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// How to start the server once the gate opens.
    #[arg(long, value_enum)]
    handoff: Option<HandoffArg>,

    /// Do not provision the bootstrap admin account.
    #[arg(long)]
    skip_admin: bool,

    /// Do not apply migrations.
    #[arg(long)]
    skip_migrations: bool,

    /// Server command to run after the gate opens.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum HandoffArg {
    Exec,
    Spawn,
}

impl From<HandoffArg> for HandoffMode {
    fn from(arg: HandoffArg) -> Self {
        match arg {
            HandoffArg::Exec => HandoffMode::Exec,
            HandoffArg::Spawn => HandoffMode::Spawn,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config_with(cli.config.as_deref(), |config| {
        if cli.skip_admin {
            config.bootstrap_admin.enabled = false;
        }
        if cli.skip_migrations {
            config.migrations.enabled = false;
        }
        if let Some(mode) = cli.handoff {
            config.handoff.mode = mode.into();
        }
        if !cli.command.is_empty() {
            config.handoff.command = cli.command;
        }
    })?;

    logging::init_logging(&config.observability);
    tracing::info!("booknest-gate v{} starting", env!("CARGO_PKG_VERSION"));

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());
    let mut cancel = shutdown.subscribe();

    let store = PostgresStore::new(&config.database, config.migrations.directory.as_deref()).await?;
    let mut gate = StartupGate::from_config(store, &config);

    let report = gate
        .run(&mut cancel)
        .instrument(tracing::info_span!("startup_gate"))
        .await
        .inspect_err(|e| tracing::error!(error = %e, "Startup gate failed"))?;

    tracing::info!(
        probe_failures = report.probe_failures,
        migrations = report.migrations.as_ref().map_or(0, |m| m.applied.len()),
        admin = ?report.admin,
        "Startup complete"
    );

    let Some(command) = ServerCommand::from_argv(&config.handoff.command) else {
        tracing::info!("No server command configured, exiting");
        return Ok(());
    };

    let code = hand_off(&command, config.handoff.mode, &shutdown).await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
