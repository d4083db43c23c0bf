//! Handing control to the main server once the gate is open.
//!
//! # Modes
//! - Exec: replace this process image (Unix). Signals then go straight to
//!   the server and the gate leaves nothing resident.
//! - Spawn: run the server as a child with inherited stdio and environment
//!   and mirror its exit code. On shutdown the child is killed outright
//!   (SIGKILL, no drain); deployments that need a graceful drain use exec.
//!
//! A shutdown requested before handoff (e.g. during migration) wins: the
//! server is never started.

use std::process::ExitStatus;

use thiserror::Error;

use crate::config::HandoffMode;
use crate::lifecycle::Shutdown;

#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("shutdown requested before the server started")]
    Cancelled,

    #[error("failed to exec {program}: {source}")]
    Exec {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting on {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("exec handoff is only supported on Unix")]
    Unsupported,
}

/// The main server entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ServerCommand {
    /// Split `argv` into program and arguments. `None` when empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

/// Start `command` in the given mode and return its exit code.
///
/// In exec mode this only returns on failure.
pub async fn hand_off(
    command: &ServerCommand,
    mode: HandoffMode,
    shutdown: &Shutdown,
) -> Result<i32, HandoffError> {
    if shutdown.is_triggered() {
        tracing::warn!(program = %command.program, "Shutdown requested, not starting server");
        return Err(HandoffError::Cancelled);
    }

    tracing::info!(
        program = %command.program,
        args = ?command.args,
        mode = ?mode,
        "Handing off to server"
    );

    match mode {
        HandoffMode::Exec => Err(exec(command)),
        HandoffMode::Spawn => spawn(command, shutdown).await,
    }
}

#[cfg(unix)]
fn exec(command: &ServerCommand) -> HandoffError {
    use std::os::unix::process::CommandExt;

    let source = std::process::Command::new(&command.program)
        .args(&command.args)
        .exec();
    HandoffError::Exec {
        program: command.program.clone(),
        source,
    }
}

#[cfg(not(unix))]
fn exec(_command: &ServerCommand) -> HandoffError {
    HandoffError::Unsupported
}

async fn spawn(command: &ServerCommand, shutdown: &Shutdown) -> Result<i32, HandoffError> {
    let mut child = tokio::process::Command::new(&command.program)
        .args(&command.args)
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| HandoffError::Spawn {
            program: command.program.clone(),
            source,
        })?;

    let wait_error = |source| HandoffError::Wait {
        program: command.program.clone(),
        source,
    };

    let mut stop = shutdown.subscribe();
    // Checked again after subscribing; a trigger that landed before
    // subscribe() is never delivered on `stop`.
    let status = if shutdown.is_triggered() {
        stop_child(&mut child).await.map_err(wait_error)?
    } else {
        tokio::select! {
            status = child.wait() => status.map_err(wait_error)?,
            _ = stop.recv() => stop_child(&mut child).await.map_err(wait_error)?,
        }
    };

    tracing::info!(status = %status, "Server exited");
    Ok(exit_code(status))
}

async fn stop_child(child: &mut tokio::process::Child) -> std::io::Result<ExitStatus> {
    tracing::info!("Stopping server");
    // kill() fails if the child already exited; wait() still reaps it.
    let _ = child.kill().await;
    child.wait().await
}

/// Shell convention: a child killed by signal N reports 128 + N.
#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
