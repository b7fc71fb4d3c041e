//! Error types and diagnostics helpers for the CLI runtime.

use std::io;
use std::sync::Arc;

use ipfs_config::{Multiaddr, RepoPathError};
use thiserror::Error;

use crate::commands::CommandError;
use crate::dispatch::DispatchError;
use crate::http::HttpError;
use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    /// Sentinel for a completed invocation, including help output.
    #[error("normal exit")]
    NormalExit,
    /// Sentinel for an invocation without a command; help has been written.
    #[error("bare invocation")]
    BareInvocation,
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    RepoPath(#[from] RepoPathError),
    #[error("failed to install signal handlers: {0}")]
    Signals(io::Error),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Execute(#[from] ExecuteError),
    #[error("failed to write output: {0}")]
    WriteOutput(io::Error),
}

/// Failures while executing a command, locally or on the daemon.
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("failed to connect to daemon at {endpoint}: {source}")]
    Connect {
        endpoint: Multiaddr,
        #[source]
        source: io::Error,
    },
    #[error("request to daemon at {endpoint} failed: {source}")]
    Exchange {
        endpoint: Multiaddr,
        #[source]
        source: HttpError,
    },
    #[error("{message}")]
    Remote { message: String },
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("failed to write command output: {0}")]
    Output(#[source] io::Error),
}

/// Determines whether an error indicates the daemon is not running.
///
/// Returns true for connection-refused, socket-not-found, and address-unavailable
/// errors, which typically indicate the daemon process is not listening.
pub(crate) fn is_daemon_not_running(error: &ExecuteError) -> bool {
    match error {
        ExecuteError::Connect { source, .. } => matches!(
            source.kind(),
            io::ErrorKind::ConnectionRefused
                | io::ErrorKind::NotFound
                | io::ErrorKind::AddrNotAvailable
        ),
        _ => false,
    }
}
