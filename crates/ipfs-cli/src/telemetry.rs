//! Structured telemetry initialisation for the CLI and the daemon.

use std::env;
use std::io::{self, IsTerminal};

use ipfs_config::{Config, LogFormat};
use once_cell::sync::OnceCell;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

/// Filter applied when debug output is requested.
pub const DEBUG_FILTER: &str = "debug";

static TELEMETRY: OnceCell<reload::Handle<EnvFilter, Registry>> = OnceCell::new();

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the configured log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
    #[error("failed to reload log filter: {0}")]
    Reload(String),
    #[error("telemetry has not been initialised")]
    NotInitialised,
}

/// Configures the global tracing subscriber when invoked for the first time.
///
/// Repeated calls are idempotent. `debug` replaces the configured filter with
/// [`DEBUG_FILTER`].
pub fn initialise(config: &Config, debug: bool) -> Result<(), TelemetryError> {
    let filter = if debug {
        DEBUG_FILTER
    } else {
        config.log_filter()
    };
    TELEMETRY
        .get_or_try_init(|| install_subscriber(filter, config.log_format()))
        .map(|_| ())
}

fn install_subscriber(
    filter: &str,
    format: LogFormat,
) -> Result<reload::Handle<EnvFilter, Registry>, TelemetryError> {
    let filter = parse_filter(filter)?;
    let (filter_layer, handle) = reload::Layer::new(filter);

    let json = matches!(format, LogFormat::Json).then(|| {
        fmt::layer()
            .json()
            .flatten_event(true)
            .with_target(true)
            .with_writer(io::stderr)
            .with_timer(UtcTime::rfc_3339())
    });
    let compact = matches!(format, LogFormat::Compact).then(|| {
        fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(io::stderr)
            .with_ansi(io::stderr().is_terminal())
            .with_timer(UtcTime::rfc_3339())
    });

    let subscriber = Registry::default()
        .with(filter_layer)
        .with(json)
        .with(compact);
    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)?;
    Ok(handle)
}

fn parse_filter(filter: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(filter).map_err(|error| TelemetryError::Filter(error.to_string()))
}

/// Replaces the active log filter.
pub fn reload_filter(filter: &str) -> Result<(), TelemetryError> {
    let handle = TELEMETRY.get().ok_or(TelemetryError::NotInitialised)?;
    let filter = parse_filter(filter)?;
    handle
        .reload(filter)
        .map_err(|error| TelemetryError::Reload(error.to_string()))
}

/// Reports whether debug logging was requested by flag or environment.
#[must_use]
pub fn debug_requested(flag: bool) -> bool {
    debug_requested_from(
        flag,
        env::var("IPFS_LOGGING").ok().as_deref(),
        env::var("DEBUG").ok().as_deref(),
    )
}

/// `IPFS_LOGGING=debug` and a truthy `DEBUG` both enable debug output.
pub(crate) fn debug_requested_from(
    flag: bool,
    ipfs_logging: Option<&str>,
    debug: Option<&str>,
) -> bool {
    flag || ipfs_logging == Some("debug") || debug.is_some_and(is_truthy)
}

fn is_truthy(value: &str) -> bool {
    matches!(value, "1" | "t" | "T" | "true" | "TRUE" | "True")
}

/// Logs the profiling trigger; profiling itself is not collected.
pub fn note_profiling_request() {
    if let Some(mode) = env::var_os("IPFS_PROF") {
        tracing::info!(
            target: concat!(env!("CARGO_PKG_NAME"), "::telemetry"),
            mode = %mode.to_string_lossy(),
            "profiling requested; ignoring"
        );
    }
}
