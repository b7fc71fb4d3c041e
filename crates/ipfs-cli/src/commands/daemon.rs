//! Commands that act on the running daemon itself.

use std::time::UNIX_EPOCH;

use tracing::info;

use super::{CommandError, Invocation};
use crate::telemetry;

const COMMANDS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::commands");

pub(super) fn log_level(invocation: &mut Invocation<'_>) -> Result<(), CommandError> {
    invocation.daemon()?;
    let filter = invocation.argument(0).unwrap_or_default().to_owned();
    telemetry::reload_filter(&filter)?;
    info!(target: COMMANDS_TARGET, filter = %filter, "log filter replaced");
    writeln!(invocation.out, "Changed log filter to '{filter}'")?;
    Ok(())
}

pub(super) fn cmds(invocation: &mut Invocation<'_>) -> Result<(), CommandError> {
    let records = invocation.daemon()?.requests();
    for record in records {
        let received = record
            .received_at
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        let mut line = format!("{} {received} {}", record.id, record.path.command_line());
        for argument in &record.arguments {
            line.push(' ');
            line.push_str(argument);
        }
        writeln!(invocation.out, "{line}")?;
    }
    Ok(())
}

pub(super) fn shutdown(invocation: &mut Invocation<'_>) -> Result<(), CommandError> {
    invocation.daemon()?.request_shutdown();
    writeln!(invocation.out, "Daemon is shutting down")?;
    Ok(())
}
