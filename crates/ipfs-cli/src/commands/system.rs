//! Commands that need neither a repository nor a node.

use super::{CommandError, CommandTable, Invocation};
use crate::command::CommandPath;

pub(super) fn version(invocation: &mut Invocation<'_>) -> Result<(), CommandError> {
    writeln!(invocation.out, "ipfs version {}", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}

pub(super) fn commands(invocation: &mut Invocation<'_>) -> Result<(), CommandError> {
    writeln!(invocation.out, "ipfs")?;
    for spec in CommandTable::standard().iter() {
        let path = CommandPath::from_key(spec.key());
        writeln!(invocation.out, "{}", path.command_line())?;
    }
    Ok(())
}
