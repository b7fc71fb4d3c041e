//! The single execution interface shared by local and remote runs.

use std::io::Write;
use std::sync::Arc;

use crate::command::CommandRequest;
use crate::commands::{CommandTable, Invocation};
use crate::environment::Environment;
use crate::errors::ExecuteError;
use crate::server::DaemonContext;

/// Runs a command request, writing its output to `out`.
pub trait Executor {
    fn execute(
        &self,
        request: &CommandRequest,
        env: &Environment,
        out: &mut dyn Write,
    ) -> Result<(), ExecuteError>;
}

/// Runs commands in this process through the command table.
#[derive(Clone)]
pub struct LocalExecutor {
    table: &'static CommandTable,
    daemon: Option<Arc<DaemonContext>>,
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalExecutor {
    /// Executor for an ordinary CLI invocation.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: CommandTable::standard(),
            daemon: None,
        }
    }

    /// Executor used by the daemon to serve API requests.
    #[must_use]
    pub(crate) fn for_daemon(daemon: Arc<DaemonContext>) -> Self {
        Self {
            table: CommandTable::standard(),
            daemon: Some(daemon),
        }
    }
}

impl Executor for LocalExecutor {
    fn execute(
        &self,
        request: &CommandRequest,
        env: &Environment,
        out: &mut dyn Write,
    ) -> Result<(), ExecuteError> {
        let handler = self.table.handler_for(request)?;
        let mut invocation = Invocation {
            request,
            env,
            daemon: self.daemon.as_deref(),
            out,
        };
        handler(&mut invocation)?;
        invocation.out.flush().map_err(ExecuteError::Output)
    }
}
