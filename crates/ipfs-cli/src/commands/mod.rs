//! The command table and the handlers behind it.
//!
//! The table maps command paths to a summary, the positional arguments a
//! command expects, and a handler. Group commands (`swarm`, `config`, ...)
//! have no handler of their own and only exist to list their subcommands.

mod daemon;
mod help;
mod node;
mod repo;
mod system;

use std::io::{self, Write};
use std::sync::Arc;

use ipfs_config::{ApiFileError, RepoConfigError};
use once_cell::sync::Lazy;
use thiserror::Error;

use crate::command::{CommandPath, CommandRequest};
use crate::environment::Environment;
use crate::node::{Node, NodeError};
use crate::server::{DaemonContext, ServerError};
use crate::telemetry::TelemetryError;

pub(crate) use help::write_bare_help;

/// Runs a command against its invocation.
pub(crate) type Handler = fn(&mut Invocation<'_>) -> Result<(), CommandError>;

/// A row of the command table.
#[derive(Clone, Copy)]
pub(crate) struct CommandSpec {
    key: &'static str,
    summary: &'static str,
    arguments: &'static [&'static str],
    handler: Option<Handler>,
}

impl CommandSpec {
    const fn new(key: &'static str, summary: &'static str, handler: Handler) -> Self {
        Self {
            key,
            summary,
            arguments: &[],
            handler: Some(handler),
        }
    }

    const fn group(key: &'static str, summary: &'static str) -> Self {
        Self {
            key,
            summary,
            arguments: &[],
            handler: None,
        }
    }

    const fn with_arguments(mut self, arguments: &'static [&'static str]) -> Self {
        self.arguments = arguments;
        self
    }

    pub(crate) const fn key(&self) -> &'static str {
        self.key
    }

    pub(crate) const fn summary(&self) -> &'static str {
        self.summary
    }

    pub(crate) const fn arguments(&self) -> &'static [&'static str] {
        self.arguments
    }

    fn path(&self) -> CommandPath {
        CommandPath::from_key(self.key)
    }

    fn usage(&self) -> String {
        let mut usage = self.path().command_line();
        for argument in self.arguments {
            usage.push_str(&format!(" <{argument}>"));
        }
        usage
    }
}

static STANDARD: Lazy<CommandTable> = Lazy::new(|| {
    CommandTable::new(vec![
        CommandSpec::new("init", "Initialise a new repository", repo::init),
        CommandSpec::new("daemon", "Run the API server for this node", node::daemon),
        CommandSpec::new("id", "Show the node identity", node::id),
        CommandSpec::group("config", "Inspect or edit the repository configuration"),
        CommandSpec::new("config/show", "Print the repository configuration", repo::show),
        CommandSpec::new("config/edit", "Open the configuration in $EDITOR", repo::edit),
        CommandSpec::group("repo", "Maintain the repository"),
        CommandSpec::new("repo/fsck", "Remove a stale daemon API record", repo::fsck),
        CommandSpec::group("swarm", "Inspect peer connections"),
        CommandSpec::new("swarm/peers", "List the peers the node keeps", node::peers),
        CommandSpec::group("log", "Adjust daemon logging"),
        CommandSpec::new("log/level", "Replace the daemon log filter", daemon::log_level)
            .with_arguments(&["filter"]),
        CommandSpec::group("diag", "Daemon diagnostics"),
        CommandSpec::new("diag/cmds", "List requests served by the daemon", daemon::cmds),
        CommandSpec::new("shutdown", "Stop the running daemon", daemon::shutdown),
        CommandSpec::new("commands", "List every command", system::commands),
        CommandSpec::new("version", "Show version information", system::version),
    ])
});

/// The set of commands the front end knows.
pub(crate) struct CommandTable {
    specs: Vec<CommandSpec>,
}

impl CommandTable {
    fn new(specs: Vec<CommandSpec>) -> Self {
        Self { specs }
    }

    pub(crate) fn standard() -> &'static Self {
        &STANDARD
    }

    pub(crate) fn get(&self, path: &CommandPath) -> Option<&CommandSpec> {
        let key = path.key();
        self.specs.iter().find(|spec| spec.key == key)
    }

    /// Direct subcommands of `path`, in table order.
    pub(crate) fn children<'a>(
        &'a self,
        path: &'a CommandPath,
    ) -> impl Iterator<Item = &'a CommandSpec> + 'a {
        let depth = path.segments().len() + 1;
        self.specs.iter().filter(move |spec| {
            let candidate = spec.path();
            candidate.segments().len() == depth && candidate.segments().starts_with(path.segments())
        })
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &CommandSpec> {
        self.specs.iter()
    }

    /// Splits command tokens into the longest known command path and its
    /// arguments.
    pub(crate) fn resolve(&self, tokens: &[String]) -> Result<CommandRequest, CommandError> {
        let mut matched = 0;
        for length in 1..=tokens.len() {
            if self.get(&CommandPath::new(&tokens[..length])).is_some() {
                matched = length;
            } else {
                break;
            }
        }
        if matched == 0
            && let Some(first) = tokens.first()
        {
            return Err(CommandError::UnknownCommand {
                name: first.clone(),
            });
        }

        let path = CommandPath::new(&tokens[..matched]);
        Ok(CommandRequest::new(path, tokens[matched..].to_vec()))
    }

    /// Returns the handler for a resolved request. Groups need a subcommand and
    /// commands get exactly the arguments they declare.
    pub(crate) fn handler_for(&self, request: &CommandRequest) -> Result<Handler, CommandError> {
        let path = request.path();
        let Some(spec) = self.get(path) else {
            return Err(CommandError::UnknownCommand {
                name: path.segments().join(" "),
            });
        };
        let Some(handler) = spec.handler else {
            return match request.arguments().first() {
                Some(name) => Err(CommandError::UnknownCommand {
                    name: format!("{} {name}", path.segments().join(" ")),
                }),
                None => Err(CommandError::MissingSubcommand {
                    command_line: path.command_line(),
                }),
            };
        };
        if request.arguments().len() != spec.arguments.len() {
            return Err(CommandError::Usage {
                usage: spec.usage(),
            });
        }
        Ok(handler)
    }

    /// Writes usage for `path`, or the root overview for the root path.
    pub(crate) fn write_help(&self, path: &CommandPath, out: &mut dyn Write) -> io::Result<()> {
        help::write_help(self, path, out)
    }
}

impl std::fmt::Debug for CommandTable {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_list()
            .entries(self.specs.iter().map(|spec| spec.key))
            .finish()
    }
}

/// Everything a handler can reach while it runs.
pub(crate) struct Invocation<'a> {
    pub(crate) request: &'a CommandRequest,
    pub(crate) env: &'a Environment,
    pub(crate) daemon: Option<&'a DaemonContext>,
    pub(crate) out: &'a mut dyn Write,
}

impl Invocation<'_> {
    /// The node for this invocation, constructed on first use.
    pub(crate) fn node(&self) -> Result<Arc<Node>, CommandError> {
        Ok(self.env.node(Some(self.request))?)
    }

    /// Daemon state; fails when the command runs outside the daemon.
    pub(crate) fn daemon(&self) -> Result<&DaemonContext, CommandError> {
        self.daemon.ok_or_else(|| CommandError::DaemonOnly {
            command_line: self.request.path().command_line(),
        })
    }

    pub(crate) fn argument(&self, index: usize) -> Option<&str> {
        self.request.arguments().get(index).map(String::as_str)
    }
}

/// Failures raised by command handlers.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command \"{name}\"")]
    UnknownCommand { name: String },
    #[error("'{command_line}' requires a subcommand; see '{command_line} --help'")]
    MissingSubcommand { command_line: String },
    #[error("usage: {usage}")]
    Usage { usage: String },
    #[error("'{command_line}' only runs inside the daemon")]
    DaemonOnly { command_line: String },
    #[error("repository already initialised at '{root}'")]
    AlreadyInitialised { root: String },
    #[error("no editor configured; set $EDITOR")]
    NoEditor,
    #[error("editor '{editor}' exited with {status}")]
    EditorFailed { editor: String, status: String },
    #[error("failed to start editor '{editor}': {source}")]
    EditorSpawn {
        editor: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Node(#[from] NodeError),
    #[error(transparent)]
    RepoConfig(#[from] RepoConfigError),
    #[error(transparent)]
    ApiFile(#[from] ApiFileError),
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("failed to serialise output: {0}")]
    Serialise(#[from] serde_json::Error),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

impl CommandError {
    #[must_use]
    pub fn is_unknown_command(&self) -> bool {
        matches!(self, Self::UnknownCommand { .. })
    }
}
