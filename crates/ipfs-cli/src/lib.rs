//! Command-line front end for an IPFS node.
//!
//! The runtime normalises arguments, loads layered configuration, matches the
//! command tokens against the command table, and asks the dispatcher where
//! the command runs: in this process against a lazily built node, or on a
//! running daemon reached over HTTP. Configuration loading and IO streams can
//! be substituted so tests drive the same path as the binary.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use ipfs_config::RepoPaths;
use tracing::debug;

mod args;
mod cli;
mod client;
pub mod command;
mod commands;
mod config;
pub mod discovery;
pub mod dispatch;
pub mod environment;
mod errors;
pub mod executor;
mod http;
pub mod node;
pub mod registry;
pub mod resolve;
pub mod server;
pub mod telemetry;
pub mod transport;

use cli::Cli;
pub use client::HttpClient;
use commands::{CommandTable, write_bare_help};
use config::{ConfigArgumentSplit, split_config_arguments};
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
use dispatch::{DispatchRequest, Dispatcher};
use environment::Environment;
pub(crate) use errors::AppError;
pub use errors::ExecuteError;
use resolve::CancelToken;

/// CLI flags recognised by the configuration loader.
///
/// MAINTENANCE: keep in sync with the fields of `ipfs_config::Config`.
const CONFIG_CLI_FLAGS: &[&str] = &["--config-path", "--log-filter", "--log-format"];

const CLI_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::cli");

/// Bundles the IO streams provided to the CLI runtime.
pub(crate) struct IoStreams<'a, W: Write, E: Write> {
    pub(crate) stdout: &'a mut W,
    pub(crate) stderr: &'a mut E,
}

impl<'a, W: Write, E: Write> IoStreams<'a, W, E> {
    pub(crate) fn new(stdout: &'a mut W, stderr: &'a mut E) -> Self {
        Self { stdout, stderr }
    }
}

struct CliRunner<'a, W: Write, E: Write, L: ConfigLoader> {
    io: &'a mut IoStreams<'a, W, E>,
    loader: &'a L,
}

impl<'a, W, E, L> CliRunner<'a, W, E, L>
where
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    fn new(io: &'a mut IoStreams<'a, W, E>, loader: &'a L) -> Self {
        Self { io, loader }
    }

    fn run<I>(&mut self, args: I) -> ExitCode
    where
        I: IntoIterator<Item = OsString>,
    {
        let args: Vec<OsString> = args.into_iter().collect();
        let split = split_config_arguments(&args);
        let cli_arguments = args::normalise(prepare_cli_arguments(&args, &split));

        let result = if cli_arguments.len() <= 1 {
            self.bare_invocation()
        } else {
            self.execute(cli_arguments, &split.config_arguments)
        };
        self.finish(result)
    }

    fn bare_invocation(&mut self) -> Result<(), AppError> {
        write_bare_help(&mut *self.io.stderr).map_err(AppError::WriteOutput)?;
        Err(AppError::BareInvocation)
    }

    fn execute(
        &mut self,
        cli_arguments: Vec<OsString>,
        config_arguments: &[OsString],
    ) -> Result<(), AppError> {
        let cli = Cli::try_parse_from(cli_arguments).map_err(AppError::CliUsage)?;
        let config = self.loader.load(config_arguments)?;
        telemetry::initialise(&config, telemetry::debug_requested(cli.debug))?;
        telemetry::note_profiling_request();

        let table = CommandTable::standard();
        let request = table.resolve(&cli.command)?;
        if cli.help {
            table
                .write_help(request.path(), &mut *self.io.stdout)
                .map_err(AppError::WriteOutput)?;
            return Err(AppError::NormalExit);
        }
        if request.path().is_root() {
            return self.bare_invocation();
        }
        table.handler_for(&request)?;

        let env = Environment::new(RepoPaths::resolve(cli.config.as_deref())?);
        let cancel = CancelToken::new();
        let _signals = cancel.watch_signals().map_err(AppError::Signals)?;
        let outcome = Dispatcher::system(cancel).select(&DispatchRequest {
            path: request.path(),
            explicit_api: cli.api.as_ref(),
            repo: env.repo(),
            is_daemon_start: Cli::is_daemon_start(request.path()),
        })?;
        debug!(
            target: CLI_TARGET,
            command = %request.path(),
            outcome = ?outcome,
            "dispatching command"
        );

        outcome
            .into_executor()
            .execute(&request, &env, &mut *self.io.stdout)?;
        self.io.stdout.flush().map_err(AppError::WriteOutput)
    }

    fn finish(&mut self, result: Result<(), AppError>) -> ExitCode {
        match result.err().unwrap_or(AppError::NormalExit) {
            AppError::NormalExit => ExitCode::SUCCESS,
            AppError::BareInvocation => ExitCode::FAILURE,
            AppError::CliUsage(error) => {
                let _ = write!(self.io.stderr, "{error}");
                ExitCode::FAILURE
            }
            error => {
                let _ = writeln!(self.io.stderr, "Error: {error}");
                ExitCode::FAILURE
            }
        }
    }
}

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let mut io = IoStreams::new(stdout, stderr);
    run_with_loader(args, &mut io, &OrthoConfigLoader)
}

/// Runs the CLI with a custom configuration loader.
#[must_use]
pub(crate) fn run_with_loader<'a, I, W, E, L>(
    args: I,
    io: &'a mut IoStreams<'a, W, E>,
    loader: &'a L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    CliRunner::new(io, loader).run(args)
}

fn prepare_cli_arguments(args: &[OsString], split: &ConfigArgumentSplit) -> Vec<OsString> {
    let mut cli_arguments: Vec<OsString> = Vec::new();
    if let Some(first) = args.first() {
        cli_arguments.push(first.clone());
    }
    if split.command_start < args.len() {
        cli_arguments.extend(args[split.command_start..].iter().cloned());
    }
    cli_arguments
}
