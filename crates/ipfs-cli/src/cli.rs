//! Command-line surface parsed by clap.
//!
//! Command tokens are collected verbatim and matched against the command table
//! afterwards, so clap only owns the global options.

use camino::Utf8PathBuf;
use clap::Parser;
use ipfs_config::Multiaddr;

use crate::command::CommandPath;

#[derive(Parser, Debug)]
#[command(
    name = "ipfs",
    disable_help_flag = true,
    disable_version_flag = true,
    disable_help_subcommand = true
)]
pub(crate) struct Cli {
    /// Run the command on the daemon listening at this address.
    #[arg(long, value_name = "MULTIADDR")]
    pub(crate) api: Option<Multiaddr>,
    /// Repository root.
    #[arg(long, value_name = "PATH")]
    pub(crate) config: Option<Utf8PathBuf>,
    /// Enable debug logging.
    #[arg(short = 'D', long)]
    pub(crate) debug: bool,
    /// Show usage for the command.
    #[arg(short = 'h', long)]
    pub(crate) help: bool,
    /// Command path followed by its arguments.
    #[arg(value_name = "COMMAND", num_args = 0..)]
    pub(crate) command: Vec<String>,
}

impl Cli {
    /// True for `ipfs daemon`, which must not treat `--api` as a request to
    /// reach an existing daemon.
    pub(crate) fn is_daemon_start(path: &CommandPath) -> bool {
        path.segments() == ["daemon"]
    }
}
