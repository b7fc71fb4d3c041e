//! Entry point for the `ipfs` command-line front end.
//!
//! The binary delegates to [`ipfs_cli::run`], which normalises arguments,
//! loads configuration, decides where the command runs, and executes it either
//! in-process or against a running daemon.

use std::io::{self, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    // Left unlocked: daemon connection threads log to stderr while the main
    // thread is still inside `run`.
    let mut stderr = io::stderr();
    ipfs_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
