//! Usage text for the root command and its subcommands.

use std::io::{self, Write};

use super::CommandTable;
use crate::command::CommandPath;

const ROOT_SUMMARY: &str = "Command-line front end for an IPFS node";

const ROOT_OPTIONS: &[(&str, &str)] = &[
    ("--api <multiaddr>", "Run the command on the daemon listening here"),
    ("--config <path>", "Repository root (default: $IPFS_PATH or ~/.ipfs)"),
    ("--debug", "Enable debug logging"),
    ("-h, --help", "Show usage for a command"),
    ("--config-path <file>", "Front-end configuration file"),
    ("--log-filter <filter>", "Tracing filter for log output"),
    ("--log-format <format>", "Log output format: compact or json"),
];

/// Writes the short block shown when `ipfs` runs without a command.
pub(crate) fn write_bare_help(out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "Usage: ipfs [OPTIONS] <COMMAND> [ARGS...]")?;
    writeln!(out)?;
    writeln!(out, "Common commands:")?;
    for key in ["init", "daemon", "id", "swarm/peers"] {
        writeln!(out, "  {}", CommandPath::from_key(key).command_line())?;
    }
    writeln!(out)?;
    writeln!(out, "Run 'ipfs --help' for the full command list.")
}

pub(super) fn write_help(
    table: &CommandTable,
    path: &CommandPath,
    out: &mut dyn Write,
) -> io::Result<()> {
    if path.is_root() {
        return write_root_help(table, out);
    }
    let Some(spec) = table.get(path) else {
        return write_root_help(table, out);
    };

    writeln!(out, "USAGE")?;
    writeln!(out, "  {}", spec.usage())?;
    writeln!(out)?;
    writeln!(out, "  {}.", spec.summary())?;

    let children: Vec<_> = table.children(path).collect();
    if !children.is_empty() {
        writeln!(out)?;
        writeln!(out, "SUBCOMMANDS")?;
        write_command_rows(out, children.iter().map(|child| (child.usage(), child.summary())))?;
    }
    out.flush()
}

fn write_root_help(table: &CommandTable, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "USAGE")?;
    writeln!(out, "  ipfs [OPTIONS] <COMMAND> [ARGS...]")?;
    writeln!(out)?;
    writeln!(out, "  {ROOT_SUMMARY}.")?;
    writeln!(out)?;
    writeln!(out, "COMMANDS")?;
    let root = CommandPath::root();
    write_command_rows(
        out,
        table
            .children(&root)
            .map(|spec| (spec.usage(), spec.summary())),
    )?;
    writeln!(out)?;
    writeln!(out, "OPTIONS")?;
    let width = ROOT_OPTIONS.iter().map(|(flag, _)| flag.len()).max().unwrap_or(0);
    for (flag, summary) in ROOT_OPTIONS {
        writeln!(out, "  {flag:<width$}  {summary}")?;
    }
    writeln!(out)?;
    writeln!(out, "Use 'ipfs <command> --help' for more information about a command.")?;
    out.flush()
}

fn write_command_rows(
    out: &mut dyn Write,
    rows: impl Iterator<Item = (String, &'static str)>,
) -> io::Result<()> {
    let rows: Vec<_> = rows.collect();
    let width = rows.iter().map(|(usage, _)| usage.len()).max().unwrap_or(0);
    for (usage, summary) in rows {
        writeln!(out, "  {usage:<width$}  {summary}")?;
    }
    Ok(())
}
