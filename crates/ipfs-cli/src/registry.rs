//! Per-command capability flags.
//!
//! The registry records, for a handful of command paths, where a command may
//! run and whether it touches the repository. A lookup walks the path from the
//! root and keeps the deepest registered entry, so `diag/cmds/clear` inherits
//! the flags of `diag/cmds` unless it has an entry of its own.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::command::CommandPath;

/// Execution constraints for one command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilityFlags {
    /// The command needs the daemon's live node.
    pub cannot_run_on_client: bool,
    /// The command must run in the invoking process.
    pub cannot_run_on_daemon: bool,
    /// The command never opens the repository.
    pub does_not_use_repo: bool,
    /// The command is provided by an external program.
    pub external: bool,
}

impl CapabilityFlags {
    /// No constraints.
    pub const NONE: Self = Self {
        cannot_run_on_client: false,
        cannot_run_on_daemon: false,
        does_not_use_repo: false,
        external: false,
    };

    const fn client_only() -> Self {
        Self {
            cannot_run_on_daemon: true,
            ..Self::NONE
        }
    }

    const fn daemon_only() -> Self {
        Self {
            cannot_run_on_client: true,
            ..Self::NONE
        }
    }

    const fn without_repo(self) -> Self {
        Self {
            does_not_use_repo: true,
            ..self
        }
    }

    /// Returns true when the command can run neither locally nor remotely.
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        self.cannot_run_on_client && self.cannot_run_on_daemon
    }
}

static STANDARD: Lazy<CapabilityRegistry> = Lazy::new(|| {
    CapabilityRegistry::from_entries([
        ("init", CapabilityFlags::client_only().without_repo()),
        ("daemon", CapabilityFlags::client_only()),
        ("commands", CapabilityFlags::NONE.without_repo()),
        ("version", CapabilityFlags::NONE.without_repo()),
        ("log", CapabilityFlags::daemon_only()),
        ("diag/cmds", CapabilityFlags::daemon_only()),
        ("shutdown", CapabilityFlags::daemon_only()),
        ("repo/fsck", CapabilityFlags::client_only()),
        ("config/edit", CapabilityFlags::client_only().without_repo()),
    ])
});

/// Immutable map from command keys to their flags.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    entries: HashMap<String, CapabilityFlags>,
}

impl CapabilityRegistry {
    /// The process-wide table for the built-in commands.
    #[must_use]
    pub fn standard() -> &'static Self {
        &STANDARD
    }

    /// Builds a registry from `key => flags` pairs. Keys are `/`-separated.
    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, CapabilityFlags)>,
        K: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(key, flags)| (key.into(), flags))
                .collect(),
        }
    }

    /// Flags for `path`, taken from its deepest registered prefix.
    #[must_use]
    pub fn lookup(&self, path: &CommandPath) -> CapabilityFlags {
        if path.is_root() {
            return CapabilityFlags::NONE.without_repo();
        }
        path.prefix_keys()
            .filter_map(|key| self.entries.get(&key).copied())
            .last()
            .unwrap_or_default()
    }
}
