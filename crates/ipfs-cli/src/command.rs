//! Command paths and the requests built from them.
//!
//! A [`CommandPath`] names a command by its segments (`["swarm", "peers"]`)
//! and is the key for capability lookups, the command table, and the remote
//! request target. A [`CommandRequest`] pairs a path with its positional
//! arguments and is what every executor receives.

use std::fmt;

/// Ordered command segments. Empty for the root command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CommandPath(Vec<String>);

impl CommandPath {
    /// Builds a path from its segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// The root command path.
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Parses a `/`-separated key such as `swarm/peers`.
    #[must_use]
    pub fn from_key(key: &str) -> Self {
        Self::new(key.split('/').filter(|segment| !segment.is_empty()))
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Segments joined with `/`, as used by lookup tables and URLs.
    #[must_use]
    pub fn key(&self) -> String {
        self.0.join("/")
    }

    /// Keys of every non-empty prefix, shortest first.
    pub fn prefix_keys(&self) -> impl Iterator<Item = String> + '_ {
        (1..=self.0.len()).map(|length| self.0[..length].join("/"))
    }

    /// Segments joined with spaces, as typed on the command line.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once("ipfs")
            .chain(self.0.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for CommandPath {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "[{}]", self.0.join(" "))
    }
}

/// A command to execute together with its positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    path: CommandPath,
    arguments: Vec<String>,
}

impl CommandRequest {
    #[must_use]
    pub fn new(path: CommandPath, arguments: Vec<String>) -> Self {
        Self { path, arguments }
    }

    #[must_use]
    pub fn path(&self) -> &CommandPath {
        &self.path
    }

    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }
}
