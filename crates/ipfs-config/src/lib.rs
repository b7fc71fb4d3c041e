//! Shared configuration for the `ipfs` command-line front end.
//!
//! The crate owns the layered [`Config`] loaded through `ortho_config`, the
//! [`Multiaddr`] type used to describe daemon API endpoints, and the on-disk
//! repository layout ([`RepoPaths`]) including the API discovery record a
//! running daemon leaves behind for later invocations.

mod defaults;
mod logging;
mod multiaddr;
pub mod repo;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_API_ADDRESS, DEFAULT_LOG_FILTER, default_api_address, default_log_filter,
    default_log_filter_string, default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use multiaddr::{Multiaddr, MultiaddrParseError, Protocol};
pub use repo::{
    Addresses, ApiFileError, Identity, Peering, RepoConfig, RepoConfigError, RepoPathError,
    RepoPaths,
};

/// Layered configuration for the command-line front end.
///
/// Values are merged from defaults, a `.ipfs.toml` file (or the file named by
/// `--config-path` / `IPFS_CONFIG_PATH`), `IPFS_*` environment variables, and
/// finally the configuration flags given before the command tokens.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, OrthoConfig)]
#[ortho_config(prefix = "IPFS")]
pub struct Config {
    /// Tracing filter expression applied to CLI and daemon logs.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for log records written to stderr.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Returns the configured log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Returns the configured log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
