//! On-disk repository layout shared by local commands and the daemon.
//!
//! A repository is a directory holding the node's `config` document and, while
//! a daemon runs, an `api` record advertising where the daemon listens. Both
//! the front end and the daemon derive the same [`RepoPaths`] so discovery
//! finds what the daemon wrote.

mod api_file;
mod document;
mod files;

use std::env;
use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

pub use api_file::ApiFileError;
pub use document::{Addresses, Identity, Peering, RepoConfig, RepoConfigError};

use crate::multiaddr::Multiaddr;

/// Environment variable overriding the repository root.
pub const REPO_PATH_ENV: &str = "IPFS_PATH";

const DEFAULT_REPO_DIR: &str = ".ipfs";
const CONFIG_FILE: &str = "config";
const API_FILE: &str = "api";

/// Canonical paths inside a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoPaths {
    root: Utf8PathBuf,
    config_path: Utf8PathBuf,
    api_path: Utf8PathBuf,
}

impl RepoPaths {
    /// Derives the layout beneath `root`.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        let root = root.into();
        Self {
            config_path: root.join(CONFIG_FILE),
            api_path: root.join(API_FILE),
            root,
        }
    }

    /// Picks the repository root for this invocation.
    ///
    /// An explicit `--config` value wins, then `IPFS_PATH`, then `~/.ipfs`.
    pub fn resolve(explicit: Option<&Utf8Path>) -> Result<Self, RepoPathError> {
        let from_env = env::var(REPO_PATH_ENV).ok();
        let home = dirs::home_dir();
        let home = match home {
            Some(path) => Some(
                Utf8PathBuf::from_path_buf(path).map_err(|path| RepoPathError::NonUtf8Home {
                    path: path.display().to_string(),
                })?,
            ),
            None => None,
        };
        Self::resolve_with(explicit, from_env.as_deref(), home.as_deref())
    }

    /// Resolution with the environment and home directory supplied by the caller.
    pub fn resolve_with(
        explicit: Option<&Utf8Path>,
        from_env: Option<&str>,
        home: Option<&Utf8Path>,
    ) -> Result<Self, RepoPathError> {
        let chosen = explicit
            .map(Utf8Path::as_str)
            .or_else(|| from_env.filter(|value| !value.trim().is_empty()));

        let root = match chosen {
            Some(raw) => expand_home(raw.trim(), home)?,
            None => home
                .map(|home| home.join(DEFAULT_REPO_DIR))
                .ok_or(RepoPathError::NoHome)?,
        };
        Ok(Self::new(root))
    }

    /// Repository root directory.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        self.root.as_path()
    }

    /// Path of the configuration document.
    #[must_use]
    pub fn config_path(&self) -> &Utf8Path {
        self.config_path.as_path()
    }

    /// Path of the API discovery record.
    #[must_use]
    pub fn api_path(&self) -> &Utf8Path {
        self.api_path.as_path()
    }

    /// A repository is initialised once its configuration file exists.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.config_path.is_file()
    }

    /// Loads the configuration document.
    pub fn load_config(&self) -> Result<RepoConfig, RepoConfigError> {
        let contents = match fs::read_to_string(&self.config_path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Err(RepoConfigError::NotInitialised {
                    root: self.root.clone(),
                });
            }
            Err(source) => {
                return Err(RepoConfigError::Read {
                    path: self.config_path.clone(),
                    source,
                });
            }
        };
        RepoConfig::from_json(&self.config_path, &contents)
    }

    /// Writes the configuration document, creating the root if needed.
    pub fn save_config(&self, config: &RepoConfig) -> Result<(), RepoConfigError> {
        let write_error = |source| RepoConfigError::Write {
            path: self.config_path.clone(),
            source,
        };
        fs::create_dir_all(&self.root).map_err(write_error)?;
        let mut rendered = config.to_json_pretty()?;
        rendered.push('\n');
        files::atomic_write(&self.config_path, rendered.as_bytes()).map_err(write_error)
    }

    /// Reads the address a running daemon advertised, if any.
    pub fn read_api_address(&self) -> Result<Option<Multiaddr>, ApiFileError> {
        api_file::read(&self.api_path)
    }

    /// Advertises the daemon's listening address.
    pub fn write_api_address(&self, address: &Multiaddr) -> Result<(), ApiFileError> {
        api_file::write(&self.api_path, address)
    }

    /// Removes the API record. Returns `true` if one existed.
    pub fn remove_api_address(&self) -> Result<bool, ApiFileError> {
        api_file::remove(&self.api_path)
    }
}

fn expand_home(raw: &str, home: Option<&Utf8Path>) -> Result<Utf8PathBuf, RepoPathError> {
    if raw == "~" {
        return home.map(Utf8Path::to_path_buf).ok_or(RepoPathError::NoHome);
    }
    match raw.strip_prefix("~/") {
        Some(rest) => home
            .map(|home| home.join(rest))
            .ok_or(RepoPathError::NoHome),
        None => Ok(Utf8PathBuf::from(raw)),
    }
}

/// Errors raised while choosing the repository root.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepoPathError {
    /// No explicit path was given and the home directory is unknown.
    #[error("cannot locate the repository: no home directory and IPFS_PATH is unset")]
    NoHome,
    /// The home directory is not valid UTF-8.
    #[error("home directory '{path}' is not valid UTF-8")]
    NonUtf8Home { path: String },
}
