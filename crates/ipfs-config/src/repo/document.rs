//! The JSON configuration document stored at `<repo>/config`.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::defaults::default_api_address;
use crate::multiaddr::Multiaddr;

/// Repository configuration as persisted by `ipfs init`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RepoConfig {
    /// Node identity.
    pub identity: Identity,
    /// Listening addresses.
    pub addresses: Addresses,
    /// Peers the node keeps connections to.
    #[serde(default)]
    pub peering: Peering,
}

impl RepoConfig {
    /// Creates a configuration for a new node with the default API address.
    #[must_use]
    pub fn new(peer_id: impl Into<String>) -> Self {
        Self {
            identity: Identity {
                peer_id: peer_id.into(),
            },
            addresses: Addresses {
                api: default_api_address(),
            },
            peering: Peering::default(),
        }
    }

    /// Parses a configuration document.
    pub fn from_json(path: &Utf8Path, contents: &str) -> Result<Self, RepoConfigError> {
        serde_json::from_str(contents).map_err(|source| RepoConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Renders the document as indented JSON.
    pub fn to_json_pretty(&self) -> Result<String, RepoConfigError> {
        serde_json::to_string_pretty(self).map_err(RepoConfigError::Serialise)
    }
}

/// Node identity section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "PeerID")]
    pub peer_id: String,
}

/// Listening address section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Addresses {
    #[serde(rename = "API")]
    pub api: Multiaddr,
}

/// Static peering section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peering {
    #[serde(rename = "Peers", default)]
    pub peers: Vec<Multiaddr>,
}

/// Failures reading or writing the repository configuration.
#[derive(Debug, Error)]
pub enum RepoConfigError {
    /// The repository has no configuration file yet.
    #[error("no repository found at '{root}' (run 'ipfs init')")]
    NotInitialised { root: Utf8PathBuf },
    /// The configuration file could not be read.
    #[error("failed to read repository configuration '{path}': {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    /// The configuration file could not be written.
    #[error("failed to write repository configuration '{path}': {source}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    /// The configuration file did not contain a valid document.
    #[error("invalid repository configuration '{path}': {source}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// The configuration could not be rendered.
    #[error("failed to serialise repository configuration: {0}")]
    Serialise(#[source] serde_json::Error),
}
