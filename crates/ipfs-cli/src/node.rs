//! The in-process node built from an opened repository.

use std::time::SystemTime;

use ipfs_config::{Multiaddr, RepoConfig, RepoConfigError, RepoPaths};
use thiserror::Error;
use tracing::info;

const NODE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::node");

/// A node instance. It owns the repository it was opened from.
#[derive(Debug)]
pub struct Node {
    repo: RepoPaths,
    config: RepoConfig,
    started_at: SystemTime,
}

impl Node {
    /// Opens the repository at `repo` and builds a node from its configuration.
    pub fn open(repo: &RepoPaths) -> Result<Self, NodeError> {
        let config = repo.load_config()?;
        info!(
            target: NODE_TARGET,
            peer = %config.identity.peer_id,
            repo = %repo.root(),
            "node constructed"
        );
        Ok(Self {
            repo: repo.clone(),
            config,
            started_at: SystemTime::now(),
        })
    }

    #[must_use]
    pub fn repo(&self) -> &RepoPaths {
        &self.repo
    }

    #[must_use]
    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    #[must_use]
    pub fn peer_id(&self) -> &str {
        &self.config.identity.peer_id
    }

    /// Address the daemon API listens on.
    #[must_use]
    pub fn api_address(&self) -> &Multiaddr {
        &self.config.addresses.api
    }

    /// Peers the node keeps connections to.
    #[must_use]
    pub fn peers(&self) -> &[Multiaddr] {
        &self.config.peering.peers
    }

    #[must_use]
    pub const fn started_at(&self) -> SystemTime {
        self.started_at
    }
}

/// Failures constructing a node.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("constructing node without a request")]
    NoRequest,
    #[error(transparent)]
    Repo(#[from] RepoConfigError),
}
