//! API address discovery from repository state.

use ipfs_config::{ApiFileError, Multiaddr, RepoPaths};
use thiserror::Error;

/// Finds the address a running daemon advertised for a repository.
pub trait ApiDiscovery {
    /// Returns `None` when no daemon has advertised an address.
    fn discover(&self, repo: &RepoPaths) -> Result<Option<Multiaddr>, DiscoveryError>;
}

/// Reads the `<repo>/api` record.
#[derive(Debug, Default, Clone, Copy)]
pub struct ApiFileDiscovery;

impl ApiDiscovery for ApiFileDiscovery {
    fn discover(&self, repo: &RepoPaths) -> Result<Option<Multiaddr>, DiscoveryError> {
        discover(repo)
    }
}

/// Reads the persisted API address for `repo`.
pub fn discover(repo: &RepoPaths) -> Result<Option<Multiaddr>, DiscoveryError> {
    repo.read_api_address().map_err(DiscoveryError)
}

/// The discovery record exists but could not be used.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct DiscoveryError(#[from] pub ApiFileError);
