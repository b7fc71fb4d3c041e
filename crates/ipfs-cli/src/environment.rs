//! Per-invocation execution environment.
//!
//! The environment knows the repository root and how to build a node, but it
//! only builds one when a command asks for it, and at most once.

use std::sync::Arc;

use ipfs_config::RepoPaths;
use once_cell::sync::OnceCell;
use tracing::debug;

use crate::command::CommandRequest;
use crate::node::{Node, NodeError};

const ENVIRONMENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::environment");

/// Builds a node from an opened repository.
pub type NodeFactory = Box<dyn Fn(&RepoPaths) -> Result<Node, NodeError> + Send + Sync>;

/// State shared by every command of an invocation.
pub struct Environment {
    repo: RepoPaths,
    factory: NodeFactory,
    node: OnceCell<Arc<Node>>,
}

impl Environment {
    /// Environment that opens the node from `repo` on demand.
    #[must_use]
    pub fn new(repo: RepoPaths) -> Self {
        Self::with_factory(repo, Box::new(Node::open))
    }

    #[must_use]
    pub fn with_factory(repo: RepoPaths, factory: NodeFactory) -> Self {
        Self {
            repo,
            factory,
            node: OnceCell::new(),
        }
    }

    /// Environment around a node that is already running.
    #[must_use]
    pub fn with_node(node: Arc<Node>) -> Self {
        let repo = node.repo().clone();
        Self {
            repo,
            factory: Box::new(Node::open),
            node: OnceCell::with_value(node),
        }
    }

    #[must_use]
    pub fn repo(&self) -> &RepoPaths {
        &self.repo
    }

    /// Returns the node, constructing it for the first request that needs one.
    pub fn node(&self, request: Option<&CommandRequest>) -> Result<Arc<Node>, NodeError> {
        let request = request.ok_or(NodeError::NoRequest)?;
        self.node
            .get_or_try_init(|| {
                debug!(
                    target: ENVIRONMENT_TARGET,
                    command = %request.path(),
                    repo = %self.repo.root(),
                    "constructing node"
                );
                (self.factory)(&self.repo).map(Arc::new)
            })
            .cloned()
    }

    /// Returns true once a node has been constructed.
    #[must_use]
    pub fn has_node(&self) -> bool {
        self.node.get().is_some()
    }
}
