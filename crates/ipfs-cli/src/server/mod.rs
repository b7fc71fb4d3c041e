//! In-process API server started by `ipfs daemon`.
//!
//! The daemon binds the API address from the repository configuration, writes
//! the discovery record so later invocations find it, and answers requests by
//! running them through the same local executor the CLI uses, against one
//! shared node.

mod listener;

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use hyper::{Method, StatusCode};
use ipfs_config::{ApiFileError, Multiaddr};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::command::{CommandPath, CommandRequest};
use crate::environment::Environment;
use crate::errors::ExecuteError;
use crate::executor::{Executor, LocalExecutor};
use crate::http::{self, Reply, RequestHead};
use crate::node::Node;
use crate::registry::CapabilityRegistry;
use crate::resolve::CancelToken;
use crate::transport::{API_PREFIX, Connection};

pub(crate) use listener::{ApiListener, ConnectionHandler};

pub(crate) const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");

/// A request the daemon has served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    pub id: u64,
    pub path: CommandPath,
    pub arguments: Vec<String>,
    pub received_at: SystemTime,
}

/// Daemon-wide state visible to daemon-only commands.
#[derive(Debug, Default)]
pub struct DaemonContext {
    shutdown: CancelToken,
    requests: Mutex<Vec<RequestRecord>>,
}

impl DaemonContext {
    #[must_use]
    pub fn new(shutdown: CancelToken) -> Self {
        Self {
            shutdown,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Asks the accept loop to stop after in-flight requests complete.
    pub fn request_shutdown(&self) {
        info!(target: SERVER_TARGET, "shutdown requested");
        self.shutdown.cancel();
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Records a request and returns its sequence number.
    pub fn record(&self, request: &CommandRequest) -> u64 {
        let mut requests = self
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let id = requests.len() as u64 + 1;
        requests.push(RequestRecord {
            id,
            path: request.path().clone(),
            arguments: request.arguments().to_vec(),
            received_at: SystemTime::now(),
        });
        id
    }

    /// Snapshot of the requests served so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RequestRecord> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Answers API requests against a shared node.
pub(crate) struct ApiHandler {
    env: Environment,
    daemon: Arc<DaemonContext>,
    registry: &'static CapabilityRegistry,
}

impl ApiHandler {
    pub(crate) fn new(node: Arc<Node>, daemon: Arc<DaemonContext>) -> Self {
        Self {
            env: Environment::with_node(node),
            daemon,
            registry: CapabilityRegistry::standard(),
        }
    }

    fn respond(&self, head: &RequestHead) -> Reply {
        if head.method != Method::POST {
            let message = format!("method {} not allowed", head.method);
            return Reply::error(StatusCode::METHOD_NOT_ALLOWED, &message);
        }
        let command = match http::parse_target(API_PREFIX, &head.target) {
            Ok(command) => command,
            Err(error) => return Reply::error(StatusCode::NOT_FOUND, &error.to_string()),
        };

        let path = command.path();
        if self.registry.lookup(path).cannot_run_on_daemon {
            let message = format!("command cannot be run on the daemon: {path}");
            return Reply::error(StatusCode::BAD_REQUEST, &message);
        }

        let id = self.daemon.record(&command);
        debug!(
            target: SERVER_TARGET,
            id,
            command = %path,
            host = head.host.as_deref().unwrap_or_default(),
            "serving request"
        );
        let executor = LocalExecutor::for_daemon(Arc::clone(&self.daemon));
        let mut body = Vec::new();
        match executor.execute(&command, &self.env, &mut body) {
            Ok(()) => Reply::text(body),
            Err(ExecuteError::Command(error)) if error.is_unknown_command() => {
                Reply::error(StatusCode::NOT_FOUND, &error.to_string())
            }
            Err(error) => {
                warn!(target: SERVER_TARGET, id, error = %error, "request failed");
                Reply::error(StatusCode::INTERNAL_SERVER_ERROR, &error.to_string())
            }
        }
    }
}

impl ConnectionHandler for ApiHandler {
    fn handle(&self, connection: Connection) {
        if let Err(error) = http::serve(connection, |head| self.respond(head)) {
            warn!(target: SERVER_TARGET, error = %error, "failed to answer API request");
        }
    }
}

/// Runs the daemon for `node` until a termination signal or `shutdown`.
pub fn run_daemon(node: Arc<Node>, out: &mut dyn Write) -> Result<(), ServerError> {
    let listener = ApiListener::bind(node.api_address())?;
    let address = listener.address().clone();
    let repo = node.repo().clone();
    repo.write_api_address(&address)?;

    let shutdown = CancelToken::new();
    let _signals = shutdown.watch_signals().map_err(ServerError::Signals)?;
    let daemon = Arc::new(DaemonContext::new(shutdown.clone()));
    let handler = Arc::new(ApiHandler::new(Arc::clone(&node), daemon));

    let announced = writeln!(out, "API server listening on {address}")
        .and_then(|()| writeln!(out, "Daemon is ready"))
        .and_then(|()| out.flush());
    let served = match announced {
        Ok(()) => listener.serve(handler, &shutdown),
        Err(source) => Err(ServerError::Output(source)),
    };

    let removed = repo.remove_api_address();
    served?;
    removed?;
    info!(target: SERVER_TARGET, address = %address, "daemon stopped");
    writeln!(out, "Daemon stopped").map_err(ServerError::Output)
}

/// Failures starting or running the daemon.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind API address {address}: {source}")]
    Bind {
        address: Multiaddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to configure API listener: {source}")]
    NonBlocking {
        #[source]
        source: io::Error,
    },
    #[error("cannot serve the API on {address}")]
    UnsupportedAddress { address: Multiaddr },
    #[error(transparent)]
    ApiFile(#[from] ApiFileError),
    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] io::Error),
    #[error("failed to write daemon output: {0}")]
    Output(#[source] io::Error),
}
