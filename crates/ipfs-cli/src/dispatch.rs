//! Decides where a command runs.
//!
//! The dispatcher combines the command's capability flags, an explicit
//! `--api` address, the daemon's discovery record, and the repository state
//! into a [`DispatchOutcome`]. Commands that never touch the repository are
//! answered before any discovery or resolution happens.

use ipfs_config::{Multiaddr, RepoPaths};
use thiserror::Error;
use tracing::debug;

use crate::client::HttpClient;
use crate::command::CommandPath;
use crate::discovery::{ApiDiscovery, ApiFileDiscovery, DiscoveryError};
use crate::executor::{Executor, LocalExecutor};
use crate::registry::CapabilityRegistry;
use crate::resolve::{
    CancelToken, Deadline, MultiaddrResolver, RESOLVE_TIMEOUT, ResolutionError, ResolvedAddress,
};
use crate::transport::{self, TransportConfig, UnsupportedTransport};

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Inputs to a routing decision.
#[derive(Debug, Clone, Copy)]
pub struct DispatchRequest<'a> {
    pub path: &'a CommandPath,
    pub explicit_api: Option<&'a Multiaddr>,
    pub repo: &'a RepoPaths,
    pub is_daemon_start: bool,
}

/// Where the command will run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// In this process.
    Local,
    /// On the daemon, with no local alternative.
    Remote(TransportConfig),
    /// On the daemon, running locally if no daemon answers.
    RemoteWithLocalFallback(TransportConfig),
}

impl DispatchOutcome {
    /// Builds the executor that carries out this decision.
    #[must_use]
    pub fn into_executor(self) -> Box<dyn Executor> {
        match self {
            Self::Local => Box::new(LocalExecutor::new()),
            Self::Remote(transport) => Box::new(HttpClient::new(transport)),
            Self::RemoteWithLocalFallback(transport) => {
                Box::new(HttpClient::new(transport).with_fallback(LocalExecutor::new()))
            }
        }
    }
}

/// Reasons a command is refused outright.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Refusal {
    #[error("command disabled: {path}")]
    Disabled { path: CommandPath },
    #[error("api flag specified but command cannot be run on the daemon")]
    ApiFlagOnLocalCommand,
    #[error("command must be run on the daemon: {path}")]
    DaemonRequired { path: CommandPath },
}

/// Failures while routing a command.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Refused(#[from] Refusal),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Transport(#[from] UnsupportedTransport),
}

/// Reports whether a repository has been initialised.
pub trait RepoInspector {
    fn is_initialized(&self, repo: &RepoPaths) -> bool;
}

/// Checks for `<repo>/config` on disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsRepoInspector;

impl RepoInspector for FsRepoInspector {
    fn is_initialized(&self, repo: &RepoPaths) -> bool {
        repo.is_initialized()
    }
}

/// Turns an API address into something dialable before a deadline.
pub trait AddressResolver {
    fn resolve(
        &self,
        address: &Multiaddr,
        deadline: &Deadline,
    ) -> Result<ResolvedAddress, ResolutionError>;
}

impl AddressResolver for MultiaddrResolver {
    fn resolve(
        &self,
        address: &Multiaddr,
        deadline: &Deadline,
    ) -> Result<ResolvedAddress, ResolutionError> {
        Self::resolve(self, address, deadline)
    }
}

/// The routing decision procedure.
pub struct Dispatcher<'r, D = ApiFileDiscovery, I = FsRepoInspector, R = MultiaddrResolver> {
    registry: &'r CapabilityRegistry,
    discovery: D,
    inspector: I,
    resolver: R,
    cancel: CancelToken,
}

impl Dispatcher<'static> {
    /// Dispatcher backed by the filesystem and the system resolver.
    #[must_use]
    pub fn system(cancel: CancelToken) -> Self {
        Self::new(
            CapabilityRegistry::standard(),
            ApiFileDiscovery,
            FsRepoInspector,
            MultiaddrResolver::default(),
            cancel,
        )
    }
}

impl<'r, D, I, R> Dispatcher<'r, D, I, R>
where
    D: ApiDiscovery,
    I: RepoInspector,
    R: AddressResolver,
{
    pub fn new(
        registry: &'r CapabilityRegistry,
        discovery: D,
        inspector: I,
        resolver: R,
        cancel: CancelToken,
    ) -> Self {
        Self {
            registry,
            discovery,
            inspector,
            resolver,
            cancel,
        }
    }

    /// Decides where `request` runs.
    pub fn select(&self, request: &DispatchRequest<'_>) -> Result<DispatchOutcome, DispatchError> {
        let path = request.path;
        let flags = self.registry.lookup(path);

        if flags.is_disabled() {
            return Err(Refusal::Disabled { path: path.clone() }.into());
        }

        if !flags.cannot_run_on_client && flags.does_not_use_repo {
            debug!(target: DISPATCH_TARGET, command = %path, "running locally without repository");
            return Ok(DispatchOutcome::Local);
        }

        let daemon_requested = request.explicit_api.is_some() && !request.is_daemon_start;

        if flags.cannot_run_on_daemon || flags.external {
            if daemon_requested {
                return Err(Refusal::ApiFlagOnLocalCommand.into());
            }
            debug!(target: DISPATCH_TARGET, command = %path, "command is client-only");
            return Ok(DispatchOutcome::Local);
        }

        let address = match request.explicit_api {
            Some(address) => Some(address.clone()),
            None => self.discovery.discover(request.repo)?,
        };

        let Some(address) = address else {
            if flags.cannot_run_on_client {
                return Err(Refusal::DaemonRequired { path: path.clone() }.into());
            }
            debug!(target: DISPATCH_TARGET, command = %path, "no daemon advertised; running locally");
            return Ok(DispatchOutcome::Local);
        };

        let deadline = Deadline::after(RESOLVE_TIMEOUT, self.cancel.clone());
        let resolved = self.resolver.resolve(&address, &deadline)?;
        let transport = transport::build(&resolved)?;

        if !daemon_requested && self.inspector.is_initialized(request.repo) {
            debug!(
                target: DISPATCH_TARGET,
                command = %path,
                api = %transport.address(),
                "forwarding to daemon with local fallback"
            );
            Ok(DispatchOutcome::RemoteWithLocalFallback(transport))
        } else {
            debug!(
                target: DISPATCH_TARGET,
                command = %path,
                api = %transport.address(),
                "forwarding to daemon"
            );
            Ok(DispatchOutcome::Remote(transport))
        }
    }
}
