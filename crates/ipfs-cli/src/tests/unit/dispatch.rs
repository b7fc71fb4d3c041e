//! Routing decisions made by the dispatcher.
//!
//! Collaborators are replaced by recording fakes so the tests can observe
//! which of them a decision consulted.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use ipfs_config::{Multiaddr, RepoPaths};
use rstest::rstest;

use crate::command::CommandPath;
use crate::discovery::{ApiDiscovery, DiscoveryError};
use crate::dispatch::{
    AddressResolver, DispatchError, DispatchOutcome, DispatchRequest, Dispatcher, Refusal,
    RepoInspector,
};
use crate::registry::{CapabilityFlags, CapabilityRegistry};
use crate::resolve::{CancelToken, Deadline, RESOLVE_TIMEOUT, ResolutionError, ResolvedAddress};
use crate::transport::{Dialer, UNIX_HOST};

const DAEMON_API: &str = "/ip4/127.0.0.1/tcp/5001";

#[derive(Clone)]
struct RecordingDiscovery {
    address: Option<Multiaddr>,
    calls: Rc<Cell<usize>>,
}

impl RecordingDiscovery {
    fn new(address: Option<&str>) -> Self {
        Self {
            address: address.map(|text| text.parse().expect("address")),
            calls: Rc::new(Cell::new(0)),
        }
    }
}

impl ApiDiscovery for RecordingDiscovery {
    fn discover(&self, _repo: &RepoPaths) -> Result<Option<Multiaddr>, DiscoveryError> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.address.clone())
    }
}

struct FixedInspector(bool);

impl RepoInspector for FixedInspector {
    fn is_initialized(&self, _repo: &RepoPaths) -> bool {
        self.0
    }
}

/// Resolves concrete addresses to themselves; DNS names never resolve.
struct IdentityResolver {
    calls: Rc<Cell<usize>>,
    timeout: Rc<Cell<Option<Duration>>>,
}

impl AddressResolver for IdentityResolver {
    fn resolve(
        &self,
        address: &Multiaddr,
        deadline: &Deadline,
    ) -> Result<ResolvedAddress, ResolutionError> {
        self.calls.set(self.calls.get() + 1);
        self.timeout.set(Some(deadline.timeout()));
        if address.is_resolved() {
            Ok(ResolvedAddress::new(address.clone()))
        } else {
            Err(ResolutionError::NonResolvable)
        }
    }
}

struct Harness {
    registry: CapabilityRegistry,
    discovery: RecordingDiscovery,
    initialised: bool,
    resolver_calls: Rc<Cell<usize>>,
    resolver_timeout: Rc<Cell<Option<Duration>>>,
    repo: RepoPaths,
}

impl Harness {
    fn new(discovered: Option<&str>, initialised: bool) -> Self {
        Self::with_registry(CapabilityRegistry::standard().clone(), discovered, initialised)
    }

    fn with_registry(
        registry: CapabilityRegistry,
        discovered: Option<&str>,
        initialised: bool,
    ) -> Self {
        Self {
            registry,
            discovery: RecordingDiscovery::new(discovered),
            initialised,
            resolver_calls: Rc::new(Cell::new(0)),
            resolver_timeout: Rc::new(Cell::new(None)),
            repo: RepoPaths::new("/nonexistent/ipfs-repo"),
        }
    }

    fn select(&self, key: &str, explicit: Option<&str>) -> Result<DispatchOutcome, DispatchError> {
        let explicit: Option<Multiaddr> = explicit.map(|text| text.parse().expect("address"));
        let path = CommandPath::from_key(key);
        let dispatcher = Dispatcher::new(
            &self.registry,
            self.discovery.clone(),
            FixedInspector(self.initialised),
            IdentityResolver {
                calls: Rc::clone(&self.resolver_calls),
                timeout: Rc::clone(&self.resolver_timeout),
            },
            CancelToken::new(),
        );
        dispatcher.select(&DispatchRequest {
            path: &path,
            explicit_api: explicit.as_ref(),
            repo: &self.repo,
            is_daemon_start: key == "daemon",
        })
    }

    fn discovery_calls(&self) -> usize {
        self.discovery.calls.get()
    }
}

fn refusal(result: Result<DispatchOutcome, DispatchError>) -> Refusal {
    match result {
        Err(DispatchError::Refused(refusal)) => refusal,
        other => panic!("expected a refusal, got {other:?}"),
    }
}

#[rstest]
#[case("version")]
#[case("commands")]
#[case("init")]
#[case("config/edit")]
fn repo_free_commands_skip_discovery(#[case] key: &str) {
    let harness = Harness::new(Some(DAEMON_API), true);
    let outcome = harness.select(key, None).expect("dispatch");
    assert_eq!(outcome, DispatchOutcome::Local);
    assert_eq!(harness.discovery_calls(), 0);
    assert_eq!(harness.resolver_calls.get(), 0);
}

#[test]
fn contradictory_flags_are_always_refused() {
    let flags = CapabilityFlags {
        cannot_run_on_client: true,
        cannot_run_on_daemon: true,
        ..CapabilityFlags::NONE
    };
    let registry = CapabilityRegistry::from_entries([("broken", flags)]);
    for explicit in [None, Some(DAEMON_API)] {
        let harness = Harness::with_registry(registry.clone(), Some(DAEMON_API), true);
        let refused = refusal(harness.select("broken/child", explicit));
        assert_eq!(refused.to_string(), "command disabled: [broken child]");
    }
}

#[test]
fn explicit_api_on_client_only_command_is_refused() {
    let harness = Harness::new(None, true);
    let refused = refusal(harness.select("repo/fsck", Some(DAEMON_API)));
    assert_eq!(refused, Refusal::ApiFlagOnLocalCommand);
    assert_eq!(
        refused.to_string(),
        "api flag specified but command cannot be run on the daemon"
    );
}

#[test]
fn external_commands_run_locally() {
    let flags = CapabilityFlags {
        external: true,
        ..CapabilityFlags::NONE
    };
    let registry = CapabilityRegistry::from_entries([("plugin", flags)]);
    let harness = Harness::with_registry(registry, Some(DAEMON_API), true);
    assert_eq!(harness.select("plugin", None).expect("dispatch"), DispatchOutcome::Local);
    assert_eq!(harness.discovery_calls(), 0);
}

#[test]
fn repo_free_client_commands_ignore_explicit_api() {
    let harness = Harness::new(None, true);
    let outcome = harness.select("init", Some(DAEMON_API)).expect("dispatch");
    assert_eq!(outcome, DispatchOutcome::Local);
}

#[test]
fn daemon_start_ignores_explicit_api() {
    let harness = Harness::new(Some(DAEMON_API), true);
    let outcome = harness.select("daemon", Some(DAEMON_API)).expect("dispatch");
    assert_eq!(outcome, DispatchOutcome::Local);
}

#[test]
fn missing_record_runs_locally() {
    let harness = Harness::new(None, false);
    let outcome = harness.select("swarm/peers", None).expect("dispatch");
    assert_eq!(outcome, DispatchOutcome::Local);
    assert_eq!(harness.discovery_calls(), 1);
    assert_eq!(harness.resolver_calls.get(), 0);
}

#[test]
fn daemon_only_command_without_daemon_is_refused() {
    let harness = Harness::new(None, true);
    let refused = refusal(harness.select("diag/cmds", None));
    assert_eq!(refused.to_string(), "command must be run on the daemon: [diag cmds]");
}

#[test]
fn discovered_daemon_with_initialised_repo_allows_fallback() {
    let harness = Harness::new(Some(DAEMON_API), true);
    let outcome = harness.select("swarm/peers", None).expect("dispatch");
    let transport = match outcome {
        DispatchOutcome::RemoteWithLocalFallback(transport) => transport,
        other => panic!("expected remote with fallback, got {other:?}"),
    };
    assert_eq!(transport.host(), "127.0.0.1:5001");
    assert_eq!(transport.api_prefix(), "/api/v0");
    assert_eq!(
        transport.dialer(),
        &Dialer::Tcp("127.0.0.1:5001".parse().expect("socket"))
    );
}

#[test]
fn discovered_daemon_without_repo_is_remote_only() {
    let harness = Harness::new(Some(DAEMON_API), false);
    let outcome = harness.select("swarm/peers", None).expect("dispatch");
    assert!(matches!(outcome, DispatchOutcome::Remote(_)));
}

#[test]
fn explicit_api_never_falls_back() {
    let harness = Harness::new(None, true);
    let outcome = harness
        .select("swarm/peers", Some("/ip6/::1/tcp/5002"))
        .expect("dispatch");
    let transport = match outcome {
        DispatchOutcome::Remote(transport) => transport,
        other => panic!("expected remote, got {other:?}"),
    };
    assert_eq!(transport.host(), "[::1]:5002");
    assert_eq!(harness.discovery_calls(), 0);
}

#[test]
fn explicit_api_reaches_daemon_only_commands() {
    let harness = Harness::new(None, true);
    let outcome = harness.select("shutdown", Some(DAEMON_API)).expect("dispatch");
    assert!(matches!(outcome, DispatchOutcome::Remote(_)));
}

#[test]
fn unix_socket_transport_pins_the_socket_path() {
    let harness = Harness::new(Some("/unix/tmp/ipfs/api.sock"), true);
    let outcome = harness.select("id", None).expect("dispatch");
    let transport = match outcome {
        DispatchOutcome::RemoteWithLocalFallback(transport) => transport,
        other => panic!("expected remote with fallback, got {other:?}"),
    };
    assert_eq!(transport.host(), UNIX_HOST);
    assert_eq!(transport.dialer(), &Dialer::Unix("/tmp/ipfs/api.sock".into()));
}

#[rstest]
#[case::discovered(None)]
#[case::explicit(Some("/ip4/127.0.0.1/tcp/5002"))]
fn resolution_is_bounded_by_the_resolve_timeout(#[case] explicit: Option<&str>) {
    let harness = Harness::new(Some(DAEMON_API), true);
    harness.select("id", explicit).expect("dispatch");
    assert_eq!(harness.resolver_calls.get(), 1);
    assert_eq!(harness.resolver_timeout.get(), Some(RESOLVE_TIMEOUT));
    assert_eq!(RESOLVE_TIMEOUT, Duration::from_secs(10));
}

#[test]
fn resolution_failures_propagate() {
    let harness = Harness::new(Some("/dns4/nowhere.invalid/tcp/5001"), true);
    let error = harness.select("id", None).expect_err("unresolvable");
    assert!(matches!(
        error,
        DispatchError::Resolution(ResolutionError::NonResolvable)
    ));
    assert_eq!(error.to_string(), "non-resolvable API endpoint");
}

#[test]
fn unsupported_transports_are_rejected() {
    let harness = Harness::new(Some("/ip4/127.0.0.1/udp/5001"), true);
    let error = harness.select("id", None).expect_err("unsupported");
    assert!(matches!(error, DispatchError::Transport(_)));
}
