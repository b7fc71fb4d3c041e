//! API address resolution under a bounded deadline.
//!
//! DNS components are looked up on a worker thread while the caller polls for
//! the answer, so a hung resolver never holds the invocation past its
//! [`Deadline`]. The deadline combines a fixed timeout with a [`CancelToken`]
//! that termination signals can trip.

use std::io;
use std::net::{IpAddr, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use ipfs_config::{Multiaddr, Protocol};
use signal_hook::SigId;
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use thiserror::Error;
use tracing::debug;

/// Upper bound on how long resolution may take.
pub const RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

const SIGNAL_EXIT_STATUS: i32 = 130;
const POLL_INTERVAL: Duration = Duration::from_millis(20);
const RESOLVE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::resolve");

/// Shared flag signalling that the invocation should stop waiting.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Trips the token on SIGINT or SIGTERM until the returned guard drops.
    ///
    /// A second signal after the token has tripped terminates the process.
    pub fn watch_signals(&self) -> io::Result<SignalWatch> {
        let mut ids = Vec::with_capacity(4);
        for signal in [SIGINT, SIGTERM] {
            ids.push(signal_hook::flag::register_conditional_shutdown(
                signal,
                SIGNAL_EXIT_STATUS,
                Arc::clone(&self.0),
            )?);
            ids.push(signal_hook::flag::register(signal, Arc::clone(&self.0))?);
        }
        Ok(SignalWatch { ids })
    }
}

/// Keeps signal handlers registered for a [`CancelToken`].
#[derive(Debug)]
pub struct SignalWatch {
    ids: Vec<SigId>,
}

impl Drop for SignalWatch {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            signal_hook::low_level::unregister(id);
        }
    }
}

/// The sooner of a fixed instant and external cancellation.
#[derive(Debug, Clone)]
pub struct Deadline {
    expires_at: Instant,
    timeout: Duration,
    cancel: CancelToken,
}

impl Deadline {
    #[must_use]
    pub fn after(timeout: Duration, cancel: CancelToken) -> Self {
        Self {
            expires_at: Instant::now() + timeout,
            timeout,
            cancel,
        }
    }

    /// Time left, or `None` once the deadline has passed.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .checked_duration_since(Instant::now())
            .filter(|left| !left.is_zero())
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// How a resolved address is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Tcp4,
    Tcp6,
    Unix,
    Other,
}

impl TransportKind {
    /// Classifies a concrete address by its leading host and port.
    #[must_use]
    pub fn of(address: &Multiaddr) -> Self {
        match address.protocols() {
            [Protocol::Ip4(_), Protocol::Tcp(_), ..] => Self::Tcp4,
            [Protocol::Ip6(_), Protocol::Tcp(_), ..] => Self::Tcp6,
            [Protocol::Unix(_)] => Self::Unix,
            _ => Self::Other,
        }
    }
}

/// A dialable address with its transport classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub address: Multiaddr,
    pub kind: TransportKind,
}

impl ResolvedAddress {
    #[must_use]
    pub fn new(address: Multiaddr) -> Self {
        let kind = TransportKind::of(&address);
        Self { address, kind }
    }
}

/// Host name lookups.
pub trait NameResolver: Send + Sync + 'static {
    /// Returns candidate addresses for `host` in preference order.
    fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Lookups through the operating system resolver.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemNameResolver;

impl NameResolver for SystemNameResolver {
    fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        Ok((host, 0).to_socket_addrs()?.map(|addr| addr.ip()).collect())
    }
}

/// Resolves multiaddresses, delegating DNS components to a [`NameResolver`].
#[derive(Clone)]
pub struct MultiaddrResolver {
    names: Arc<dyn NameResolver>,
}

impl Default for MultiaddrResolver {
    fn default() -> Self {
        Self::new(SystemNameResolver)
    }
}

impl MultiaddrResolver {
    pub fn new(names: impl NameResolver) -> Self {
        Self {
            names: Arc::new(names),
        }
    }

    /// Turns `address` into a concrete address before `deadline`.
    pub fn resolve(
        &self,
        address: &Multiaddr,
        deadline: &Deadline,
    ) -> Result<ResolvedAddress, ResolutionError> {
        let Some(first) = address.protocols().first() else {
            return Err(ResolutionError::NonResolvable);
        };
        let (host, family) = match first {
            Protocol::Dns(host) => (host.clone(), None),
            Protocol::Dns4(host) => (host.clone(), Some(AddressFamily::V4)),
            Protocol::Dns6(host) => (host.clone(), Some(AddressFamily::V6)),
            _ => return Ok(ResolvedAddress::new(address.clone())),
        };

        let candidates = self.lookup_before(address, host, deadline)?;
        let chosen = candidates
            .into_iter()
            .find(|ip| family.is_none_or(|family| family.matches(*ip)))
            .ok_or(ResolutionError::NonResolvable)?;
        let component = match chosen {
            IpAddr::V4(ip) => Protocol::Ip4(ip),
            IpAddr::V6(ip) => Protocol::Ip6(ip),
        };
        let resolved = ResolvedAddress::new(address.with_first(component));
        debug!(
            target: RESOLVE_TARGET,
            from = %address,
            to = %resolved.address,
            "resolved API address"
        );
        Ok(resolved)
    }

    fn lookup_before(
        &self,
        address: &Multiaddr,
        host: String,
        deadline: &Deadline,
    ) -> Result<Vec<IpAddr>, ResolutionError> {
        if deadline.is_cancelled() {
            return Err(ResolutionError::Cancelled {
                address: address.clone(),
            });
        }

        let (sender, receiver) = mpsc::channel();
        let names = Arc::clone(&self.names);
        thread::spawn(move || {
            // The receiver is gone once the caller has given up.
            let _ = sender.send(names.lookup(&host));
        });

        loop {
            if deadline.is_cancelled() {
                return Err(ResolutionError::Cancelled {
                    address: address.clone(),
                });
            }
            let Some(remaining) = deadline.remaining() else {
                return Err(ResolutionError::Timeout {
                    address: address.clone(),
                    timeout: deadline.timeout(),
                });
            };
            match receiver.recv_timeout(remaining.min(POLL_INTERVAL)) {
                Ok(result) => {
                    return result.map_err(|source| ResolutionError::Lookup {
                        address: address.clone(),
                        source,
                    });
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ResolutionError::Lookup {
                        address: address.clone(),
                        source: io::Error::other("resolver thread exited without an answer"),
                    });
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    const fn matches(self, ip: IpAddr) -> bool {
        matches!(
            (self, ip),
            (Self::V4, IpAddr::V4(_)) | (Self::V6, IpAddr::V6(_))
        )
    }
}

/// Failures turning an API address into something dialable.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("resolving API endpoint {address} timed out after {}s", .timeout.as_secs())]
    Timeout { address: Multiaddr, timeout: Duration },
    #[error("resolving API endpoint {address} was cancelled")]
    Cancelled { address: Multiaddr },
    #[error("failed to resolve API endpoint {address}: {source}")]
    Lookup {
        address: Multiaddr,
        #[source]
        source: io::Error,
    },
    #[error("non-resolvable API endpoint")]
    NonResolvable,
}
