//! Transport selection for remote command execution.
//!
//! [`build`] turns a resolved API address into a [`TransportConfig`]: the HTTP
//! host to announce, the API path prefix, and a [`Dialer`] that opens the
//! underlying stream. Local-socket transports announce the sentinel host
//! `unix` and always dial the socket path captured here, whatever host the
//! request names.

use std::io;
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use camino::Utf8PathBuf;
use ipfs_config::{Multiaddr, Protocol};
use thiserror::Error;

#[cfg(unix)]
use std::os::fd::OwnedFd;
#[cfg(unix)]
use std::os::unix::net::UnixStream;

#[cfg(unix)]
use socket2::{Domain, SockAddr, Socket, Type};

use crate::resolve::{ResolvedAddress, TransportKind};

/// Path prefix under which the daemon serves commands.
pub const API_PREFIX: &str = "/api/v0";
/// Host announced for local-socket transports.
pub const UNIX_HOST: &str = "unix";

pub(crate) const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) enum Connection {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

/// Opens streams to the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialer {
    Tcp(SocketAddr),
    Unix(Utf8PathBuf),
}

impl Dialer {
    pub(crate) fn dial(&self) -> io::Result<Connection> {
        match self {
            Self::Tcp(address) => {
                TcpStream::connect_timeout(address, CONNECTION_TIMEOUT).map(Connection::Tcp)
            }
            Self::Unix(path) => connect_unix(path),
        }
    }
}

/// Everything the HTTP client needs to reach the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    address: Multiaddr,
    host: String,
    api_prefix: &'static str,
    dialer: Dialer,
}

impl TransportConfig {
    /// Address the transport was built from.
    #[must_use]
    pub fn address(&self) -> &Multiaddr {
        &self.address
    }

    /// Value of the HTTP `Host` header.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub const fn api_prefix(&self) -> &'static str {
        self.api_prefix
    }

    #[must_use]
    pub fn dialer(&self) -> &Dialer {
        &self.dialer
    }
}

/// Builds the transport for a resolved address.
pub fn build(resolved: &ResolvedAddress) -> Result<TransportConfig, UnsupportedTransport> {
    let unsupported = || UnsupportedTransport {
        address: resolved.address.clone(),
    };
    let (host, dialer) = match resolved.kind {
        TransportKind::Tcp4 | TransportKind::Tcp6 => {
            let socket = resolved.address.tcp_socket_addr().ok_or_else(unsupported)?;
            (socket.to_string(), Dialer::Tcp(socket))
        }
        TransportKind::Unix => match resolved.address.protocols() {
            [Protocol::Unix(path)] => (UNIX_HOST.to_owned(), Dialer::Unix(path.clone())),
            _ => return Err(unsupported()),
        },
        TransportKind::Other => return Err(unsupported()),
    };
    Ok(TransportConfig {
        address: resolved.address.clone(),
        host,
        api_prefix: API_PREFIX,
        dialer,
    })
}

/// The address names a transport the client cannot dial.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported API address: {address}")]
pub struct UnsupportedTransport {
    pub address: Multiaddr,
}

#[cfg(unix)]
fn connect_unix(path: &camino::Utf8Path) -> io::Result<Connection> {
    let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
    let address = SockAddr::unix(path.as_std_path())?;
    socket.connect_timeout(&address, CONNECTION_TIMEOUT)?;
    Ok(Connection::Unix(UnixStream::from(OwnedFd::from(socket))))
}

#[cfg(not(unix))]
fn connect_unix(path: &camino::Utf8Path) -> io::Result<Connection> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("local sockets are not supported on this platform: {path}"),
    ))
}
