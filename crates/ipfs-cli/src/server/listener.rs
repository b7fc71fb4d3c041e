//! Listening socket for the daemon API.

use std::io;
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ipfs_config::Multiaddr;
use tracing::{info, warn};

#[cfg(unix)]
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;
#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};

#[cfg(unix)]
use camino::Utf8Path;

use super::{SERVER_TARGET, ServerError};
use crate::resolve::CancelToken;
use crate::transport::Connection;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Handles one accepted connection.
pub(crate) trait ConnectionHandler: Send + Sync {
    fn handle(&self, connection: Connection);
}

enum ListenerKind {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

/// Bound API socket, not yet accepting.
pub(crate) struct ApiListener {
    address: Multiaddr,
    listener: ListenerKind,
}

impl ApiListener {
    /// Binds the API address. TCP port zero is replaced by the bound port.
    pub(crate) fn bind(address: &Multiaddr) -> Result<Self, ServerError> {
        if let Some(socket) = address.tcp_socket_addr() {
            let listener = TcpListener::bind(socket).map_err(|source| ServerError::Bind {
                address: address.clone(),
                source,
            })?;
            let bound = listener.local_addr().map_err(|source| ServerError::Bind {
                address: address.clone(),
                source,
            })?;
            return Ok(Self {
                address: Multiaddr::from_socket_addr(bound),
                listener: ListenerKind::Tcp(listener),
            });
        }

        #[cfg(unix)]
        if let Some(path) = address.unix_path() {
            let listener = bind_unix(address, path)?;
            return Ok(Self {
                address: address.clone(),
                listener: ListenerKind::Unix(listener),
            });
        }

        Err(ServerError::UnsupportedAddress {
            address: address.clone(),
        })
    }

    /// Address clients should dial.
    pub(crate) fn address(&self) -> &Multiaddr {
        &self.address
    }

    /// Accepts connections until `shutdown` trips, then waits for in-flight
    /// handlers to finish.
    pub(crate) fn serve(
        self,
        handler: Arc<dyn ConnectionHandler>,
        shutdown: &CancelToken,
    ) -> Result<(), ServerError> {
        if let Err(source) = self.set_nonblocking() {
            self.cleanup();
            return Err(ServerError::NonBlocking { source });
        }
        info!(target: SERVER_TARGET, address = %self.address, "API listener active");

        let mut in_flight: Vec<thread::JoinHandle<()>> = Vec::new();
        let mut last_error = None::<io::ErrorKind>;
        while !shutdown.is_cancelled() {
            in_flight.retain(|handle| !handle.is_finished());
            match self.accept() {
                Ok(Some(connection)) => {
                    last_error = None;
                    let handler = Arc::clone(&handler);
                    in_flight.push(thread::spawn(move || handler.handle(connection)));
                }
                Ok(None) => thread::sleep(ACCEPT_BACKOFF),
                Err(error) => {
                    let kind = error.kind();
                    if last_error != Some(kind) {
                        warn!(target: SERVER_TARGET, error = %error, "API accept error");
                    }
                    last_error = Some(kind);
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }

        for handle in in_flight {
            if handle.join().is_err() {
                warn!(target: SERVER_TARGET, "request handler panicked");
            }
        }
        self.cleanup();
        Ok(())
    }

    fn set_nonblocking(&self) -> io::Result<()> {
        match &self.listener {
            ListenerKind::Tcp(listener) => listener.set_nonblocking(true),
            #[cfg(unix)]
            ListenerKind::Unix(listener) => listener.set_nonblocking(true),
        }
    }

    fn accept(&self) -> io::Result<Option<Connection>> {
        let accepted = match &self.listener {
            ListenerKind::Tcp(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(Connection::Tcp(stream))
            }),
            #[cfg(unix)]
            ListenerKind::Unix(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(Connection::Unix(stream))
            }),
        };
        match accepted {
            Ok(connection) => Ok(Some(connection)),
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(error),
        }
    }

    fn cleanup(&self) {
        #[cfg(unix)]
        if let Some(path) = self.address.unix_path()
            && let Err(error) = fs::remove_file(path)
            && error.kind() != io::ErrorKind::NotFound
        {
            warn!(
                target: SERVER_TARGET,
                error = %error,
                path = %path,
                "failed to remove unix socket file"
            );
        }
    }
}

/// Binds a unix socket, replacing a stale one left by a dead daemon.
#[cfg(unix)]
fn bind_unix(address: &Multiaddr, path: &Utf8Path) -> Result<UnixListener, ServerError> {
    let bind_error = |source| ServerError::Bind {
        address: address.clone(),
        source,
    };
    if path.exists() {
        let metadata = fs::symlink_metadata(path).map_err(bind_error)?;
        if !metadata.file_type().is_socket() {
            return Err(bind_error(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("'{path}' exists and is not a socket"),
            )));
        }
        match UnixStream::connect(path) {
            Ok(_stream) => {
                return Err(bind_error(io::Error::new(
                    io::ErrorKind::AddrInUse,
                    format!("another daemon is listening on '{path}'"),
                )));
            }
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
                ) =>
            {
                fs::remove_file(path).map_err(bind_error)?;
            }
            Err(error) => return Err(bind_error(error)),
        }
    }
    UnixListener::bind(path).map_err(bind_error)
}
