//! Self-describing network addresses for daemon API endpoints.
//!
//! Addresses use the slash-delimited multiaddress notation, for example
//! `/ip4/127.0.0.1/tcp/5001`, `/dns4/node.example/tcp/5001`, or
//! `/unix/run/ipfs/api.sock`. Only the protocols the front end can meaningfully
//! describe are recognised; anything else is rejected at parse time.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One component of a [`Multiaddr`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// IPv4 host address.
    Ip4(Ipv4Addr),
    /// IPv6 host address.
    Ip6(Ipv6Addr),
    /// DNS name resolving to either address family.
    Dns(String),
    /// DNS name restricted to IPv4 results.
    Dns4(String),
    /// DNS name restricted to IPv6 results.
    Dns6(String),
    /// TCP port.
    Tcp(u16),
    /// UDP port.
    Udp(u16),
    /// Filesystem path of a local socket. Consumes the rest of the address.
    Unix(Utf8PathBuf),
    /// QUIC (draft) transport marker.
    Quic,
    /// QUIC v1 transport marker.
    QuicV1,
    /// HTTP application marker.
    Http,
    /// HTTPS application marker.
    Https,
    /// WebSocket marker.
    Ws,
    /// Secure WebSocket marker.
    Wss,
    /// Peer identity.
    P2p(String),
}

impl Protocol {
    /// Protocol name as it appears in the textual form.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ip4(_) => "ip4",
            Self::Ip6(_) => "ip6",
            Self::Dns(_) => "dns",
            Self::Dns4(_) => "dns4",
            Self::Dns6(_) => "dns6",
            Self::Tcp(_) => "tcp",
            Self::Udp(_) => "udp",
            Self::Unix(_) => "unix",
            Self::Quic => "quic",
            Self::QuicV1 => "quic-v1",
            Self::Http => "http",
            Self::Https => "https",
            Self::Ws => "ws",
            Self::Wss => "wss",
            Self::P2p(_) => "p2p",
        }
    }

    /// Returns true for components naming a host that still needs a lookup.
    #[must_use]
    pub const fn is_dns(&self) -> bool {
        matches!(self, Self::Dns(_) | Self::Dns4(_) | Self::Dns6(_))
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        match self {
            Self::Ip4(address) => write!(formatter, "/{name}/{address}"),
            Self::Ip6(address) => write!(formatter, "/{name}/{address}"),
            Self::Dns(host) | Self::Dns4(host) | Self::Dns6(host) | Self::P2p(host) => {
                write!(formatter, "/{name}/{host}")
            }
            Self::Tcp(port) | Self::Udp(port) => write!(formatter, "/{name}/{port}"),
            Self::Unix(path) => {
                let path = path.as_str();
                if path.starts_with('/') {
                    write!(formatter, "/{name}{path}")
                } else {
                    write!(formatter, "/{name}/{path}")
                }
            }
            Self::Quic | Self::QuicV1 | Self::Http | Self::Https | Self::Ws | Self::Wss => {
                write!(formatter, "/{name}")
            }
        }
    }
}

/// Ordered stack of protocol components describing how to reach a peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Multiaddr {
    protocols: Vec<Protocol>,
}

impl Multiaddr {
    /// Builds an address from its components.
    ///
    /// Returns `None` when `protocols` is empty.
    #[must_use]
    pub fn new(protocols: Vec<Protocol>) -> Option<Self> {
        if protocols.is_empty() {
            None
        } else {
            Some(Self { protocols })
        }
    }

    /// Builds a TCP address from a socket address.
    #[must_use]
    pub fn from_socket_addr(address: SocketAddr) -> Self {
        let host = match address.ip() {
            IpAddr::V4(ip) => Protocol::Ip4(ip),
            IpAddr::V6(ip) => Protocol::Ip6(ip),
        };
        Self {
            protocols: vec![host, Protocol::Tcp(address.port())],
        }
    }

    /// Builds a local-socket address.
    #[must_use]
    pub fn unix(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            protocols: vec![Protocol::Unix(path.into())],
        }
    }

    /// Components in order, outermost first.
    #[must_use]
    pub fn protocols(&self) -> &[Protocol] {
        &self.protocols
    }

    /// Returns true when no component requires a name lookup.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !self.protocols.iter().any(Protocol::is_dns)
    }

    /// Socket path for local-socket addresses.
    #[must_use]
    pub fn unix_path(&self) -> Option<&Utf8Path> {
        match self.protocols.as_slice() {
            [Protocol::Unix(path)] => Some(path.as_path()),
            _ => None,
        }
    }

    /// Concrete socket address for addresses starting `/ip4|ip6/<host>/tcp/<port>`.
    ///
    /// Trailing components such as `/http` do not change where to connect.
    #[must_use]
    pub fn tcp_socket_addr(&self) -> Option<SocketAddr> {
        match self.protocols.as_slice() {
            [Protocol::Ip4(ip), Protocol::Tcp(port), ..] => Some(SocketAddr::from((*ip, *port))),
            [Protocol::Ip6(ip), Protocol::Tcp(port), ..] => Some(SocketAddr::from((*ip, *port))),
            _ => None,
        }
    }

    /// Returns a copy with the first component replaced.
    #[must_use]
    pub fn with_first(&self, protocol: Protocol) -> Self {
        let mut protocols = self.protocols.clone();
        if let Some(first) = protocols.first_mut() {
            *first = protocol;
        }
        Self { protocols }
    }
}

impl fmt::Display for Multiaddr {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        for protocol in &self.protocols {
            write!(formatter, "{protocol}")?;
        }
        Ok(())
    }
}

impl From<Multiaddr> for String {
    fn from(address: Multiaddr) -> Self {
        address.to_string()
    }
}

impl TryFrom<String> for Multiaddr {
    type Error = MultiaddrParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for Multiaddr {
    type Err = MultiaddrParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(MultiaddrParseError::Empty);
        }
        let Some(body) = trimmed.strip_prefix('/') else {
            return Err(MultiaddrParseError::MissingLeadingSlash(input.to_owned()));
        };

        let mut segments = body.trim_end_matches('/').split('/');
        let mut protocols = Vec::new();
        while let Some(name) = segments.next() {
            let parser = SegmentParser { input, protocol: name };
            let protocol = match name {
                "ip4" => Protocol::Ip4(parser.parse(segments.next())?),
                "ip6" => Protocol::Ip6(parser.parse(segments.next())?),
                "dns" => Protocol::Dns(parser.required(segments.next())?.to_owned()),
                "dns4" => Protocol::Dns4(parser.required(segments.next())?.to_owned()),
                "dns6" => Protocol::Dns6(parser.required(segments.next())?.to_owned()),
                "tcp" => Protocol::Tcp(parser.parse(segments.next())?),
                "udp" => Protocol::Udp(parser.parse(segments.next())?),
                "p2p" | "ipfs" => Protocol::P2p(parser.required(segments.next())?.to_owned()),
                "unix" => {
                    let rest: Vec<&str> = segments.by_ref().collect();
                    let path = rest.join("/");
                    parser.required(Some(path.as_str()))?;
                    Protocol::Unix(Utf8PathBuf::from(format!("/{path}")))
                }
                "quic" => Protocol::Quic,
                "quic-v1" => Protocol::QuicV1,
                "http" => Protocol::Http,
                "https" => Protocol::Https,
                "ws" => Protocol::Ws,
                "wss" => Protocol::Wss,
                other => {
                    return Err(MultiaddrParseError::UnknownProtocol {
                        protocol: other.to_owned(),
                        input: input.to_owned(),
                    });
                }
            };
            protocols.push(protocol);
        }

        Self::new(protocols).ok_or(MultiaddrParseError::Empty)
    }
}

struct SegmentParser<'a> {
    input: &'a str,
    protocol: &'a str,
}

impl<'a> SegmentParser<'a> {
    fn required<'v>(&self, value: Option<&'v str>) -> Result<&'v str, MultiaddrParseError> {
        value
            .filter(|value| !value.is_empty())
            .ok_or_else(|| MultiaddrParseError::MissingValue {
                protocol: self.protocol.to_owned(),
                input: self.input.to_owned(),
            })
    }

    fn parse<T: FromStr>(&self, value: Option<&str>) -> Result<T, MultiaddrParseError> {
        let raw = self.required(value)?;
        raw.parse().map_err(|_| MultiaddrParseError::InvalidValue {
            protocol: self.protocol.to_owned(),
            value: raw.to_owned(),
            input: self.input.to_owned(),
        })
    }
}

/// Errors encountered while parsing a [`Multiaddr`] from text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MultiaddrParseError {
    /// The address contained no components.
    #[error("multiaddress must not be empty")]
    Empty,
    /// The address did not begin with `/`.
    #[error("multiaddress '{0}' must begin with '/'")]
    MissingLeadingSlash(String),
    /// A component named a protocol this front end does not understand.
    #[error("unknown protocol '{protocol}' in multiaddress '{input}'")]
    UnknownProtocol { protocol: String, input: String },
    /// A component that carries a value had none.
    #[error("protocol '{protocol}' requires a value in multiaddress '{input}'")]
    MissingValue { protocol: String, input: String },
    /// A component value failed to parse.
    #[error("invalid {protocol} value '{value}' in multiaddress '{input}'")]
    InvalidValue {
        protocol: String,
        value: String,
        input: String,
    },
}
