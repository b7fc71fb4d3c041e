use std::net::{Ipv4Addr, SocketAddr};

use crate::logging::LogFormat;
use crate::multiaddr::Multiaddr;

/// Address a freshly initialised repository configures for the daemon API.
pub const DEFAULT_API_ADDRESS: &str = "/ip4/127.0.0.1/tcp/5001";

/// Default log filter expression used by the CLI and the daemon.
pub const DEFAULT_LOG_FILTER: &str = "warn";

const DEFAULT_API_PORT: u16 = 5001;

/// Default log filter expression used by the CLI and the daemon.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format. The CLI talks to humans first.
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// API address written into new repository configurations.
pub fn default_api_address() -> Multiaddr {
    Multiaddr::from_socket_addr(SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_API_PORT)))
}
