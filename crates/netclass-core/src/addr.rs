//! Address classification and boundary parsers
//!
//! Everything past this module works on typed `IpAddr`, `SocketAddr` and
//! `IpNet` values; text is only accepted here.

use std::net::{IpAddr, SocketAddr};

use ipnet::IpNet;

use crate::error::{Error, Result};

/// Returns true for loopback, link-local and private/unique-local addresses.
///
/// IPv4-mapped IPv6 addresses are classified as the IPv4 address they carry,
/// so `::ffff:10.0.0.1` is private just like `10.0.0.1`.
pub fn is_private(addr: IpAddr) -> bool {
    match addr.to_canonical() {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unique_local() || v6.is_unicast_link_local(),
    }
}

/// Host-exact prefix (`/32` or `/128`) for an address.
pub fn host_prefix(addr: IpAddr) -> IpNet {
    IpNet::from(addr.to_canonical())
}

/// Parse a bare IP address.
pub fn parse_ip(s: &str) -> Result<IpAddr> {
    s.trim()
        .parse()
        .map_err(|e| Error::invalid_input(format!("invalid IP address '{}': {}", s, e)))
}

/// Parse an `ip:port` endpoint (`[v6]:port` for IPv6).
pub fn parse_endpoint(s: &str) -> Result<SocketAddr> {
    s.trim()
        .parse()
        .map_err(|e| Error::invalid_input(format!("invalid endpoint '{}': {}", s, e)))
}

/// Parse a CIDR prefix. A bare address is accepted as a host-exact prefix.
///
/// Host bits are cleared, so `2.2.2.7/24` and `2.2.2.0/24` are the same prefix.
pub fn parse_prefix(s: &str) -> Result<IpNet> {
    let s = s.trim();
    if !s.contains('/') {
        return parse_ip(s).map(host_prefix);
    }
    s.parse::<IpNet>()
        .map(|net| net.trunc())
        .map_err(|e| Error::invalid_input(format!("invalid prefix '{}': {}", s, e)))
}
