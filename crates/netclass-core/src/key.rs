//! Destination keys
//!
//! A destination key is the label value a connection metric is reported
//! under: `"<destination> (<actual destination>)"`. For hostnames that
//! rotate across many public addresses the key collapses to
//! `"<fqdn>:<port> ()"`.

use std::fmt;
use std::net::SocketAddr;

use crate::domain::Domain;

/// Aggregation key for a connection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DestinationKey {
    destination: String,
    actual_destination: String,
}

impl DestinationKey {
    /// Build a key from a connection and the domain its destination resolved from
    pub fn new(
        destination: SocketAddr,
        actual_destination: SocketAddr,
        domain: Option<&Domain>,
    ) -> Self {
        match domain {
            Some(domain) if !domain.specify_ip() => Self {
                destination: format!("{}:{}", domain.fqdn, destination.port()),
                actual_destination: String::new(),
            },
            _ => Self {
                destination: destination.to_string(),
                actual_destination: actual_destination.to_string(),
            },
        }
    }

    /// Primary label: `ip:port` or `fqdn:port`
    pub fn destination_label(&self) -> &str {
        &self.destination
    }

    /// Detail label: the actual `ip:port`, empty for ambiguous domains
    pub fn actual_destination_label(&self) -> &str {
        &self.actual_destination
    }
}

impl fmt::Display for DestinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.destination, self.actual_destination)
    }
}
