//! Connection filter
//!
//! Public-to-public connections are treated as bulk internet traffic and
//! skipped. Anything that touches a private or whitelisted address is kept.
//! When a public-looking destination is observed to actually land on a
//! private or whitelisted endpoint, the destination itself is learned into
//! the whitelist, so later connections to it are kept whatever their
//! actual endpoint turns out to be.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::{PoisonError, RwLock};

use ipnet::IpNet;
use tracing::{debug, info, trace};

use crate::addr::{host_prefix, is_private};

/// Whitelisted prefixes, split so matching cost does not grow with learning
#[derive(Debug, Default)]
struct Whitelist {
    /// Host-exact entries, learned or configured: hash lookup only
    hosts: HashSet<IpAddr>,
    /// Wider operator prefixes: scanned
    prefixes: HashSet<IpNet>,
}

impl Whitelist {
    fn insert(&mut self, prefix: IpNet) -> bool {
        let prefix = prefix.trunc();
        if prefix.prefix_len() == prefix.max_prefix_len() {
            self.hosts.insert(prefix.addr())
        } else {
            self.prefixes.insert(prefix)
        }
    }

    fn matches(&self, ip: IpAddr) -> bool {
        self.hosts.contains(&ip) || self.prefixes.iter().any(|prefix| prefix.contains(&ip))
    }

    fn len(&self) -> usize {
        self.hosts.len() + self.prefixes.len()
    }
}

/// Whitelist-driven skip/keep decisions
///
/// The whitelist only grows for the lifetime of the filter.
#[derive(Debug, Default)]
pub struct ConnectionFilter {
    whitelist: RwLock<Whitelist>,
}

impl ConnectionFilter {
    /// Create a filter with an empty whitelist
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a filter pre-seeded with operator prefixes
    pub fn with_prefixes(prefixes: impl IntoIterator<Item = IpNet>) -> Self {
        let filter = Self::new();
        for prefix in prefixes {
            filter.whitelist_prefix(prefix);
        }
        filter
    }

    /// Always keep connections to or through `prefix`
    pub fn whitelist_prefix(&self, prefix: IpNet) {
        let mut whitelist = self.whitelist.write().unwrap_or_else(PoisonError::into_inner);
        if whitelist.insert(prefix) {
            info!("Whitelisted prefix {}", prefix.trunc());
        }
    }

    /// Decide whether a connection should be left out of reporting
    ///
    /// `destination` is where the connection was directed, `actual_destination`
    /// where it was observed to arrive (post-NAT / load balancing).
    ///
    /// Once this returns false because of the actual destination, the
    /// destination is whitelisted before returning, so every later call for
    /// the same destination also returns false.
    pub fn should_be_skipped(&self, destination: IpAddr, actual_destination: IpAddr) -> bool {
        let destination = destination.to_canonical();
        let actual_destination = actual_destination.to_canonical();

        {
            let whitelist = self.whitelist.read().unwrap_or_else(PoisonError::into_inner);
            if is_private(destination) || whitelist.matches(destination) {
                return false;
            }
            if !is_private(actual_destination) && !whitelist.matches(actual_destination) {
                trace!("Skipping {} -> {}", destination, actual_destination);
                return true;
            }
        }

        // The whitelist never shrinks, so the decision above still holds.
        let mut whitelist = self.whitelist.write().unwrap_or_else(PoisonError::into_inner);
        if whitelist.hosts.insert(destination) {
            debug!(
                "Learned {} (actual destination {} is internal)",
                destination, actual_destination
            );
        }
        false
    }

    /// Check if an address falls into any whitelisted prefix
    pub fn is_whitelisted(&self, ip: IpAddr) -> bool {
        let whitelist = self.whitelist.read().unwrap_or_else(PoisonError::into_inner);
        whitelist.matches(ip.to_canonical())
    }

    /// Sorted snapshot of the whitelist
    pub fn prefixes(&self) -> Vec<IpNet> {
        let whitelist = self.whitelist.read().unwrap_or_else(PoisonError::into_inner);
        let mut prefixes: Vec<IpNet> = whitelist
            .hosts
            .iter()
            .map(|ip| host_prefix(*ip))
            .chain(whitelist.prefixes.iter().copied())
            .collect();
        prefixes.sort();
        prefixes
    }

    /// Number of whitelisted prefixes, static and learned
    pub fn whitelist_len(&self) -> usize {
        self.whitelist.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}
