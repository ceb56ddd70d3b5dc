//! Resolved-address tracking per hostname
//!
//! The tracker answers one question for the key formatter: is a specific
//! backend address informative for this hostname, or does the hostname
//! rotate across so many public addresses that only the name is stable?

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::net::IpAddr;
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use crate::addr::is_private;

/// Everything known about one hostname
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    /// Canonical hostname
    pub fqdn: String,
    /// Distinct addresses the hostname has resolved to
    pub ips: BTreeSet<IpAddr>,
}

impl Domain {
    /// Build a domain snapshot from a hostname and its addresses
    pub fn new(fqdn: impl Into<String>, ips: impl IntoIterator<Item = IpAddr>) -> Self {
        Self {
            fqdn: fqdn.into(),
            ips: ips.into_iter().map(|ip| ip.to_canonical()).collect(),
        }
    }

    /// True unless the hostname resolved to two or more distinct public addresses
    pub fn specify_ip(&self) -> bool {
        self.ips.iter().filter(|ip| !is_private(**ip)).take(2).count() < 2
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Domain({},{})", self.fqdn, self.specify_ip())
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    domains: HashMap<String, Domain>,
    /// Most recent hostname each address was seen under
    by_ip: HashMap<IpAddr, String>,
}

/// Thread-safe registry of hostname resolutions
///
/// The address sets only grow; callers that need a bound call [`reset`]
/// periodically.
///
/// [`reset`]: DomainTracker::reset
#[derive(Debug, Default)]
pub struct DomainTracker {
    inner: RwLock<TrackerState>,
}

impl DomainTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a resolution into the hostname's address set
    ///
    /// Creates the domain on first sight. Re-adding known addresses is a no-op.
    pub fn record_resolution(&self, fqdn: &str, ips: impl IntoIterator<Item = IpAddr>) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let state = &mut *guard;

        let domain = state.domains.entry(fqdn.to_string()).or_insert_with(|| {
            debug!("Tracking new domain {}", fqdn);
            Domain {
                fqdn: fqdn.to_string(),
                ips: BTreeSet::new(),
            }
        });

        for ip in ips {
            let ip = ip.to_canonical();
            domain.ips.insert(ip);
            if state.by_ip.get(&ip).map(String::as_str) != Some(fqdn) {
                state.by_ip.insert(ip, fqdn.to_string());
            }
        }
    }

    /// Point-in-time copy of a domain
    pub fn lookup(&self, fqdn: &str) -> Option<Domain> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.domains.get(fqdn).cloned()
    }

    /// Hostname an address was most recently resolved from
    pub fn fqdn_for(&self, ip: IpAddr) -> Option<String> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.by_ip.get(&ip.to_canonical()).cloned()
    }

    /// Tracked hostnames, sorted
    pub fn fqdns(&self) -> Vec<String> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = guard.domains.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of tracked hostnames
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).domains.len()
    }

    /// Check if no hostname is tracked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every resolution
    pub fn reset(&self) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.domains.clear();
        guard.by_ip.clear();
    }
}
