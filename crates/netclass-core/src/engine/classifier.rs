//! The classifier: one filter, one tracker and one normalizer, owned together
//! so a process (or a test) holds exactly one instance of each.

use std::net::{IpAddr, SocketAddr};

use tracing::trace;

use crate::config::ClassifierConfig;
use crate::domain::{Domain, DomainTracker};
use crate::error::Result;
use crate::filter::ConnectionFilter;
use crate::fqdn::{FqdnNormalizer, RecordType};
use crate::key::DestinationKey;

/// Outcome of classifying a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Not worth a metric
    Skipped,
    /// Report under `key`
    Kept { key: DestinationKey },
}

/// Classification context shared by every observation path
#[derive(Debug, Default)]
pub struct Classifier {
    filter: ConnectionFilter,
    tracker: DomainTracker,
    normalizer: FqdnNormalizer,
}

impl Classifier {
    /// Create a classifier with default settings and an empty whitelist
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a classifier from configuration
    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            filter: ConnectionFilter::with_prefixes(config.whitelist.iter().copied()),
            tracker: DomainTracker::new(),
            normalizer: FqdnNormalizer::new(&config.normalizer),
        })
    }

    pub fn filter(&self) -> &ConnectionFilter {
        &self.filter
    }

    pub fn tracker(&self) -> &DomainTracker {
        &self.tracker
    }

    pub fn normalizer(&self) -> &FqdnNormalizer {
        &self.normalizer
    }

    /// Record a DNS answer under its canonical hostname
    ///
    /// Reverse lookups carry no forward addresses and are only normalized.
    /// Returns the canonical hostname.
    pub fn record_resolution(
        &self,
        fqdn: &str,
        record_type: &RecordType,
        ips: impl IntoIterator<Item = IpAddr>,
    ) -> String {
        let name = self.normalizer.normalize(fqdn, record_type);
        if *record_type != RecordType::Ptr {
            self.tracker.record_resolution(&name, ips);
        }
        name
    }

    /// Domain snapshot for a connection's destination
    ///
    /// Uses the hostname reported with the connection when there is one,
    /// otherwise the hostname the destination address was last resolved from.
    pub fn domain_for(&self, destination: IpAddr, fqdn: Option<&str>) -> Option<Domain> {
        match fqdn {
            Some(fqdn) => self
                .tracker
                .lookup(&self.normalizer.normalize(fqdn, &RecordType::A)),
            None => self
                .tracker
                .fqdn_for(destination)
                .and_then(|name| self.tracker.lookup(&name)),
        }
    }

    /// Decide whether to report a connection, and under which key
    pub fn classify(
        &self,
        destination: SocketAddr,
        actual_destination: SocketAddr,
        fqdn: Option<&str>,
    ) -> Verdict {
        if self
            .filter
            .should_be_skipped(destination.ip(), actual_destination.ip())
        {
            return Verdict::Skipped;
        }

        let domain = self.domain_for(destination.ip(), fqdn);
        let key = DestinationKey::new(destination, actual_destination, domain.as_ref());
        trace!("Keeping {} -> {} as '{}'", destination, actual_destination, key);
        Verdict::Kept { key }
    }
}
