//! Hostname normalization
//!
//! Resolved hostnames become metric labels and domain keys, so variants that
//! only differ by an instance address or a cluster search-path expansion are
//! collapsed into one canonical form.
//!
//! Rules are evaluated in a fixed order and the first match wins:
//!
//! 1. reverse lookups (PTR) become `IP.in-addr.arpa` / `IP.ip6.arpa`
//! 2. `ip-a-b-c-d.<cloud internal suffix>` becomes `IP.<suffix>`
//! 3. `<name>[.svc.<ns> | .<ns>.svc | .svc][.<ns>].<cluster domain>` becomes
//!    `<name>.search_path_suffix`
//! 4. anything else is returned unchanged

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::NormalizerConfig;
use crate::error::{Error, Result};

const REVERSE_V4: &str = "IP.in-addr.arpa";
const REVERSE_V6: &str = "IP.ip6.arpa";
const SEARCH_PATH_SUFFIX: &str = "search_path_suffix";
const SERVICE_LABEL: &str = "svc";

static CLOUD_INSTANCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^ip-[0-9]{1,3}-[0-9]{1,3}-[0-9]{1,3}-[0-9]{1,3}\.(ec2|ec2\.internal|(?:[a-z0-9-]+\.)?compute\.internal)$",
    )
    .expect("invalid cloud instance regex")
});

static DEFAULT_NORMALIZER: LazyLock<FqdnNormalizer> =
    LazyLock::new(|| FqdnNormalizer::new(&NormalizerConfig::default()));

/// DNS record type of the question that produced a hostname
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    Aaaa,
    Ptr,
    Cname,
    Other(String),
}

impl FromStr for RecordType {
    type Err = Error;

    /// Accepts plain (`PTR`) and prefixed (`TypePTR`) spellings, case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let name = match s.get(..4) {
            Some(prefix) if prefix.eq_ignore_ascii_case("type") && s.len() > 4 => &s[4..],
            _ => s,
        };
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::invalid_input(format!("invalid record type '{}'", s)));
        }
        Ok(match name.to_ascii_uppercase().as_str() {
            "A" => RecordType::A,
            "AAAA" => RecordType::Aaaa,
            "PTR" => RecordType::Ptr,
            "CNAME" => RecordType::Cname,
            other => RecordType::Other(other.to_string()),
        })
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::A => f.write_str("A"),
            RecordType::Aaaa => f.write_str("AAAA"),
            RecordType::Ptr => f.write_str("PTR"),
            RecordType::Cname => f.write_str("CNAME"),
            RecordType::Other(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Rule {
    ReverseLookup,
    CloudInstance,
    SearchPath,
}

/// Precedence matters: instance hostnames are checked before suffix stripping.
const RULES: [Rule; 3] = [Rule::ReverseLookup, Rule::CloudInstance, Rule::SearchPath];

/// Ordered rule cascade collapsing hostnames into canonical forms
#[derive(Debug, Clone)]
pub struct FqdnNormalizer {
    /// Lowercased labels of the cluster domain, e.g. ["cluster", "local"]
    cluster_labels: Vec<String>,
    /// Lowercased namespaces also stripped when they end the name without svc
    namespaces: HashSet<String>,
}

impl FqdnNormalizer {
    /// Build a normalizer from configuration
    pub fn new(config: &NormalizerConfig) -> Self {
        let cluster_labels = config
            .cluster_domain
            .trim_matches('.')
            .split('.')
            .map(|l| l.to_ascii_lowercase())
            .collect();
        let namespaces = config
            .namespaces
            .iter()
            .map(|ns| ns.to_ascii_lowercase())
            .collect();

        Self {
            cluster_labels,
            namespaces,
        }
    }

    /// Normalize a hostname reported for a question of `record_type`
    ///
    /// Total and idempotent: unmatched names are returned as-is.
    pub fn normalize(&self, fqdn: &str, record_type: &RecordType) -> String {
        RULES
            .iter()
            .find_map(|rule| self.apply(*rule, fqdn, record_type))
            .unwrap_or_else(|| fqdn.to_string())
    }

    fn apply(&self, rule: Rule, fqdn: &str, record_type: &RecordType) -> Option<String> {
        let name = fqdn.strip_suffix('.').unwrap_or(fqdn);
        match rule {
            Rule::ReverseLookup => reverse_lookup(name, record_type),
            Rule::CloudInstance => CLOUD_INSTANCE
                .captures(name)
                .map(|caps| format!("IP.{}", &caps[1])),
            Rule::SearchPath => self.strip_search_path(name),
        }
    }

    fn strip_search_path(&self, name: &str) -> Option<String> {
        let labels: Vec<&str> = name.split('.').collect();
        let root = self.cluster_labels.len();
        if labels.len() <= root {
            return None;
        }

        let (head, tail) = labels.split_at(labels.len() - root);
        let is_cluster_root = tail
            .iter()
            .zip(&self.cluster_labels)
            .all(|(l, c)| l.eq_ignore_ascii_case(c));
        if !is_cluster_root {
            return None;
        }

        let is_svc = |label: &str| label.eq_ignore_ascii_case(SERVICE_LABEL);
        let mut end = head.len();
        if end >= 3 && is_svc(head[end - 2]) {
            // `svc.<namespace>`: the namespace follows svc, whatever its name
            end -= 2;
        } else if end >= 2 && is_svc(head[end - 1]) {
            // `<namespace>.svc`: the label before svc is only a namespace
            // when a name of at least two labels is left in front of it
            end -= 1;
            if end >= 3 {
                end -= 1;
            }
        }

        while end > 2 && self.namespaces.contains(&head[end - 1].to_ascii_lowercase()) {
            end -= 1;
        }

        Some(format!("{}.{}", head[..end].join("."), SEARCH_PATH_SUFFIX))
    }
}

impl Default for FqdnNormalizer {
    fn default() -> Self {
        Self::new(&NormalizerConfig::default())
    }
}

fn reverse_lookup(name: &str, record_type: &RecordType) -> Option<String> {
    if *record_type != RecordType::Ptr {
        return None;
    }
    let is_v6 = name
        .get(name.len().saturating_sub(8)..)
        .is_some_and(|tail| tail.eq_ignore_ascii_case("ip6.arpa"));
    Some(if is_v6 { REVERSE_V6 } else { REVERSE_V4 }.to_string())
}

/// Normalize a hostname with the default cluster settings.
pub fn normalize_fqdn(fqdn: &str, record_type: &RecordType) -> String {
    DEFAULT_NORMALIZER.normalize(fqdn, record_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(fqdn: &str) -> String {
        normalize_fqdn(fqdn, &RecordType::A)
    }

    #[test]
    fn test_reverse_lookup() {
        assert_eq!(normalize_fqdn("4.3.2.1.in-addr.arpa", &RecordType::Ptr), "IP.in-addr.arpa");
        assert_eq!(
            normalize_fqdn(
                "1.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.8.b.d.0.1.0.0.2.ip6.arpa",
                &RecordType::Ptr
            ),
            "IP.ip6.arpa"
        );
        // Only the question type matters, not the name.
        assert_eq!(normalize_fqdn("coroot.com", &RecordType::Ptr), "IP.in-addr.arpa");
        assert_eq!(a("4.3.2.1.in-addr.arpa"), "4.3.2.1.in-addr.arpa");
    }

    #[test]
    fn test_cloud_instance() {
        assert_eq!(a("ip-172-1-2-3.ec2.internal"), "IP.ec2.internal");
        assert_eq!(a("ip-172-1-2-3.ec2"), "IP.ec2");
        assert_eq!(a("ip-10-0-12-7.us-west-2.compute.internal"), "IP.us-west-2.compute.internal");
        assert_eq!(a("ip-10-0-12-7.compute.internal"), "IP.compute.internal");

        assert_eq!(a("ip-172-1-2-3.example.com"), "ip-172-1-2-3.example.com");
        assert_eq!(a("ip-172-1-2.ec2.internal"), "ip-172-1-2.ec2.internal");
        assert_eq!(a("my-ip-172-1-2-3.ec2.internal"), "my-ip-172-1-2-3.ec2.internal");
        // Only ASCII digits form an instance address
        assert_eq!(a("ip-١٧٢-1-2-3.ec2"), "ip-١٧٢-1-2-3.ec2");
    }

    #[test]
    fn test_search_path() {
        assert_eq!(a("example.com"), "example.com");
        assert_eq!(a("example.com.cluster.local"), "example.com.search_path_suffix");
        assert_eq!(a("example.com.svc.cluster.local"), "example.com.search_path_suffix");
        assert_eq!(a("example.com.svc.default.cluster.local"), "example.com.search_path_suffix");
        assert_eq!(a("example.com.default.svc.cluster.local"), "example.com.search_path_suffix");
        assert_eq!(a("example.net.svc.default.cluster.local"), "example.net.search_path_suffix");
        assert_eq!(a("example.org.svc.default.cluster.local"), "example.org.search_path_suffix");
        assert_eq!(a("example.io.svc.default.cluster.local"), "example.io.search_path_suffix");
        assert_eq!(a("Example.COM.SVC.Cluster.Local"), "Example.COM.search_path_suffix");
    }

    #[test]
    fn test_search_path_any_namespace() {
        // Namespaces outside the configured list, in both label orders
        assert_eq!(
            a("example.com.monitoring.svc.cluster.local"),
            "example.com.search_path_suffix"
        );
        assert_eq!(
            a("example.com.svc.monitoring.cluster.local"),
            "example.com.search_path_suffix"
        );
        assert_eq!(a("api.stripe.com.payments.svc.cluster.local"), "api.stripe.com.search_path_suffix");
        assert_eq!(a("db.svc.monitoring.cluster.local"), "db.search_path_suffix");
    }

    #[test]
    fn test_search_path_service_names_do_not_depend_on_namespace() {
        assert_eq!(a("redis.default.svc.cluster.local"), "redis.default.search_path_suffix");
        assert_eq!(a("redis.monitoring.svc.cluster.local"), "redis.monitoring.search_path_suffix");
    }

    #[test]
    fn test_search_path_namespace_without_svc() {
        // Configured namespaces are stripped even without svc, unknown ones are not
        assert_eq!(a("example.com.kube-system.cluster.local"), "example.com.search_path_suffix");
        assert_eq!(
            a("example.com.monitoring.cluster.local"),
            "example.com.monitoring.search_path_suffix"
        );
        assert_eq!(a("cluster.local"), "cluster.local");
        assert_eq!(a("redis.cluster.local"), "redis.search_path_suffix");
    }

    #[test]
    fn test_custom_cluster_domain() {
        let normalizer = FqdnNormalizer::new(&NormalizerConfig {
            cluster_domain: "k8s.internal".to_string(),
            namespaces: vec!["prod".to_string()],
        });

        assert_eq!(
            normalizer.normalize("api.stripe.com.prod.svc.k8s.internal", &RecordType::A),
            "api.stripe.com.search_path_suffix"
        );
        assert_eq!(
            normalizer.normalize("example.com.k8s.internal", &RecordType::A),
            "example.com.search_path_suffix"
        );
        // "default" is not in this normalizer's list, so it stays without svc
        assert_eq!(
            normalizer.normalize("example.com.default.k8s.internal", &RecordType::A),
            "example.com.default.search_path_suffix"
        );
        assert_eq!(
            normalizer.normalize("example.com.svc.cluster.local", &RecordType::A),
            "example.com.svc.cluster.local"
        );
    }

    #[test]
    fn test_unchanged() {
        assert_eq!(a("coroot.com"), "coroot.com");
        assert_eq!(a("CoRoot.com"), "CoRoot.com");
        assert_eq!(a("coroot.com."), "coroot.com.");
        assert_eq!(a(""), "");
    }

    #[test]
    fn test_idempotent() {
        let cases = [
            ("4.3.2.1.in-addr.arpa", RecordType::Ptr),
            ("x.ip6.arpa", RecordType::Ptr),
            ("ip-172-1-2-3.ec2.internal", RecordType::A),
            ("ip-172-1-2-3.ec2.", RecordType::Aaaa),
            ("example.com.svc.default.cluster.local", RecordType::A),
            ("redis.default.svc.cluster.local", RecordType::A),
            ("example.com.svc.monitoring.cluster.local", RecordType::A),
            ("coroot.com", RecordType::Cname),
        ];
        for (fqdn, t) in cases {
            let once = normalize_fqdn(fqdn, &t);
            assert_eq!(normalize_fqdn(&once, &t), once, "not idempotent for {}", fqdn);
        }
    }

    #[test]
    fn test_record_type_parse() {
        assert_eq!("TypePTR".parse::<RecordType>().unwrap(), RecordType::Ptr);
        assert_eq!("TypeA".parse::<RecordType>().unwrap(), RecordType::A);
        assert_eq!("aaaa".parse::<RecordType>().unwrap(), RecordType::Aaaa);
        assert_eq!("CNAME".parse::<RecordType>().unwrap(), RecordType::Cname);
        assert_eq!(
            "TypeSRV".parse::<RecordType>().unwrap(),
            RecordType::Other("SRV".to_string())
        );
        // "Type" alone is treated as a record name, not an empty prefix.
        assert_eq!(
            "Type".parse::<RecordType>().unwrap(),
            RecordType::Other("TYPE".to_string())
        );
        assert!("".parse::<RecordType>().is_err());
        assert!("Type-A".parse::<RecordType>().is_err());
        assert_eq!(RecordType::Ptr.to_string(), "PTR");
    }
}
