// # netclass-core
//
// Traffic classification and cardinality reduction for a node-resident
// observability agent.
//
// ## Architecture Overview
//
// A lower-level collector reports DNS answers and outbound connections.
// This library decides which connections are worth a metric and which
// label the metric gets:
// - **addr**: private/public classification and boundary parsers
// - **fqdn**: collapses hostname variants into bounded canonical forms
// - **DomainTracker**: per-hostname resolved IP sets and the `specify_ip` flag
// - **ConnectionFilter**: static and learned whitelist, skip/keep decisions
// - **DestinationKey**: stable text key used as a metric label value
// - **ObservationSource**: stream of DNS answers and connections from the capture layer
// - **ClassifierEngine**: drives all of the above from an observation stream
//
// ## Design Principles
//
// 1. **Instance-owned state**: filter and tracker are values owned by a
//    `Classifier`, never process globals
// 2. **Total operations**: classification never fails; malformed input is
//    rejected by the parsers at the boundary
// 3. **In-memory only**: learned state is rebuilt by observation after restart

pub mod addr;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod filter;
pub mod fqdn;
pub mod key;
pub mod traits;

// Re-export core types for convenience
pub use addr::{is_private, parse_endpoint, parse_ip, parse_prefix};
pub use config::{ClassifierConfig, EngineConfig, NormalizerConfig};
pub use domain::{Domain, DomainTracker};
pub use engine::{Classifier, ClassifierEngine, ClassifierEvent, Verdict};
pub use error::{Error, Result};
pub use filter::ConnectionFilter;
pub use fqdn::{FqdnNormalizer, RecordType, normalize_fqdn};
pub use key::DestinationKey;
pub use traits::{Observation, ObservationSource};
