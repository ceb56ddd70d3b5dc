//! Configuration types for the classifier
//!
//! Configuration is optional: `ClassifierConfig::default()` describes a
//! classifier with an empty static whitelist and the stock Kubernetes
//! search-path labels.

use std::path::Path;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main classifier configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Operator-configured always-allow prefixes
    #[serde(default)]
    pub whitelist: Vec<IpNet>,

    /// Hostname normalization settings
    #[serde(default)]
    pub normalizer: NormalizerConfig,

    /// Engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl ClassifierConfig {
    /// Parse a configuration from a JSON document
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.normalizer.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// Hostname normalization settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Cluster-local DNS root, e.g. "cluster.local"
    #[serde(default = "default_cluster_domain")]
    pub cluster_domain: String,

    /// Namespaces stripped from a search-path suffix even without an adjacent `svc`
    ///
    /// The label next to `svc` is treated as a namespace whether listed or not.
    #[serde(default = "default_namespaces")]
    pub namespaces: Vec<String>,
}

impl NormalizerConfig {
    /// Validate the normalizer configuration
    pub fn validate(&self) -> Result<()> {
        if self.cluster_domain.is_empty() {
            return Err(Error::config("cluster domain cannot be empty"));
        }
        for label in self.cluster_domain.split('.') {
            if !is_valid_label(label) {
                return Err(Error::config(format!(
                    "cluster domain '{}' has an invalid label '{}'",
                    self.cluster_domain, label
                )));
            }
        }
        for ns in &self.namespaces {
            if !is_valid_label(ns) {
                return Err(Error::config(format!(
                    "namespace '{}' is not a single DNS label",
                    ns
                )));
            }
        }
        Ok(())
    }
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            cluster_domain: default_cluster_domain(),
            namespaces: default_namespaces(),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the outgoing event channel
    ///
    /// When full, new events are dropped with a warning log.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<()> {
        if self.event_channel_capacity == 0 {
            return Err(Error::config("event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= 63
        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        && !label.starts_with('-')
        && !label.ends_with('-')
}

fn default_cluster_domain() -> String {
    "cluster.local".to_string()
}

fn default_namespaces() -> Vec<String> {
    vec![
        "default".to_string(),
        "kube-system".to_string(),
        "kube-public".to_string(),
    ]
}

fn default_event_channel_capacity() -> usize {
    1000
}
