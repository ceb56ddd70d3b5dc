//! Classifier engine
//!
//! The ClassifierEngine is responsible for:
//! - Consuming observations from an ObservationSource
//! - Recording DNS answers in the domain tracker
//! - Gating connections through the connection filter
//! - Emitting a destination key for every kept connection
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────┐
//! │ ObservationSource │─── Observation ───┐
//! └───────────────────┘                   │
//!                                         ▼
//!                              ┌──────────────────┐
//!                              │ ClassifierEngine │
//!                              └──────────────────┘
//!                                         │
//!         ┌───────────────────────────────┼──────────────────────────┐
//!         ▼                               ▼                          ▼
//! ┌───────────────┐             ┌──────────────────┐         ┌─────────────┐
//! │ DomainTracker │             │ ConnectionFilter │         │   Events    │
//! │ (resolutions) │             │ (skip / keep)    │         │ (keys)      │
//! └───────────────┘             └──────────────────┘         └─────────────┘
//! ```

mod classifier;

pub use classifier::{Classifier, Verdict};

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::fqdn::RecordType;
use crate::key::DestinationKey;
use crate::traits::{Observation, ObservationSource};

/// Events emitted by the ClassifierEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifierEvent {
    /// Engine started
    Started,

    /// DNS answer recorded under its canonical hostname
    ///
    /// `ips` counts distinct addresses in the answer.
    ResolutionRecorded { fqdn: String, ips: usize },

    /// Reverse lookup answer, normalized but not tracked
    ReverseLookup { fqdn: String },

    /// Connection left out of reporting
    ConnectionSkipped {
        destination: SocketAddr,
        actual_destination: SocketAddr,
    },

    /// Connection to report under `key`
    ConnectionKept {
        destination: SocketAddr,
        actual_destination: SocketAddr,
        key: DestinationKey,
    },

    /// Engine stopped
    Stopped { reason: String },
}

/// Drives a [`Classifier`] from an observation stream
///
/// ## Lifecycle
///
/// 1. Create with [`ClassifierEngine::new()`]
/// 2. Start with [`ClassifierEngine::run()`]
/// 3. Engine runs until the source ends or a shutdown signal is received
///
/// ## Load Resistance
///
/// Events go through a bounded channel. When the consumer falls behind,
/// new events are dropped with a warning instead of buffering without bound.
pub struct ClassifierEngine {
    source: Box<dyn ObservationSource>,
    classifier: Arc<Classifier>,
    event_tx: mpsc::Sender<ClassifierEvent>,
}

impl ClassifierEngine {
    /// Create a new engine
    ///
    /// Returns the engine and the receiving end of its event channel.
    pub fn new(
        source: Box<dyn ObservationSource>,
        classifier: Arc<Classifier>,
        config: &EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<ClassifierEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);
        let engine = Self {
            source,
            classifier,
            event_tx: tx,
        };
        Ok((engine, rx))
    }

    /// The classifier this engine feeds
    pub fn classifier(&self) -> &Arc<Classifier> {
        &self.classifier
    }

    /// Run until the source ends or Ctrl-C is received
    pub async fn run(&self) -> Result<()> {
        self.run_with_shutdown(None).await
    }

    /// Run until the source ends or `shutdown_rx` fires
    ///
    /// With `None`, Ctrl-C is the shutdown signal.
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.emit_event(ClassifierEvent::Started);

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        };
        tokio::pin!(shutdown);

        let mut observations = self.source.watch();
        let reason = loop {
            tokio::select! {
                next = observations.next() => match next {
                    Some(observation) => self.handle_observation(observation),
                    None => break "Observation source ended",
                },

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break "Shutdown signal";
                }
            }
        };

        info!(
            "Classifier engine stopped: {} ({} domains, {} whitelisted prefixes)",
            reason,
            self.classifier.tracker().len(),
            self.classifier.filter().whitelist_len()
        );
        self.emit_event(ClassifierEvent::Stopped {
            reason: reason.to_string(),
        });
        Ok(())
    }

    fn handle_observation(&self, observation: Observation) {
        match observation {
            Observation::Resolution {
                fqdn,
                record_type,
                ips,
            } => {
                if record_type == RecordType::Ptr {
                    let name = self.classifier.record_resolution(&fqdn, &record_type, ips);
                    debug!("Reverse lookup {} as {}", fqdn, name);
                    self.emit_event(ClassifierEvent::ReverseLookup { fqdn: name });
                    return;
                }

                let count = ips
                    .iter()
                    .map(|ip| ip.to_canonical())
                    .collect::<HashSet<_>>()
                    .len();
                let name = self.classifier.record_resolution(&fqdn, &record_type, ips);
                debug!("Resolved {} ({}) -> {} address(es) as {}", fqdn, record_type, count, name);
                self.emit_event(ClassifierEvent::ResolutionRecorded {
                    fqdn: name,
                    ips: count,
                });
            }
            Observation::Connection {
                destination,
                actual_destination,
                fqdn,
            } => {
                let event = match self.classifier.classify(
                    destination,
                    actual_destination,
                    fqdn.as_deref(),
                ) {
                    Verdict::Skipped => ClassifierEvent::ConnectionSkipped {
                        destination,
                        actual_destination,
                    },
                    Verdict::Kept { key } => ClassifierEvent::ConnectionKept {
                        destination,
                        actual_destination,
                        key,
                    },
                };
                self.emit_event(event);
            }
        }
    }

    fn emit_event(&self, event: ClassifierEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}
