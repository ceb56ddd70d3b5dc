//! Test doubles and common utilities for contract tests

#![allow(dead_code)]

use netclass_core::engine::ClassifierEvent;
use netclass_core::traits::{Observation, ObservationSource};
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tokio_stream::Stream;

/// An ObservationSource that emits observations on demand
pub struct ControlledObservationSource {
    /// Receiver for the engine's watch stream
    engine_rx: Arc<std::sync::Mutex<Option<mpsc::UnboundedReceiver<Observation>>>>,
    /// Call counter for watch()
    watch_call_count: Arc<AtomicUsize>,
}

impl ControlledObservationSource {
    /// Create a new controlled source and the sender that feeds it
    ///
    /// Dropping the sender ends the stream.
    pub fn new() -> (Self, mpsc::UnboundedSender<Observation>) {
        let (test_tx, engine_rx) = mpsc::unbounded_channel();

        let source = Self {
            engine_rx: Arc::new(std::sync::Mutex::new(Some(engine_rx))),
            watch_call_count: Arc::new(AtomicUsize::new(0)),
        };

        (source, test_tx)
    }

    /// Shared handle on the watch() call count
    ///
    /// Take it before handing the source to the engine.
    pub fn watch_call_counter(&self) -> WatchCallCounter {
        WatchCallCounter(self.watch_call_count.clone())
    }
}

/// Number of times watch() was called on a ControlledObservationSource
pub struct WatchCallCounter(Arc<AtomicUsize>);

impl WatchCallCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl ObservationSource for ControlledObservationSource {
    fn watch(&self) -> Pin<Box<dyn Stream<Item = Observation> + Send + 'static>> {
        self.watch_call_count.fetch_add(1, Ordering::SeqCst);

        let rx = self
            .engine_rx
            .lock()
            .unwrap()
            .take()
            .expect("watch() can only be called once");

        Box::pin(tokio_stream::wrappers::UnboundedReceiverStream::new(rx))
    }
}

pub fn ip(s: &str) -> IpAddr {
    s.parse().expect("valid IP in test")
}

pub fn ep(s: &str) -> SocketAddr {
    s.parse().expect("valid endpoint in test")
}

pub fn observation(line: &str) -> Observation {
    line.parse().expect("valid observation in test")
}

/// Drain every event until the channel closes
pub async fn collect_events(rx: &mut mpsc::Receiver<ClassifierEvent>) -> Vec<ClassifierEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

/// Keys of every kept connection, in order
pub fn kept_keys(events: &[ClassifierEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            ClassifierEvent::ConnectionKept { key, .. } => Some(key.to_string()),
            _ => None,
        })
        .collect()
}
