//! Contract Test: Observation Flow
//!
//! Constraints verified:
//! - DNS answers are recorded under their canonical hostname
//! - Connections are gated by the filter before a key is built
//! - Keys collapse to the hostname for ambiguous domains
//! - The engine stops when the source ends or on the shutdown signal
//! - The observation source is watched exactly once per run

mod common;

use common::*;
use netclass_core::engine::{Classifier, ClassifierEngine, ClassifierEvent};
use netclass_core::{ClassifierConfig, EngineConfig, parse_prefix};
use std::sync::Arc;

#[tokio::test]
async fn observations_produce_keys_in_order() {
    let (source, tx) = ControlledObservationSource::new();
    let watch_calls = source.watch_call_counter();
    let classifier = Arc::new(Classifier::new());
    let (engine, mut rx) =
        ClassifierEngine::new(Box::new(source), classifier.clone(), &EngineConfig::default())
            .expect("engine construction succeeds");

    for line in [
        "dns TypeA s3.example.com.svc.default.cluster.local 52.1.1.1,52.1.1.2",
        "dns TypeA db.example.com 1.1.1.1",
        "conn 1.1.1.1:443 2.2.2.2:443",
        "conn 1.1.1.1:5432 10.0.0.7:5432",
        "conn 1.1.1.1:5432 2.2.2.2:5432",
        "conn 52.1.1.1:443 192.168.0.3:443",
        "conn 127.0.0.1:8080 127.0.0.1:8080",
    ] {
        tx.send(observation(line)).expect("send succeeds");
    }
    drop(tx);

    engine.run_with_shutdown(None).await.expect("engine runs");
    drop(engine);
    let events = collect_events(&mut rx).await;

    assert_eq!(events.first(), Some(&ClassifierEvent::Started));
    assert_eq!(
        events[1],
        ClassifierEvent::ResolutionRecorded {
            fqdn: "s3.example.com.search_path_suffix".to_string(),
            ips: 2,
        }
    );
    assert_eq!(
        events[3],
        ClassifierEvent::ConnectionSkipped {
            destination: ep("1.1.1.1:443"),
            actual_destination: ep("2.2.2.2:443"),
        }
    );
    assert_eq!(
        kept_keys(&events),
        vec![
            "1.1.1.1:5432 (10.0.0.7:5432)",
            "1.1.1.1:5432 (2.2.2.2:5432)",
            "s3.example.com.search_path_suffix:443 ()",
            "127.0.0.1:8080 (127.0.0.1:8080)",
        ]
    );
    assert_eq!(
        events.last(),
        Some(&ClassifierEvent::Stopped {
            reason: "Observation source ended".to_string()
        })
    );

    // The source is watched once for the whole run
    assert_eq!(watch_calls.get(), 1);

    // Learned state lives in the shared classifier
    assert!(classifier.filter().is_whitelisted(ip("1.1.1.1")));
    assert!(classifier.filter().is_whitelisted(ip("52.1.1.1")));
    assert_eq!(classifier.tracker().len(), 2);
}

#[tokio::test]
async fn configured_whitelist_is_applied() {
    let config = ClassifierConfig {
        whitelist: vec![parse_prefix("2.2.2.0/24").unwrap()],
        ..Default::default()
    };
    let classifier = Arc::new(Classifier::from_config(&config).unwrap());

    let (source, tx) = ControlledObservationSource::new();
    let (engine, mut rx) = ClassifierEngine::new(Box::new(source), classifier, &config.engine)
        .expect("engine construction succeeds");

    tx.send(observation("conn 2.2.2.2:443 2.2.2.2:443")).unwrap();
    tx.send(observation("conn 3.3.3.3:443 3.3.3.3:443")).unwrap();
    drop(tx);

    engine.run_with_shutdown(None).await.unwrap();
    drop(engine);
    let events = collect_events(&mut rx).await;

    assert_eq!(kept_keys(&events), vec!["2.2.2.2:443 (2.2.2.2:443)"]);
}

#[tokio::test]
async fn shutdown_signal_terminates_engine() {
    let (source, _tx) = ControlledObservationSource::new();
    let (engine, mut rx) = ClassifierEngine::new(
        Box::new(source),
        Arc::new(Classifier::new()),
        &EngineConfig::default(),
    )
    .expect("engine construction succeeds");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle =
        tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    shutdown_tx.send(()).expect("shutdown signal send succeeds");

    let result = tokio::time::timeout(tokio::time::Duration::from_secs(5), engine_handle).await;
    assert!(result.is_ok(), "Engine should terminate within 5 seconds");
    result.unwrap().unwrap().unwrap();

    let events = collect_events(&mut rx).await;
    assert_eq!(
        events,
        vec![
            ClassifierEvent::Started,
            ClassifierEvent::Stopped {
                reason: "Shutdown signal".to_string()
            },
        ]
    );
}
