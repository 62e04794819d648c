// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end ingestion through a LocalBus into an on-disk database.

use plug_logger::{
    Config, IngestError, LocalBus, MeasurementKind, MeasurementStore, MessageEvent, Outcome,
    PlugLogger, SqliteStore, DEFAULT_IGNORE_MARKERS,
};
use std::sync::Arc;
use std::thread;

struct Harness {
    _dir: tempfile::TempDir,
    db: String,
    bus: Arc<LocalBus>,
    logger: Option<PlugLogger<LocalBus>>,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("plugs.db").to_str().unwrap().to_string();
        let config = Config::builder().database_path(&db).build();
        let bus = Arc::new(LocalBus::new());
        let logger = PlugLogger::init(&config, Arc::clone(&bus)).unwrap();

        Self {
            _dir: dir,
            db,
            bus,
            logger: Some(logger),
        }
    }

    fn publish(&self, topic: &str, payload: &str) -> Result<Outcome, IngestError> {
        let mut results = self.bus.publish(MessageEvent::new(topic, payload));
        assert_eq!(results.len(), 1);
        results.remove(0)
    }

    /// Shut the logger down and reopen the database for inspection.
    fn finish(&mut self) -> SqliteStore {
        if let Some(logger) = self.logger.take() {
            logger.cleanup();
        }
        SqliteStore::new(&self.db).unwrap()
    }
}

#[test]
fn power_example_writes_one_record_and_one_device() {
    let mut harness = Harness::new();

    let outcome = harness
        .publish("shellies/plug1/relay/0/power", "42.5")
        .unwrap();
    assert_eq!(
        outcome,
        Outcome::Persisted {
            kind: MeasurementKind::Power,
            device_id: "plug1".to_string()
        }
    );

    let store = harness.finish();
    let stats = store.stats().unwrap();
    assert_eq!(stats.power, 1);
    assert_eq!(stats.measurements(), 1);
    assert_eq!(store.devices().unwrap(), vec!["plug1"]);
}

#[test]
fn online_example_writes_nothing() {
    let mut harness = Harness::new();

    let outcome = harness.publish("shellies/plug1/online", "true").unwrap();
    assert!(matches!(outcome, Outcome::Filtered { .. }));

    let stats = harness.finish().stats().unwrap();
    assert_eq!(stats.devices, 0);
    assert_eq!(stats.measurements(), 0);
}

#[test]
fn every_marker_suppresses_writes() {
    let mut harness = Harness::new();

    for marker in DEFAULT_IGNORE_MARKERS {
        let topics = [
            format!("shellies/plug1/{marker}"),
            format!("shellies/plug1/relay/0/{marker}"),
            format!("shellies/plug-{marker}/temperature"),
        ];
        for topic in &topics {
            assert!(matches!(
                harness.publish(topic, "1"),
                Ok(Outcome::Filtered { .. })
            ));
        }
    }

    let stats = harness.finish().stats().unwrap();
    assert_eq!(stats.devices, 0);
    assert_eq!(stats.measurements(), 0);
}

#[test]
fn each_topic_shape_lands_in_its_table() {
    let mut harness = Harness::new();

    harness.publish("shellies/plug1/temperature", "24.31").unwrap();
    harness.publish("shellies/plug1/relay/0", "on").unwrap();
    harness.publish("shellies/plug1/relay/0/power", "12.7").unwrap();
    harness.publish("shellies/plug1/relay/0/energy", "3301").unwrap();
    harness.publish("shellies/plug2/relay/0/energy", "17").unwrap();

    let store = harness.finish();
    assert_eq!(store.count(MeasurementKind::Temperature).unwrap(), 1);
    assert_eq!(store.count(MeasurementKind::Status).unwrap(), 1);
    assert_eq!(store.count(MeasurementKind::Power).unwrap(), 1);
    assert_eq!(store.count(MeasurementKind::Consumption).unwrap(), 2);
    assert_eq!(store.devices().unwrap(), vec!["plug1", "plug2"]);
}

#[test]
fn unclassified_topic_is_rejected_without_measurement() {
    let mut harness = Harness::new();

    let err = harness
        .publish("shellies/plug1/relay/0/voltage", "230")
        .unwrap_err();
    assert!(matches!(err, IngestError::UnclassifiedTopic(ref t) if t == "shellies/plug1/relay/0/voltage"));

    // The listener keeps working after a failed event.
    harness.publish("shellies/plug1/relay/0/power", "1").unwrap();

    let stats = harness.finish().stats().unwrap();
    assert_eq!(stats.measurements(), 1);
}

#[test]
fn unclassified_topic_does_not_register_device() {
    let mut harness = Harness::new();

    assert!(matches!(
        harness.publish("shellies/ghost/relay/0/voltage", "230"),
        Err(IngestError::UnclassifiedTopic(_))
    ));

    let stats = harness.finish().stats().unwrap();
    assert_eq!(stats.devices, 0);
    assert_eq!(stats.measurements(), 0);
}

#[test]
fn malformed_topic_is_rejected() {
    let mut harness = Harness::new();

    assert!(matches!(
        harness.publish("plug1", "1"),
        Err(IngestError::MalformedTopic { .. })
    ));
    assert!(matches!(
        harness.publish("shellies//relay/0", "on"),
        Err(IngestError::MalformedTopic { .. })
    ));

    assert_eq!(harness.finish().stats().unwrap().devices, 0);
}

#[test]
fn concurrent_delivery_registers_each_device_once() {
    let mut harness = Harness::new();
    let bus = Arc::clone(&harness.bus);

    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let bus = Arc::clone(&bus);
            thread::spawn(move || {
                for i in 0..25 {
                    let device = format!("plug{}", i % 5);
                    let topic = format!("shellies/{device}/relay/0/power");
                    let results = bus.publish(MessageEvent::new(topic, format!("{worker}.{i}")));
                    for result in results {
                        result.unwrap();
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    let store = harness.finish();
    assert_eq!(
        store.devices().unwrap(),
        vec!["plug0", "plug1", "plug2", "plug3", "plug4"]
    );
    assert_eq!(store.count(MeasurementKind::Power).unwrap(), 8 * 25);
}

#[test]
fn registry_survives_restart() {
    let mut harness = Harness::new();
    harness.publish("shellies/plug1/relay/0", "off").unwrap();
    drop(harness.finish());

    let dir = tempfile::tempdir().unwrap();
    let copy = dir.path().join("copy.db");
    std::fs::copy(&harness.db, &copy).unwrap();

    let config = Config::builder()
        .database_path(copy.to_str().unwrap())
        .build();
    let bus = Arc::new(LocalBus::new());
    let logger = PlugLogger::init(&config, Arc::clone(&bus)).unwrap();
    bus.publish(MessageEvent::new("shellies/plug1/relay/0", "on"));
    let stats = logger.cleanup();

    assert_eq!(stats.devices_registered, 0);
    assert_eq!(stats.persisted, 1);

    let store = SqliteStore::new(copy.to_str().unwrap()).unwrap();
    assert_eq!(store.devices().unwrap(), vec!["plug1"]);
    assert_eq!(store.count(MeasurementKind::Status).unwrap(), 2);
}
