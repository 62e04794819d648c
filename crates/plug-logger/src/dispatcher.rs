// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Event dispatcher
//!
//! Runs one inbound message through the ingestion pipeline.
//!
//! # Operation
//!
//! 1. Drop administrative topics (filter)
//! 2. Split the topic and extract the device identifier
//! 3. Classify the topic into a measurement kind
//! 4. Register the device if unknown
//! 5. Persist one record
//!
//! Each event is independent; the only state carried between events is the
//! device registry. A failure is reported for that event only.

use crate::bus::{MessageEvent, MessageHandler};
use crate::classify::{classify, Classification, MeasurementKind, MeasurementRecord};
use crate::error::IngestError;
use crate::filter::TopicFilter;
use crate::registry::DeviceRegistry;
use crate::store::{MeasurementStore, Registration};
use crate::topic::TopicPath;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Successful handling of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Dropped by the topic filter; nothing written.
    Filtered { marker: String },
    /// One measurement record written.
    Persisted {
        kind: MeasurementKind,
        device_id: String,
    },
}

/// Dispatcher statistics
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DispatcherStats {
    /// Events received
    pub received: u64,
    /// Events dropped by the topic filter
    pub filtered: u64,
    /// Measurement records written
    pub persisted: u64,
    /// Events that failed (malformed, unclassified, store errors)
    pub failed: u64,
    /// Devices inserted into the registry
    pub devices_registered: u64,
}

#[derive(Default)]
struct Counters {
    received: AtomicU64,
    filtered: AtomicU64,
    persisted: AtomicU64,
    failed: AtomicU64,
    devices_registered: AtomicU64,
}

/// Event dispatcher
pub struct EventDispatcher<S: MeasurementStore> {
    filter: TopicFilter,
    registry: DeviceRegistry<S>,
    store: Arc<S>,
    counters: Counters,
}

impl<S: MeasurementStore> EventDispatcher<S> {
    pub fn new(filter: TopicFilter, store: Arc<S>) -> Self {
        Self {
            filter,
            registry: DeviceRegistry::new(Arc::clone(&store)),
            store,
            counters: Counters::default(),
        }
    }

    /// Process one event.
    pub fn handle(&self, event: &MessageEvent) -> Result<Outcome, IngestError> {
        self.counters.received.fetch_add(1, Ordering::Relaxed);

        let result = self.process(event);
        match &result {
            Ok(Outcome::Filtered { .. }) => {
                self.counters.filtered.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Outcome::Persisted { .. }) => {
                self.counters.persisted.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(topic = %event.topic, "Event not processed: {}", e);
            }
        }
        result
    }

    fn process(&self, event: &MessageEvent) -> Result<Outcome, IngestError> {
        if let Some(marker) = self.filter.matched_marker(&event.topic) {
            tracing::info!(topic = %event.topic, marker, "Not important topic, skipping");
            return Ok(Outcome::Filtered {
                marker: marker.to_string(),
            });
        }

        let path = TopicPath::parse(&event.topic)?;
        let device_id = path.device_id();

        let kind = match classify(&path) {
            Classification::Classified(kind) => kind,
            Classification::Unclassified => {
                return Err(IngestError::UnclassifiedTopic(event.topic.clone()));
            }
        };
        tracing::info!(topic = %event.topic, %kind, "Classified topic");

        // Registration failure aborts the event: no orphaned measurements.
        match self.registry.ensure_registered(device_id) {
            Ok(Registration::Inserted) => {
                self.counters
                    .devices_registered
                    .fetch_add(1, Ordering::Relaxed);
                tracing::info!(device = %device_id, "Registered new plug");
            }
            Ok(Registration::AlreadyKnown) => {
                tracing::info!(device = %device_id, "Plug already registered");
            }
            Err(source) => {
                return Err(IngestError::Registration {
                    device: device_id.to_string(),
                    source,
                });
            }
        }

        let record = MeasurementRecord::new(kind, device_id, &event.payload);
        self.store
            .insert_measurement(&record)
            .map_err(|source| IngestError::Persist {
                device: device_id.to_string(),
                source,
            })?;

        tracing::info!(
            device = %record.device_id,
            %kind,
            value = %record.value_lossy(),
            "Stored measurement"
        );

        Ok(Outcome::Persisted {
            kind,
            device_id: record.device_id,
        })
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            received: self.counters.received.load(Ordering::Relaxed),
            filtered: self.counters.filtered.load(Ordering::Relaxed),
            persisted: self.counters.persisted.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            devices_registered: self.counters.devices_registered.load(Ordering::Relaxed),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Consume the dispatcher, releasing its hold on the store.
    pub fn into_store(self) -> Arc<S> {
        drop(self.registry);
        self.store
    }
}

impl<S: MeasurementStore> MessageHandler for EventDispatcher<S> {
    fn on_message(&self, event: &MessageEvent) -> Result<Outcome, IngestError> {
        self.handle(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{MatchPolicy, DEFAULT_IGNORE_MARKERS};
    use crate::sqlite::SqliteStore;

    fn dispatcher() -> EventDispatcher<SqliteStore> {
        let store = Arc::new(SqliteStore::new_in_memory().unwrap());
        EventDispatcher::new(TopicFilter::default(), store)
    }

    #[test]
    fn test_power_event_persisted() {
        let dispatcher = dispatcher();

        let outcome = dispatcher
            .handle(&MessageEvent::new("shellies/plug1/relay/0/power", "42.5"))
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Persisted {
                kind: MeasurementKind::Power,
                device_id: "plug1".to_string()
            }
        );

        let store = dispatcher.store();
        assert_eq!(
            store.values(MeasurementKind::Power),
            vec![("plug1".to_string(), b"42.5".to_vec())]
        );
        assert_eq!(store.devices().unwrap(), vec!["plug1"]);
        assert_eq!(store.stats().unwrap().measurements(), 1);
    }

    #[test]
    fn test_each_kind_written_to_its_table() {
        let dispatcher = dispatcher();
        let events = [
            ("shellies/plug1/temperature", "24.31", MeasurementKind::Temperature),
            ("shellies/plug1/relay/0", "on", MeasurementKind::Status),
            ("shellies/plug1/relay/0/power", "12.7", MeasurementKind::Power),
            ("shellies/plug1/relay/0/energy", "3301", MeasurementKind::Consumption),
        ];

        for (topic, payload, _) in events {
            dispatcher.handle(&MessageEvent::new(topic, payload)).unwrap();
        }

        let store = dispatcher.store();
        for (_, payload, kind) in events {
            let values = store.values(kind);
            assert_eq!(values.len(), 1, "kind {kind}");
            assert_eq!(values[0].1, payload.as_bytes());
        }
        assert_eq!(store.devices().unwrap().len(), 1);
    }

    #[test]
    fn test_filtered_event_writes_nothing() {
        let dispatcher = dispatcher();

        let outcome = dispatcher
            .handle(&MessageEvent::new("shellies/plug1/online", "true"))
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Filtered {
                marker: "online".to_string()
            }
        );

        for topic in [
            "shellies/announce",
            "shellies/plug1/info",
            "shellies/plug1/temperature_f",
            "shellies/plug1/overtemperature",
            "shellies/plug1/relay/0/command",
        ] {
            assert!(matches!(
                dispatcher.handle(&MessageEvent::new(topic, "x")),
                Ok(Outcome::Filtered { .. })
            ));
        }

        let stats = dispatcher.store().stats().unwrap();
        assert_eq!(stats.devices, 0);
        assert_eq!(stats.measurements(), 0);
        assert_eq!(dispatcher.stats().filtered, 6);
    }

    #[test]
    fn test_unclassified_event_writes_nothing() {
        let dispatcher = dispatcher();

        let err = dispatcher
            .handle(&MessageEvent::new("shellies/plug1/relay/0/voltage", "230"))
            .unwrap_err();
        assert!(matches!(err, IngestError::UnclassifiedTopic(_)));

        let store = dispatcher.store();
        assert_eq!(store.stats().unwrap().measurements(), 0);
        assert!(store.devices().unwrap().is_empty());
        assert_eq!(dispatcher.stats().failed, 1);
        assert_eq!(dispatcher.stats().devices_registered, 0);
    }

    #[test]
    fn test_malformed_event_rejected() {
        let dispatcher = dispatcher();

        let err = dispatcher
            .handle(&MessageEvent::new("shellies", "1"))
            .unwrap_err();
        assert!(matches!(err, IngestError::MalformedTopic { .. }));
        assert_eq!(dispatcher.store().stats().unwrap().devices, 0);
    }

    #[test]
    fn test_segment_policy_keeps_lookalike_devices() {
        let store = Arc::new(SqliteStore::new_in_memory().unwrap());
        let filter = TopicFilter::new(
            MatchPolicy::Segment,
            DEFAULT_IGNORE_MARKERS.iter().map(|m| m.to_string()),
        );
        let dispatcher = EventDispatcher::new(filter, store);

        dispatcher
            .handle(&MessageEvent::new("shellies/command123/relay/0/power", "5"))
            .unwrap();
        assert_eq!(dispatcher.store().devices().unwrap(), vec!["command123"]);
    }

    #[test]
    fn test_registration_failure_aborts_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.db");
        let store = Arc::new(SqliteStore::open(path.to_str().unwrap(), false).unwrap());
        let dispatcher = EventDispatcher::new(TopicFilter::default(), store);

        let err = dispatcher
            .handle(&MessageEvent::new("shellies/plug1/relay/0/power", "1"))
            .unwrap_err();
        assert!(matches!(err, IngestError::Registration { .. }));
    }

    #[test]
    fn test_stats_accumulate() {
        let dispatcher = dispatcher();

        dispatcher
            .handle(&MessageEvent::new("shellies/plug1/relay/0/power", "1"))
            .unwrap();
        dispatcher
            .handle(&MessageEvent::new("shellies/plug1/relay/0/power", "2"))
            .unwrap();
        dispatcher
            .handle(&MessageEvent::new("shellies/plug2/online", "true"))
            .unwrap();
        let _ = dispatcher.handle(&MessageEvent::new("shellies/plug2/relay", "?"));

        assert_eq!(
            dispatcher.stats(),
            DispatcherStats {
                received: 4,
                filtered: 1,
                persisted: 2,
                failed: 1,
                devices_registered: 1,
            }
        );
    }
}
