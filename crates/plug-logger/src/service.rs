// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Logger service lifecycle
//!
//! `init` opens the store and registers the dispatcher on the bus;
//! `cleanup` unregisters and closes the store. A store that cannot be
//! opened is fatal and nothing is registered.

use crate::bus::{MessageBus, SubscriptionHandle};
use crate::config::Config;
use crate::dispatcher::{DispatcherStats, EventDispatcher};
use crate::error::ServiceError;
use crate::sqlite::SqliteStore;
use std::sync::Arc;

/// Running logger: an open store plus a registered dispatcher.
pub struct PlugLogger<B: MessageBus> {
    bus: Arc<B>,
    dispatcher: Arc<EventDispatcher<SqliteStore>>,
    subscription: SubscriptionHandle,
}

impl<B: MessageBus> PlugLogger<B> {
    /// Open the store and start listening on `bus`.
    pub fn init(config: &Config, bus: Arc<B>) -> Result<Self, ServiceError> {
        config.validate()?;

        let store = SqliteStore::open(&config.database_path, config.create_schema).map_err(
            |e| {
                tracing::error!("Error opening database: {}", e);
                e
            },
        )?;
        tracing::info!(database = %config.database_path, "Opened DB");

        let dispatcher = Arc::new(EventDispatcher::new(
            config.topic_filter(),
            Arc::new(store),
        ));
        let subscription = bus.register(dispatcher.clone())?;

        tracing::info!(
            %subscription,
            policy = %config.match_policy,
            markers = ?config.ignore_markers,
            "Plug logger listening"
        );

        Ok(Self {
            bus,
            dispatcher,
            subscription,
        })
    }

    /// Unregister from the bus and close the store (best effort).
    pub fn cleanup(self) -> DispatcherStats {
        tracing::info!("Shutting down");

        if let Err(e) = self.bus.unregister(self.subscription) {
            tracing::warn!("Failed to unregister {}: {}", self.subscription, e);
        }

        let stats = self.dispatcher.stats();

        match Arc::try_unwrap(self.dispatcher) {
            Ok(dispatcher) => match Arc::try_unwrap(dispatcher.into_store()) {
                Ok(store) => {
                    if let Err(e) = store.close() {
                        tracing::error!("{}", e);
                    }
                }
                Err(_) => tracing::warn!("Store still referenced, closing on last drop"),
            },
            Err(_) => tracing::warn!("Dispatcher still referenced, closing store on last drop"),
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{LocalBus, MessageEvent};
    use crate::error::StoreError;
    use crate::store::MeasurementStore;

    #[test]
    fn test_init_publish_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("plugs.db");
        let config = Config::builder()
            .database_path(db.to_str().unwrap())
            .build();

        let bus = Arc::new(LocalBus::new());
        let logger = PlugLogger::init(&config, Arc::clone(&bus)).unwrap();
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish(MessageEvent::new("shellies/plug1/relay/0/power", "42.5"));
        bus.publish(MessageEvent::new("shellies/plug1/online", "true"));

        let stats = logger.cleanup();
        assert_eq!(stats.persisted, 1);
        assert_eq!(stats.filtered, 1);
        assert_eq!(bus.subscriber_count(), 0);

        // Events after cleanup reach nobody.
        assert!(bus
            .publish(MessageEvent::new("shellies/plug1/relay/0/power", "1"))
            .is_empty());

        let store = SqliteStore::new(db.to_str().unwrap()).unwrap();
        assert_eq!(store.stats().unwrap().power, 1);
    }

    #[test]
    fn test_init_fails_without_store() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("no-such-dir").join("plugs.db");
        let config = Config::builder()
            .database_path(db.to_str().unwrap())
            .build();

        let bus = Arc::new(LocalBus::new());
        let err = PlugLogger::init(&config, Arc::clone(&bus)).err().unwrap();

        assert!(matches!(
            err,
            ServiceError::Store(StoreError::Unavailable { .. })
        ));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_init_rejects_invalid_config() {
        let config = Config::builder().database_path("").build();
        let bus = Arc::new(LocalBus::new());

        assert!(matches!(
            PlugLogger::init(&config, bus).err().unwrap(),
            ServiceError::Config(_)
        ));
    }
}
