// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Smart-plug telemetry logger
//!
//! Subscribes to Shelly plug topics on an MQTT broker, classifies each
//! message by topic shape and stores the measurement in SQLite, keyed by
//! device.
//!
//! # Features
//!
//! - **Topic filter** -- drops `online`, `announce`, `info`, `command`, ... topics
//! - **Device registry** -- atomic insert-or-ignore, one row per plug
//! - **Classifier** -- temperature, relay status, power and energy readings
//! - **SQLite backend** -- foreign keys from measurements to plugs
//!
//! # Architecture
//!
//! ```text
//! MessageBus (MQTT / LocalBus)
//! +-- EventDispatcher
//!     +-- TopicFilter      (drop noise)
//!     +-- TopicPath        (device id = segment 1)
//!     +-- DeviceRegistry   (ensure plug row)
//!     +-- classify()       (pick measurement table)
//!     +-- MeasurementStore (SqliteStore)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use plug_logger::{Config, LocalBus, MessageEvent, PlugLogger};
//! use std::sync::Arc;
//!
//! let config = Config::builder().database_path("plugs.db").build();
//! let bus = Arc::new(LocalBus::new());
//! let logger = PlugLogger::init(&config, Arc::clone(&bus))?;
//!
//! bus.publish(MessageEvent::new("shellies/plug1/relay/0/power", "42.5"));
//! let stats = logger.cleanup();
//! ```

pub mod bus;
pub mod classify;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod mqtt;
pub mod registry;
pub mod service;
pub mod sqlite;
pub mod store;
pub mod topic;

pub use bus::{HandlerSet, LocalBus, MessageBus, MessageEvent, MessageHandler, SubscriptionHandle};
pub use classify::{classify, Classification, MeasurementKind, MeasurementRecord};
pub use config::{Config, ConfigBuilder, MqttConfig};
pub use dispatcher::{DispatcherStats, EventDispatcher, Outcome};
pub use error::{BusError, ConfigError, IngestError, ServiceError, StoreError};
pub use filter::{MatchPolicy, TopicFilter, DEFAULT_IGNORE_MARKERS};
pub use mqtt::{MqttBus, StopHandle};
pub use registry::DeviceRegistry;
pub use service::PlugLogger;
pub use sqlite::SqliteStore;
pub use store::{MeasurementStore, Registration, StoreStats};
pub use topic::TopicPath;
