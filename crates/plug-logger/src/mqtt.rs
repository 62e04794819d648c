// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MQTT-backed message bus (rumqttc, blocking client).
//!
//! [`MqttBus::run`] drives the connection on the calling thread and hands
//! every inbound publish to the registered handlers in arrival order. The
//! subscription is (re)issued on every ConnAck, so a broker restart with a
//! clean session does not silently stop delivery.
//!
//! The connection is always polled without a deadline while running: a
//! poll cancelled mid-handshake restarts the connect from scratch.

use crate::bus::{HandlerSet, MessageBus, MessageEvent, MessageHandler, SubscriptionHandle};
use crate::config::MqttConfig;
use crate::error::BusError;
use rumqttc::{Client, Connection, Event, MqttOptions, Outgoing, Packet, QoS, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

const REQUEST_CAPACITY: usize = 64;

/// Handle to stop a running [`MqttBus`].
#[derive(Clone)]
pub struct StopHandle {
    client: Client,
    running: Arc<AtomicBool>,
}

impl StopHandle {
    /// Stop the bus loop.
    ///
    /// Takes effect even when called before [`MqttBus::run`].
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        // Wakes a poll blocked on an idle connection.
        if let Err(e) = self.client.try_disconnect() {
            tracing::debug!("MQTT disconnect not queued: {}", e);
        }
    }
}

/// MQTT message bus.
pub struct MqttBus {
    client: Client,
    connection: Mutex<Connection>,
    handlers: HandlerSet,
    subscription: String,
    qos: QoS,
    reconnect_delay: Duration,
    running: Arc<AtomicBool>,
}

fn qos_from_level(level: u8) -> QoS {
    match level {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}

impl MqttBus {
    /// Create the client. No network traffic happens until [`run`](Self::run).
    pub fn new(config: &MqttConfig) -> Self {
        let mut options = MqttOptions::new(config.client_id(), &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        options.set_clean_session(true);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, connection) = Client::new(options, REQUEST_CAPACITY);

        Self {
            client,
            connection: Mutex::new(connection),
            handlers: HandlerSet::new(),
            subscription: config.subscription.clone(),
            qos: qos_from_level(config.qos),
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            client: self.client.clone(),
            running: Arc::clone(&self.running),
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn connection(&self) -> MutexGuard<'_, Connection> {
        match self.connection.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Queue a publish. Sent once the connection is driven.
    pub fn publish(&self, topic: &str, payload: impl Into<Vec<u8>>) -> Result<(), BusError> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload.into())?;
        Ok(())
    }

    /// Run the receive loop until stopped (blocking).
    pub fn run(&self) -> Result<(), BusError> {
        if !self.is_running() {
            tracing::info!("MQTT bus stopped before start");
            return Ok(());
        }

        let mut connection = self.connection();
        tracing::info!(subscription = %self.subscription, "MQTT bus started");

        for notification in connection.iter() {
            match notification {
                Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                Ok(event) => self.handle_event(event),
                Err(e) => {
                    if !self.is_running() {
                        break;
                    }
                    tracing::warn!("MQTT connection error: {}", e);
                    std::thread::sleep(self.reconnect_delay);
                }
            }

            if !self.is_running() {
                break;
            }
        }

        tracing::info!("MQTT bus stopped");
        Ok(())
    }

    /// Drive the connection until every queued publish has been written and
    /// the client has disconnected. Used by one-shot publishers.
    ///
    /// Fails with [`BusError::Timeout`] when that does not happen within
    /// `timeout`, and with [`BusError::Connection`] on the first connection
    /// error.
    pub fn flush(&self, timeout: Duration) -> Result<(), BusError> {
        self.client.disconnect()?;

        let mut connection = self.connection();
        let deadline = Instant::now() + timeout;
        let mut published = 0usize;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(BusError::Timeout(timeout));
            }

            match connection.recv_timeout(remaining) {
                Ok(Ok(Event::Outgoing(Outgoing::Publish(_)))) => published += 1,
                Ok(Ok(Event::Outgoing(Outgoing::Disconnect))) => {
                    tracing::debug!(published, "MQTT flush complete");
                    return Ok(());
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(BusError::Connection(e)),
                Err(RecvTimeoutError::Timeout) => return Err(BusError::Timeout(timeout)),
                Err(RecvTimeoutError::Disconnected) => return Err(BusError::Closed),
            }
        }
    }

    fn handle_event(&self, event: Event) {
        match event {
            Event::Incoming(Packet::ConnAck(_)) => {
                tracing::info!(subscription = %self.subscription, "Connected to broker, subscribing");
                if let Err(e) = self.client.try_subscribe(self.subscription.as_str(), self.qos) {
                    tracing::error!("Failed to subscribe to {}: {}", self.subscription, e);
                }
            }
            Event::Incoming(Packet::Publish(publish)) => {
                let event = MessageEvent::new(publish.topic, publish.payload.to_vec());
                for result in self.handlers.deliver(&event) {
                    if let Err(e) = result {
                        tracing::debug!(topic = %event.topic, "Handler rejected event: {}", e);
                    }
                }
            }
            Event::Incoming(Packet::SubAck(ack)) => {
                tracing::debug!(pkid = ack.pkid, "Subscription acknowledged");
            }
            _ => {}
        }
    }
}

impl MessageBus for MqttBus {
    fn register(&self, handler: Arc<dyn MessageHandler>) -> Result<SubscriptionHandle, BusError> {
        let handle = self.handlers.insert(handler);
        tracing::debug!(%handle, "MQTT bus: handler registered");
        Ok(handle)
    }

    fn unregister(&self, handle: SubscriptionHandle) -> Result<(), BusError> {
        self.handlers.remove(handle)?;
        tracing::debug!(%handle, "MQTT bus: handler unregistered");
        Ok(())
    }
}
