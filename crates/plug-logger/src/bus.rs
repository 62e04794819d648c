// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message bus abstraction
//!
//! The logger does not talk to a broker directly. It registers a
//! [`MessageHandler`] on a [`MessageBus`] and is handed one
//! [`MessageEvent`] per inbound publish. The bus decides whether handlers
//! are invoked sequentially or from several threads; handlers must be
//! `Send + Sync` either way.
//!
//! # Implementations
//!
//! - [`LocalBus`] -- in-process fan-out, used by tests and tools
//! - [`MqttBus`](crate::mqtt::MqttBus) -- rumqttc-backed broker client

use crate::dispatcher::Outcome;
use crate::error::{BusError, IngestError};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// A single inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    /// Slash-delimited topic.
    pub topic: String,
    /// Raw payload. Not guaranteed to be UTF-8.
    pub payload: Vec<u8>,
}

impl MessageEvent {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Callback invoked once per inbound message.
///
/// An `Err` marks the event as unprocessed; the handler stays registered.
pub trait MessageHandler: Send + Sync {
    fn on_message(&self, event: &MessageEvent) -> Result<Outcome, IngestError>;
}

/// Token returned by [`MessageBus::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Subscription interface of a message bus.
pub trait MessageBus: Send + Sync {
    /// Register a handler for all inbound messages.
    fn register(&self, handler: Arc<dyn MessageHandler>) -> Result<SubscriptionHandle, BusError>;

    /// Remove a previously registered handler.
    fn unregister(&self, handle: SubscriptionHandle) -> Result<(), BusError>;
}

/// Registered handlers, shared by bus implementations.
pub struct HandlerSet {
    next_id: AtomicU64,
    handlers: RwLock<Vec<(SubscriptionHandle, Arc<dyn MessageHandler>)>>,
}

impl HandlerSet {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            handlers: RwLock::new(Vec::new()),
        }
    }

    pub fn insert(&self, handler: Arc<dyn MessageHandler>) -> SubscriptionHandle {
        let handle = SubscriptionHandle(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut handlers = match self.handlers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        handlers.push((handle, handler));
        handle
    }

    pub fn remove(&self, handle: SubscriptionHandle) -> Result<(), BusError> {
        let mut handlers = match self.handlers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = handlers.len();
        handlers.retain(|(h, _)| *h != handle);
        if handlers.len() == before {
            return Err(BusError::UnknownSubscription(handle.id()));
        }
        Ok(())
    }

    /// Current handlers. Taken as a snapshot so a handler may unregister
    /// while being invoked.
    pub fn snapshot(&self) -> Vec<Arc<dyn MessageHandler>> {
        let handlers = match self.handlers.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        handlers.iter().map(|(_, h)| Arc::clone(h)).collect()
    }

    pub fn len(&self) -> usize {
        match self.handlers.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver an event to every handler on the calling thread.
    pub fn deliver(&self, event: &MessageEvent) -> Vec<Result<Outcome, IngestError>> {
        self.snapshot()
            .iter()
            .map(|handler| handler.on_message(event))
            .collect()
    }
}

impl Default for HandlerSet {
    fn default() -> Self {
        Self::new()
    }
}

/// In-process message bus.
///
/// `publish` invokes every registered handler synchronously on the caller's
/// thread. Publishing from several threads gives concurrent delivery.
#[derive(Default)]
pub struct LocalBus {
    handlers: HandlerSet,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event, returning one result per registered handler.
    pub fn publish(&self, event: MessageEvent) -> Vec<Result<Outcome, IngestError>> {
        self.handlers.deliver(&event)
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.len()
    }
}

impl MessageBus for LocalBus {
    fn register(&self, handler: Arc<dyn MessageHandler>) -> Result<SubscriptionHandle, BusError> {
        let handle = self.handlers.insert(handler);
        tracing::debug!(%handle, "LocalBus: handler registered");
        Ok(handle)
    }

    fn unregister(&self, handle: SubscriptionHandle) -> Result<(), BusError> {
        self.handlers.remove(handle)?;
        tracing::debug!(%handle, "LocalBus: handler unregistered");
        Ok(())
    }
}
