// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Device registry
//!
//! Ensures a device row exists before any measurement for it is written.
//! Registration is an atomic insert-or-ignore in the store, so two events
//! racing for the same new device both succeed and exactly one row is
//! created. Devices seen once are remembered in-process to skip the store
//! round trip on later events.

use crate::error::StoreError;
use crate::store::{MeasurementStore, Registration};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

pub struct DeviceRegistry<S: MeasurementStore> {
    store: Arc<S>,
    /// Devices known to exist in the store
    known: Mutex<HashSet<String>>,
}

impl<S: MeasurementStore> DeviceRegistry<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            known: Mutex::new(HashSet::new()),
        }
    }

    /// Register `device_id` if it is not known yet.
    pub fn ensure_registered(&self, device_id: &str) -> Result<Registration, StoreError> {
        if self.is_known(device_id) {
            return Ok(Registration::AlreadyKnown);
        }

        let registration = self.store.ensure_device(device_id)?;

        let mut known = match self.known.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        known.insert(device_id.to_string());

        Ok(registration)
    }

    fn is_known(&self, device_id: &str) -> bool {
        let known = match self.known.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        known.contains(device_id)
    }
}
