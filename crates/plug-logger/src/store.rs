// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Measurement store abstraction
//!
//! Defines the narrow write interface the dispatcher needs, plus a few
//! read helpers used by the CLI and tests.

use crate::classify::{MeasurementKind, MeasurementRecord};
use crate::error::StoreError;
use serde::Serialize;

/// Outcome of a device registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// Device was not known and has been inserted.
    Inserted,
    /// Device already existed (including a lost concurrent insert).
    AlreadyKnown,
}

/// Row counts per table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub devices: usize,
    pub temperature: usize,
    pub status: usize,
    pub power: usize,
    pub consumption: usize,
}

impl StoreStats {
    /// Total number of measurement rows.
    pub fn measurements(&self) -> usize {
        self.temperature + self.status + self.power + self.consumption
    }
}

/// Measurement store trait
///
/// # Implementations
///
/// - `SqliteStore` -- default backend
pub trait MeasurementStore: Send + Sync {
    /// Register a device identifier if unknown (atomic insert-or-ignore).
    fn ensure_device(&self, device_id: &str) -> Result<Registration, StoreError>;

    /// Persist one measurement record.
    ///
    /// The device must already be registered.
    fn insert_measurement(&self, record: &MeasurementRecord) -> Result<(), StoreError>;

    /// List registered device identifiers, sorted.
    fn devices(&self) -> Result<Vec<String>, StoreError>;

    /// Number of records of a given kind.
    fn count(&self, kind: MeasurementKind) -> Result<usize, StoreError>;

    /// Row counts for every table.
    fn stats(&self) -> Result<StoreStats, StoreError> {
        Ok(StoreStats {
            devices: self.devices()?.len(),
            temperature: self.count(MeasurementKind::Temperature)?,
            status: self.count(MeasurementKind::Status)?,
            power: self.count(MeasurementKind::Power)?,
            consumption: self.count(MeasurementKind::Consumption)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_stats_serialization() {
        let stats = StoreStats {
            devices: 2,
            temperature: 1,
            status: 3,
            power: 4,
            consumption: 5,
        };

        assert_eq!(stats.measurements(), 13);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["devices"], 2);
        assert_eq!(json["consumption"], 5);
    }
}
