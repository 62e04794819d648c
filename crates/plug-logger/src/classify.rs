// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Measurement classification.
//!
//! Rules, evaluated in order (first match wins):
//!
//! | Topic shape                       | Kind         |
//! |-----------------------------------|--------------|
//! | `<root>/<id>/temperature[/...]`   | Temperature  |
//! | `<root>/<id>/<any>/0`             | Status       |
//! | `<root>/<id>/<any>/<any>/power`   | Power        |
//! | `<root>/<id>/<any>/<any>/energy`  | Consumption  |

use crate::topic::TopicPath;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of measurement carried by a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementKind {
    Temperature,
    Status,
    Power,
    Consumption,
}

impl MeasurementKind {
    /// All kinds, in classification order.
    pub const ALL: [MeasurementKind; 4] = [
        Self::Temperature,
        Self::Status,
        Self::Power,
        Self::Consumption,
    ];

    /// Table the record is written to.
    pub fn table(&self) -> &'static str {
        match self {
            Self::Temperature => "plug_temperature",
            Self::Status => "plug_status",
            Self::Power => "plug_power",
            Self::Consumption => "plug_consumption",
        }
    }

    /// Value column inside [`table`](Self::table). Same name as the table.
    pub fn value_column(&self) -> &'static str {
        self.table()
    }

    /// Parameterized insert statement for this kind.
    pub fn insert_sql(&self) -> &'static str {
        match self {
            Self::Temperature => {
                "INSERT INTO plug_temperature (plug_name, plug_temperature) VALUES (?1, ?2)"
            }
            Self::Status => "INSERT INTO plug_status (plug_name, plug_status) VALUES (?1, ?2)",
            Self::Power => "INSERT INTO plug_power (plug_name, plug_power) VALUES (?1, ?2)",
            Self::Consumption => {
                "INSERT INTO plug_consumption (plug_name, plug_consumption) VALUES (?1, ?2)"
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Status => "status",
            Self::Power => "power",
            Self::Consumption => "consumption",
        }
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Classified(MeasurementKind),
    Unclassified,
}

/// Select the measurement kind for a parsed topic.
pub fn classify(path: &TopicPath<'_>) -> Classification {
    let count = path.len();

    if path.segment(2) == Some("temperature") {
        return Classification::Classified(MeasurementKind::Temperature);
    }
    if count == 4 && path.segment(3) == Some("0") {
        return Classification::Classified(MeasurementKind::Status);
    }
    if count == 5 {
        match path.segment(4) {
            Some("power") => return Classification::Classified(MeasurementKind::Power),
            Some("energy") => return Classification::Classified(MeasurementKind::Consumption),
            _ => {}
        }
    }

    Classification::Unclassified
}

/// A classified measurement ready to be persisted.
///
/// The payload is kept verbatim; it is never parsed as a number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementRecord {
    pub kind: MeasurementKind,
    pub device_id: String,
    pub value: Vec<u8>,
}

impl MeasurementRecord {
    pub fn new(kind: MeasurementKind, device_id: impl Into<String>, value: &[u8]) -> Self {
        Self {
            kind,
            device_id: device_id.into(),
            value: value.to_vec(),
        }
    }

    /// Value rendered for logs.
    pub fn value_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.value)
    }
}
