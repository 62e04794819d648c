// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SQLite measurement backend

use crate::classify::{MeasurementKind, MeasurementRecord};
use crate::error::StoreError;
use crate::store::{MeasurementStore, Registration};
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS plugs (
    plug_name TEXT PRIMARY KEY NOT NULL
);

CREATE TABLE IF NOT EXISTS plug_temperature (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    plug_name TEXT NOT NULL REFERENCES plugs(plug_name),
    plug_temperature TEXT NOT NULL,
    recorded_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_temperature_plug ON plug_temperature(plug_name);

CREATE TABLE IF NOT EXISTS plug_status (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    plug_name TEXT NOT NULL REFERENCES plugs(plug_name),
    plug_status TEXT NOT NULL,
    recorded_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_status_plug ON plug_status(plug_name);

CREATE TABLE IF NOT EXISTS plug_power (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    plug_name TEXT NOT NULL REFERENCES plugs(plug_name),
    plug_power TEXT NOT NULL,
    recorded_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_power_plug ON plug_power(plug_name);

CREATE TABLE IF NOT EXISTS plug_consumption (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    plug_name TEXT NOT NULL REFERENCES plugs(plug_name),
    plug_consumption TEXT NOT NULL,
    recorded_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_consumption_plug ON plug_consumption(plug_name);
";

const REGISTER_SQL: &str = "INSERT OR IGNORE INTO plugs (plug_name) VALUES (?1)";

/// Payload bound as TEXT, byte for byte (no UTF-8 validation).
struct TextBytes<'a>(&'a [u8]);

impl ToSql for TextBytes<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Borrowed(ValueRef::Text(self.0)))
    }
}

/// SQLite measurement store
///
/// One connection for the lifetime of the process, serialized behind a
/// Mutex (SQLite Connection is not Sync).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE plugs (plug_name TEXT PRIMARY KEY NOT NULL);
/// CREATE TABLE plug_power (
///     id INTEGER PRIMARY KEY AUTOINCREMENT,
///     plug_name TEXT NOT NULL REFERENCES plugs(plug_name),
///     plug_power TEXT NOT NULL,
///     recorded_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
/// );
/// -- plug_temperature, plug_status, plug_consumption: same shape
/// ```
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open a file-based store, creating the schema if missing.
    pub fn new(path: &str) -> Result<Self, StoreError> {
        Self::open(path, true)
    }

    /// Open a file-based store.
    ///
    /// With `create_schema` false the tables must already exist.
    pub fn open(path: &str, create_schema: bool) -> Result<Self, StoreError> {
        let unavailable = |source| StoreError::Unavailable {
            path: path.to_string(),
            source,
        };

        let conn = Connection::open(path).map_err(unavailable)?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(unavailable)?;

        Self::init(conn, create_schema).map_err(unavailable)
    }

    /// Create an in-memory store (for testing)
    pub fn new_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Unavailable {
            path: ":memory:".to_string(),
            source,
        })?;

        Self::init(conn, true).map_err(|source| StoreError::Unavailable {
            path: ":memory:".to_string(),
            source,
        })
    }

    fn init(conn: Connection, create_schema: bool) -> rusqlite::Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        if create_schema {
            conn.execute_batch(SCHEMA)?;
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Close the connection.
    pub fn close(self) -> Result<(), StoreError> {
        let conn = match self.conn.into_inner() {
            Ok(conn) => conn,
            Err(poisoned) => poisoned.into_inner(),
        };
        conn.close().map_err(|(_, e)| StoreError::Close(e))
    }
}

impl MeasurementStore for SqliteStore {
    fn ensure_device(&self, device_id: &str) -> Result<Registration, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare_cached(REGISTER_SQL).map_err(StoreError::Prepare)?;

        stmt.raw_bind_parameter(1, device_id)
            .map_err(|source| StoreError::Bind { index: 1, source })?;
        let inserted = stmt.raw_execute().map_err(StoreError::Exec)?;

        Ok(if inserted > 0 {
            Registration::Inserted
        } else {
            Registration::AlreadyKnown
        })
    }

    fn insert_measurement(&self, record: &MeasurementRecord) -> Result<(), StoreError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare_cached(record.kind.insert_sql())
            .map_err(StoreError::Prepare)?;

        stmt.raw_bind_parameter(1, record.device_id.as_str())
            .map_err(|source| StoreError::Bind { index: 1, source })?;
        stmt.raw_bind_parameter(2, TextBytes(&record.value))
            .map_err(|source| StoreError::Bind { index: 2, source })?;
        stmt.raw_execute().map_err(StoreError::Exec)?;

        Ok(())
    }

    fn devices(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare_cached("SELECT plug_name FROM plugs ORDER BY plug_name ASC")
            .map_err(StoreError::Prepare)?;

        let devices = stmt
            .query_map([], |row| row.get(0))
            .map_err(StoreError::Exec)?
            .collect::<Result<Vec<String>, _>>()
            .map_err(StoreError::Exec)?;

        Ok(devices)
    }

    fn count(&self, kind: MeasurementKind) -> Result<usize, StoreError> {
        let conn = self.conn();
        let sql = format!("SELECT COUNT(*) FROM {}", kind.table());
        let count: i64 = conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(StoreError::Exec)?;

        Ok(count as usize)
    }
}

#[cfg(test)]
impl SqliteStore {
    /// Raw values stored for a kind, oldest first.
    pub(crate) fn values(&self, kind: MeasurementKind) -> Vec<(String, Vec<u8>)> {
        let conn = self.conn();
        let sql = format!(
            "SELECT plug_name, {} FROM {} ORDER BY id ASC",
            kind.value_column(),
            kind.table()
        );
        let mut stmt = conn.prepare(&sql).unwrap();
        let rows = stmt
            .query_map([], |row| {
                let name: String = row.get(0)?;
                let value = row
                    .get_ref(1)?
                    .as_bytes()
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            1,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?
                    .to_vec();
                Ok((name, value))
            })
            .unwrap();
        rows.collect::<Result<Vec<_>, _>>().unwrap()
    }
}
