// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for the ingestion path.

use thiserror::Error;

/// Store (SQLite) failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database could not be opened or its schema could not be prepared.
    #[error("store unavailable ({path}): {source}")]
    Unavailable {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Statement preparation failed.
    #[error("failed to prepare statement: {0}")]
    Prepare(#[source] rusqlite::Error),

    /// Parameter binding failed.
    #[error("failed to bind parameter {index}: {source}")]
    Bind {
        index: usize,
        #[source]
        source: rusqlite::Error,
    },

    /// Statement execution failed.
    #[error("failed to execute statement: {0}")]
    Exec(#[source] rusqlite::Error),

    /// Connection close failed.
    #[error("failed to close store: {0}")]
    Close(#[source] rusqlite::Error),
}

/// Per-event failures. None of these stop the listener.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed topic '{topic}': {reason}")]
    MalformedTopic { topic: String, reason: &'static str },

    #[error("no measurement rule matches topic '{0}'")]
    UnclassifiedTopic(String),

    #[error("device registration failed for '{device}': {source}")]
    Registration {
        device: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to persist measurement for '{device}': {source}")]
    Persist {
        device: String,
        #[source]
        source: StoreError,
    },
}

/// Message bus (subscription / transport) failures.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("unknown subscription handle {0}")]
    UnknownSubscription(u64),

    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("MQTT connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),

    /// Queued requests were not sent in time.
    #[error("MQTT requests not delivered within {0:?}")]
    Timeout(std::time::Duration),

    #[error("MQTT request channel closed")]
    Closed,
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Startup failures of the logger service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = IngestError::UnclassifiedTopic("shellies/plug1/relay/0/voltage".into());
        assert_eq!(
            err.to_string(),
            "no measurement rule matches topic 'shellies/plug1/relay/0/voltage'"
        );

        let err = IngestError::MalformedTopic {
            topic: "shellies".into(),
            reason: "missing device segment",
        };
        assert!(err.to_string().contains("missing device segment"));

        let err = BusError::UnknownSubscription(7);
        assert_eq!(err.to_string(), "unknown subscription handle 7");

        let err = BusError::Timeout(std::time::Duration::from_secs(5));
        assert_eq!(err.to_string(), "MQTT requests not delivered within 5s");
    }
}
