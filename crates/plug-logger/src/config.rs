// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Logger configuration
//!
//! Loaded from YAML; every key is optional.
//!
//! ```yaml
//! database_path: /var/lib/plug-logger/plugs.db
//! match_policy: segment
//! mqtt:
//!   host: 192.168.1.5
//!   port: 1883
//!   subscription: "shellies/+/#"
//! ```

use crate::error::ConfigError;
use crate::filter::{MatchPolicy, TopicFilter, DEFAULT_IGNORE_MARKERS};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Logger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file
    pub database_path: String,

    /// Create missing tables at startup
    pub create_schema: bool,

    /// Topic markers that are never logged
    pub ignore_markers: Vec<String>,

    /// How `ignore_markers` are matched
    pub match_policy: MatchPolicy,

    /// Broker connection
    pub mqtt: MqttConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "plugs.db".to_string(),
            create_schema: true,
            ignore_markers: DEFAULT_IGNORE_MARKERS.iter().map(|m| m.to_string()).collect(),
            match_policy: MatchPolicy::default(),
            mqtt: MqttConfig::default(),
        }
    }
}

/// MQTT broker settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    /// Client ID (None = `plug-logger-<pid>`)
    pub client_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u64,
    /// Topic filter subscribed on every (re)connect
    pub subscription: String,
    /// Subscription QoS (0, 1 or 2)
    pub qos: u8,
    /// Delay before polling again after a connection error
    pub reconnect_delay_ms: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: None,
            username: None,
            password: None,
            keep_alive_secs: 60,
            subscription: "shellies/+/#".to_string(),
            qos: 0,
            reconnect_delay_ms: 1000,
        }
    }
}

impl MqttConfig {
    /// Configured client ID, or one derived from the process ID.
    pub fn client_id(&self) -> String {
        self.client_id
            .clone()
            .unwrap_or_else(|| format!("plug-logger-{}", std::process::id()))
    }

    /// Broker address as `host:port`.
    pub fn broker_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Check values that would only fail later at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.trim().is_empty() {
            return Err(ConfigError::Invalid("database_path is empty".into()));
        }
        if self.ignore_markers.iter().any(|m| m.is_empty()) {
            return Err(ConfigError::Invalid(
                "ignore_markers contains an empty marker".into(),
            ));
        }
        if self.mqtt.subscription.trim().is_empty() {
            return Err(ConfigError::Invalid("mqtt.subscription is empty".into()));
        }
        if self.mqtt.keep_alive_secs < 5 {
            return Err(ConfigError::Invalid(format!(
                "mqtt.keep_alive_secs must be at least 5 (got {})",
                self.mqtt.keep_alive_secs
            )));
        }
        if self.mqtt.qos > 2 {
            return Err(ConfigError::Invalid(format!(
                "mqtt.qos must be 0, 1 or 2 (got {})",
                self.mqtt.qos
            )));
        }
        Ok(())
    }

    /// Topic filter built from `ignore_markers` and `match_policy`.
    pub fn topic_filter(&self) -> TopicFilter {
        TopicFilter::new(self.match_policy, self.ignore_markers.iter().cloned())
    }
}

/// Config builder for fluent API
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    base: Option<Config>,
    database_path: Option<String>,
    create_schema: Option<bool>,
    ignore_markers: Option<Vec<String>>,
    match_policy: Option<MatchPolicy>,
    host: Option<String>,
    port: Option<u16>,
    client_id: Option<String>,
    subscription: Option<String>,
}

impl ConfigBuilder {
    /// Start from an existing configuration (e.g. loaded from file)
    pub fn from_config(config: Config) -> Self {
        Self {
            base: Some(config),
            ..Default::default()
        }
    }

    pub fn database_path(mut self, path: impl Into<String>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn create_schema(mut self, create: bool) -> Self {
        self.create_schema = Some(create);
        self
    }

    pub fn ignore_markers<I, M>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<String>,
    {
        self.ignore_markers = Some(markers.into_iter().map(Into::into).collect());
        self
    }

    pub fn match_policy(mut self, policy: MatchPolicy) -> Self {
        self.match_policy = Some(policy);
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self
    }

    /// Set the broker subscription filter
    pub fn subscription(mut self, filter: impl Into<String>) -> Self {
        self.subscription = Some(filter.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> Config {
        let mut config = self.base.unwrap_or_default();

        if let Some(path) = self.database_path {
            config.database_path = path;
        }
        if let Some(create) = self.create_schema {
            config.create_schema = create;
        }
        if let Some(markers) = self.ignore_markers {
            config.ignore_markers = markers;
        }
        if let Some(policy) = self.match_policy {
            config.match_policy = policy;
        }
        if let Some(host) = self.host {
            config.mqtt.host = host;
        }
        if let Some(port) = self.port {
            config.mqtt.port = port;
        }
        if let Some(id) = self.client_id {
            config.mqtt.client_id = Some(id);
        }
        if let Some(filter) = self.subscription {
            config.mqtt.subscription = filter;
        }

        config
    }
}
