// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Filtering of administrative and noise topics.
//!
//! Shelly plugs publish a number of topics that carry no measurement:
//!
//! - `online`, `info`, `announce` -- posted on (re)connect
//! - `temperature_f` -- Fahrenheit duplicate of `temperature`
//! - `overtemperature` -- boolean flag, not a reading
//! - `command` -- the inbound toggle topic
//!
//! Two match policies are supported. [`MatchPolicy::Substring`] drops a topic
//! when a marker occurs anywhere in it. This is over-broad: a device named
//! `command123` or `kitchen-info` is dropped as well. [`MatchPolicy::Segment`]
//! only drops topics with a segment exactly equal to a marker.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Markers dropped by default.
pub const DEFAULT_IGNORE_MARKERS: [&str; 6] = [
    "online",
    "temperature_f",
    "overtemperature",
    "command",
    "info",
    "announce",
];

/// How ignore markers are matched against a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Marker found anywhere in the topic string.
    #[default]
    Substring,
    /// Marker equal to one of the `/`-delimited segments.
    Segment,
}

impl MatchPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Substring => "substring",
            Self::Segment => "segment",
        }
    }
}

impl fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Topic ignore filter.
#[derive(Debug, Clone)]
pub struct TopicFilter {
    policy: MatchPolicy,
    markers: Vec<String>,
}

impl Default for TopicFilter {
    fn default() -> Self {
        Self::new(
            MatchPolicy::default(),
            DEFAULT_IGNORE_MARKERS.iter().map(|m| m.to_string()),
        )
    }
}

impl TopicFilter {
    /// Create a filter from a policy and a set of markers.
    pub fn new(policy: MatchPolicy, markers: impl IntoIterator<Item = String>) -> Self {
        Self {
            policy,
            markers: markers.into_iter().collect(),
        }
    }

    /// Returns the first marker matching `topic`, if any.
    pub fn matched_marker(&self, topic: &str) -> Option<&str> {
        let marker = match self.policy {
            MatchPolicy::Substring => self.markers.iter().find(|m| topic.contains(m.as_str())),
            MatchPolicy::Segment => self
                .markers
                .iter()
                .find(|m| topic.split('/').any(|segment| segment == m.as_str())),
        };
        marker.map(String::as_str)
    }

    /// Check if a topic should be dropped before classification.
    pub fn is_ignored(&self, topic: &str) -> bool {
        self.matched_marker(topic).is_some()
    }
}
