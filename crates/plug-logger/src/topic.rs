// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topic parsing.
//!
//! Shelly plugs publish under `<root>/<device_id>/<rest...>`, e.g.
//! `shellies/shellyplug-s-1A2B3C/relay/0/power`. The device identifier is
//! always segment 1.

use crate::error::IngestError;

/// A topic split into its `/`-delimited segments.
///
/// Empty segments are kept (`a//b` has three segments), matching broker
/// tokenisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPath<'a> {
    raw: &'a str,
    segments: Vec<&'a str>,
}

impl<'a> TopicPath<'a> {
    /// Split `topic` into segments.
    ///
    /// Fails with `MalformedTopic` when there is no device segment, or when
    /// the device segment is empty.
    pub fn parse(topic: &'a str) -> Result<Self, IngestError> {
        let segments: Vec<&str> = topic.split('/').collect();

        if segments.len() < 2 {
            return Err(IngestError::MalformedTopic {
                topic: topic.to_string(),
                reason: "missing device segment",
            });
        }
        if segments[1].is_empty() {
            return Err(IngestError::MalformedTopic {
                topic: topic.to_string(),
                reason: "empty device identifier",
            });
        }

        Ok(Self {
            raw: topic,
            segments,
        })
    }

    /// The original topic string.
    pub fn as_str(&self) -> &'a str {
        self.raw
    }

    /// Device identifier (segment 1).
    pub fn device_id(&self) -> &'a str {
        self.segments[1]
    }

    /// Segment at `index`, if present.
    pub fn segment(&self, index: usize) -> Option<&'a str> {
        self.segments.get(index).copied()
    }

    pub fn segments(&self) -> &[&'a str] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false: a parsed topic has at least two segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
