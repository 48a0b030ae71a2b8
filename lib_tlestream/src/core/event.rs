//! # Change Event
//!
//! The payload pushed to subscribers whenever a cached record changes.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One record change, as delivered to subscribers.
///
/// Serialized as `{"objectId": …, "timestamp": "<RFC 3339>", "lines": […]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    /// The object whose record changed.
    pub object_id: u32,
    /// When the new record was created, in UTC.
    pub timestamp: DateTime<Utc>,
    /// The new record lines.
    pub lines: Vec<String>,
}

impl ChangeEvent {
    /// An event stamped with the current wall-clock time.
    pub fn now(object_id: u32, lines: Vec<String>) -> Self {
        Self {
            object_id,
            timestamp: Utc::now(),
            lines,
        }
    }

    /// The JSON text frame sent over the wire.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// ISO-8601 timestamp with millisecond precision, for log lines.
    pub fn timestamp_iso(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}
