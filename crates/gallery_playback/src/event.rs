//! Playback events.
//!
//! An event is a timestamped record of something that happened to the
//! repository (a file read, an edit, a tool call). The controller only
//! cares about ordering; every other field rides along untouched in the
//! payload and is handed to listeners as-is.

use crate::error::{PlaybackError, Result};
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// A single recorded event.
///
/// On the wire this is a JSON object with a `timestamp` string, an optional
/// `timestampMs` number, and any number of extra fields:
///
/// ```json
/// { "timestamp": "2024-05-01T12:00:00Z", "tool": "Read", "filePaths": ["src/lib.rs"] }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEvent", rename_all = "camelCase")]
pub struct PlaybackEvent {
    timestamp: String,
    timestamp_ms: i64,
    #[serde(flatten)]
    payload: Map<String, Value>,
}

/// Deserialization shape before `timestamp_ms` is derived.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    timestamp: String,
    #[serde(default)]
    timestamp_ms: Option<i64>,
    #[serde(flatten)]
    payload: Map<String, Value>,
}

impl TryFrom<RawEvent> for PlaybackEvent {
    type Error = PlaybackError;

    fn try_from(raw: RawEvent) -> Result<Self> {
        let timestamp_ms = match raw.timestamp_ms {
            Some(ms) => ms,
            None => parse_timestamp_ms(&raw.timestamp)?,
        };
        Ok(Self {
            timestamp: raw.timestamp,
            timestamp_ms,
            payload: raw.payload,
        })
    }
}

impl PlaybackEvent {
    /// Create an event, deriving `timestamp_ms` from the ISO-8601 timestamp.
    pub fn new(timestamp: impl Into<String>, payload: Map<String, Value>) -> Result<Self> {
        let timestamp = timestamp.into();
        let timestamp_ms = parse_timestamp_ms(&timestamp)?;
        Ok(Self {
            timestamp,
            timestamp_ms,
            payload,
        })
    }

    /// Create an event from already-known parts. No consistency check is made
    /// between `timestamp` and `timestamp_ms`.
    pub fn from_parts(
        timestamp: impl Into<String>,
        timestamp_ms: i64,
        payload: Map<String, Value>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            timestamp_ms,
            payload,
        }
    }

    /// The original timestamp string.
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Milliseconds since the Unix epoch.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    /// All pass-through fields.
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// A single pass-through field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }

    /// A pass-through field, if it is a string.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str)
    }

    /// Parse a JSON array of events, preserving array order.
    pub fn from_json_str(json: &str) -> Result<Vec<Self>> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Load a JSON array of events from a file.
pub fn load_events(path: impl AsRef<Path>) -> Result<Vec<PlaybackEvent>> {
    let content = fs::read_to_string(path.as_ref())?;
    let events = PlaybackEvent::from_json_str(&content)?;
    tracing::debug!(
        "Loaded {} events from {}",
        events.len(),
        path.as_ref().display()
    );
    Ok(events)
}

/// Convert an ISO-8601 timestamp to epoch milliseconds.
///
/// Offsets are honoured; a timestamp without an offset is read as UTC.
fn parse_timestamp_ms(timestamp: &str) -> Result<i64> {
    match DateTime::parse_from_rfc3339(timestamp) {
        Ok(dt) => Ok(dt.timestamp_millis()),
        Err(source) => NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc().timestamp_millis())
            .map_err(|_| PlaybackError::InvalidTimestamp {
                timestamp: timestamp.to_string(),
                source,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_derives_timestamp_ms() {
        let event = PlaybackEvent::new("2024-05-01T12:00:00Z", Map::new()).unwrap();
        assert_eq!(event.timestamp_ms(), 1_714_564_800_000);
        assert_eq!(event.timestamp(), "2024-05-01T12:00:00Z");
    }

    #[test]
    fn test_offset_and_naive_timestamps() {
        let offset = PlaybackEvent::new("2024-05-01T14:00:00.250+02:00", Map::new()).unwrap();
        assert_eq!(offset.timestamp_ms(), 1_714_564_800_250);

        let naive = PlaybackEvent::new("2024-05-01T12:00:00", Map::new()).unwrap();
        assert_eq!(naive.timestamp_ms(), 1_714_564_800_000);
    }

    #[test]
    fn test_invalid_timestamp() {
        let err = PlaybackEvent::new("yesterday", Map::new()).unwrap_err();
        assert!(matches!(err, PlaybackError::InvalidTimestamp { .. }));
    }

    #[test]
    fn test_payload_passes_through() {
        let events = PlaybackEvent::from_json_str(
            r#"[
                {"timestamp": "2024-05-01T12:00:00Z", "tool": "Read", "filePaths": ["src/lib.rs"]},
                {"timestamp": "2024-05-01T12:00:01Z", "timestampMs": 42, "tool": "Edit"}
            ]"#,
        )
        .unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].str_field("tool"), Some("Read"));
        assert_eq!(events[0].field("filePaths"), Some(&json!(["src/lib.rs"])));
        assert!(events[0].field("timestamp").is_none());

        // An explicit timestampMs wins even when it disagrees with timestamp.
        assert_eq!(events[1].timestamp_ms(), 42);
        assert_eq!(events[1].str_field("tool"), Some("Edit"));
    }

    #[test]
    fn test_order_is_preserved() {
        let events = PlaybackEvent::from_json_str(
            r#"[
                {"timestamp": "2024-05-01T12:00:05Z"},
                {"timestamp": "2024-05-01T12:00:01Z"}
            ]"#,
        )
        .unwrap();
        assert!(events[0].timestamp_ms() > events[1].timestamp_ms());
    }

    #[test]
    fn test_serializes_camel_case_with_flattened_payload() {
        let mut payload = Map::new();
        payload.insert("operation".into(), json!("edit"));
        let event = PlaybackEvent::from_parts("2024-05-01T12:00:00Z", 7, payload);

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"timestamp": "2024-05-01T12:00:00Z", "timestampMs": 7, "operation": "edit"})
        );
    }

    #[test]
    fn test_missing_timestamp_is_rejected() {
        assert!(PlaybackEvent::from_json_str(r#"[{"tool": "Read"}]"#).is_err());
    }

    #[test]
    fn test_load_events_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"timestamp": "2024-05-01T12:00:00Z", "tool": "Read"}}]"#).unwrap();

        let events = load_events(file.path()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].str_field("tool"), Some("Read"));
    }

    #[test]
    fn test_load_events_missing_file() {
        let err = load_events("/non/existent/events.json").unwrap_err();
        assert!(matches!(err, PlaybackError::Io(_)));
    }
}
