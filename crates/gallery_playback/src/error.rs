//! Playback error types

use thiserror::Error;

/// Errors raised while loading events or parsing playback settings.
///
/// The controller itself never fails; navigation on an empty or exhausted
/// sequence is a no-op.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// Failed to read an event file
    #[error("Failed to read events: {0}")]
    Io(#[from] std::io::Error),

    /// Event file is not a JSON array of events
    #[error("Invalid event JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Event timestamp is not RFC 3339 and no `timestampMs` was given
    #[error("Invalid event timestamp {timestamp:?}: {source}")]
    InvalidTimestamp {
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },

    /// Speed outside the supported multiplier set
    #[error("Unsupported playback speed: {0} (expected one of 0.5, 1, 2, 5)")]
    UnsupportedSpeed(String),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
