//! Playback configuration

use crate::speed::{PlaybackSpeed, BASE_INTERVAL};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Controller settings.
///
/// Deserializes from a TOML table such as:
///
/// ```toml
/// speed = 2
/// base_interval_ms = 1000
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct PlaybackConfig {
    /// Speed the controller starts at.
    #[serde(default)]
    pub speed: PlaybackSpeed,
    /// Tick interval at 1x, in milliseconds.
    #[serde(default = "default_base_interval_ms")]
    pub base_interval_ms: u64,
}

fn default_base_interval_ms() -> u64 {
    BASE_INTERVAL.as_millis() as u64
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed: PlaybackSpeed::default(),
            base_interval_ms: default_base_interval_ms(),
        }
    }
}

impl PlaybackConfig {
    /// Set the initial speed.
    pub fn with_speed(mut self, speed: PlaybackSpeed) -> Self {
        self.speed = speed;
        self
    }

    /// Set the 1x tick interval.
    pub fn with_base_interval(mut self, base: Duration) -> Self {
        self.base_interval_ms = base.as_millis() as u64;
        self
    }

    /// The 1x tick interval, never shorter than one millisecond.
    pub fn base_interval(&self) -> Duration {
        Duration::from_millis(self.base_interval_ms.max(1))
    }
}
