//! Playback speed multipliers.

use crate::error::PlaybackError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Base tick interval at normal speed.
pub const BASE_INTERVAL: Duration = Duration::from_millis(1000);

/// Supported playback speeds.
///
/// The set is closed: the tick interval is `base / multiplier`, so at the
/// default one-second base the intervals are 2000, 1000, 500 and 200 ms.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub enum PlaybackSpeed {
    /// 0.5x
    Half,
    /// 1x
    #[default]
    Normal,
    /// 2x
    Double,
    /// 5x
    Quintuple,
}

impl PlaybackSpeed {
    /// All speeds, slowest first.
    pub const ALL: [PlaybackSpeed; 4] = [
        PlaybackSpeed::Half,
        PlaybackSpeed::Normal,
        PlaybackSpeed::Double,
        PlaybackSpeed::Quintuple,
    ];

    /// The multiplier applied to the base rate.
    pub fn multiplier(self) -> f64 {
        match self {
            PlaybackSpeed::Half => 0.5,
            PlaybackSpeed::Normal => 1.0,
            PlaybackSpeed::Double => 2.0,
            PlaybackSpeed::Quintuple => 5.0,
        }
    }

    /// Tick interval for this speed given a base interval.
    pub fn interval(self, base: Duration) -> Duration {
        // Twice the multiplier is integral for every variant.
        let doubled = match self {
            PlaybackSpeed::Half => 1,
            PlaybackSpeed::Normal => 2,
            PlaybackSpeed::Double => 4,
            PlaybackSpeed::Quintuple => 10,
        };
        base * 2 / doubled
    }
}

impl TryFrom<f64> for PlaybackSpeed {
    type Error = PlaybackError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        PlaybackSpeed::ALL
            .into_iter()
            .find(|speed| speed.multiplier() == value)
            .ok_or_else(|| PlaybackError::UnsupportedSpeed(value.to_string()))
    }
}

impl From<PlaybackSpeed> for f64 {
    fn from(speed: PlaybackSpeed) -> Self {
        speed.multiplier()
    }
}

impl FromStr for PlaybackSpeed {
    type Err = PlaybackError;

    /// Accepts `"2"`, `"2x"`, `"0.5"` or `"0.5x"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let number = trimmed
            .strip_suffix(['x', 'X'])
            .unwrap_or(trimmed)
            .trim();
        number
            .parse::<f64>()
            .map_err(|_| PlaybackError::UnsupportedSpeed(s.to_string()))
            .and_then(PlaybackSpeed::try_from)
    }
}

impl fmt::Display for PlaybackSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.multiplier())
    }
}
