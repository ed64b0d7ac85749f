use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, specta::Type)]
/// How the platform should trade accuracy for battery when producing fixes
pub enum Priority {
    /// Use GPS if possible, most accurate
    HighAccuracy,
    /// Roughly block-level accuracy
    Balanced,
    /// Roughly city-level accuracy
    LowPower,
    /// Only receive fixes other apps requested
    Passive,
}

impl Priority {
    pub fn is_high_accuracy(&self) -> bool {
        matches!(self, Self::HighAccuracy)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, specta::Type)]
/// Parameters of the periodic location subscription, not too slow, not too fast, GPS if
/// possible
pub struct LocationRequest {
    /// Target time between fixes
    pub interval_ms: u32,
    /// Fixes may arrive at most this often
    pub fastest_interval_ms: u32,
    /// Accuracy / power preference
    pub priority: Priority,
}

impl LocationRequest {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms as u64)
    }

    pub fn fastest_interval(&self) -> Duration {
        Duration::from_millis(self.fastest_interval_ms as u64)
    }
}

impl Default for LocationRequest {
    fn default() -> Self {
        Self {
            interval_ms: 10_000,
            fastest_interval_ms: 5_000,
            priority: Priority::HighAccuracy,
        }
    }
}
