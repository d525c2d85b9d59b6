//! Delivery rate control for frame subscriptions

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Shortest period a throttled subscription can tick at
pub const MIN_THROTTLE_INTERVAL: Duration = Duration::from_nanos(1);

/// Delivery rate for a frame subscription.
///
/// The stock firmware emits `fs / N` = 62.5 frames per second. Plotting
/// consumers rarely need that; audio triggers usually want every frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateRate {
    /// Every frame, in order
    Native,

    /// At most this many frames per second, latest frame wins.
    /// A rate at or above the source rate behaves like `Native`.
    Max(u32),
}

impl UpdateRate {
    /// Normalize rate against the source frame rate
    pub fn normalize(self, source_hz: f64) -> Self {
        match self {
            UpdateRate::Native => UpdateRate::Native,
            UpdateRate::Max(0) => UpdateRate::Native,
            UpdateRate::Max(hz) if f64::from(hz) >= source_hz => UpdateRate::Native,
            UpdateRate::Max(hz) => UpdateRate::Max(hz),
        }
    }

    /// Throttle interval, if the rate is below the source rate.
    ///
    /// Never zero: rates too high to express in nanoseconds clamp to 1ns.
    pub fn throttle_interval(self, source_hz: f64) -> Option<Duration> {
        match self.normalize(source_hz) {
            UpdateRate::Native => None,
            UpdateRate::Max(hz) => {
                Some(Duration::from_secs_f64(1.0 / f64::from(hz)).max(MIN_THROTTLE_INTERVAL))
            }
        }
    }
}
