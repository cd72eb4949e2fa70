//! Clock and timing utilities for the per-frame update loop.
//!
//! Every sample is stamped with monotonic nanoseconds since the session
//! epoch. This module provides utilities for:
//! - Capturing the session epoch
//! - Deriving per-frame intervals from sample timestamps
//! - Pacing a sample source at a nominal rate

use std::time::Instant;

/// A session clock that provides monotonic timestamps relative to
/// a fixed epoch (the moment tracking started).
#[derive(Debug, Clone)]
pub struct SessionClock {
    /// The instant tracking started.
    epoch: Instant,

    /// Wall-clock time at epoch (ISO 8601 string).
    epoch_wall: String,
}

impl SessionClock {
    /// Create a new session clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Get nanoseconds elapsed since session start.
    pub fn elapsed_ns(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    /// Wall-clock time at session start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }

    /// Convert a nanosecond value to seconds.
    pub fn ns_to_secs(ns: u64) -> f64 {
        ns as f64 / 1_000_000_000.0
    }

    /// Convert seconds to nanoseconds. Negative input saturates to zero.
    pub fn secs_to_ns(secs: f64) -> u64 {
        (secs.max(0.0) * 1_000_000_000.0) as u64
    }

    /// Seconds between two sample timestamps, zero if `later` is not after `earlier`.
    pub fn secs_between(earlier_ns: u64, later_ns: u64) -> f64 {
        Self::ns_to_secs(later_ns.saturating_sub(earlier_ns))
    }
}

/// Derives the frame interval from consecutive sample timestamps.
///
/// The first frame after construction or [`FrameClock::reset`] reports the
/// nominal interval. Gaps are clamped to `max_gap_secs` so a stall never
/// shows up as one giant step; out-of-order stamps yield zero.
#[derive(Debug, Clone)]
pub struct FrameClock {
    nominal_interval_secs: f64,
    max_gap_secs: f64,
    last_ns: Option<u64>,
}

impl FrameClock {
    pub fn new(nominal_hz: u32, max_gap_secs: f64) -> Self {
        Self {
            nominal_interval_secs: 1.0 / nominal_hz.max(1) as f64,
            max_gap_secs: max_gap_secs.max(0.0),
            last_ns: None,
        }
    }

    /// Advance to `timestamp_ns` and return the elapsed interval in seconds.
    pub fn tick(&mut self, timestamp_ns: u64) -> f64 {
        let dt = match self.last_ns {
            None => self.nominal_interval_secs,
            Some(prev) => SessionClock::secs_between(prev, timestamp_ns).min(self.max_gap_secs),
        };
        self.last_ns = Some(self.last_ns.map_or(timestamp_ns, |prev| prev.max(timestamp_ns)));
        dt
    }

    /// Forget the previous timestamp (e.g. after tracking was lost).
    pub fn reset(&mut self) {
        self.last_ns = None;
    }

    /// Timestamp of the most recent tick.
    pub fn last_timestamp_ns(&self) -> Option<u64> {
        self.last_ns
    }
}

/// Rate controller for pacing a sample source.
#[derive(Debug)]
pub struct RateController {
    target_interval_ns: u64,
    last_tick_ns: Option<u64>,
}

impl RateController {
    /// Create a controller targeting the given Hz rate.
    pub fn new(target_hz: u32) -> Self {
        Self {
            target_interval_ns: 1_000_000_000 / target_hz.max(1) as u64,
            last_tick_ns: None,
        }
    }

    /// Check if enough time has passed for the next tick.
    /// Returns true and updates internal state if ready.
    /// The first call always returns true.
    pub fn should_tick(&mut self, current_ns: u64) -> bool {
        match self.last_tick_ns {
            None => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            Some(last) if current_ns >= last + self.target_interval_ns => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            _ => false,
        }
    }

    /// Nanoseconds until the next tick is due, zero if already due.
    pub fn remaining_ns(&self, current_ns: u64) -> u64 {
        match self.last_tick_ns {
            None => 0,
            Some(last) => (last + self.target_interval_ns).saturating_sub(current_ns),
        }
    }
}
