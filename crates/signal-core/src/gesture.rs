//! Gesture Detectors: sustained eyes-closed and double mouth-open.
//!
//! Both detectors run on every frame whatever decision method is selected.
//! Routing an event to "confirm" or "recalibrate" happens later, in
//! [`crate::decision::route_gesture`].

use gazelink_common::clock::SessionClock;
use gazelink_tracking_model::sample::{RawSample, TimestampNs};
use gazelink_tracking_model::tuning::PipelineTuning;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct GestureConfig {
    /// Closure length that counts as a deep blink (s).
    pub deep_blink_secs: f64,
    pub eyes_closed_threshold: f32,
    pub mouth_open_threshold: f32,
    /// Time allowed between the first and second mouth-open (s).
    pub mouth_sequence_window_secs: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self::from_tuning(&PipelineTuning::default())
    }
}

impl GestureConfig {
    pub fn from_tuning(tuning: &PipelineTuning) -> Self {
        Self {
            deep_blink_secs: tuning.gestures.deep_blink_secs,
            eyes_closed_threshold: tuning.gaze.eyes_closed_threshold,
            mouth_open_threshold: tuning.gestures.mouth_open_threshold,
            mouth_sequence_window_secs: tuning.gestures.mouth_sequence_window_secs,
        }
    }
}

/// One-shot gesture events completed on a single frame.
///
/// Both may be set together; the dispatcher decides which one matters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GestureEvents {
    pub deep_blink: bool,
    pub double_mouth_open: bool,
}

impl GestureEvents {
    pub fn any(&self) -> bool {
        self.deep_blink || self.double_mouth_open
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum EyeState {
    Open,
    Closing { since: TimestampNs },
}

/// Fires once when the eyes reopen after staying closed long enough.
pub struct SustainedBlinkDetector {
    threshold_secs: f64,
    eyes_closed_threshold: f32,
    state: EyeState,
}

impl SustainedBlinkDetector {
    pub fn new(config: &GestureConfig) -> Self {
        Self {
            threshold_secs: config.deep_blink_secs,
            eyes_closed_threshold: config.eyes_closed_threshold,
            state: EyeState::Open,
        }
    }

    /// Returns true on the frame a qualifying closure ends.
    pub fn update(&mut self, sample: &RawSample) -> bool {
        let closed = sample.eyes_closed(self.eyes_closed_threshold);
        match (self.state, closed) {
            (EyeState::Open, true) => {
                self.state = EyeState::Closing {
                    since: sample.timestamp_ns,
                };
                false
            }
            (EyeState::Closing { since }, false) => {
                self.state = EyeState::Open;
                let closed_for = SessionClock::secs_between(since, sample.timestamp_ns);
                if closed_for >= self.threshold_secs {
                    tracing::info!(closed_for, "Deep blink detected");
                    true
                } else {
                    tracing::trace!(closed_for, "Closure too short for deep blink");
                    false
                }
            }
            _ => false,
        }
    }

    /// Start time of the closure in progress, if any.
    pub fn closing_since(&self) -> Option<TimestampNs> {
        match self.state {
            EyeState::Open => None,
            EyeState::Closing { since } => Some(since),
        }
    }

    pub fn reset(&mut self) {
        self.state = EyeState::Open;
    }
}

/// Counts open-to-closed mouth transitions and fires on the second one
/// inside the sequence window.
pub struct DoubleMouthOpenDetector {
    window_secs: f64,
    open_threshold: f32,
    was_open: bool,
    count: u8,
    last_count_ns: TimestampNs,
}

impl DoubleMouthOpenDetector {
    pub fn new(config: &GestureConfig) -> Self {
        Self {
            window_secs: config.mouth_sequence_window_secs,
            open_threshold: config.mouth_open_threshold,
            was_open: false,
            count: 0,
            last_count_ns: 0,
        }
    }

    /// Returns true on the frame the second mouth-open completes.
    pub fn update(&mut self, sample: &RawSample) -> bool {
        let now = sample.timestamp_ns;

        if self.count >= 1
            && SessionClock::secs_between(self.last_count_ns, now) > self.window_secs
        {
            tracing::debug!("Mouth-open sequence timed out");
            self.count = 0;
        }

        let open = sample.mouth_open(self.open_threshold);
        let closed_now = self.was_open && !open;
        self.was_open = open;

        if !closed_now {
            return false;
        }

        self.count += 1;
        self.last_count_ns = now;

        if self.count >= 2 {
            self.count = 0;
            tracing::info!("Double mouth-open detected");
            true
        } else {
            false
        }
    }

    /// Completed opens in the current sequence (0 or 1).
    pub fn count(&self) -> u8 {
        self.count
    }

    pub fn reset(&mut self) {
        self.was_open = false;
        self.count = 0;
    }
}
