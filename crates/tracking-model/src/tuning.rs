//! Tunable constants for every threshold and duration in the pipeline.
//!
//! All fields default to the reference values; a tuning file only needs
//! to name what it overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// How the smoothing factor relates to frame timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingMode {
    /// Apply the factor once per frame regardless of the frame interval.
    FixedStep,
    /// Scale the factor by the frame interval so that it matches
    /// `FixedStep` at the reference rate and stays consistent elsewhere.
    #[default]
    TimeConstant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineTuning {
    pub gaze: GazeTuning,
    pub calibration: CalibrationTuning,
    pub drift: DriftTuning,
    pub gestures: GestureTuning,
    pub decision: DecisionTuning,

    /// Rate at which per-frame factors are defined (Hz).
    pub reference_rate_hz: u32,

    /// Longest interval a single frame may contribute (seconds).
    pub max_frame_gap_secs: f64,

    /// How long a status notice stays visible (seconds).
    pub status_display_secs: f64,

    /// How long the correction gate stays held after a soft drift correction.
    pub correction_hold_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GazeTuning {
    pub smoothing_factor: f32,
    /// Lower factor used while heavy stabilization is requested.
    pub stabilized_smoothing_factor: f32,
    pub smoothing_mode: SmoothingMode,
    /// Normalized distance the cursor may wander and still count as dwelling.
    pub dwell_distance: f32,
    /// Both eye-blink channels must exceed this to count as closed.
    pub eyes_closed_threshold: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationTuning {
    pub default_sensitivity: f32,
    /// Raw deltas at or below this are too small to derive a sensitivity from.
    pub noise_floor: f32,
    /// Fraction dropped from each end before averaging candidates.
    pub trim_ratio: f32,
    pub move_secs: f64,
    pub settle_secs: f64,
    pub record_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftTuning {
    /// Distance from the calibrated head position that counts as a posture change (m).
    pub movement_threshold_m: f32,
    /// Frame-to-frame distance that counts as still moving (m).
    pub movement_reset_threshold_m: f32,
    /// How long the head must hold still before re-anchoring (s).
    pub stability_duration_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureTuning {
    pub deep_blink_secs: f64,
    pub mouth_open_threshold: f32,
    pub mouth_sequence_window_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionTuning {
    pub dwell_confirm_secs: f64,
}

impl Default for PipelineTuning {
    fn default() -> Self {
        Self {
            gaze: GazeTuning::default(),
            calibration: CalibrationTuning::default(),
            drift: DriftTuning::default(),
            gestures: GestureTuning::default(),
            decision: DecisionTuning::default(),
            reference_rate_hz: 60,
            max_frame_gap_secs: 0.1,
            status_display_secs: 4.0,
            correction_hold_secs: 1.0,
        }
    }
}

impl Default for GazeTuning {
    fn default() -> Self {
        Self {
            smoothing_factor: 0.15,
            stabilized_smoothing_factor: 0.05,
            smoothing_mode: SmoothingMode::TimeConstant,
            dwell_distance: 0.05,
            eyes_closed_threshold: 0.9,
        }
    }
}

impl Default for CalibrationTuning {
    fn default() -> Self {
        Self {
            default_sensitivity: crate::calibration::DEFAULT_SENSITIVITY,
            noise_floor: 0.01,
            trim_ratio: 0.25,
            move_secs: 1.0,
            settle_secs: 1.0,
            record_secs: 0.5,
        }
    }
}

impl Default for DriftTuning {
    fn default() -> Self {
        Self {
            movement_threshold_m: 0.05,
            movement_reset_threshold_m: 0.005,
            stability_duration_secs: 3.0,
        }
    }
}

impl Default for GestureTuning {
    fn default() -> Self {
        Self {
            deep_blink_secs: 3.0,
            mouth_open_threshold: 0.5,
            mouth_sequence_window_secs: 5.0,
        }
    }
}

impl Default for DecisionTuning {
    fn default() -> Self {
        Self {
            dwell_confirm_secs: 3.0,
        }
    }
}

/// Errors from loading or validating tuning.
#[derive(Debug, thiserror::Error)]
pub enum TuningError {
    #[error("failed to read tuning file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse tuning file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid tuning: {field} {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl PipelineTuning {
    /// Load overrides from a JSON file and validate them.
    pub fn load(path: &Path) -> Result<Self, TuningError> {
        let content = std::fs::read_to_string(path)?;
        let tuning: Self = serde_json::from_str(&content)?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Fail on the first invalid field.
    pub fn validate(&self) -> Result<(), TuningError> {
        match self.violations().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Every invalid field, in declaration order.
    pub fn violations(&self) -> Vec<TuningError> {
        let mut out = Vec::new();
        let mut check = |ok: bool, field: &'static str, reason: &str| {
            if !ok {
                out.push(TuningError::Invalid {
                    field,
                    reason: reason.to_string(),
                });
            }
        };

        let unit_factor = |f: f32| f > 0.0 && f <= 1.0;
        let positive = |v: f64| v.is_finite() && v > 0.0;

        check(
            unit_factor(self.gaze.smoothing_factor),
            "gaze.smoothing_factor",
            "must be in (0, 1]",
        );
        check(
            unit_factor(self.gaze.stabilized_smoothing_factor),
            "gaze.stabilized_smoothing_factor",
            "must be in (0, 1]",
        );
        check(
            self.gaze.dwell_distance > 0.0,
            "gaze.dwell_distance",
            "must be positive",
        );
        check(
            (0.0..1.0).contains(&self.gaze.eyes_closed_threshold),
            "gaze.eyes_closed_threshold",
            "must be in [0, 1)",
        );
        check(
            self.calibration.default_sensitivity > 0.0,
            "calibration.default_sensitivity",
            "must be positive",
        );
        check(
            self.calibration.noise_floor >= 0.0,
            "calibration.noise_floor",
            "must not be negative",
        );
        check(
            (0.0..0.5).contains(&self.calibration.trim_ratio),
            "calibration.trim_ratio",
            "must be in [0, 0.5)",
        );
        check(
            positive(self.calibration.record_secs),
            "calibration.record_secs",
            "must be positive",
        );
        check(
            self.calibration.move_secs >= 0.0 && self.calibration.settle_secs >= 0.0,
            "calibration.move_secs/settle_secs",
            "must not be negative",
        );
        check(
            self.drift.movement_threshold_m > self.drift.movement_reset_threshold_m
                && self.drift.movement_reset_threshold_m > 0.0,
            "drift.movement_threshold_m",
            "must exceed a positive movement_reset_threshold_m",
        );
        check(
            positive(self.drift.stability_duration_secs),
            "drift.stability_duration_secs",
            "must be positive",
        );
        check(
            positive(self.gestures.deep_blink_secs),
            "gestures.deep_blink_secs",
            "must be positive",
        );
        check(
            (0.0..1.0).contains(&self.gestures.mouth_open_threshold),
            "gestures.mouth_open_threshold",
            "must be in [0, 1)",
        );
        check(
            positive(self.gestures.mouth_sequence_window_secs),
            "gestures.mouth_sequence_window_secs",
            "must be positive",
        );
        check(
            positive(self.decision.dwell_confirm_secs),
            "decision.dwell_confirm_secs",
            "must be positive",
        );
        check(
            self.reference_rate_hz > 0,
            "reference_rate_hz",
            "must be positive",
        );
        check(
            positive(self.max_frame_gap_secs),
            "max_frame_gap_secs",
            "must be positive",
        );
        check(
            self.status_display_secs >= 0.0 && self.correction_hold_secs >= 0.0,
            "status_display_secs/correction_hold_secs",
            "must not be negative",
        );

        out
    }
}
