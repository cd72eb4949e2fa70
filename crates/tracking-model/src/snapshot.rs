//! The immutable per-frame view published to UI consumers.

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationProfile;
use crate::decision::DecisionMethod;
use crate::geometry::Vec2;
use crate::sample::TimestampNs;

/// Availability of the face-tracking collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TrackingStatus {
    /// Frames are arriving.
    Active,
    /// No frames yet this session.
    #[default]
    Waiting,
    /// Frames stopped arriving; cursor and dwell are frozen.
    Lost,
    /// Tracking hardware is unsupported. Terminal for the session.
    Unsupported { reason: String },
}

/// Phase of the current calibration target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationPhase {
    /// The UI is moving the marker to the target.
    Moving,
    /// The user is settling their gaze on the target.
    Settling,
    /// Raw gaze is being collected for the target.
    Recording,
}

/// Progress of a running calibration session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProgress {
    /// Zero-based index of the current target.
    pub point_index: usize,
    /// Total number of targets.
    pub point_count: usize,
    /// Current target in normalized screen coordinates.
    pub target: Vec2,
    pub phase: CalibrationPhase,
}

/// Kind of human-readable notice shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    DriftCorrected,
    Recalibrating,
    CalibrationComplete,
    CalibrationAborted,
}

impl NoticeKind {
    pub fn message(&self) -> &'static str {
        match self {
            Self::DriftCorrected => "Posture change detected, pointer re-anchored",
            Self::Recalibrating => "Recalibrating…",
            Self::CalibrationComplete => "Calibration complete",
            Self::CalibrationAborted => "Calibration aborted",
        }
    }
}

/// A status notice with the sample time it was raised at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusNotice {
    pub kind: NoticeKind,
    pub raised_at_ns: TimestampNs,
}

/// Everything the UI layer needs for one frame.
///
/// Consumers hold read-only copies; the only writer is the update loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    /// Timestamp of the sample this snapshot was computed from.
    pub timestamp_ns: TimestampNs,

    /// Smoothed pointer position `[0, 1]²`.
    pub cursor_position: Vec2,

    /// Seconds the pointer has been stationary.
    pub dwell_time: f64,

    /// A deep blink completed and has not been cleared by the consumer.
    pub did_confirm_deep_blink: bool,

    /// A double mouth-open completed and has not been cleared by the consumer.
    pub did_confirm_double_mouth_open: bool,

    /// The active method's signal has crossed its confirmation threshold.
    pub confirmation_ready: bool,

    /// The user's selected confirmation method.
    pub decision_method: DecisionMethod,

    /// Human-readable notice, auto-cleared after a few seconds.
    pub status_message: Option<String>,

    pub tracking: TrackingStatus,

    /// Present while a calibration session runs.
    pub calibration: Option<CalibrationProgress>,

    /// The current gaze-to-screen mapping.
    pub profile: CalibrationProfile,
}

impl PipelineSnapshot {
    pub fn is_tracking_active(&self) -> bool {
        self.tracking == TrackingStatus::Active
    }
}

impl Default for PipelineSnapshot {
    fn default() -> Self {
        Self {
            timestamp_ns: 0,
            cursor_position: Vec2::SCREEN_CENTER,
            dwell_time: 0.0,
            did_confirm_deep_blink: false,
            did_confirm_double_mouth_open: false,
            confirmation_ready: false,
            decision_method: DecisionMethod::default(),
            status_message: None,
            tracking: TrackingStatus::default(),
            calibration: None,
            profile: CalibrationProfile::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_snapshot_is_centered_and_waiting() {
        let snapshot = PipelineSnapshot::default();
        assert_eq!(snapshot.cursor_position, Vec2::SCREEN_CENTER);
        assert!(!snapshot.is_tracking_active());
        assert_eq!(snapshot.tracking, TrackingStatus::Waiting);
    }

    #[test]
    fn test_tracking_status_serializes_tagged() {
        let json = serde_json::to_string(&TrackingStatus::Unsupported {
            reason: "no TrueDepth camera".to_string(),
        })
        .unwrap();
        assert!(json.contains("\"state\":\"unsupported\""));
        assert!(json.contains("no TrueDepth camera"));
    }
}
