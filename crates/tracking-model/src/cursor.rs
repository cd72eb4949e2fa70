//! Cursor and head-reference state.

use serde::{Deserialize, Serialize};

use crate::geometry::{Vec2, Vec3};
use crate::sample::TimestampNs;

/// Stabilized pointer state, recomputed every open-eye frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorState {
    /// Smoothed position in normalized screen coordinates `[0, 1]²`.
    pub position: Vec2,

    /// Seconds the cursor has stayed near the current dwell checkpoint.
    pub dwell_time: f64,
}

impl Default for CursorState {
    fn default() -> Self {
        Self {
            position: Vec2::SCREEN_CENTER,
            dwell_time: 0.0,
        }
    }
}

/// Head-position reference used for posture drift detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadReference {
    /// Head position when the mapping was last calibrated or re-anchored.
    pub calibrated_position: Vec3,

    /// Head position seen on the previous frame.
    pub last_frame_position: Vec3,

    /// Last time the head was still moving.
    pub last_movement_ns: TimestampNs,

    /// The head left the reference and has not settled yet.
    pub waiting_for_stability: bool,
}

impl HeadReference {
    /// Reference anchored at `position`, as seen at `now_ns`.
    pub fn anchored(position: Vec3, now_ns: TimestampNs) -> Self {
        Self {
            calibrated_position: position,
            last_frame_position: position,
            last_movement_ns: now_ns,
            waiting_for_stability: false,
        }
    }
}
