//! Calibration data: the gaze-to-screen mapping and target point patterns.

use serde::{Deserialize, Serialize};

use crate::geometry::Vec2;

/// Sensitivity used before any calibration has run.
pub const DEFAULT_SENSITIVITY: f32 = 2.0;

/// Affine mapping from raw gaze to normalized screen coordinates.
///
/// `screen.x = raw.x * sensitivity_x + offset_x + 0.5`
/// `screen.y = -raw.y * sensitivity_y + offset_y + 0.5`
///
/// Y is inverted: face-space "up" is positive, screen Y grows downward.
/// Sensitivities are always positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    pub sensitivity_x: f32,
    pub sensitivity_y: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self::with_sensitivity(DEFAULT_SENSITIVITY)
    }
}

impl CalibrationProfile {
    /// Uncalibrated profile with the given sensitivity on both axes.
    pub fn with_sensitivity(sensitivity: f32) -> Self {
        let sensitivity = if sensitivity > 0.0 {
            sensitivity
        } else {
            DEFAULT_SENSITIVITY
        };
        Self {
            sensitivity_x: sensitivity,
            sensitivity_y: sensitivity,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }

    /// Map a raw gaze vector to (unclamped) screen coordinates.
    pub fn map(&self, raw: Vec2) -> Vec2 {
        Vec2 {
            x: raw.x * self.sensitivity_x + self.offset_x + 0.5,
            y: -raw.y * self.sensitivity_y + self.offset_y + 0.5,
        }
    }

    /// Set offsets so that `center_raw` maps exactly to screen center
    /// under the current sensitivities.
    pub fn anchor_center(&mut self, center_raw: Vec2) {
        self.offset_x = -(center_raw.x * self.sensitivity_x);
        self.offset_y = center_raw.y * self.sensitivity_y;
    }
}

/// Error raised when building a custom calibration pattern.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatternError {
    #[error("calibration pattern is empty")]
    Empty,

    #[error("first calibration point must be screen center, got ({x}, {y})")]
    FirstNotCenter { x: f32, y: f32 },

    #[error("calibration point {index} is outside the screen: ({x}, {y})")]
    OutOfBounds { index: usize, x: f32, y: f32 },
}

/// Ordered target points presented one at a time during calibration.
/// The first point is always screen center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPattern {
    points: Vec<Vec2>,
}

impl CalibrationPattern {
    /// Center, four corners, then four edge midpoints.
    pub fn standard() -> Self {
        Self {
            points: vec![
                Vec2::SCREEN_CENTER,
                Vec2::new(0.1, 0.1),
                Vec2::new(0.9, 0.1),
                Vec2::new(0.9, 0.9),
                Vec2::new(0.1, 0.9),
                Vec2::new(0.5, 0.1),
                Vec2::new(0.9, 0.5),
                Vec2::new(0.5, 0.9),
                Vec2::new(0.1, 0.5),
            ],
        }
    }

    /// The standard pattern plus four inner points at 0.3 / 0.7.
    pub fn with_inner_points() -> Self {
        let mut pattern = Self::standard();
        pattern.points.extend([
            Vec2::new(0.3, 0.3),
            Vec2::new(0.7, 0.3),
            Vec2::new(0.7, 0.7),
            Vec2::new(0.3, 0.7),
        ]);
        pattern
    }

    /// A caller-supplied sequence of targets.
    pub fn custom(points: Vec<Vec2>) -> Result<Self, PatternError> {
        let first = points.first().ok_or(PatternError::Empty)?;
        if first.distance_to(&Vec2::SCREEN_CENTER) > 1e-6 {
            return Err(PatternError::FirstNotCenter {
                x: first.x,
                y: first.y,
            });
        }
        if let Some((index, p)) = points
            .iter()
            .enumerate()
            .find(|(_, p)| !(0.0..=1.0).contains(&p.x) || !(0.0..=1.0).contains(&p.y))
        {
            return Err(PatternError::OutOfBounds {
                index,
                x: p.x,
                y: p.y,
            });
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl Default for CalibrationPattern {
    fn default() -> Self {
        Self::standard()
    }
}
