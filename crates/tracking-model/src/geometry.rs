//! Small vector types for gaze, screen, and head-pose coordinates.

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

/// A 2D vector. Used both for raw gaze (unbounded, face-relative units)
/// and for normalized screen positions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    /// Center of the normalized screen.
    pub const SCREEN_CENTER: Vec2 = Vec2 { x: 0.5, y: 0.5 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Vec2) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Linear interpolation between two points.
    pub fn lerp(a: &Vec2, b: &Vec2, t: f32) -> Vec2 {
        let t = t.clamp(0.0, 1.0);
        Vec2 {
            x: a.x + (b.x - a.x) * t,
            y: a.y + (b.y - a.y) * t,
        }
    }

    /// Clamp both components into the normalized screen `[0, 1]`.
    pub fn clamp_unit(&self) -> Vec2 {
        Vec2 {
            x: self.x.clamp(0.0, 1.0),
            y: self.y.clamp(0.0, 1.0),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// A 3D position in meters (head pose translation).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Vec3) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2))
            .sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec2_distance() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_vec2_lerp_clamps_t() {
        let a = Vec2::ZERO;
        let b = Vec2::new(1.0, 1.0);
        assert_eq!(Vec2::lerp(&a, &b, 2.0), b);
        let mid = Vec2::lerp(&a, &b, 0.5);
        assert!((mid.x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_clamp_unit() {
        let p = Vec2::new(-0.2, 1.7).clamp_unit();
        assert_eq!(p, Vec2::new(0.0, 1.0));
    }

    #[test]
    fn test_vec3_distance_in_meters() {
        let a = Vec3::new(0.0, 0.0, 0.5);
        let b = Vec3::new(0.06, 0.0, 0.5);
        assert!((a.distance_to(&b) - 0.06).abs() < 1e-6);
    }

    #[test]
    fn test_non_finite_detection() {
        assert!(!Vec2::new(f32::NAN, 0.0).is_finite());
        assert!(!Vec3::new(0.0, f32::INFINITY, 0.0).is_finite());
        assert!(Vec3::ZERO.is_finite());
    }
}
