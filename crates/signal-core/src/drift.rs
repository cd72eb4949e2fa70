//! Drift Corrector: re-anchors the head reference after a posture change.
//!
//! Two thresholds separate "the head moved" from "the head settled somewhere
//! else":
//! - leaving `movement_threshold_m` around the calibrated position starts a
//!   wait for stability;
//! - while waiting, any frame-to-frame step above `movement_reset_threshold_m`
//!   restarts the stability timer.
//!
//! After `stability_duration_secs` without such a step the calibrated head
//! position is replaced with the current one. Gaze sensitivity and offsets
//! are never touched.

use gazelink_common::clock::SessionClock;
use gazelink_tracking_model::cursor::HeadReference;
use gazelink_tracking_model::geometry::Vec3;
use gazelink_tracking_model::sample::TimestampNs;
use gazelink_tracking_model::tuning::PipelineTuning;

#[derive(Debug, Clone)]
pub struct DriftConfig {
    pub movement_threshold_m: f32,
    pub movement_reset_threshold_m: f32,
    pub stability_duration_secs: f64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self::from_tuning(&PipelineTuning::default())
    }
}

impl DriftConfig {
    pub fn from_tuning(tuning: &PipelineTuning) -> Self {
        Self {
            movement_threshold_m: tuning.drift.movement_threshold_m,
            movement_reset_threshold_m: tuning.drift.movement_reset_threshold_m,
            stability_duration_secs: tuning.drift.stability_duration_secs,
        }
    }
}

/// A soft correction: the head reference moved, the gaze mapping did not.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftCorrection {
    pub previous: Vec3,
    pub anchored: Vec3,
    pub timestamp_ns: TimestampNs,
}

impl DriftCorrection {
    /// Distance the reference moved, in meters.
    pub fn displacement_m(&self) -> f32 {
        self.previous.distance_to(&self.anchored)
    }
}

pub struct DriftCorrector {
    config: DriftConfig,
    reference: Option<HeadReference>,
}

impl DriftCorrector {
    pub fn new(config: DriftConfig) -> Self {
        Self {
            config,
            reference: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DriftConfig::default())
    }

    /// Feed one head position.
    ///
    /// `allow_correction` is false while another correction holds the gate;
    /// a correction that would fire then is dropped and the stability wait
    /// starts over.
    pub fn update(
        &mut self,
        head: Vec3,
        now: TimestampNs,
        allow_correction: bool,
    ) -> Option<DriftCorrection> {
        if !head.is_finite() {
            return None;
        }

        let Some(reference) = self.reference.as_mut() else {
            self.reference = Some(HeadReference::anchored(head, now));
            tracing::debug!(x = head.x, y = head.y, z = head.z, "Head reference initialized");
            return None;
        };

        let from_reference = head.distance_to(&reference.calibrated_position);
        let frame_step = head.distance_to(&reference.last_frame_position);
        reference.last_frame_position = head;

        if from_reference <= self.config.movement_threshold_m {
            if reference.waiting_for_stability {
                tracing::debug!("Head returned to reference posture");
            }
            reference.waiting_for_stability = false;
            reference.last_movement_ns = now;
            return None;
        }

        if !reference.waiting_for_stability {
            reference.waiting_for_stability = true;
            reference.last_movement_ns = now;
            tracing::debug!(from_reference, "Head left reference; waiting for stability");
            return None;
        }

        if frame_step > self.config.movement_reset_threshold_m {
            reference.last_movement_ns = now;
            return None;
        }

        let still_for = SessionClock::secs_between(reference.last_movement_ns, now);
        if still_for < self.config.stability_duration_secs {
            return None;
        }

        if !allow_correction {
            tracing::debug!("Drift correction suppressed by correction gate");
            reference.last_movement_ns = now;
            return None;
        }

        let correction = DriftCorrection {
            previous: reference.calibrated_position,
            anchored: head,
            timestamp_ns: now,
        };
        *reference = HeadReference::anchored(head, now);

        tracing::info!(
            displacement_m = correction.displacement_m(),
            "Posture drift corrected; head reference re-anchored"
        );
        Some(correction)
    }

    /// Anchor the reference at `head` (used when calibration runs).
    pub fn reanchor(&mut self, head: Vec3, now: TimestampNs) {
        if head.is_finite() {
            self.reference = Some(HeadReference::anchored(head, now));
        }
    }

    /// Forget the reference; the next frame re-initializes it.
    pub fn reset(&mut self) {
        self.reference = None;
    }

    pub fn reference(&self) -> Option<HeadReference> {
        self.reference
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME_NS: u64 = 1_000_000_000 / 60;

    fn at(i: u64) -> TimestampNs {
        i * 1_000_000_000 / 60
    }

    #[test]
    fn test_first_frame_initializes_reference() {
        let mut drift = DriftCorrector::with_defaults();
        assert!(drift.update(Vec3::new(0.0, 0.0, 0.5), 0, true).is_none());
        let reference = drift.reference().unwrap();
        assert_eq!(reference.calibrated_position, Vec3::new(0.0, 0.0, 0.5));
        assert!(!reference.waiting_for_stability);
    }

    #[test]
    fn test_small_movement_never_waits() {
        let mut drift = DriftCorrector::with_defaults();
        drift.update(Vec3::ZERO, 0, true);
        for i in 1..600 {
            assert!(drift.update(Vec3::new(0.03, 0.0, 0.0), at(i), true).is_none());
        }
        assert!(!drift.reference().unwrap().waiting_for_stability);
    }

    #[test]
    fn test_returning_to_reference_clears_wait() {
        let mut drift = DriftCorrector::with_defaults();
        drift.update(Vec3::ZERO, 0, true);
        drift.update(Vec3::new(0.06, 0.0, 0.0), at(1), true);
        assert!(drift.reference().unwrap().waiting_for_stability);
        drift.update(Vec3::new(0.01, 0.0, 0.0), at(2), true);
        assert!(!drift.reference().unwrap().waiting_for_stability);
    }

    #[test]
    fn test_suppressed_correction_restarts_wait() {
        let mut drift = DriftCorrector::with_defaults();
        drift.update(Vec3::ZERO, 0, true);
        let moved = Vec3::new(0.06, 0.0, 0.0);
        drift.update(moved, at(1), true);
        assert!(drift.update(moved, at(1 + 180), false).is_none());
        // Needs another full stability window once allowed.
        assert!(drift.update(moved, at(1 + 200), true).is_none());
        assert!(drift.update(moved, at(1 + 360), true).is_some());
    }

    #[test]
    fn test_reanchor_and_reset() {
        let mut drift = DriftCorrector::with_defaults();
        drift.reanchor(Vec3::new(0.0, 0.1, 0.4), FRAME_NS);
        assert_eq!(
            drift.reference().unwrap().calibrated_position,
            Vec3::new(0.0, 0.1, 0.4)
        );
        drift.reset();
        assert!(drift.reference().is_none());
    }

    #[test]
    fn test_non_finite_head_is_ignored() {
        let mut drift = DriftCorrector::with_defaults();
        assert!(drift
            .update(Vec3::new(f32::NAN, 0.0, 0.0), 0, true)
            .is_none());
        assert!(drift.reference().is_none());
    }
}
