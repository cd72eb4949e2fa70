//! Exponential smoothing for the pointer.
//!
//! `next = prev + (target - prev) * alpha`. With `alpha` in `(0, 1]` the
//! step is a linear interpolation, so repeated steps toward a fixed target
//! converge monotonically and never overshoot.

use gazelink_tracking_model::geometry::Vec2;
use gazelink_tracking_model::tuning::SmoothingMode;

/// Exponential smoother with a per-frame or frame-rate-independent factor.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialSmoother {
    mode: SmoothingMode,
    reference_rate_hz: f64,
}

impl ExponentialSmoother {
    pub fn new(mode: SmoothingMode, reference_rate_hz: u32) -> Self {
        Self {
            mode,
            reference_rate_hz: reference_rate_hz.max(1) as f64,
        }
    }

    /// Effective interpolation weight for one frame lasting `dt_secs`.
    ///
    /// In `TimeConstant` mode, `alpha = 1 - (1 - factor)^(dt * reference_hz)`,
    /// which equals `factor` when `dt` is exactly one reference frame.
    pub fn alpha(&self, factor: f32, dt_secs: f64) -> f32 {
        let factor = clamp01(factor);
        match self.mode {
            SmoothingMode::FixedStep => factor,
            SmoothingMode::TimeConstant => {
                let frames = (dt_secs.max(0.0) * self.reference_rate_hz) as f32;
                clamp01(1.0 - (1.0 - factor).powf(frames))
            }
        }
    }

    /// Move `prev` toward `target` by one frame.
    pub fn step(&self, prev: Vec2, target: Vec2, factor: f32, dt_secs: f64) -> Vec2 {
        let alpha = self.alpha(factor, dt_secs);
        prev + (target - prev) * alpha
    }
}

fn clamp01(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: f64 = 1.0 / 60.0;

    #[test]
    fn test_time_constant_matches_fixed_step_at_reference_rate() {
        let fixed = ExponentialSmoother::new(SmoothingMode::FixedStep, 60);
        let scaled = ExponentialSmoother::new(SmoothingMode::TimeConstant, 60);
        assert!((fixed.alpha(0.15, FRAME) - scaled.alpha(0.15, FRAME)).abs() < 1e-5);
    }

    #[test]
    fn test_time_constant_is_frame_rate_independent() {
        let smoother = ExponentialSmoother::new(SmoothingMode::TimeConstant, 60);
        let target = Vec2::new(1.0, 1.0);

        // One second at 60 Hz vs one second at 30 Hz.
        let mut at_60 = Vec2::ZERO;
        for _ in 0..60 {
            at_60 = smoother.step(at_60, target, 0.15, 1.0 / 60.0);
        }
        let mut at_30 = Vec2::ZERO;
        for _ in 0..30 {
            at_30 = smoother.step(at_30, target, 0.15, 1.0 / 30.0);
        }
        assert!((at_60.x - at_30.x).abs() < 1e-3);
    }

    #[test]
    fn test_fixed_step_ignores_interval() {
        let smoother = ExponentialSmoother::new(SmoothingMode::FixedStep, 60);
        assert_eq!(smoother.alpha(0.2, 0.5), 0.2);
        assert_eq!(smoother.alpha(0.2, 0.0), 0.2);
    }

    #[test]
    fn test_zero_interval_does_not_move() {
        let smoother = ExponentialSmoother::new(SmoothingMode::TimeConstant, 60);
        let p = smoother.step(Vec2::ZERO, Vec2::new(1.0, 1.0), 0.5, 0.0);
        assert_eq!(p, Vec2::ZERO);
    }

    #[test]
    fn test_lower_factor_smooths_more() {
        let smoother = ExponentialSmoother::new(SmoothingMode::FixedStep, 60);
        let target = Vec2::new(1.0, 0.0);
        let fast = smoother.step(Vec2::ZERO, target, 0.15, FRAME);
        let slow = smoother.step(Vec2::ZERO, target, 0.05, FRAME);
        assert!(slow.x < fast.x);
    }

    proptest::proptest! {
        #[test]
        fn prop_converges_monotonically_without_overshoot(
            factor in 0.01f32..=1.0,
            start in -2.0f32..2.0,
            target in -2.0f32..2.0,
            fixed in proptest::bool::ANY,
        ) {
            let mode = if fixed { SmoothingMode::FixedStep } else { SmoothingMode::TimeConstant };
            let smoother = ExponentialSmoother::new(mode, 60);
            let goal = Vec2::new(target, target);
            let mut p = Vec2::new(start, start);
            let mut prev_err = (goal.x - p.x).abs();
            for _ in 0..200 {
                let next = smoother.step(p, goal, factor, FRAME);
                let err = (goal.x - next.x).abs();
                proptest::prop_assert!(err <= prev_err + 1e-6);
                // Never crosses to the other side of the target.
                proptest::prop_assert!((goal.x - next.x) * (goal.x - start) >= -1e-5);
                prev_err = err;
                p = next;
            }
        }
    }
}
