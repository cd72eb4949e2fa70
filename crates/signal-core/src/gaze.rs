//! Gaze Signal Processor: calibrated mapping, smoothing, and dwell time.
//!
//! Per open-eye frame:
//! 1. Map raw gaze through the [`CalibrationProfile`] (Y inverted).
//! 2. Smooth toward the mapped target.
//! 3. Accumulate dwell time while the cursor stays within
//!    `dwell_distance` of the dwell checkpoint; otherwise reset to zero and
//!    move the checkpoint.
//!
//! Closed-eye frames freeze both cursor and dwell so a blink gesture
//! cannot smear the pointer.

use gazelink_common::clock::FrameClock;
use gazelink_tracking_model::calibration::CalibrationProfile;
use gazelink_tracking_model::cursor::CursorState;
use gazelink_tracking_model::geometry::Vec2;
use gazelink_tracking_model::sample::RawSample;
use gazelink_tracking_model::tuning::{PipelineTuning, SmoothingMode};

use crate::smoothing::ExponentialSmoother;

/// Configuration for the gaze signal processor.
#[derive(Debug, Clone)]
pub struct GazeConfig {
    /// Smoothing factor in normal operation.
    pub smoothing_factor: f32,

    /// Lower factor used while heavy stabilization is requested.
    pub stabilized_smoothing_factor: f32,

    pub smoothing_mode: SmoothingMode,

    /// Rate at which the smoothing factors are defined (Hz).
    pub reference_rate_hz: u32,

    /// Maximum normalized distance from the checkpoint that still counts as dwelling.
    pub dwell_distance: f32,

    /// Both blink channels must exceed this for the eyes to count as closed.
    pub eyes_closed_threshold: f32,

    /// Longest interval one frame may add to dwell time.
    pub max_frame_gap_secs: f64,
}

impl Default for GazeConfig {
    fn default() -> Self {
        Self::from_tuning(&PipelineTuning::default())
    }
}

impl GazeConfig {
    pub fn from_tuning(tuning: &PipelineTuning) -> Self {
        Self {
            smoothing_factor: tuning.gaze.smoothing_factor,
            stabilized_smoothing_factor: tuning.gaze.stabilized_smoothing_factor,
            smoothing_mode: tuning.gaze.smoothing_mode,
            reference_rate_hz: tuning.reference_rate_hz,
            dwell_distance: tuning.gaze.dwell_distance,
            eyes_closed_threshold: tuning.gaze.eyes_closed_threshold,
            max_frame_gap_secs: tuning.max_frame_gap_secs,
        }
    }
}

/// What the processor did with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GazeFrame {
    /// Cursor and dwell were updated.
    Updated,
    /// Both eyes closed; state frozen.
    EyesClosed,
    /// Gaze was NaN or infinite; state frozen.
    Rejected,
}

/// Stateful per-frame gaze processor. Owns the [`CursorState`].
pub struct GazeSignalProcessor {
    config: GazeConfig,
    smoother: ExponentialSmoother,
    frame_clock: FrameClock,
    state: CursorState,
    dwell_checkpoint: Vec2,
    heavy_stabilization: bool,
}

impl GazeSignalProcessor {
    pub fn new(config: GazeConfig) -> Self {
        let smoother = ExponentialSmoother::new(config.smoothing_mode, config.reference_rate_hz);
        let frame_clock = FrameClock::new(config.reference_rate_hz, config.max_frame_gap_secs);
        let state = CursorState::default();
        Self {
            config,
            smoother,
            frame_clock,
            dwell_checkpoint: state.position,
            state,
            heavy_stabilization: false,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(GazeConfig::default())
    }

    /// Strict AND of both blink channels against the closed threshold.
    pub fn is_eyes_closed(&self, sample: &RawSample) -> bool {
        sample.eyes_closed(self.config.eyes_closed_threshold)
    }

    /// Process one sample against the current calibration.
    pub fn process(&mut self, sample: &RawSample, profile: &CalibrationProfile) -> GazeFrame {
        // The clock advances on every frame so a skipped stretch never
        // turns into one long dwell step afterwards.
        let dt = self.frame_clock.tick(sample.timestamp_ns);

        if self.is_eyes_closed(sample) {
            return GazeFrame::EyesClosed;
        }
        if !sample.gaze.is_finite() {
            tracing::debug!(t = sample.timestamp_ns, "Dropping non-finite gaze sample");
            return GazeFrame::Rejected;
        }

        let target = profile.map(sample.gaze);
        if !target.is_finite() {
            tracing::debug!(t = sample.timestamp_ns, "Mapped gaze is non-finite");
            return GazeFrame::Rejected;
        }
        let target = target.clamp_unit();

        let factor = self.active_smoothing_factor();
        let position = self
            .smoother
            .step(self.state.position, target, factor, dt)
            .clamp_unit();

        if position.distance_to(&self.dwell_checkpoint) < self.config.dwell_distance {
            self.state.dwell_time += dt;
        } else {
            self.state.dwell_time = 0.0;
            self.dwell_checkpoint = position;
        }
        self.state.position = position;

        tracing::trace!(
            x = position.x,
            y = position.y,
            dwell = self.state.dwell_time,
            "Cursor updated"
        );
        GazeFrame::Updated
    }

    /// Current cursor state.
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Request or release heavy stabilization (lower smoothing factor).
    pub fn set_heavy_stabilization(&mut self, enabled: bool) {
        if self.heavy_stabilization != enabled {
            tracing::debug!(enabled, "Heavy stabilization toggled");
        }
        self.heavy_stabilization = enabled;
    }

    pub fn heavy_stabilization(&self) -> bool {
        self.heavy_stabilization
    }

    pub fn active_smoothing_factor(&self) -> f32 {
        if self.heavy_stabilization {
            self.config.stabilized_smoothing_factor
        } else {
            self.config.smoothing_factor
        }
    }

    /// Zero the dwell timer and re-center the checkpoint on the cursor.
    /// Used when a dwell confirmation has been consumed.
    pub fn reset_dwell(&mut self) {
        self.state.dwell_time = 0.0;
        self.dwell_checkpoint = self.state.position;
    }

    /// Forget frame timing after a tracking gap so the gap adds no dwell.
    pub fn resume_after_gap(&mut self) {
        self.frame_clock.reset();
    }

    pub fn config(&self) -> &GazeConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gazelink_tracking_model::geometry::Vec3;

    const FRAME_NS: u64 = 1_000_000_000 / 60;

    fn sample(i: u64, gaze: Vec2) -> RawSample {
        RawSample::new(i * FRAME_NS, gaze, Vec3::ZERO)
    }

    fn fixed_step_config() -> GazeConfig {
        GazeConfig {
            smoothing_mode: SmoothingMode::FixedStep,
            ..GazeConfig::default()
        }
    }

    #[test]
    fn test_mapping_inverts_y() {
        let mut gaze = GazeSignalProcessor::new(GazeConfig {
            smoothing_factor: 1.0,
            ..fixed_step_config()
        });
        let profile = CalibrationProfile::default();
        gaze.process(&sample(0, Vec2::new(0.1, 0.1)), &profile);
        let p = gaze.state().position;
        // x: 0.1 * 2 + 0.5 = 0.7, y: -0.1 * 2 + 0.5 = 0.3
        assert!((p.x - 0.7).abs() < 1e-5);
        assert!((p.y - 0.3).abs() < 1e-5);
    }

    #[test]
    fn test_smoothing_moves_partway() {
        let mut gaze = GazeSignalProcessor::new(fixed_step_config());
        let profile = CalibrationProfile::default();
        gaze.process(&sample(0, Vec2::new(0.2, 0.0)), &profile);
        // target x = 0.9, prev 0.5, factor 0.15 -> 0.56
        assert!((gaze.state().position.x - 0.56).abs() < 1e-5);
    }

    #[test]
    fn test_heavy_stabilization_uses_lower_factor() {
        let mut gaze = GazeSignalProcessor::new(fixed_step_config());
        gaze.set_heavy_stabilization(true);
        assert_eq!(gaze.active_smoothing_factor(), 0.05);
        gaze.process(&sample(0, Vec2::new(0.2, 0.0)), &CalibrationProfile::default());
        // 0.5 + 0.4 * 0.05
        assert!((gaze.state().position.x - 0.52).abs() < 1e-5);
    }

    #[test]
    fn test_eyes_closed_freezes_cursor_and_dwell() {
        let mut gaze = GazeSignalProcessor::with_defaults();
        let profile = CalibrationProfile::default();
        for i in 0..30 {
            gaze.process(&sample(i, Vec2::ZERO), &profile);
        }
        let before = gaze.state();

        for i in 30..60 {
            let closed = sample(i, Vec2::new(0.4, 0.4)).with_blink(0.95, 0.95);
            assert_eq!(gaze.process(&closed, &profile), GazeFrame::EyesClosed);
        }
        assert_eq!(gaze.state(), before);
    }

    #[test]
    fn test_single_eye_closed_still_updates() {
        let mut gaze = GazeSignalProcessor::with_defaults();
        let winking = sample(0, Vec2::ZERO).with_blink(1.0, 0.2);
        assert_eq!(
            gaze.process(&winking, &CalibrationProfile::default()),
            GazeFrame::Updated
        );
    }

    #[test]
    fn test_non_finite_gaze_is_rejected() {
        let mut gaze = GazeSignalProcessor::with_defaults();
        let before = gaze.state();
        let bad = sample(0, Vec2::new(f32::NAN, 0.0));
        assert_eq!(
            gaze.process(&bad, &CalibrationProfile::default()),
            GazeFrame::Rejected
        );
        assert_eq!(gaze.state(), before);
    }

    #[test]
    fn test_extreme_gaze_stays_on_screen() {
        let mut gaze = GazeSignalProcessor::new(GazeConfig {
            smoothing_factor: 1.0,
            ..fixed_step_config()
        });
        gaze.process(&sample(0, Vec2::new(50.0, -50.0)), &CalibrationProfile::default());
        assert_eq!(gaze.state().position, Vec2::new(1.0, 1.0));
    }

    #[test]
    fn test_dwell_accumulates_then_resets_on_jump() {
        let mut gaze = GazeSignalProcessor::with_defaults();
        let profile = CalibrationProfile::default();
        for i in 0..120 {
            gaze.process(&sample(i, Vec2::ZERO), &profile);
        }
        let dwell = gaze.state().dwell_time;
        assert!((dwell - 2.0).abs() < 1e-6, "dwell={dwell}");

        // One frame with a large step: x target 0.9, moves by 0.06 > 0.05.
        gaze.process(&sample(120, Vec2::new(0.2, 0.0)), &profile);
        assert_eq!(gaze.state().dwell_time, 0.0);
    }

    #[test]
    fn test_reset_dwell_recenters_checkpoint() {
        let mut gaze = GazeSignalProcessor::with_defaults();
        let profile = CalibrationProfile::default();
        for i in 0..30 {
            gaze.process(&sample(i, Vec2::ZERO), &profile);
        }
        gaze.reset_dwell();
        assert_eq!(gaze.state().dwell_time, 0.0);
        gaze.process(&sample(30, Vec2::ZERO), &profile);
        assert!(gaze.state().dwell_time > 0.0);
    }

    #[test]
    fn test_gap_after_resume_adds_nominal_interval_only() {
        let mut gaze = GazeSignalProcessor::with_defaults();
        let profile = CalibrationProfile::default();
        gaze.process(&sample(0, Vec2::ZERO), &profile);
        gaze.resume_after_gap();
        gaze.process(&sample(600, Vec2::ZERO), &profile);
        let dwell = gaze.state().dwell_time;
        assert!((dwell - 2.0 / 60.0).abs() < 1e-9, "dwell={dwell}");
    }

    proptest::proptest! {
        #[test]
        fn prop_dwell_non_decreasing_while_still(
            jitter in proptest::collection::vec(-0.004f32..0.004, 10..120),
        ) {
            let mut gaze = GazeSignalProcessor::with_defaults();
            let profile = CalibrationProfile::default();
            let mut prev = 0.0;
            for (i, j) in jitter.iter().enumerate() {
                gaze.process(&sample(i as u64, Vec2::new(*j, *j)), &profile);
                let dwell = gaze.state().dwell_time;
                proptest::prop_assert!(dwell >= prev);
                prev = dwell;
            }
        }
    }
}
