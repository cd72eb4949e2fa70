//! Calibration Engine: derives sensitivity and offset from target points.
//!
//! # Algorithm
//!
//! 1. **Center:** clear the candidate lists and anchor the offsets so the
//!    center reading maps to screen center under the current sensitivity.
//! 2. **Other targets:** per axis, `|screen_delta / raw_delta|` becomes a
//!    sensitivity candidate when the raw delta clears the noise floor.
//! 3. **Aggregate:** each axis' sensitivity is the trimmed mean of its
//!    candidates, so a single mis-fixated point cannot skew the result.
//! 4. **Re-anchor:** offsets depend on sensitivity, so they are recomputed
//!    against the center reading after every update.

use gazelink_common::error::{GazelinkError, GazelinkResult};
use gazelink_tracking_model::calibration::CalibrationProfile;
use gazelink_tracking_model::geometry::Vec2;
use gazelink_tracking_model::tuning::PipelineTuning;

/// Screen deltas smaller than this carry no sensitivity information
/// (the target sits on the center line for that axis).
const MIN_SCREEN_DELTA: f32 = 1e-4;

/// Configuration for the calibration engine.
#[derive(Debug, Clone)]
pub struct CalibrationConfig {
    /// Raw deltas at or below this are discarded as noise.
    pub noise_floor: f32,
    /// Fraction of candidates dropped from each end before averaging.
    pub trim_ratio: f32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self::from_tuning(&PipelineTuning::default())
    }
}

impl CalibrationConfig {
    pub fn from_tuning(tuning: &PipelineTuning) -> Self {
        Self {
            noise_floor: tuning.calibration.noise_floor,
            trim_ratio: tuning.calibration.trim_ratio,
        }
    }
}

/// Which axes produced a sensitivity candidate for one target point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointObservation {
    pub accepted_x: bool,
    pub accepted_y: bool,
}

/// Diagnostic view of the accumulated calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationSummary {
    pub points_recorded: usize,
    pub candidates_x: usize,
    pub candidates_y: usize,
    pub profile: CalibrationProfile,
}

/// Accumulates per-axis sensitivity candidates across a calibration run.
pub struct CalibrationEngine {
    config: CalibrationConfig,
    center_raw: Option<Vec2>,
    candidates_x: Vec<f32>,
    candidates_y: Vec<f32>,
    points_recorded: usize,
    last_profile: Option<CalibrationProfile>,
}

impl CalibrationEngine {
    pub fn new(config: CalibrationConfig) -> Self {
        Self {
            config,
            center_raw: None,
            candidates_x: Vec::new(),
            candidates_y: Vec::new(),
            points_recorded: 0,
            last_profile: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CalibrationConfig::default())
    }

    /// Record the center target. Clears every accumulated candidate.
    pub fn record_center(
        &mut self,
        raw: Vec2,
        profile: &mut CalibrationProfile,
    ) -> GazelinkResult<()> {
        if !raw.is_finite() {
            return Err(GazelinkError::calibration("center reading is not finite"));
        }

        self.candidates_x.clear();
        self.candidates_y.clear();
        self.center_raw = Some(raw);
        self.points_recorded = 1;

        profile.anchor_center(raw);
        self.last_profile = Some(*profile);

        tracing::info!(
            raw_x = raw.x,
            raw_y = raw.y,
            offset_x = profile.offset_x,
            offset_y = profile.offset_y,
            "Calibration center recorded"
        );
        Ok(())
    }

    /// Record a non-center target and update the profile.
    pub fn record_point(
        &mut self,
        target: Vec2,
        raw: Vec2,
        profile: &mut CalibrationProfile,
    ) -> GazelinkResult<PointObservation> {
        let center = self.center_raw.ok_or_else(|| {
            GazelinkError::calibration("record_point called before record_center")
        })?;
        if !raw.is_finite() || !target.is_finite() {
            return Err(GazelinkError::calibration("calibration reading is not finite"));
        }

        let raw_delta = raw - center;
        let screen_delta = target - Vec2::SCREEN_CENTER;

        let accepted_x = self.push_candidate(Axis::X, screen_delta.x, raw_delta.x);
        let accepted_y = self.push_candidate(Axis::Y, screen_delta.y, raw_delta.y);
        self.points_recorded += 1;

        self.apply(profile, center);

        tracing::info!(
            target_x = target.x,
            target_y = target.y,
            accepted_x,
            accepted_y,
            sensitivity_x = profile.sensitivity_x,
            sensitivity_y = profile.sensitivity_y,
            "Calibration point recorded"
        );

        Ok(PointObservation {
            accepted_x,
            accepted_y,
        })
    }

    /// Snapshot of what has been accumulated so far.
    pub fn summary(&self) -> CalibrationSummary {
        CalibrationSummary {
            points_recorded: self.points_recorded,
            candidates_x: self.candidates_x.len(),
            candidates_y: self.candidates_y.len(),
            profile: self.last_profile.unwrap_or_default(),
        }
    }

    fn push_candidate(&mut self, axis: Axis, screen_delta: f32, raw_delta: f32) -> bool {
        if raw_delta.abs() <= self.config.noise_floor {
            tracing::debug!(?axis, raw_delta, "Raw delta below noise floor; candidate skipped");
            return false;
        }
        if screen_delta.abs() < MIN_SCREEN_DELTA {
            return false;
        }
        let candidate = (screen_delta / raw_delta).abs();
        if !candidate.is_finite() {
            return false;
        }
        match axis {
            Axis::X => self.candidates_x.push(candidate),
            Axis::Y => self.candidates_y.push(candidate),
        }
        true
    }

    fn apply(&mut self, profile: &mut CalibrationProfile, center: Vec2) {
        match trimmed_mean(&self.candidates_x, self.config.trim_ratio) {
            Some(s) => profile.sensitivity_x = s,
            None => tracing::warn!(
                retained = profile.sensitivity_x,
                "No X sensitivity candidates yet; keeping current sensitivity"
            ),
        }
        match trimmed_mean(&self.candidates_y, self.config.trim_ratio) {
            Some(s) => profile.sensitivity_y = s,
            None => tracing::warn!(
                retained = profile.sensitivity_y,
                "No Y sensitivity candidates yet; keeping current sensitivity"
            ),
        }
        profile.anchor_center(center);
        self.last_profile = Some(*profile);
    }
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    X,
    Y,
}

/// Mean of `values` after dropping `floor(n * trim_ratio)` entries from
/// each end of the sorted list. `None` for an empty list.
pub fn trimmed_mean(values: &[f32], trim_ratio: f32) -> Option<f32> {
    let mut sorted: Vec<f32> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len();
    let mut trim = (n as f32 * trim_ratio.clamp(0.0, 0.5)).floor() as usize;
    if trim * 2 >= n {
        trim = (n - 1) / 2;
    }

    let kept = &sorted[trim..n - trim];
    Some(kept.iter().sum::<f32>() / kept.len() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trimmed_mean_drops_outlier() {
        let mean = trimmed_mean(&[1.0, 2.0, 3.0, 4.0, 100.0], 0.25).unwrap();
        assert!((mean - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_trimmed_mean_unsorted_input() {
        let mean = trimmed_mean(&[100.0, 3.0, 1.0, 4.0, 2.0], 0.25).unwrap();
        assert!((mean - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_trimmed_mean_small_lists_keep_everything() {
        assert_eq!(trimmed_mean(&[2.0], 0.25), Some(2.0));
        let mean = trimmed_mean(&[2.0, 4.0, 6.0], 0.25).unwrap();
        assert!((mean - 4.0).abs() < 1e-6);
        assert_eq!(trimmed_mean(&[], 0.25), None);
    }

    #[test]
    fn test_record_point_requires_center() {
        let mut engine = CalibrationEngine::with_defaults();
        let mut profile = CalibrationProfile::default();
        let err = engine
            .record_point(Vec2::new(0.9, 0.9), Vec2::new(0.2, 0.2), &mut profile)
            .unwrap_err();
        assert!(matches!(err, GazelinkError::Calibration { .. }));
    }

    #[test]
    fn test_center_then_corner_round_trip() {
        let mut engine = CalibrationEngine::with_defaults();
        let mut profile = CalibrationProfile::default();
        let center = Vec2::new(0.1, -0.05);

        engine.record_center(center, &mut profile).unwrap();
        let obs = engine
            .record_point(Vec2::new(0.9, 0.9), Vec2::new(0.25, -0.2), &mut profile)
            .unwrap();
        assert!(obs.accepted_x && obs.accepted_y);

        // |0.4 / 0.15| on both axes.
        assert!((profile.sensitivity_x - 0.4 / 0.15).abs() < 1e-4);
        assert!((profile.sensitivity_y - 0.4 / 0.15).abs() < 1e-4);

        let p = profile.map(center);
        assert!((p.x - 0.5).abs() < 1e-5);
        assert!((p.y - 0.5).abs() < 1e-5);

        let corner = profile.map(Vec2::new(0.25, -0.2));
        assert!((corner.x - 0.9).abs() < 1e-4);
        assert!((corner.y - 0.9).abs() < 1e-4);
    }

    #[test]
    fn test_degenerate_sample_keeps_default_sensitivity() {
        let mut engine = CalibrationEngine::with_defaults();
        let mut profile = CalibrationProfile::default();
        let center = Vec2::new(0.0, 0.0);
        engine.record_center(center, &mut profile).unwrap();

        // User did not move their eyes: raw delta under the noise floor.
        let obs = engine
            .record_point(Vec2::new(0.9, 0.1), Vec2::new(0.005, 0.0), &mut profile)
            .unwrap();
        assert_eq!(
            obs,
            PointObservation {
                accepted_x: false,
                accepted_y: false
            }
        );
        assert_eq!(profile.sensitivity_x, 2.0);
        assert_eq!(profile.sensitivity_y, 2.0);
        assert_eq!(engine.summary().candidates_x, 0);
    }

    #[test]
    fn test_center_line_target_contributes_one_axis() {
        let mut engine = CalibrationEngine::with_defaults();
        let mut profile = CalibrationProfile::default();
        engine.record_center(Vec2::ZERO, &mut profile).unwrap();

        // Right edge midpoint: only X carries information.
        let obs = engine
            .record_point(Vec2::new(0.9, 0.5), Vec2::new(0.2, 0.03), &mut profile)
            .unwrap();
        assert!(obs.accepted_x);
        assert!(!obs.accepted_y);
        assert!((profile.sensitivity_x - 2.0).abs() < 1e-5);
        assert!(profile.sensitivity_y > 0.0);
    }

    #[test]
    fn test_recenter_clears_stale_candidates() {
        let mut engine = CalibrationEngine::with_defaults();
        let mut profile = CalibrationProfile::default();
        engine.record_center(Vec2::ZERO, &mut profile).unwrap();
        engine
            .record_point(Vec2::new(0.9, 0.9), Vec2::new(0.1, -0.1), &mut profile)
            .unwrap();
        assert_eq!(engine.summary().candidates_x, 1);

        engine.record_center(Vec2::new(0.05, 0.0), &mut profile).unwrap();
        let summary = engine.summary();
        assert_eq!(summary.candidates_x, 0);
        assert_eq!(summary.candidates_y, 0);
        assert_eq!(summary.points_recorded, 1);
    }

    #[test]
    fn test_outlier_point_is_trimmed() {
        let mut engine = CalibrationEngine::with_defaults();
        let mut profile = CalibrationProfile::default();
        engine.record_center(Vec2::ZERO, &mut profile).unwrap();

        // Four consistent points at sensitivity 2.0 and one mis-fixation.
        for (target, raw) in [
            (Vec2::new(0.9, 0.9), Vec2::new(0.2, -0.2)),
            (Vec2::new(0.1, 0.1), Vec2::new(-0.2, 0.2)),
            (Vec2::new(0.9, 0.1), Vec2::new(0.2, 0.2)),
            (Vec2::new(0.1, 0.9), Vec2::new(-0.2, -0.2)),
            (Vec2::new(0.3, 0.3), Vec2::new(-0.011, 0.011)),
        ] {
            engine.record_point(target, raw, &mut profile).unwrap();
        }
        // Candidates x: [2, 2, 2, 2, ~18.2] -> trimmed to [2, 2, 2].
        assert!((profile.sensitivity_x - 2.0).abs() < 1e-4);
    }

    proptest::proptest! {
        #[test]
        fn prop_trimmed_mean_within_bounds(
            values in proptest::collection::vec(0.01f32..100.0, 1..40),
            ratio in 0.0f32..0.49,
        ) {
            let mean = trimmed_mean(&values, ratio).unwrap();
            let min = values.iter().cloned().fold(f32::INFINITY, f32::min);
            let max = values.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
            proptest::prop_assert!(mean >= min - 1e-3 && mean <= max + 1e-3);
            proptest::prop_assert!(mean > 0.0);
        }
    }
}
