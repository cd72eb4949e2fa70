//! Generate a scripted sample stream.

use std::path::PathBuf;

use gazelink_common::clock::SessionClock;
use gazelink_common::config::AppConfig;
use gazelink_runtime::writer::SampleWriter;
use gazelink_tracking_model::calibration::CalibrationPattern;
use gazelink_tracking_model::geometry::{Vec2, Vec3};
use gazelink_tracking_model::sample::{RawSample, SampleStreamHeader};
use gazelink_tracking_model::tuning::PipelineTuning;

/// Raw gaze when looking at screen center.
const CENTER_RAW: Vec2 = Vec2 { x: 0.1, y: -0.05 };
/// Raw gaze units per unit of normalized screen distance.
const GAZE_SPAN: f32 = 0.375;
const REST_HEAD: Vec3 = Vec3 {
    x: 0.0,
    y: 0.0,
    z: 0.55,
};
const JAW_CLOSED: f32 = 0.1;
const JAW_OPEN: f32 = 0.8;

pub fn run(config: &AppConfig, output: PathBuf, rate: u32) -> anyhow::Result<()> {
    let tuning = super::load_tuning(config, None)?;
    let samples = synthetic_session(rate, &tuning);

    let header = SampleStreamHeader::new(SessionClock::start().epoch_wall(), rate, "simulate");
    let mut writer = SampleWriter::create(&output, &header)?;
    writer.write_all(&samples)?;
    writer.flush()?;

    let duration = samples
        .last()
        .map(|s| SessionClock::ns_to_secs(s.timestamp_ns))
        .unwrap_or(0.0);
    println!("Wrote {} samples ({duration:.1}s) to {}", samples.len(), output.display());
    println!();
    println!("Try:");
    println!("  gazelink calibrate {}", output.display());
    println!("  gazelink replay {} --calibrate --method sustained_blink", output.display());
    Ok(())
}

/// Raw gaze a user looking at `target` produces.
fn raw_for(target: Vec2) -> Vec2 {
    Vec2::new(
        CENTER_RAW.x + (target.x - 0.5) * GAZE_SPAN,
        CENTER_RAW.y - (target.y - 0.5) * GAZE_SPAN,
    )
}

/// Builds a stream one segment at a time at a fixed rate.
struct Script {
    rate_hz: u32,
    frame: u64,
    head: Vec3,
    samples: Vec<RawSample>,
}

impl Script {
    fn new(rate_hz: u32) -> Self {
        Self {
            rate_hz: rate_hz.max(1),
            frame: 0,
            head: REST_HEAD,
            samples: Vec::new(),
        }
    }

    /// Append `secs` of frames. `shape` gets the fraction of the segment
    /// elapsed and the frame number and returns the sample to emit.
    fn segment(&mut self, secs: f64, shape: impl Fn(f32, u64, RawSample) -> RawSample) {
        let frames = (secs * self.rate_hz as f64).round().max(1.0) as u64;
        for n in 0..frames {
            let ts = self.frame * 1_000_000_000 / self.rate_hz as u64;
            let base = RawSample::new(ts, CENTER_RAW, self.head).with_jaw_open(JAW_CLOSED);
            let progress = n as f32 / frames as f32;
            self.samples.push(shape(progress, self.frame, base));
            self.frame += 1;
        }
    }

    fn look_at(&mut self, target: Vec2, secs: f64) {
        let raw = raw_for(target);
        self.segment(secs, |_, frame, s| RawSample {
            gaze: raw + jitter(frame),
            ..s
        });
    }
}

/// Deterministic fixational jitter well inside the dwell radius.
fn jitter(frame: u64) -> Vec2 {
    let phase = frame as f32 * 0.7;
    Vec2::new(phase.sin() * 0.001, (phase * 1.3).cos() * 0.001)
}

/// A complete scripted session at `rate_hz`:
/// 1. a standard calibration sweep, each target held a little longer than
///    one calibration point lasts
/// 2. a fixation long enough to confirm by dwell
/// 3. a 6 cm posture shift, then holding still
/// 4. a deep blink
/// 5. a double mouth-open
pub fn synthetic_session(rate_hz: u32, tuning: &PipelineTuning) -> Vec<RawSample> {
    let mut script = Script::new(rate_hz);
    let c = &tuning.calibration;
    let per_point = c.move_secs + c.settle_secs + c.record_secs + 0.1;

    for target in CalibrationPattern::standard().points() {
        script.look_at(*target, per_point);
    }

    let fixation = Vec2::new(0.3, 0.6);
    script.look_at(fixation, tuning.decision.dwell_confirm_secs + 1.0);
    script.look_at(Vec2::new(0.7, 0.4), 1.0);

    let shifted = Vec3::new(
        REST_HEAD.x + tuning.drift.movement_threshold_m + 0.01,
        REST_HEAD.y,
        REST_HEAD.z,
    );
    let raw = raw_for(fixation);
    script.segment(0.3, |progress, _, s| RawSample {
        gaze: raw,
        head_position: Vec3::new(
            REST_HEAD.x + (shifted.x - REST_HEAD.x) * progress,
            REST_HEAD.y,
            REST_HEAD.z,
        ),
        ..s
    });
    script.head = shifted;
    script.look_at(fixation, tuning.drift.stability_duration_secs + 1.5);

    script.segment(tuning.gestures.deep_blink_secs + 0.5, |_, _, s| {
        s.with_blink(0.98, 0.97)
    });
    script.look_at(fixation, 1.0);

    let open = |_: f32, _: u64, s: RawSample| s.with_jaw_open(JAW_OPEN);
    script.segment(0.3, open);
    script.look_at(fixation, 0.7);
    script.segment(0.3, open);
    script.look_at(fixation, 1.5);

    script.samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use gazelink_signal_core::FramePipeline;
    use gazelink_tracking_model::decision::DecisionMethod;

    #[test]
    fn test_timestamps_are_strictly_increasing() {
        let samples = synthetic_session(60, &PipelineTuning::default());
        assert!(samples.windows(2).all(|w| w[0].timestamp_ns < w[1].timestamp_ns));
    }

    #[test]
    fn test_synthetic_session_exercises_every_stage() {
        let tuning = PipelineTuning::default();
        let samples = synthetic_session(60, &tuning);

        let mut pipeline = FramePipeline::new(tuning);
        pipeline.set_decision_method(DecisionMethod::SustainedBlink);
        pipeline.set_decision_selection_phase(true);
        pipeline
            .start_calibration(CalibrationPattern::standard())
            .unwrap();

        let (mut drift, mut blinks, mut mouths, mut dwell_peak) = (0, 0, 0, 0.0f64);
        for sample in &samples {
            let snap = pipeline.process(sample);
            let report = pipeline.last_report();
            drift += usize::from(report.drift_correction.is_some());
            blinks += usize::from(report.gestures.deep_blink);
            mouths += usize::from(report.gestures.double_mouth_open);
            if !pipeline.is_calibrating() {
                dwell_peak = dwell_peak.max(snap.dwell_time);
            }
        }

        assert!(!pipeline.is_calibrating());
        assert_eq!(pipeline.last_calibration_summary().unwrap().points_recorded, 9);
        assert_eq!(drift, 1);
        assert_eq!(blinks, 1);
        assert_eq!(mouths, 1);
        assert!(dwell_peak >= 3.0);
    }
}
