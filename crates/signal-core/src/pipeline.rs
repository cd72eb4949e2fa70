//! One update step per sample, all stages in a fixed order.
//!
//! `FramePipeline` owns every piece of mutable pipeline state. Whoever owns
//! the pipeline is the single writer; everybody else reads the
//! [`PipelineSnapshot`] it returns.
//!
//! Per-frame order:
//! 1. calibration session phases (if one is running)
//! 2. gaze mapping, smoothing and dwell
//! 3. drift correction, behind the [`CorrectionGate`]
//! 4. gesture detectors, unconditionally
//! 5. gesture routing and the decision dispatcher
//! 6. status notice expiry
//!
//! Between frames the owner may report idle time with
//! [`FramePipeline::advance_idle`] so notices and the correction hold keep
//! running while no samples arrive.

use gazelink_common::clock::SessionClock;
use gazelink_common::error::{GazelinkError, GazelinkResult};
use gazelink_tracking_model::calibration::{CalibrationPattern, CalibrationProfile};
use gazelink_tracking_model::cursor::{CursorState, HeadReference};
use gazelink_tracking_model::decision::DecisionMethod;
use gazelink_tracking_model::sample::{RawSample, TimestampNs};
use gazelink_tracking_model::snapshot::{
    NoticeKind, PipelineSnapshot, StatusNotice, TrackingStatus,
};
use gazelink_tracking_model::tuning::PipelineTuning;

use crate::calibration::{CalibrationConfig, CalibrationSummary};
use crate::calibration_session::{CalibrationSession, SessionEvent, SessionTiming};
use crate::decision::{route_gesture, DecisionDispatcher, GestureIntent, GestureKind};
use crate::drift::{DriftConfig, DriftCorrection, DriftCorrector};
use crate::gaze::{GazeConfig, GazeSignalProcessor};
use crate::gesture::{DoubleMouthOpenDetector, GestureConfig, GestureEvents, SustainedBlinkDetector};

/// The single "correcting" flag shared by drift correction and recalibration.
///
/// Held for the whole of a calibration session, and for a short while after
/// each soft drift correction. Requests made while it is held are dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrectionGate {
    calibrating: bool,
    held_until_ns: Option<TimestampNs>,
}

impl CorrectionGate {
    pub fn is_held(&self, now_ns: TimestampNs) -> bool {
        self.calibrating || self.held_until_ns.is_some_and(|until| now_ns < until)
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibrating
    }

    fn set_calibrating(&mut self, calibrating: bool) {
        self.calibrating = calibrating;
    }

    fn hold_until(&mut self, until_ns: TimestampNs) {
        self.held_until_ns = Some(until_ns);
    }
}

/// What happened on the most recent frame, beyond the snapshot itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub gestures: GestureEvents,
    pub drift_correction: Option<DriftCorrection>,
    pub calibration_events: Vec<SessionEvent>,
    pub recalibration_started: bool,
}

pub struct FramePipeline {
    tuning: PipelineTuning,
    profile: CalibrationProfile,
    gaze: GazeSignalProcessor,
    drift: DriftCorrector,
    blink: SustainedBlinkDetector,
    mouth: DoubleMouthOpenDetector,
    dispatcher: DecisionDispatcher,
    calibration: Option<CalibrationSession>,
    last_summary: Option<CalibrationSummary>,
    gate: CorrectionGate,
    notice: Option<StatusNotice>,
    tracking: TrackingStatus,
    selection_phase: bool,
    last_timestamp_ns: TimestampNs,
    /// Time without frames since `last_timestamp_ns`.
    idle_ns: u64,
    last_report: FrameReport,
}

impl FramePipeline {
    pub fn new(tuning: PipelineTuning) -> Self {
        let gesture_config = GestureConfig::from_tuning(&tuning);
        Self {
            profile: CalibrationProfile::with_sensitivity(tuning.calibration.default_sensitivity),
            gaze: GazeSignalProcessor::new(GazeConfig::from_tuning(&tuning)),
            drift: DriftCorrector::new(DriftConfig::from_tuning(&tuning)),
            blink: SustainedBlinkDetector::new(&gesture_config),
            mouth: DoubleMouthOpenDetector::new(&gesture_config),
            dispatcher: DecisionDispatcher::from_tuning(DecisionMethod::default(), &tuning),
            calibration: None,
            last_summary: None,
            gate: CorrectionGate::default(),
            notice: None,
            tracking: TrackingStatus::Waiting,
            selection_phase: false,
            last_timestamp_ns: 0,
            idle_ns: 0,
            last_report: FrameReport::default(),
            tuning,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(PipelineTuning::default())
    }

    /// Start from an existing mapping instead of the default one.
    pub fn with_profile(mut self, profile: CalibrationProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Run every stage on one sample and return the resulting snapshot.
    pub fn process(&mut self, sample: &RawSample) -> PipelineSnapshot {
        if matches!(self.tracking, TrackingStatus::Unsupported { .. }) {
            return self.snapshot();
        }
        if self.tracking != TrackingStatus::Active {
            self.resume_tracking();
        }

        let now = sample.timestamp_ns;
        self.last_timestamp_ns = now;
        self.idle_ns = 0;
        let mut report = FrameReport::default();

        self.step_calibration(sample, &mut report);

        self.gaze.process(sample, &self.profile);

        let allow_correction = !self.gate.is_held(now);
        if let Some(correction) = self.drift.update(sample.head_position, now, allow_correction) {
            let hold = SessionClock::secs_to_ns(self.tuning.correction_hold_secs);
            self.gate.hold_until(now.saturating_add(hold));
            self.raise(NoticeKind::DriftCorrected, now);
            report.drift_correction = Some(correction);
        }

        let events = GestureEvents {
            deep_blink: self.blink.update(sample),
            double_mouth_open: self.mouth.update(sample),
        };
        self.dispatcher.record(events);
        report.gestures = events;

        for kind in fired(events) {
            match route_gesture(kind, self.selection_phase, self.dispatcher.method()) {
                GestureIntent::Confirm => {
                    tracing::debug!(?kind, "Gesture latched as confirmation");
                }
                GestureIntent::RequestRecalibration => {
                    self.dispatcher.clear_deep_blink();
                    report.recalibration_started = self.request_recalibration();
                }
                GestureIntent::Ignore => {
                    tracing::trace!(?kind, "Gesture ignored in current context");
                }
            }
        }

        self.expire_notice(now);
        self.last_report = report;
        self.snapshot()
    }

    fn step_calibration(&mut self, sample: &RawSample, report: &mut FrameReport) {
        let Some(session) = self.calibration.as_mut() else {
            return;
        };

        match session.tick(sample, &mut self.profile) {
            Ok(events) => {
                let complete = events.contains(&SessionEvent::Complete);
                report.calibration_events = events;
                if complete {
                    self.finish_calibration(sample);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Calibration step failed");
            }
        }
    }

    fn finish_calibration(&mut self, sample: &RawSample) {
        if let Some(session) = self.calibration.take() {
            self.last_summary = Some(session.engine().summary());
        }
        self.gate.set_calibrating(false);
        self.drift.reanchor(sample.head_position, sample.timestamp_ns);
        self.raise(NoticeKind::CalibrationComplete, sample.timestamp_ns);
        tracing::info!(
            sensitivity_x = self.profile.sensitivity_x,
            sensitivity_y = self.profile.sensitivity_y,
            offset_x = self.profile.offset_x,
            offset_y = self.profile.offset_y,
            "Calibration updated"
        );
    }

    /// Begin a calibration session over `pattern`. Refused while a session
    /// is running or a drift correction is still being held.
    pub fn start_calibration(&mut self, pattern: CalibrationPattern) -> GazelinkResult<()> {
        if self.calibration.is_some() {
            return Err(GazelinkError::calibration_busy(
                "a calibration session is already running",
            ));
        }
        if self.gate.is_held(self.now_ns()) {
            return Err(GazelinkError::calibration_busy(
                "a drift correction is in progress",
            ));
        }
        self.calibration = Some(CalibrationSession::new(
            pattern,
            SessionTiming::from_tuning(&self.tuning),
            CalibrationConfig::from_tuning(&self.tuning),
            &self.profile,
        ));
        self.gate.set_calibrating(true);
        Ok(())
    }

    /// Start recording the current calibration target right away.
    pub fn request_record(&mut self) -> GazelinkResult<()> {
        let now = self.last_timestamp_ns;
        match self.calibration.as_mut() {
            Some(session) => session.request_record(now),
            None => Err(GazelinkError::calibration("no calibration session is running")),
        }
    }

    /// Cancel the running session and keep the mapping it started from.
    /// Returns false when nothing was running.
    pub fn abort_calibration(&mut self) -> bool {
        let Some(session) = self.calibration.take() else {
            return false;
        };
        self.profile = session.abort();
        self.gate.set_calibrating(false);
        self.raise(NoticeKind::CalibrationAborted, self.now_ns());
        true
    }

    /// Recalibrate with the standard pattern unless a correction is already
    /// in progress. Returns whether a session was started.
    pub fn request_recalibration(&mut self) -> bool {
        let now = self.now_ns();
        match self.start_calibration(CalibrationPattern::standard()) {
            Ok(()) => {
                tracing::info!("Recalibration started");
                self.raise(NoticeKind::Recalibrating, now);
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "Recalibration request ignored");
                false
            }
        }
    }

    pub fn set_heavy_stabilization(&mut self, enabled: bool) {
        self.gaze.set_heavy_stabilization(enabled);
    }

    pub fn set_decision_method(&mut self, method: DecisionMethod) {
        self.dispatcher.set_method(method);
    }

    /// Whether gestures are currently routed as confirmations.
    pub fn set_decision_selection_phase(&mut self, in_selection_phase: bool) {
        self.selection_phase = in_selection_phase;
    }

    /// Consume the active method's confirmation, if one is ready.
    pub fn consume_confirmation(&mut self) -> bool {
        let dwell = self.gaze.state().dwell_time;
        let consumed = self.dispatcher.consume_confirmation(dwell);
        if consumed && self.dispatcher.method() == DecisionMethod::Dwell {
            self.gaze.reset_dwell();
        }
        if consumed {
            tracing::info!(method = %self.dispatcher.method(), "Confirmation consumed");
        }
        consumed
    }

    pub fn clear_deep_blink(&mut self) {
        self.dispatcher.clear_deep_blink();
    }

    pub fn clear_double_mouth_open(&mut self) {
        self.dispatcher.clear_double_mouth_open();
    }

    /// Report the collaborator's "tracking active" signal.
    pub fn set_tracking_active(&mut self, active: bool) {
        if active {
            if !matches!(
                self.tracking,
                TrackingStatus::Active | TrackingStatus::Unsupported { .. }
            ) {
                self.resume_tracking();
            }
        } else {
            self.mark_tracking_lost();
        }
    }

    /// Freeze cursor and dwell until frames arrive again.
    pub fn mark_tracking_lost(&mut self) {
        if self.tracking == TrackingStatus::Active {
            tracing::warn!(last_sample_ns = self.last_timestamp_ns, "Tracking lost");
            self.tracking = TrackingStatus::Lost;
            self.blink.reset();
            self.mouth.reset();
        }
    }

    /// Terminal: no pipeline activity for the rest of the session.
    pub fn mark_unsupported(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::error!(reason = %reason, "Face tracking unsupported");
        self.tracking = TrackingStatus::Unsupported { reason };
    }

    fn resume_tracking(&mut self) {
        if self.tracking == TrackingStatus::Lost {
            tracing::info!("Tracking resumed");
        }
        self.gaze.resume_after_gap();
        self.tracking = TrackingStatus::Active;
    }

    /// Report that `idle_ns` have passed since the last frame without a new
    /// one. Expires the status notice if its display time is up.
    pub fn advance_idle(&mut self, idle_ns: u64) {
        self.idle_ns = self.idle_ns.max(idle_ns);
        self.expire_notice(self.now_ns());
    }

    /// Idle time after the last frame at which the current notice clears.
    pub fn notice_idle_deadline_ns(&self) -> Option<u64> {
        self.notice.map(|notice| {
            let display_ns = SessionClock::secs_to_ns(self.tuning.status_display_secs);
            notice
                .raised_at_ns
                .saturating_add(display_ns)
                .saturating_sub(self.last_timestamp_ns)
        })
    }

    fn now_ns(&self) -> TimestampNs {
        self.last_timestamp_ns.saturating_add(self.idle_ns)
    }

    fn raise(&mut self, kind: NoticeKind, now_ns: TimestampNs) {
        tracing::debug!(message = kind.message(), "Status notice raised");
        self.notice = Some(StatusNotice {
            kind,
            raised_at_ns: now_ns,
        });
    }

    fn expire_notice(&mut self, now_ns: TimestampNs) {
        if let Some(notice) = self.notice {
            if SessionClock::secs_between(notice.raised_at_ns, now_ns)
                >= self.tuning.status_display_secs
            {
                self.notice = None;
            }
        }
    }

    /// The read-only view of the current state.
    pub fn snapshot(&self) -> PipelineSnapshot {
        let cursor = self.gaze.state();
        PipelineSnapshot {
            timestamp_ns: self.last_timestamp_ns,
            cursor_position: cursor.position,
            dwell_time: cursor.dwell_time,
            did_confirm_deep_blink: self.dispatcher.deep_blink_pending(),
            did_confirm_double_mouth_open: self.dispatcher.double_mouth_open_pending(),
            confirmation_ready: self.dispatcher.confirmation_ready(cursor.dwell_time),
            decision_method: self.dispatcher.method(),
            status_message: self.notice.map(|n| n.kind.message().to_string()),
            tracking: self.tracking.clone(),
            calibration: self.calibration.as_ref().and_then(|s| s.progress()),
            profile: self.profile,
        }
    }

    pub fn profile(&self) -> &CalibrationProfile {
        &self.profile
    }

    pub fn cursor(&self) -> CursorState {
        self.gaze.state()
    }

    pub fn head_reference(&self) -> Option<HeadReference> {
        self.drift.reference()
    }

    pub fn status_notice(&self) -> Option<StatusNotice> {
        self.notice
    }

    pub fn is_tracking_active(&self) -> bool {
        self.tracking == TrackingStatus::Active
    }

    pub fn gate(&self) -> CorrectionGate {
        self.gate
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibration.is_some()
    }

    /// Summary of the most recently completed calibration session.
    pub fn last_calibration_summary(&self) -> Option<&CalibrationSummary> {
        self.last_summary.as_ref()
    }

    pub fn last_report(&self) -> &FrameReport {
        &self.last_report
    }
}

fn fired(events: GestureEvents) -> impl Iterator<Item = GestureKind> {
    [
        events.deep_blink.then_some(GestureKind::DeepBlink),
        events.double_mouth_open.then_some(GestureKind::DoubleMouthOpen),
    ]
    .into_iter()
    .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gazelink_tracking_model::geometry::{Vec2, Vec3};

    const FRAME_NS: u64 = 1_000_000_000 / 60;

    fn sample(i: u64) -> RawSample {
        RawSample::new(i * FRAME_NS, Vec2::ZERO, Vec3::ZERO)
    }

    #[test]
    fn test_gate_hold_window() {
        let mut gate = CorrectionGate::default();
        assert!(!gate.is_held(0));
        gate.hold_until(100);
        assert!(gate.is_held(99));
        assert!(!gate.is_held(100));
        gate.set_calibrating(true);
        assert!(gate.is_held(1_000));
    }

    #[test]
    fn test_first_frame_activates_tracking() {
        let mut pipeline = FramePipeline::with_defaults();
        assert!(!pipeline.snapshot().is_tracking_active());
        let snap = pipeline.process(&sample(0));
        assert!(snap.is_tracking_active());
        assert!((snap.cursor_position.x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_unsupported_is_terminal() {
        let mut pipeline = FramePipeline::with_defaults();
        pipeline.mark_unsupported("no TrueDepth camera");
        pipeline.set_tracking_active(true);
        let snap = pipeline.process(&sample(1));
        assert!(matches!(snap.tracking, TrackingStatus::Unsupported { .. }));
        assert_eq!(snap.timestamp_ns, 0);
    }

    #[test]
    fn test_tracking_lost_freezes_and_resumes() {
        let mut pipeline = FramePipeline::with_defaults();
        for i in 0..60 {
            pipeline.process(&sample(i));
        }
        let dwell = pipeline.cursor().dwell_time;
        pipeline.mark_tracking_lost();
        let snap = pipeline.snapshot();
        assert_eq!(snap.tracking, TrackingStatus::Lost);
        assert_eq!(snap.dwell_time, dwell);

        // A long gap contributes one nominal frame, not the whole gap.
        let snap = pipeline.process(&sample(600));
        assert!(snap.is_tracking_active());
        assert!(snap.dwell_time - dwell < 0.02);
    }

    #[test]
    fn test_start_calibration_twice_is_busy() {
        let mut pipeline = FramePipeline::with_defaults();
        pipeline.start_calibration(CalibrationPattern::standard()).unwrap();
        let err = pipeline
            .start_calibration(CalibrationPattern::standard())
            .unwrap_err();
        assert!(matches!(err, GazelinkError::CalibrationBusy { .. }));
        assert!(pipeline.gate().is_calibrating());
    }

    #[test]
    fn test_abort_restores_profile_and_releases_gate() {
        let mut pipeline = FramePipeline::with_defaults();
        let before = *pipeline.profile();
        pipeline.start_calibration(CalibrationPattern::standard()).unwrap();
        assert!(pipeline.abort_calibration());
        assert_eq!(*pipeline.profile(), before);
        assert!(!pipeline.gate().is_calibrating());
        assert_eq!(
            pipeline.snapshot().status_message.as_deref(),
            Some(NoticeKind::CalibrationAborted.message())
        );
        assert!(!pipeline.abort_calibration());
    }

    #[test]
    fn test_request_record_without_session_fails() {
        let mut pipeline = FramePipeline::with_defaults();
        assert!(pipeline.request_record().is_err());
    }

    #[test]
    fn test_dwell_confirmation_consumes_and_resets() {
        let mut pipeline = FramePipeline::with_defaults();
        for i in 0..=200 {
            pipeline.process(&sample(i));
        }
        assert!(pipeline.snapshot().confirmation_ready);
        assert!(pipeline.consume_confirmation());
        let snap = pipeline.snapshot();
        assert_eq!(snap.dwell_time, 0.0);
        assert!(!snap.confirmation_ready);
    }
}
