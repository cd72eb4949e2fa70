//! Timer-driven walk through a calibration pattern.
//!
//! Each target goes through `Moving -> Settling -> Recording`. Phase
//! durations are measured in sample time. While recording, the raw gaze of
//! open-eye frames is averaged; when the window closes the average is fed
//! to the [`CalibrationEngine`] (center first, then the remaining points in
//! order). Only one point can be in flight at a time.

use gazelink_common::clock::SessionClock;
use gazelink_common::error::{GazelinkError, GazelinkResult};
use gazelink_tracking_model::calibration::{CalibrationPattern, CalibrationProfile};
use gazelink_tracking_model::geometry::Vec2;
use gazelink_tracking_model::sample::{RawSample, TimestampNs};
use gazelink_tracking_model::snapshot::{CalibrationPhase, CalibrationProgress};
use gazelink_tracking_model::tuning::PipelineTuning;

use crate::calibration::{CalibrationConfig, CalibrationEngine, PointObservation};

/// Phase timing for a calibration session.
#[derive(Debug, Clone)]
pub struct SessionTiming {
    pub move_secs: f64,
    pub settle_secs: f64,
    pub record_secs: f64,
    pub eyes_closed_threshold: f32,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self::from_tuning(&PipelineTuning::default())
    }
}

impl SessionTiming {
    pub fn from_tuning(tuning: &PipelineTuning) -> Self {
        Self {
            move_secs: tuning.calibration.move_secs,
            settle_secs: tuning.calibration.settle_secs,
            record_secs: tuning.calibration.record_secs,
            eyes_closed_threshold: tuning.gaze.eyes_closed_threshold,
        }
    }
}

/// Something that happened during a [`CalibrationSession::tick`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A target's recording window closed and the engine consumed it.
    PointCommitted {
        index: usize,
        raw: Vec2,
        observation: Option<PointObservation>,
    },
    /// The last target was committed.
    Complete,
}

pub struct CalibrationSession {
    timing: SessionTiming,
    pattern: CalibrationPattern,
    engine: CalibrationEngine,
    saved_profile: CalibrationProfile,
    index: usize,
    phase: CalibrationPhase,
    phase_started_ns: Option<TimestampNs>,
    record_in_flight: bool,
    sum: Vec2,
    count: u32,
    complete: bool,
}

impl CalibrationSession {
    /// Start a session. `profile` is remembered so [`Self::abort`] can restore it.
    pub fn new(
        pattern: CalibrationPattern,
        timing: SessionTiming,
        config: CalibrationConfig,
        profile: &CalibrationProfile,
    ) -> Self {
        tracing::info!(points = pattern.len(), "Calibration session started");
        Self {
            timing,
            pattern,
            engine: CalibrationEngine::new(config),
            saved_profile: *profile,
            index: 0,
            phase: CalibrationPhase::Moving,
            phase_started_ns: None,
            record_in_flight: false,
            sum: Vec2::ZERO,
            count: 0,
            complete: false,
        }
    }

    /// Advance with one sample. May update `profile` when a point commits.
    pub fn tick(
        &mut self,
        sample: &RawSample,
        profile: &mut CalibrationProfile,
    ) -> GazelinkResult<Vec<SessionEvent>> {
        let mut events = Vec::new();
        if self.complete {
            return Ok(events);
        }

        let now = sample.timestamp_ns;
        let started = *self.phase_started_ns.get_or_insert(now);
        let elapsed = SessionClock::secs_between(started, now);

        match self.phase {
            CalibrationPhase::Moving if elapsed >= self.timing.move_secs => {
                self.enter(CalibrationPhase::Settling, now);
            }
            CalibrationPhase::Settling if elapsed >= self.timing.settle_secs => {
                self.begin_record(now)?;
            }
            _ => {}
        }

        if self.phase == CalibrationPhase::Recording {
            if !sample.eyes_closed(self.timing.eyes_closed_threshold) && sample.gaze.is_finite() {
                self.sum = self.sum + sample.gaze;
                self.count += 1;
            }

            let started = self.phase_started_ns.unwrap_or(now);
            if SessionClock::secs_between(started, now) >= self.timing.record_secs {
                if self.count == 0 {
                    tracing::warn!(
                        index = self.index,
                        "No usable gaze during recording window; restarting window"
                    );
                    self.phase_started_ns = Some(now);
                } else {
                    events.push(self.commit(profile)?);
                    if self.index + 1 >= self.pattern.len() {
                        self.complete = true;
                        tracing::info!(
                            sensitivity_x = profile.sensitivity_x,
                            sensitivity_y = profile.sensitivity_y,
                            "Calibration session complete"
                        );
                        events.push(SessionEvent::Complete);
                    } else {
                        self.index += 1;
                        self.enter(CalibrationPhase::Moving, now);
                    }
                }
            }
        }

        Ok(events)
    }

    /// Skip the remaining move/settle time and start recording the current
    /// target at `now_ns`. Fails while a recording is already in flight.
    pub fn request_record(&mut self, now_ns: TimestampNs) -> GazelinkResult<()> {
        if self.complete {
            return Err(GazelinkError::calibration("calibration session already complete"));
        }
        self.begin_record(now_ns)
    }

    /// Cancel the session and return the profile from before it started.
    pub fn abort(self) -> CalibrationProfile {
        tracing::info!(index = self.index, "Calibration session aborted");
        self.saved_profile
    }

    pub fn progress(&self) -> Option<CalibrationProgress> {
        if self.complete {
            return None;
        }
        Some(CalibrationProgress {
            point_index: self.index,
            point_count: self.pattern.len(),
            target: self.current_target(),
            phase: self.phase,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn is_record_in_flight(&self) -> bool {
        self.record_in_flight
    }

    pub fn engine(&self) -> &CalibrationEngine {
        &self.engine
    }

    fn current_target(&self) -> Vec2 {
        self.pattern
            .points()
            .get(self.index)
            .copied()
            .unwrap_or(Vec2::SCREEN_CENTER)
    }

    fn enter(&mut self, phase: CalibrationPhase, now: TimestampNs) {
        tracing::debug!(index = self.index, ?phase, "Calibration phase");
        self.phase = phase;
        self.phase_started_ns = Some(now);
    }

    fn begin_record(&mut self, now: TimestampNs) -> GazelinkResult<()> {
        if self.record_in_flight {
            return Err(GazelinkError::calibration_busy(format!(
                "point {} is already recording",
                self.index
            )));
        }
        self.record_in_flight = true;
        self.sum = Vec2::ZERO;
        self.count = 0;
        self.enter(CalibrationPhase::Recording, now);
        Ok(())
    }

    fn commit(&mut self, profile: &mut CalibrationProfile) -> GazelinkResult<SessionEvent> {
        let raw = self.sum * (1.0 / self.count as f32);
        let observation = if self.index == 0 {
            self.engine.record_center(raw, profile)?;
            None
        } else {
            Some(
                self.engine
                    .record_point(self.current_target(), raw, profile)?,
            )
        };
        self.record_in_flight = false;
        Ok(SessionEvent::PointCommitted {
            index: self.index,
            raw,
            observation,
        })
    }
}
