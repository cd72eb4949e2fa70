//! Gazelink Runtime
//!
//! Hosts a [`FramePipeline`] on a single tokio task and connects it to the
//! outside world:
//!
//! - **Inbound:** samples and control commands over a bounded mpsc queue
//! - **Outbound:** the latest [`PipelineSnapshot`] over a `watch` channel
//! - **Sources:** pluggable [`SampleSource`] implementations fed by [`feed_source`]
//!
//! The update task is the only writer of pipeline state. Readers may see
//! the snapshot from the previous frame but never block the writer.

pub mod sources;
pub mod writer;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gazelink_common::clock::RateController;
use gazelink_common::config::SessionDefaults;
use gazelink_common::error::{GazelinkError, GazelinkResult};
use gazelink_signal_core::FramePipeline;
use gazelink_tracking_model::calibration::CalibrationPattern;
use gazelink_tracking_model::decision::DecisionMethod;
use gazelink_tracking_model::sample::RawSample;
use gazelink_tracking_model::snapshot::PipelineSnapshot;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Trait for face-tracking sample sources.
pub trait SampleSource: Send {
    /// Poll for the next sample. Returns `None` if none is ready yet.
    fn poll(&mut self) -> GazelinkResult<Option<RawSample>>;

    /// Source name for logging.
    fn name(&self) -> &str;

    /// Check if the source can deliver samples on this system.
    fn is_available(&self) -> bool;

    /// A finite source (e.g. a recording) has nothing more to deliver.
    fn is_finished(&self) -> bool {
        false
    }
}

/// Messages accepted by the update task.
#[derive(Debug, Clone)]
pub enum RuntimeCommand {
    Sample(RawSample),
    TrackingActive(bool),
    TrackingUnsupported(String),
    StartCalibration(CalibrationPattern),
    RequestRecord,
    AbortCalibration,
    RequestRecalibration,
    SetHeavyStabilization(bool),
    SetDecisionMethod(DecisionMethod),
    SetSelectionPhase(bool),
    ConsumeConfirmation,
    ClearDeepBlink,
    ClearDoubleMouthOpen,
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// No sample for this long marks tracking as lost.
    pub tracking_timeout: Duration,
    pub command_queue_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from_session(&SessionDefaults::default())
    }
}

impl RuntimeConfig {
    pub fn from_session(session: &SessionDefaults) -> Self {
        Self {
            tracking_timeout: Duration::from_millis(session.tracking_timeout_ms),
            command_queue_capacity: session.command_queue_capacity.max(1),
        }
    }
}

/// Counters collected by the update task over its lifetime.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeStats {
    pub samples_processed: u64,
    pub deep_blinks: u64,
    pub double_mouth_opens: u64,
    pub drift_corrections: u64,
    pub recalibrations: u64,
    pub confirmations_consumed: u64,
    pub tracking_losses: u64,
}

/// Returned by the update task when it stops.
#[derive(Debug, Clone)]
pub struct RuntimeSummary {
    pub stats: RuntimeStats,
    pub final_snapshot: PipelineSnapshot,
}

/// Cloneable handle for talking to the update task.
#[derive(Clone)]
pub struct RuntimeHandle {
    commands: mpsc::Sender<RuntimeCommand>,
    snapshots: watch::Receiver<PipelineSnapshot>,
}

impl RuntimeHandle {
    /// Queue a command, waiting if the queue is full.
    pub async fn send(&self, command: RuntimeCommand) -> GazelinkResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| GazelinkError::runtime("pipeline runtime has stopped"))
    }

    pub async fn push_sample(&self, sample: RawSample) -> GazelinkResult<()> {
        self.send(RuntimeCommand::Sample(sample)).await
    }

    /// Queue a sample without waiting. A full queue drops the sample.
    pub fn try_push_sample(&self, sample: RawSample) -> GazelinkResult<bool> {
        match self.commands.try_send(RuntimeCommand::Sample(sample)) {
            Ok(()) => Ok(true),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!(t = sample.timestamp_ns, "Command queue full; sample dropped");
                Ok(false)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(GazelinkError::runtime("pipeline runtime has stopped"))
            }
        }
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> PipelineSnapshot {
        self.snapshots.borrow().clone()
    }

    /// A receiver that is notified on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.snapshots.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    pub async fn shutdown(&self) -> GazelinkResult<()> {
        self.send(RuntimeCommand::Shutdown).await
    }
}

/// Owns the update task.
pub struct PipelineRuntime;

impl PipelineRuntime {
    /// Move `pipeline` onto its own task. Must be called inside a tokio runtime.
    pub fn spawn(
        pipeline: FramePipeline,
        config: RuntimeConfig,
    ) -> (RuntimeHandle, JoinHandle<RuntimeSummary>) {
        let (command_tx, command_rx) = mpsc::channel(config.command_queue_capacity);
        let (snapshot_tx, snapshot_rx) = watch::channel(pipeline.snapshot());

        let handle = RuntimeHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
        };
        let task = UpdateTask {
            pipeline,
            commands: command_rx,
            snapshots: snapshot_tx,
            config,
            stats: RuntimeStats::default(),
            readers_gone: false,
        };
        let join = tokio::spawn(task.run());
        (handle, join)
    }
}

/// Added to notice deadlines so the idle time measured on wake-up is
/// never short of the display time.
const NOTICE_SLACK: Duration = Duration::from_millis(1);

fn duration_ns(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

struct UpdateTask {
    pipeline: FramePipeline,
    commands: mpsc::Receiver<RuntimeCommand>,
    snapshots: watch::Sender<PipelineSnapshot>,
    config: RuntimeConfig,
    stats: RuntimeStats,
    readers_gone: bool,
}

impl UpdateTask {
    async fn run(mut self) -> RuntimeSummary {
        tracing::info!(
            timeout_ms = self.config.tracking_timeout.as_millis() as u64,
            "Pipeline runtime started"
        );

        // Deadline for the next sample; `None` while tracking is not active.
        let mut sample_deadline: Option<Instant> = None;
        let mut last_sample_at = Instant::now();

        loop {
            let notice_deadline = self
                .pipeline
                .notice_idle_deadline_ns()
                .map(|idle_ns| last_sample_at + Duration::from_nanos(idle_ns) + NOTICE_SLACK);
            let deadline = match (sample_deadline, notice_deadline) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };

            let received = match deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, self.commands.recv()).await {
                        Ok(received) => received,
                        Err(_) => {
                            let now = Instant::now();
                            if sample_deadline.is_some_and(|d| now >= d) {
                                sample_deadline = None;
                                self.on_tracking_timeout();
                            }
                            if notice_deadline.is_some_and(|d| now >= d) {
                                self.on_idle(now.saturating_duration_since(last_sample_at));
                            }
                            continue;
                        }
                    }
                }
                None => self.commands.recv().await,
            };

            let Some(command) = received else {
                tracing::debug!("All runtime handles dropped");
                break;
            };

            match command {
                RuntimeCommand::Shutdown => break,
                RuntimeCommand::Sample(sample) => {
                    self.on_sample(&sample);
                    last_sample_at = Instant::now();
                    sample_deadline = Some(last_sample_at + self.config.tracking_timeout);
                }
                other => {
                    let now = Instant::now();
                    let idle = now.saturating_duration_since(last_sample_at);
                    self.pipeline.advance_idle(duration_ns(idle));
                    self.apply(other);
                    // Active tracking always has a pending sample deadline.
                    sample_deadline = if self.pipeline.is_tracking_active() {
                        sample_deadline.or(Some(now + self.config.tracking_timeout))
                    } else {
                        None
                    };
                    self.publish();
                }
            }
        }

        tracing::info!(
            samples = self.stats.samples_processed,
            drift_corrections = self.stats.drift_corrections,
            "Pipeline runtime stopped"
        );
        RuntimeSummary {
            stats: self.stats,
            final_snapshot: self.pipeline.snapshot(),
        }
    }

    fn on_sample(&mut self, sample: &RawSample) {
        self.pipeline.process(sample);
        self.stats.samples_processed += 1;

        let report = self.pipeline.last_report();
        self.stats.deep_blinks += u64::from(report.gestures.deep_blink);
        self.stats.double_mouth_opens += u64::from(report.gestures.double_mouth_open);
        self.stats.drift_corrections += u64::from(report.drift_correction.is_some());
        self.stats.recalibrations += u64::from(report.recalibration_started);

        self.publish();
    }

    fn on_tracking_timeout(&mut self) {
        if self.pipeline.is_tracking_active() {
            tracing::warn!(
                timeout_ms = self.config.tracking_timeout.as_millis() as u64,
                "No samples within timeout"
            );
            self.pipeline.mark_tracking_lost();
            self.stats.tracking_losses += 1;
            self.publish();
        }
    }

    fn on_idle(&mut self, idle: Duration) {
        self.pipeline.advance_idle(duration_ns(idle));
        self.publish();
    }

    fn apply(&mut self, command: RuntimeCommand) {
        match command {
            RuntimeCommand::TrackingActive(active) => {
                let was_active = self.pipeline.is_tracking_active();
                self.pipeline.set_tracking_active(active);
                if was_active && !active {
                    self.stats.tracking_losses += 1;
                }
            }
            RuntimeCommand::TrackingUnsupported(reason) => self.pipeline.mark_unsupported(reason),
            RuntimeCommand::StartCalibration(pattern) => {
                if let Err(e) = self.pipeline.start_calibration(pattern) {
                    tracing::warn!(error = %e, "Calibration request rejected");
                }
            }
            RuntimeCommand::RequestRecord => {
                if let Err(e) = self.pipeline.request_record() {
                    tracing::warn!(error = %e, "Record request rejected");
                }
            }
            RuntimeCommand::AbortCalibration => {
                self.pipeline.abort_calibration();
            }
            RuntimeCommand::RequestRecalibration => {
                if self.pipeline.request_recalibration() {
                    self.stats.recalibrations += 1;
                }
            }
            RuntimeCommand::SetHeavyStabilization(enabled) => {
                self.pipeline.set_heavy_stabilization(enabled)
            }
            RuntimeCommand::SetDecisionMethod(method) => self.pipeline.set_decision_method(method),
            RuntimeCommand::SetSelectionPhase(active) => {
                self.pipeline.set_decision_selection_phase(active)
            }
            RuntimeCommand::ConsumeConfirmation => {
                if self.pipeline.consume_confirmation() {
                    self.stats.confirmations_consumed += 1;
                }
            }
            RuntimeCommand::ClearDeepBlink => self.pipeline.clear_deep_blink(),
            RuntimeCommand::ClearDoubleMouthOpen => self.pipeline.clear_double_mouth_open(),
            RuntimeCommand::Sample(_) | RuntimeCommand::Shutdown => {}
        }
    }

    fn publish(&mut self) {
        if self.snapshots.send(self.pipeline.snapshot()).is_err() && !self.readers_gone {
            self.readers_gone = true;
            tracing::warn!("All snapshot readers dropped; continuing without publishing");
        }
    }
}

/// Forward samples from `source` into the runtime until the source is
/// finished or `stop_flag` is set. With `pace_hz` the source is polled at
/// most that often. Returns the number of samples forwarded.
pub async fn feed_source(
    source: &mut dyn SampleSource,
    handle: &RuntimeHandle,
    stop_flag: Arc<AtomicBool>,
    pace_hz: Option<u32>,
) -> GazelinkResult<u64> {
    if !source.is_available() {
        return Err(GazelinkError::tracking_unavailable(format!(
            "sample source '{}' is not available",
            source.name()
        )));
    }

    tracing::info!(source = %source.name(), ?pace_hz, "Sample feed started");
    let start = Instant::now();
    let mut rate = pace_hz.map(RateController::new);
    let mut forwarded = 0u64;

    while !stop_flag.load(Ordering::Relaxed) && !source.is_finished() {
        if let Some(rate) = rate.as_mut() {
            let now_ns = duration_ns(start.elapsed());
            if !rate.should_tick(now_ns) {
                let wait = rate.remaining_ns(now_ns).max(1);
                tokio::time::sleep(Duration::from_nanos(wait)).await;
                continue;
            }
        }

        match source.poll() {
            Ok(Some(sample)) => {
                handle.push_sample(sample).await?;
                forwarded += 1;
            }
            Ok(None) => {
                // Nothing ready yet, yield briefly
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Sample source error");
            }
        }
    }

    tracing::info!(samples = forwarded, "Sample feed stopped");
    Ok(forwarded)
}
