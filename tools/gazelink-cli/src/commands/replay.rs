//! Replay a recorded stream through the pipeline runtime.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Context;
use gazelink_common::clock::SessionClock;
use gazelink_common::config::AppConfig;
use gazelink_runtime::sources::ReplaySource;
use gazelink_runtime::{feed_source, PipelineRuntime, RuntimeCommand, RuntimeConfig, RuntimeHandle};
use gazelink_signal_core::FramePipeline;
use gazelink_tracking_model::calibration::{CalibrationPattern, CalibrationProfile};
use gazelink_tracking_model::decision::DecisionMethod;

pub struct ReplayOptions {
    pub path: PathBuf,
    pub method: Option<String>,
    pub heavy: bool,
    pub calibrate: bool,
    pub in_selection_phase: bool,
    pub profile: Option<PathBuf>,
    pub realtime: bool,
}

pub async fn run(config: &AppConfig, options: ReplayOptions) -> anyhow::Result<()> {
    let tuning = super::load_tuning(config, None)?;
    let method: DecisionMethod = options
        .method
        .as_deref()
        .unwrap_or(config.session.decision_method.as_str())
        .parse()?;

    let mut source = ReplaySource::open(&options.path)
        .with_context(|| format!("Failed to open {}", options.path.display()))?;
    let rate = source
        .header()
        .map(|h| h.sample_rate_hz)
        .unwrap_or(config.session.sample_rate_hz);

    let mut pipeline = FramePipeline::new(tuning);
    if let Some(path) = &options.profile {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile {}", path.display()))?;
        let profile: CalibrationProfile = serde_json::from_str(&json)?;
        pipeline = pipeline.with_profile(profile);
    }
    pipeline.set_decision_method(method);
    pipeline.set_heavy_stabilization(options.heavy);
    pipeline.set_decision_selection_phase(options.in_selection_phase);

    println!("Replaying {} samples from {}", source.len(), options.path.display());
    println!("  Method: {method}");
    println!("  Heavy stabilization: {}", options.heavy);
    println!("  Selection phase: {}", options.in_selection_phase);
    println!();

    tracing::debug!(rate, realtime = options.realtime, "Starting replay");
    let (handle, runtime) = PipelineRuntime::spawn(pipeline, RuntimeConfig::from_session(&config.session));
    let consumer = tokio::spawn(consume(handle.clone()));

    if options.calibrate {
        handle
            .send(RuntimeCommand::StartCalibration(CalibrationPattern::standard()))
            .await?;
    }

    let stop = Arc::new(AtomicBool::new(false));
    let pace = options.realtime.then_some(rate);
    feed_source(&mut source, &handle, stop, pace).await?;

    handle.shutdown().await?;
    let summary = runtime.await?;
    consumer.await?;

    let stats = &summary.stats;
    println!();
    println!("Summary:");
    println!("  Samples processed: {}", stats.samples_processed);
    println!("  Confirmations: {}", stats.confirmations_consumed);
    println!("  Deep blinks: {}", stats.deep_blinks);
    println!("  Double mouth-opens: {}", stats.double_mouth_opens);
    println!("  Drift corrections: {}", stats.drift_corrections);
    println!("  Recalibrations: {}", stats.recalibrations);
    println!("  Tracking losses: {}", stats.tracking_losses);
    println!();
    println!("Final snapshot:");
    println!("{}", serde_json::to_string_pretty(&summary.final_snapshot)?);
    Ok(())
}

/// Plays the UI consumer: consumes confirmations and echoes notices.
async fn consume(handle: RuntimeHandle) {
    let mut rx = handle.subscribe();
    let mut was_ready = false;
    let mut last_message: Option<String> = None;

    while rx.changed().await.is_ok() {
        let snap = rx.borrow_and_update().clone();
        let t = SessionClock::ns_to_secs(snap.timestamp_ns);

        if snap.status_message != last_message {
            if let Some(message) = &snap.status_message {
                println!("[{t:7.2}s] {message}");
            }
            last_message = snap.status_message.clone();
        }

        if snap.confirmation_ready && !was_ready {
            println!(
                "[{t:7.2}s] Confirmed via {} at ({:.3}, {:.3})",
                snap.decision_method, snap.cursor_position.x, snap.cursor_position.y
            );
            if handle.send(RuntimeCommand::ConsumeConfirmation).await.is_err() {
                break;
            }
        }
        was_ready = snap.confirmation_ready;

        if snap.did_confirm_deep_blink
            && snap.decision_method != DecisionMethod::SustainedBlink
            && handle.send(RuntimeCommand::ClearDeepBlink).await.is_err()
        {
            break;
        }
        if snap.did_confirm_double_mouth_open
            && snap.decision_method != DecisionMethod::DoubleMouthOpen
            && handle.send(RuntimeCommand::ClearDoubleMouthOpen).await.is_err()
        {
            break;
        }
    }
}
