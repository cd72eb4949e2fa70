//! Run a calibration session over a recorded stream.

use std::path::PathBuf;

use anyhow::Context;
use gazelink_common::config::AppConfig;
use gazelink_runtime::sources::ReplaySource;
use gazelink_signal_core::FramePipeline;
use gazelink_tracking_model::calibration::CalibrationPattern;

pub fn run(
    config: &AppConfig,
    path: PathBuf,
    inner_points: bool,
    save: Option<PathBuf>,
) -> anyhow::Result<()> {
    let tuning = super::load_tuning(config, None)?;
    let source = ReplaySource::open(&path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let pattern = if inner_points {
        CalibrationPattern::with_inner_points()
    } else {
        CalibrationPattern::standard()
    };
    println!("Calibrating with {} points from {}", pattern.len(), path.display());

    let mut pipeline = FramePipeline::new(tuning);
    pipeline.start_calibration(pattern)?;

    let mut used = 0usize;
    for sample in source.samples() {
        pipeline.process(sample);
        used += 1;
        if !pipeline.is_calibrating() {
            break;
        }
    }

    if pipeline.is_calibrating() {
        tracing::warn!(samples = used, "Calibration incomplete");
        let progress = pipeline.snapshot().calibration;
        anyhow::bail!(
            "stream ended before calibration finished (at point {} of {})",
            progress.map(|p| p.point_index + 1).unwrap_or(0),
            progress.map(|p| p.point_count).unwrap_or(0)
        );
    }

    let profile = *pipeline.profile();
    println!("  Samples used: {used}");
    if let Some(summary) = pipeline.last_calibration_summary() {
        println!("  Points recorded: {}", summary.points_recorded);
        println!(
            "  Sensitivity candidates: x={} y={}",
            summary.candidates_x, summary.candidates_y
        );
    }
    println!(
        "  Sensitivity: x={:.4} y={:.4}",
        profile.sensitivity_x, profile.sensitivity_y
    );
    println!("  Offset: x={:.4} y={:.4}", profile.offset_x, profile.offset_y);

    if let Some(save) = save {
        std::fs::write(&save, serde_json::to_string_pretty(&profile)?)
            .with_context(|| format!("Failed to write {}", save.display()))?;
        println!("Profile saved to: {}", save.display());
    }
    Ok(())
}
