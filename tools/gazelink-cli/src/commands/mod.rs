pub mod calibrate;
pub mod check;
pub mod config;
pub mod replay;
pub mod simulate;

use std::path::Path;

use anyhow::Context;
use gazelink_common::config::AppConfig;
use gazelink_tracking_model::tuning::PipelineTuning;

/// Tuning from `path`, else from the configured tuning file, else defaults.
pub fn load_tuning(config: &AppConfig, path: Option<&Path>) -> anyhow::Result<PipelineTuning> {
    match path.or(config.tuning_file.as_deref()) {
        Some(path) => PipelineTuning::load(path)
            .with_context(|| format!("Failed to load tuning from {}", path.display())),
        None => Ok(PipelineTuning::default()),
    }
}
