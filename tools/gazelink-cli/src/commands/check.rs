//! Validate tuning values.

use std::path::PathBuf;

use gazelink_common::config::AppConfig;
use gazelink_tracking_model::decision::DecisionMethod;
use gazelink_tracking_model::tuning::PipelineTuning;

pub fn run(config: &AppConfig, tuning_path: Option<PathBuf>) -> anyhow::Result<()> {
    println!("Gazelink Tuning Check");
    println!("{}", "=".repeat(50));

    let source = tuning_path
        .as_deref()
        .or(config.tuning_file.as_deref())
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "built-in defaults".to_string());
    println!("Tuning: {source}");

    // Parse without validating so every violation can be listed.
    let tuning: PipelineTuning = match tuning_path.as_deref().or(config.tuning_file.as_deref()) {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => PipelineTuning::default(),
    };

    let mut failures = 0;
    match config.session.decision_method.parse::<DecisionMethod>() {
        Ok(method) => println!("[OK] Decision method: {method}"),
        Err(e) => {
            println!("[FAIL] {e}");
            failures += 1;
        }
    }
    if config.session.sample_rate_hz > 0 {
        println!("[OK] Sample rate: {} Hz", config.session.sample_rate_hz);
    } else {
        println!("[FAIL] Sample rate must be positive");
        failures += 1;
    }

    let violations = tuning.violations();
    for violation in &violations {
        println!("[FAIL] {violation}");
    }
    failures += violations.len();

    println!();
    if failures == 0 {
        println!("All tuning values are valid.");
        Ok(())
    } else {
        anyhow::bail!("{failures} invalid setting(s)")
    }
}
