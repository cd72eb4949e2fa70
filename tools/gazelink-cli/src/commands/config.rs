//! Show or write the configuration.

use gazelink_common::config::{config_file_path, AppConfig};

pub fn run(config: &AppConfig, write: bool) -> anyhow::Result<()> {
    let tuning = super::load_tuning(config, None)?;

    println!("Config file: {}", config_file_path().display());
    println!("{}", serde_json::to_string_pretty(config)?);
    println!();
    println!("Pipeline tuning:");
    println!("{}", serde_json::to_string_pretty(&tuning)?);

    if write {
        let path = config.save()?;
        println!();
        println!("Configuration written to: {}", path.display());
    }
    Ok(())
}
