//! Gazelink CLI: drive the gaze-to-pointer pipeline from recorded streams.
//!
//! Usage:
//!   gazelink simulate [OPTIONS]     Write a synthetic sample stream
//!   gazelink replay <PATH>          Replay a stream through the runtime
//!   gazelink calibrate <PATH>       Run a calibration session over a stream
//!   gazelink config                 Show or write the default configuration
//!   gazelink check                  Validate tuning values

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gazelink_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "gazelink",
    about = "Gaze-to-pointer signal pipeline tools",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/gazelink/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a scripted session: calibration sweep, fixation, posture
    /// shift, deep blink and double mouth-open
    Simulate {
        /// Output JSONL file
        #[arg(short, long, default_value = "session.jsonl")]
        output: PathBuf,

        /// Sample rate (Hz)
        #[arg(long, default_value = "60")]
        rate: u32,
    },

    /// Replay a recorded stream through the pipeline runtime
    Replay {
        /// Path to the JSONL stream
        path: PathBuf,

        /// Confirmation method: dwell, sustained_blink, double_mouth_open
        #[arg(long)]
        method: Option<String>,

        /// Use the heavy-stabilization smoothing factor
        #[arg(long)]
        heavy: bool,

        /// Run a standard calibration at the start of the stream
        #[arg(long)]
        calibrate: bool,

        /// Route gestures as outside the decision-selection phase
        /// (a deep blink then requests recalibration)
        #[arg(long)]
        outside_selection: bool,

        /// Start from a profile written by `gazelink calibrate --save`
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Feed samples at the recorded rate instead of as fast as possible
        #[arg(long)]
        realtime: bool,
    },

    /// Run a calibration session over a recorded stream
    Calibrate {
        /// Path to the JSONL stream
        path: PathBuf,

        /// Use the 13-point pattern
        #[arg(long)]
        inner_points: bool,

        /// Write the resulting profile as JSON
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Show the effective configuration and tuning
    Config {
        /// Write the configuration to its standard location
        #[arg(long)]
        write: bool,
    },

    /// Validate tuning values
    Check {
        /// Tuning file to check instead of the configured one
        #[arg(long)]
        tuning: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    gazelink_common::logging::init_logging(&config.logging)?;

    match cli.command {
        Commands::Simulate { output, rate } => commands::simulate::run(&config, output, rate),
        Commands::Replay {
            path,
            method,
            heavy,
            calibrate,
            outside_selection,
            profile,
            realtime,
        } => {
            commands::replay::run(
                &config,
                commands::replay::ReplayOptions {
                    path,
                    method,
                    heavy,
                    calibrate,
                    in_selection_phase: !outside_selection,
                    profile,
                    realtime,
                },
            )
            .await
        }
        Commands::Calibrate {
            path,
            inner_points,
            save,
        } => commands::calibrate::run(&config, path, inner_points, save),
        Commands::Config { write } => commands::config::run(&config, write),
        Commands::Check { tuning } => commands::check::run(&config, tuning),
    }
}
