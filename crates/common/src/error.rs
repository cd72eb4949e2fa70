//! Error types shared across Gazelink crates.

use std::path::PathBuf;

/// Top-level error type for Gazelink operations.
#[derive(Debug, thiserror::Error)]
pub enum GazelinkError {
    #[error("Tracking error: {message}")]
    Tracking { message: String },

    #[error("Tracking unavailable: {message}")]
    TrackingUnavailable { message: String },

    #[error("Calibration error: {message}")]
    Calibration { message: String },

    #[error("Calibration busy: {message}")]
    CalibrationBusy { message: String },

    #[error("Runtime error: {message}")]
    Runtime { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using GazelinkError.
pub type GazelinkResult<T> = Result<T, GazelinkError>;

impl GazelinkError {
    pub fn tracking(msg: impl Into<String>) -> Self {
        Self::Tracking {
            message: msg.into(),
        }
    }

    pub fn tracking_unavailable(msg: impl Into<String>) -> Self {
        Self::TrackingUnavailable {
            message: msg.into(),
        }
    }

    pub fn calibration(msg: impl Into<String>) -> Self {
        Self::Calibration {
            message: msg.into(),
        }
    }

    pub fn calibration_busy(msg: impl Into<String>) -> Self {
        Self::CalibrationBusy {
            message: msg.into(),
        }
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}
