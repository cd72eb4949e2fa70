//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{GazelinkError, GazelinkResult};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Session defaults for the update loop.
    #[serde(default)]
    pub session: SessionDefaults,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Optional JSON file with pipeline tuning overrides.
    #[serde(default)]
    pub tuning_file: Option<PathBuf>,
}

/// Defaults applied to every tracking session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionDefaults {
    /// Nominal face-tracking sample rate (Hz).
    pub sample_rate_hz: u32,

    /// Silence on the sample channel longer than this marks tracking as lost.
    pub tracking_timeout_ms: u64,

    /// Capacity of the inbound command queue.
    pub command_queue_capacity: usize,

    /// Confirmation method used until the user picks one
    /// (`dwell`, `sustained_blink`, `double_mouth_open`).
    pub decision_method: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "gazelink_signal_core=trace,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            session: SessionDefaults::default(),
            logging: LoggingConfig::default(),
            tuning_file: None,
        }
    }
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            sample_rate_hz: 60,
            tracking_timeout_ms: 500,
            command_queue_capacity: 256,
            decision_method: "dwell".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl SessionDefaults {
    /// Nominal interval between samples in nanoseconds.
    pub fn frame_interval_ns(&self) -> u64 {
        1_000_000_000 / self.sample_rate_hz.max(1) as u64
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %config_path.display(), error = %e, "Failed to load config");
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit path.
    pub fn load_from(path: &Path) -> GazelinkResult<Self> {
        if !path.exists() {
            return Err(GazelinkError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        if config.session.sample_rate_hz == 0 {
            return Err(GazelinkError::config("session.sample_rate_hz must be positive"));
        }
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> GazelinkResult<PathBuf> {
        let config_path = config_file_path();
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    /// Save config to an explicit path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> GazelinkResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("gazelink").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_sixty_hz_session() {
        let config = AppConfig::default();
        assert_eq!(config.session.sample_rate_hz, 60);
        assert_eq!(config.session.frame_interval_ns(), 16_666_666);
        assert_eq!(config.session.decision_method, "dwell");
        assert!(config.tuning_file.is_none());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let raw = r#"{ "session": { "tracking_timeout_ms": 750 } }"#;
        let config: AppConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.session.tracking_timeout_ms, 750);
        assert_eq!(config.session.sample_rate_hz, 60);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = std::env::temp_dir().join("gazelink_test_config");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("config.json");

        let mut config = AppConfig::default();
        config.session.decision_method = "sustained_blink".to_string();
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.session.decision_method, "sustained_blink");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_zero_sample_rate_is_rejected() {
        let dir = std::env::temp_dir().join("gazelink_test_config_zero_rate");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, r#"{ "session": { "sample_rate_hz": 0 } }"#).unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, GazelinkError::Config { .. }));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_file_reports_path() {
        let path = PathBuf::from("/nonexistent/gazelink/config.json");
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, GazelinkError::FileNotFound { .. }));
    }
}
