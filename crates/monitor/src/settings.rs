//! Application settings

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use pipeline::PipelineConfig;
use serde::{Deserialize, Serialize};

/// Config file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_NAME: &str = "focus-monitor";
/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "FOCUS_MONITOR_CONFIG";
/// Prefix for overrides such as `FOCUS_MONITOR__LOG_LEVEL=debug`
pub const ENV_PREFIX: &str = "FOCUS_MONITOR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub user_id: String,
    /// Directory holding `<user>_profile.json` files
    pub profile_dir: PathBuf,
    pub log_level: String,
    pub log_json: bool,
    /// Prometheus scrape endpoint, e.g. `0.0.0.0:9000`
    pub metrics_addr: Option<String>,
    /// Collect a baseline at startup when no calibrated profile is stored
    pub calibrate_if_missing: bool,
    pub telemetry_retention: usize,
    /// Log a status line every N reports (0 = never)
    pub status_interval: u64,
    /// Finish after this many reports; runs until interrupted when unset
    pub max_reports: Option<u64>,
    pub pipeline: PipelineConfig,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            user_id: calibration::DEFAULT_USER_ID.to_string(),
            profile_dir: PathBuf::from("profiles"),
            log_level: "info".to_string(),
            log_json: false,
            metrics_addr: None,
            calibrate_if_missing: true,
            telemetry_retention: 100_000,
            status_interval: 30,
            max_reports: None,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl AppSettings {
    /// Layer defaults, the config file and `FOCUS_MONITOR__*` variables
    ///
    /// An explicit `path` must exist; otherwise `focus-monitor.{toml,json,yaml}`
    /// is read from the working directory if present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let mut settings: AppSettings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        settings.sync_user();
        Ok(settings)
    }

    /// Same as [`AppSettings::load`], taking the path from `FOCUS_MONITOR_CONFIG`
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        Self::load(path.as_deref())
    }

    /// Calibrations produce profiles for the configured user
    fn sync_user(&mut self) {
        self.pipeline.analyzer.calibration.user_id = self.user_id.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inference_engine::PerformancePreset;

    #[test]
    fn test_defaults() {
        let settings = AppSettings::default();
        assert_eq!(settings.log_level, "info");
        assert!(settings.calibrate_if_missing);
        assert!(settings.metrics_addr.is_none());
        assert_eq!(settings.pipeline.queue_capacity, 2);
        assert_eq!(settings.pipeline.preset, PerformancePreset::Balanced);
    }

    #[test]
    fn test_load_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.toml");
        std::fs::write(
            &path,
            r#"
user_id = "erin"
log_level = "debug"
status_interval = 10

[pipeline]
preset = "high_accuracy"
poll_timeout_ms = 50

[pipeline.analyzer.calibration]
duration_secs = 5.0
"#,
        )
        .unwrap();

        let settings = AppSettings::load(Some(&path)).unwrap();
        assert_eq!(settings.user_id, "erin");
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.status_interval, 10);
        assert_eq!(settings.pipeline.preset, PerformancePreset::HighAccuracy);
        assert_eq!(settings.pipeline.poll_timeout_ms, 50);
        assert_eq!(settings.pipeline.analyzer.calibration.duration_secs, 5.0);
        assert_eq!(settings.pipeline.analyzer.calibration.user_id, "erin");
        // Untouched sections keep their defaults
        assert_eq!(settings.pipeline.queue_capacity, 2);
        assert_eq!(settings.telemetry_retention, 100_000);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppSettings::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
