//! Calibration state machine

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use signal_filter::{Channel, ChannelValues};
use tracing::{debug, info, warn};

use crate::{CalibrationError, CalibrationStatistic, UserBaselineProfile, DEFAULT_USER_ID};

/// Calibration lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CalibrationState {
    #[default]
    Idle,
    Collecting,
    Complete,
    Insufficient,
}

impl CalibrationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalibrationState::Idle => "idle",
            CalibrationState::Collecting => "collecting",
            CalibrationState::Complete => "complete",
            CalibrationState::Insufficient => "insufficient",
        }
    }
}

impl fmt::Display for CalibrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calibration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Collection window in seconds
    pub duration_secs: f64,
    /// Minimum samples on the EAR channel for a valid baseline
    pub min_samples: usize,
    /// User the resulting profile belongs to
    pub user_id: String,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            duration_secs: 10.0,
            min_samples: 30,
            user_id: DEFAULT_USER_ID.to_string(),
        }
    }
}

impl CalibrationConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_secs.max(0.0))
    }
}

/// Collects smoothed samples and produces a baseline profile
#[derive(Debug)]
pub struct Calibrator {
    config: CalibrationConfig,
    state: CalibrationState,
    started_at: Option<Instant>,
    samples: Vec<Vec<f64>>,
    progress: f64,
}

impl Calibrator {
    pub fn new(config: CalibrationConfig) -> Self {
        Self {
            config,
            state: CalibrationState::Idle,
            started_at: None,
            samples: vec![Vec::new(); Channel::COUNT],
            progress: 0.0,
        }
    }

    /// Begin a new collection window
    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    pub fn start_at(&mut self, now: Instant) {
        for channel in &mut self.samples {
            channel.clear();
        }
        self.started_at = Some(now);
        self.progress = 0.0;
        self.state = CalibrationState::Collecting;
        info!(
            "Calibration started for '{}' ({:.1}s window)",
            self.config.user_id, self.config.duration_secs
        );
    }

    /// Record one frame of smoothed values
    ///
    /// Returns false when not collecting; the sample is dropped.
    pub fn add_sample(&mut self, values: &ChannelValues) -> bool {
        self.add_sample_at(values, Instant::now())
    }

    pub fn add_sample_at(&mut self, values: &ChannelValues, now: Instant) -> bool {
        if self.state != CalibrationState::Collecting {
            return false;
        }
        for (channel, value) in values.iter() {
            self.samples[channel.index()].push(value);
        }
        self.progress = self.progress_at(now);
        true
    }

    fn progress_at(&self, now: Instant) -> f64 {
        let Some(started) = self.started_at else {
            return 0.0;
        };
        let duration = self.config.duration().as_secs_f64();
        if duration <= 0.0 {
            return 1.0;
        }
        (now.saturating_duration_since(started).as_secs_f64() / duration).min(1.0)
    }

    /// Collection window elapsed
    pub fn is_complete(&self) -> bool {
        self.is_complete_at(Instant::now())
    }

    pub fn is_complete_at(&self, now: Instant) -> bool {
        self.state == CalibrationState::Collecting && self.progress_at(now) >= 1.0
    }

    /// Turn collected samples into a calibrated profile
    pub fn finish(&mut self) -> Result<UserBaselineProfile, CalibrationError> {
        if self.state != CalibrationState::Collecting {
            return Err(CalibrationError::NotCollecting(self.state));
        }

        let collected = self.sample_count();
        if collected < self.config.min_samples {
            self.state = CalibrationState::Insufficient;
            warn!(
                "Calibration failed: {} samples, need {}",
                collected, self.config.min_samples
            );
            return Err(CalibrationError::InsufficientSamples {
                collected,
                required: self.config.min_samples,
            });
        }

        let profile = UserBaselineProfile::from_statistics(self.config.user_id.clone(), |c| {
            CalibrationStatistic::from_samples(&self.samples[c.index()])
        });
        self.state = CalibrationState::Complete;
        self.progress = 1.0;

        info!(
            "Calibration complete: {} samples, EAR {:.3} ± {:.3}",
            collected, profile.ear.mean, profile.ear.std_dev
        );
        for channel in Channel::ALL {
            let stat = profile.stat(channel);
            debug!("  {}: mean={:.4}, std={:.4}", channel, stat.mean, stat.std_dev);
        }
        Ok(profile)
    }

    /// Return to idle, discarding collected samples
    pub fn reset(&mut self) {
        for channel in &mut self.samples {
            channel.clear();
        }
        self.started_at = None;
        self.progress = 0.0;
        self.state = CalibrationState::Idle;
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    /// Fraction of the window elapsed as of the last sample, in [0, 1]
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Samples collected on the EAR channel
    pub fn sample_count(&self) -> usize {
        self.samples[Channel::Ear.index()].len()
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Text progress bar, e.g. `|████------| 40%`
    pub fn progress_bar(&self, width: usize) -> String {
        let filled = ((self.progress * width as f64) as usize).min(width);
        format!(
            "|{}{}| {:.0}%",
            "█".repeat(filled),
            "-".repeat(width - filled),
            self.progress * 100.0
        )
    }
}

impl Default for Calibrator {
    fn default() -> Self {
        Self::new(CalibrationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(ear: f64) -> ChannelValues {
        ChannelValues::zeroed()
            .with(Channel::Ear, ear)
            .with(Channel::Ipd, 0.15)
            .with(Channel::HeadPitch, 5.0)
    }

    #[test]
    fn test_samples_dropped_when_idle() {
        let mut calibrator = Calibrator::default();
        assert_eq!(calibrator.state(), CalibrationState::Idle);
        assert!(!calibrator.add_sample(&frame(0.3)));
        assert_eq!(calibrator.sample_count(), 0);
    }

    #[test]
    fn test_finish_requires_collecting() {
        let mut calibrator = Calibrator::default();
        assert_eq!(
            calibrator.finish().unwrap_err(),
            CalibrationError::NotCollecting(CalibrationState::Idle)
        );
    }

    #[test]
    fn test_insufficient_samples() {
        let mut calibrator = Calibrator::default();
        let t0 = Instant::now();
        calibrator.start_at(t0);
        for i in 0..29 {
            calibrator.add_sample_at(&frame(0.3), t0 + Duration::from_millis(i * 300));
        }

        let err = calibrator.finish().unwrap_err();
        assert_eq!(
            err,
            CalibrationError::InsufficientSamples {
                collected: 29,
                required: 30
            }
        );
        assert_eq!(calibrator.state(), CalibrationState::Insufficient);
    }

    #[test]
    fn test_uniform_samples_produce_zero_std() {
        let mut calibrator = Calibrator::default();
        let t0 = Instant::now();
        calibrator.start_at(t0);
        for i in 0..30 {
            calibrator.add_sample_at(&frame(0.3), t0 + Duration::from_millis(i * 100));
        }

        let profile = calibrator.finish().unwrap();
        assert!(profile.is_calibrated);
        assert_eq!(profile.user_id, DEFAULT_USER_ID);
        assert_eq!(profile.ear.std_dev, 0.0);
        assert!((profile.ear.mean - 0.3).abs() < 1e-12);
        assert!((profile.ipd.mean - 0.15).abs() < 1e-12);
        assert_eq!(profile.ear.sample_count, 30);
        assert_eq!(calibrator.state(), CalibrationState::Complete);
    }

    #[test]
    fn test_progress_and_completion() {
        let mut calibrator = Calibrator::default();
        let t0 = Instant::now();
        calibrator.start_at(t0);

        calibrator.add_sample_at(&frame(0.3), t0 + Duration::from_secs(4));
        assert!((calibrator.progress() - 0.4).abs() < 1e-9);
        assert_eq!(calibrator.progress_bar(10), "|████------| 40%");
        assert!(!calibrator.is_complete_at(t0 + Duration::from_secs(9)));
        assert!(calibrator.is_complete_at(t0 + Duration::from_secs(10)));

        calibrator.add_sample_at(&frame(0.3), t0 + Duration::from_secs(15));
        assert_eq!(calibrator.progress(), 1.0);
    }

    #[test]
    fn test_restart_clears_previous_samples() {
        let mut calibrator = Calibrator::default();
        calibrator.start();
        for _ in 0..10 {
            calibrator.add_sample(&frame(0.3));
        }
        calibrator.start();
        assert_eq!(calibrator.sample_count(), 0);
        assert_eq!(calibrator.state(), CalibrationState::Collecting);

        calibrator.reset();
        assert_eq!(calibrator.state(), CalibrationState::Idle);
    }

    #[test]
    fn test_custom_user_and_threshold() {
        let mut calibrator = Calibrator::new(CalibrationConfig {
            duration_secs: 1.0,
            min_samples: 3,
            user_id: "bob".into(),
        });
        calibrator.start();
        for ear in [0.28, 0.30, 0.32] {
            calibrator.add_sample(&frame(ear));
        }
        let profile = calibrator.finish().unwrap();
        assert_eq!(profile.user_id, "bob");
        assert!((profile.ear.mean - 0.30).abs() < 1e-12);
        assert!(profile.ear.std_dev > 0.0);
    }
}
