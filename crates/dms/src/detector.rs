//! Adaptive anomaly detector
//!
//! Each frame is smoothed, scored against the user's calibrated baseline
//! and fed through per-condition hysteresis counters. With |z| > 2 a
//! normally distributed signal is anomalous only ~4.6% of the time, and a
//! flag additionally needs that to persist for `consecutive_frames`.

use calibration::UserBaselineProfile;
use signal_filter::{Channel, ChannelValues, MultiChannelFilter};
use tracing::{debug, info};

use crate::analysis::{DetectionCounters, DetectionFlags, DetectionResult, DistanceStatus, DmsAlert};
use crate::geometry::FrameGeometry;
use crate::state::DetectorState;
use crate::{DetectorConfig, DmsError};

/// Per-user anomaly detector
pub struct AdaptiveDetector {
    config: DetectorConfig,
    profile: UserBaselineProfile,
    filters: MultiChannelFilter,
    state: DetectorState,
    last_result: Option<DetectionResult>,
}

impl AdaptiveDetector {
    /// Create a detector judging against `profile`
    pub fn new(profile: UserBaselineProfile, config: DetectorConfig) -> Result<Self, DmsError> {
        if config.consecutive_frames == 0 {
            return Err(DmsError::Config("consecutive_frames must be at least 1".into()));
        }
        let filters = MultiChannelFilter::all(config.filter_window, config.filter_method)?;
        info!(
            "Adaptive detector for '{}' (calibrated={}, window={}, frames={})",
            profile.user_id, profile.is_calibrated, config.filter_window, config.consecutive_frames
        );
        Ok(Self {
            state: DetectorState::new(config.consecutive_frames),
            config,
            profile,
            filters,
            last_result: None,
        })
    }

    /// Process one frame of raw measurements
    pub fn process(&mut self, raw: &ChannelValues) -> DetectionResult {
        self.state.face_absent_frames = 0;
        self.evaluate(raw, true)
    }

    /// Process a frame where no face was found
    ///
    /// Neutral values keep the filters and counters moving without
    /// inventing an anomaly.
    pub fn process_missing(&mut self) -> DetectionResult {
        self.state.face_absent_frames = self.state.face_absent_frames.saturating_add(1);
        let neutral = self.neutral_values();
        self.evaluate(&neutral, false)
    }

    /// Baseline means when calibrated, geometry defaults otherwise
    pub fn neutral_values(&self) -> ChannelValues {
        self.profile
            .baseline_means()
            .unwrap_or_else(|| FrameGeometry::default().channel_values())
    }

    fn evaluate(&mut self, raw: &ChannelValues, face_detected: bool) -> DetectionResult {
        let smoothed = self.filters.update(raw);
        let z = self.profile.z_scores(&smoothed);
        let cfg = &self.config;

        let drowsy = self.state.drowsy.update(z[Channel::Ear] < cfg.z_threshold_drowsy);
        let bad_posture = self.state.bad_posture.update(
            z[Channel::HeadTilt].abs() > cfg.z_threshold_posture
                || z[Channel::ShoulderAngle].abs() > cfg.z_threshold_posture,
        );
        let head_down = self
            .state
            .head_down
            .update(z[Channel::HeadPitch] > cfg.z_threshold_posture);
        let too_close = self
            .state
            .too_close
            .update(z[Channel::Ipd] > cfg.z_threshold_distance);
        let too_far = self
            .state
            .too_far
            .update(z[Channel::Ipd] < -cfg.z_threshold_distance);

        let flags = DetectionFlags {
            drowsy,
            bad_posture,
            head_down,
            too_close,
            too_far,
        };

        let mut alerts = Vec::new();
        if flags.drowsy {
            alerts.push(DmsAlert::Drowsiness);
        }
        if flags.bad_posture {
            alerts.push(DmsAlert::BadPosture);
        }
        if flags.head_down {
            alerts.push(DmsAlert::HeadDown);
        }
        if flags.too_close {
            alerts.push(DmsAlert::TooClose);
        }
        if flags.too_far {
            alerts.push(DmsAlert::TooFar);
        }
        if self.state.face_absent_frames > cfg.face_absent_frames {
            alerts.push(DmsAlert::FaceNotVisible);
        }

        let result = DetectionResult {
            face_detected,
            raw: *raw,
            smoothed,
            z_scores: z,
            flags,
            counters: DetectionCounters {
                drowsy: self.state.drowsy.count(),
                bad_posture: self.state.bad_posture.count(),
                head_down: self.state.head_down.count(),
                too_close: self.state.too_close.count(),
                too_far: self.state.too_far.count(),
            },
            alerts,
        };

        debug!(
            "z_ear={:.2} z_tilt={:.2} z_shoulder={:.2} z_pitch={:.2} z_ipd={:.2} drowsy={}",
            z[Channel::Ear],
            z[Channel::HeadTilt],
            z[Channel::ShoulderAngle],
            z[Channel::HeadPitch],
            z[Channel::Ipd],
            result.counters.drowsy
        );

        self.last_result = Some(result.clone());
        result
    }

    /// Replace the baseline (after a new calibration) and start fresh
    pub fn set_profile(&mut self, profile: UserBaselineProfile) {
        info!(
            "Baseline replaced for '{}' (calibrated={})",
            profile.user_id, profile.is_calibrated
        );
        self.profile = profile;
        self.reset();
    }

    /// Clear filters, counters and the last result
    pub fn reset(&mut self) {
        self.filters.reset();
        self.state.reset();
        self.last_result = None;
    }

    pub fn profile(&self) -> &UserBaselineProfile {
        &self.profile
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    pub fn last_result(&self) -> Option<&DetectionResult> {
        self.last_result.as_ref()
    }

    /// Viewing distance judged on the last frame's IPD z-score
    pub fn distance_status(&self) -> DistanceStatus {
        self.last_result
            .as_ref()
            .map(|r| DistanceStatus::from_z(r.z_scores[Channel::Ipd], self.config.z_threshold_distance))
            .unwrap_or(DistanceStatus::Normal)
    }

    /// Human-readable summary of the last frame
    pub fn status_text(&self) -> String {
        let Some(r) = &self.last_result else {
            return "No data yet".to_string();
        };

        let z_ear = r.z_scores[Channel::Ear];
        let eyes = if r.flags.drowsy {
            format!("DROWSY (z={:.2})", z_ear)
        } else if z_ear < -1.0 {
            format!("Tired (z={:.2})", z_ear)
        } else {
            format!("Alert (z={:.2})", z_ear)
        };

        let posture = if r.flags.bad_posture {
            "BAD POSTURE"
        } else {
            "Good posture"
        };

        let mut parts = vec![eyes, posture.to_string()];
        if r.flags.head_down {
            parts.push("HEAD DOWN".to_string());
        }
        match self.distance_status() {
            DistanceStatus::TooClose if r.flags.too_close => parts.push("TOO CLOSE".to_string()),
            DistanceStatus::TooFar if r.flags.too_far => parts.push("TOO FAR".to_string()),
            _ => {}
        }
        parts.join(" | ")
    }
}
