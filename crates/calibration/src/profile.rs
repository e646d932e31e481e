//! User baseline profile

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use signal_filter::{Channel, ChannelValues};

use crate::{CalibrationError, CalibrationStatistic};

/// User id assigned when none is configured
pub const DEFAULT_USER_ID: &str = "default_user";

/// Personal baseline: one statistic per calibrated channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBaselineProfile {
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub is_calibrated: bool,
    pub ear: CalibrationStatistic,
    pub head_tilt: CalibrationStatistic,
    pub head_pitch: CalibrationStatistic,
    pub head_roll: CalibrationStatistic,
    pub shoulder_angle: CalibrationStatistic,
    pub ipd: CalibrationStatistic,
}

impl Default for UserBaselineProfile {
    fn default() -> Self {
        Self::uncalibrated(DEFAULT_USER_ID)
    }
}

impl UserBaselineProfile {
    /// Empty profile; every z-score against it is zero
    pub fn uncalibrated(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            created_at: Utc::now(),
            is_calibrated: false,
            ear: CalibrationStatistic::default(),
            head_tilt: CalibrationStatistic::default(),
            head_pitch: CalibrationStatistic::default(),
            head_roll: CalibrationStatistic::default(),
            shoulder_angle: CalibrationStatistic::default(),
            ipd: CalibrationStatistic::default(),
        }
    }

    /// Calibrated profile from per-channel statistics
    pub fn from_statistics(
        user_id: impl Into<String>,
        mut stat: impl FnMut(Channel) -> CalibrationStatistic,
    ) -> Self {
        let mut profile = Self::uncalibrated(user_id);
        for channel in Channel::ALL {
            *profile.stat_mut(channel) = stat(channel);
        }
        profile.is_calibrated = true;
        profile
    }

    pub fn stat(&self, channel: Channel) -> &CalibrationStatistic {
        match channel {
            Channel::Ear => &self.ear,
            Channel::HeadTilt => &self.head_tilt,
            Channel::HeadPitch => &self.head_pitch,
            Channel::HeadRoll => &self.head_roll,
            Channel::ShoulderAngle => &self.shoulder_angle,
            Channel::Ipd => &self.ipd,
        }
    }

    pub fn stat_mut(&mut self, channel: Channel) -> &mut CalibrationStatistic {
        match channel {
            Channel::Ear => &mut self.ear,
            Channel::HeadTilt => &mut self.head_tilt,
            Channel::HeadPitch => &mut self.head_pitch,
            Channel::HeadRoll => &mut self.head_roll,
            Channel::ShoulderAngle => &mut self.shoulder_angle,
            Channel::Ipd => &mut self.ipd,
        }
    }

    /// Standard score for one channel
    ///
    /// Zero when the profile is uncalibrated or the channel has no samples.
    pub fn z_score(&self, channel: Channel, value: f64) -> f64 {
        let stat = self.stat(channel);
        if !self.is_calibrated || stat.is_empty() {
            return 0.0;
        }
        stat.z_score(value)
    }

    pub fn z_scores(&self, values: &ChannelValues) -> ChannelValues {
        ChannelValues::from_fn(|c| self.z_score(c, values[c]))
    }

    /// Baseline means, `None` for an uncalibrated profile
    pub fn baseline_means(&self) -> Option<ChannelValues> {
        self.is_calibrated
            .then(|| ChannelValues::from_fn(|c| self.stat(c).mean))
    }

    pub fn to_json(&self) -> Result<String, CalibrationError> {
        serde_json::to_string_pretty(self).map_err(|e| CalibrationError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, CalibrationError> {
        serde_json::from_str(json).map_err(|e| CalibrationError::Serialization(e.to_string()))
    }
}
