//! Detection results and alerts

use serde::{Deserialize, Serialize};
use signal_filter::ChannelValues;

use crate::geometry::DEFAULT_IPD;

/// Reference viewing distance for [`DEFAULT_IPD`] (cm)
const REFERENCE_DISTANCE_CM: f64 = 50.0;

/// DMS alert types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DmsAlert {
    /// Eyes persistently narrower than the user's baseline
    Drowsiness,

    /// Head tilt or shoulder line persistently off baseline
    BadPosture,

    /// Head pitched down beyond baseline
    HeadDown,

    /// Sitting closer to the screen than usual
    TooClose,

    /// Sitting further from the screen than usual
    TooFar,

    /// Face not visible (camera blocked?)
    FaceNotVisible,
}

impl DmsAlert {
    pub fn as_str(&self) -> &'static str {
        match self {
            DmsAlert::Drowsiness => "drowsiness",
            DmsAlert::BadPosture => "bad_posture",
            DmsAlert::HeadDown => "head_down",
            DmsAlert::TooClose => "too_close",
            DmsAlert::TooFar => "too_far",
            DmsAlert::FaceNotVisible => "face_not_visible",
        }
    }
}

/// Per-frame condition flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DetectionFlags {
    pub drowsy: bool,
    pub bad_posture: bool,
    pub head_down: bool,
    pub too_close: bool,
    pub too_far: bool,
}

/// Consecutive anomalous frames per condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DetectionCounters {
    pub drowsy: u32,
    pub bad_posture: u32,
    pub head_down: u32,
    pub too_close: u32,
    pub too_far: u32,
}

/// Complete detector output for one frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Whether this frame carried real measurements
    pub face_detected: bool,
    pub raw: ChannelValues,
    pub smoothed: ChannelValues,
    pub z_scores: ChannelValues,
    pub flags: DetectionFlags,
    pub counters: DetectionCounters,
    /// Active alerts
    pub alerts: Vec<DmsAlert>,
}

impl DetectionResult {
    /// Check if any alerts are active
    pub fn has_alerts(&self) -> bool {
        !self.alerts.is_empty()
    }

    /// Get highest severity alert
    pub fn highest_severity_alert(&self) -> Option<DmsAlert> {
        // Priority: Drowsiness > FaceNotVisible > HeadDown > BadPosture > Others
        [
            DmsAlert::Drowsiness,
            DmsAlert::FaceNotVisible,
            DmsAlert::HeadDown,
            DmsAlert::BadPosture,
        ]
        .into_iter()
        .find(|alert| self.alerts.contains(alert))
        .or_else(|| self.alerts.first().copied())
    }
}

/// Viewing distance classification from the IPD z-score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceStatus {
    TooClose,
    Normal,
    TooFar,
}

impl DistanceStatus {
    /// Large IPD means the face is near the camera
    pub fn from_z(z_ipd: f64, threshold: f64) -> Self {
        if z_ipd > threshold {
            DistanceStatus::TooClose
        } else if z_ipd < -threshold {
            DistanceStatus::TooFar
        } else {
            DistanceStatus::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceStatus::TooClose => "too_close",
            DistanceStatus::Normal => "normal",
            DistanceStatus::TooFar => "too_far",
        }
    }
}

/// Rough face-to-camera distance in centimetres
///
/// Apparent IPD scales inversely with distance; [`DEFAULT_IPD`] is taken
/// as the reference at 50 cm.
pub fn estimate_distance_cm(ipd: f64) -> Option<f64> {
    if ipd <= 0.0 {
        return None;
    }
    Some(REFERENCE_DISTANCE_CM / (ipd / DEFAULT_IPD))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highest_severity() {
        let result = DetectionResult {
            alerts: vec![DmsAlert::TooClose, DmsAlert::BadPosture, DmsAlert::Drowsiness],
            ..Default::default()
        };
        assert_eq!(result.highest_severity_alert(), Some(DmsAlert::Drowsiness));

        let result = DetectionResult {
            alerts: vec![DmsAlert::TooFar],
            ..Default::default()
        };
        assert_eq!(result.highest_severity_alert(), Some(DmsAlert::TooFar));
        assert!(!DetectionResult::default().has_alerts());
    }

    #[test]
    fn test_distance_polarity() {
        assert_eq!(DistanceStatus::from_z(2.5, 2.0), DistanceStatus::TooClose);
        assert_eq!(DistanceStatus::from_z(-2.5, 2.0), DistanceStatus::TooFar);
        assert_eq!(DistanceStatus::from_z(1.0, 2.0), DistanceStatus::Normal);
    }

    #[test]
    fn test_distance_estimate() {
        assert!((estimate_distance_cm(0.15).unwrap() - 50.0).abs() < 1e-9);
        assert!((estimate_distance_cm(0.30).unwrap() - 25.0).abs() < 1e-9);
        assert_eq!(estimate_distance_cm(0.0), None);
    }
}
