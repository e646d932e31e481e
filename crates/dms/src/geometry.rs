//! Geometry extraction from normalized landmarks
//!
//! Pure functions; every measurement degrades to `None` when a required
//! landmark is missing so that [`FrameGeometry::extract`] can substitute
//! a neutral value.

use serde::{Deserialize, Serialize};
use signal_filter::{Channel, ChannelValues};

use crate::landmarks::{face_index as fi, pose_index as pi, FaceLandmarks, PoseLandmarks};

/// Inter-pupillary distance assumed when no face is visible
pub const DEFAULT_IPD: f64 = 0.15;
/// Open-eye aspect ratio assumed when no face is visible
pub const DEFAULT_EAR: f64 = 0.30;

/// Landmark indices describing one eye
#[derive(Debug, Clone, Copy)]
pub struct EyePoints {
    pub upper: usize,
    pub lower: usize,
    pub outer: usize,
    pub inner: usize,
}

pub const LEFT_EYE: EyePoints = EyePoints {
    upper: fi::LEFT_EYE_UPPER,
    lower: fi::LEFT_EYE_LOWER,
    outer: fi::LEFT_EYE_OUTER,
    inner: fi::LEFT_EYE_INNER,
};

pub const RIGHT_EYE: EyePoints = EyePoints {
    upper: fi::RIGHT_EYE_UPPER,
    lower: fi::RIGHT_EYE_LOWER,
    outer: fi::RIGHT_EYE_OUTER,
    inner: fi::RIGHT_EYE_INNER,
};

/// Eye aspect ratio: lid opening over eye width
pub fn eye_aspect_ratio(face: &FaceLandmarks, eye: EyePoints) -> Option<f64> {
    let vertical = face.get(eye.upper)?.distance(face.get(eye.lower)?);
    let horizontal = face.get(eye.outer)?.distance(face.get(eye.inner)?);
    if horizontal == 0.0 {
        return Some(0.0);
    }
    Some(vertical / horizontal)
}

/// Head pitch in degrees, positive when looking down
///
/// Estimated from the forehead-nose to nose-chin length ratio.
pub fn head_pitch(face: &FaceLandmarks) -> Option<f64> {
    let forehead = face.get(fi::FOREHEAD)?;
    let nose = face.get(fi::NOSE_TIP)?;
    let chin = face.get(fi::CHIN)?;

    let upper = forehead.distance_2d(nose);
    let lower = nose.distance_2d(chin);
    if lower == 0.0 {
        return Some(0.0);
    }
    Some((upper / lower - 1.0) * 50.0)
}

/// Head roll in degrees from the line through both outer eye corners
pub fn head_roll(face: &FaceLandmarks) -> Option<f64> {
    let left = face.get(fi::LEFT_EYE_OUTER)?;
    let right = face.get(fi::RIGHT_EYE_OUTER)?;
    let roll = (right.y - left.y).atan2(right.x - left.x).to_degrees();
    // Mirrored input puts an upright head at ±180
    Some(normalize_half_turn(roll))
}

fn normalize_half_turn(angle: f64) -> f64 {
    if angle > 90.0 {
        angle - 180.0
    } else if angle < -90.0 {
        angle + 180.0
    } else {
        angle
    }
}

/// Head yaw in degrees, positive when turned right
pub fn head_yaw(face: &FaceLandmarks) -> Option<f64> {
    let left = face.get(fi::LEFT_CHEEK)?;
    let right = face.get(fi::RIGHT_CHEEK)?;
    let nose = face.get(fi::NOSE_TIP)?;

    let dist_left = (nose.x - left.x).abs();
    let dist_right = (nose.x - right.x).abs();
    let total = dist_left + dist_right;
    if total == 0.0 {
        return Some(0.0);
    }
    Some((dist_right - dist_left) / total * 45.0)
}

/// Inter-pupillary distance proxy: outer eye corner separation
pub fn inter_pupillary_distance(face: &FaceLandmarks) -> Option<f64> {
    let left = face.get(fi::LEFT_EYE_OUTER)?;
    let right = face.get(fi::RIGHT_EYE_OUTER)?;
    Some(left.distance_2d(right))
}

/// Horizontal iris position within the eyes, 0 = left, 0.5 = center, 1 = right
pub fn gaze_ratio(face: &FaceLandmarks) -> Option<f64> {
    let left_iris = face.get(fi::LEFT_IRIS_CENTER)?.x;
    let left_outer = face.get(fi::LEFT_EYE_OUTER)?.x;
    let left_inner = face.get(fi::LEFT_EYE_INNER)?.x;
    let right_iris = face.get(fi::RIGHT_IRIS_CENTER)?.x;
    let right_outer = face.get(fi::RIGHT_EYE_OUTER)?.x;
    let right_inner = face.get(fi::RIGHT_EYE_INNER)?.x;

    let left_width = left_inner - left_outer;
    let left_ratio = if left_width.abs() < 0.001 {
        0.5
    } else {
        (left_iris - left_outer) / left_width
    };

    // Mirrored: measured from the outer corner inwards
    let right_width = right_outer - right_inner;
    let right_ratio = if right_width.abs() < 0.001 {
        0.5
    } else {
        (right_outer - right_iris) / right_width
    };

    Some(((left_ratio + right_ratio) / 2.0).clamp(0.0, 1.0))
}

fn mid_shoulder_y(pose: &PoseLandmarks) -> Option<f64> {
    let left = pose.get(pi::LEFT_SHOULDER)?;
    let right = pose.get(pi::RIGHT_SHOULDER)?;
    Some((left.y + right.y) / 2.0)
}

/// Forward head drop: how far the nose sits below the shoulder line (×100)
pub fn head_tilt(pose: &PoseLandmarks) -> Option<f64> {
    let nose = pose.get(pi::NOSE)?;
    let shoulders = mid_shoulder_y(pose)?;
    if nose.y > shoulders {
        Some((nose.y - shoulders) * 100.0)
    } else {
        Some(0.0)
    }
}

/// Absolute shoulder line angle in degrees
pub fn shoulder_angle(pose: &PoseLandmarks) -> Option<f64> {
    let left = pose.get(pi::LEFT_SHOULDER)?;
    let right = pose.get(pi::RIGHT_SHOULDER)?;
    let dx = right.x - left.x;
    if dx == 0.0 {
        return Some(0.0);
    }
    Some(((right.y - left.y) / dx).atan().to_degrees().abs())
}

/// Neck posture score (0-100) from the nose-to-shoulder vertical gap
pub fn neck_score(pose: &PoseLandmarks) -> Option<f64> {
    let nose = pose.get(pi::NOSE)?;
    let gap = mid_shoulder_y(pose)? - nose.y;
    let score = if gap > 0.20 {
        100.0
    } else if gap > 0.15 {
        85.0
    } else if gap > 0.10 {
        65.0
    } else if gap > 0.05 {
        40.0
    } else if gap > 0.0 {
        20.0
    } else {
        5.0
    };
    Some(score)
}

/// Composite posture score (0-100)
///
/// Neck 30 points, head tilt 25, pitch 20, shoulders 15, roll 10.
pub fn posture_score(
    head_tilt: f64,
    shoulder_angle: f64,
    neck_score: f64,
    head_pitch: f64,
    head_roll: f64,
) -> f64 {
    let neck = (neck_score * 0.30).min(30.0);

    let tilt = match head_tilt {
        t if t < 5.0 => 25.0,
        t if t < 10.0 => 18.0,
        t if t < 15.0 => 10.0,
        _ => 3.0,
    };

    let pitch = match head_pitch.abs() {
        p if p < 10.0 => 20.0,
        p if p < 20.0 => 12.0,
        p if p < 30.0 => 6.0,
        _ => 2.0,
    };

    let shoulders = match shoulder_angle {
        s if s < 5.0 => 15.0,
        s if s < 10.0 => 10.0,
        s if s < 15.0 => 6.0,
        _ => 2.0,
    };

    let roll = match head_roll.abs() {
        r if r < 5.0 => 10.0,
        r if r < 10.0 => 6.0,
        r if r < 15.0 => 3.0,
        _ => 1.0,
    };

    (neck + tilt + pitch + shoulders + roll).clamp(0.0, 100.0)
}

/// All geometric measurements for one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameGeometry {
    pub face_detected: bool,
    pub pose_detected: bool,
    pub ear_left: f64,
    pub ear_right: f64,
    pub ear: f64,
    pub head_pitch: f64,
    pub head_roll: f64,
    pub head_yaw: f64,
    pub head_tilt: f64,
    pub shoulder_angle: f64,
    pub neck_score: f64,
    pub ipd: f64,
    pub posture_score: f64,
    pub gaze_ratio: f64,
}

impl Default for FrameGeometry {
    fn default() -> Self {
        Self {
            face_detected: false,
            pose_detected: false,
            ear_left: DEFAULT_EAR,
            ear_right: DEFAULT_EAR,
            ear: DEFAULT_EAR,
            head_pitch: 0.0,
            head_roll: 0.0,
            head_yaw: 0.0,
            head_tilt: 0.0,
            shoulder_angle: 0.0,
            neck_score: 75.0,
            ipd: DEFAULT_IPD,
            posture_score: 100.0,
            gaze_ratio: 0.5,
        }
    }
}

impl FrameGeometry {
    /// Extract every measurement available from this frame's landmarks
    pub fn extract(face: Option<&FaceLandmarks>, pose: Option<&PoseLandmarks>) -> Self {
        let mut geometry = Self::default();

        if let Some(face) = face {
            geometry.face_detected = true;
            geometry.ear_left = eye_aspect_ratio(face, LEFT_EYE).unwrap_or(0.0);
            geometry.ear_right = eye_aspect_ratio(face, RIGHT_EYE).unwrap_or(0.0);
            geometry.ear = (geometry.ear_left + geometry.ear_right) / 2.0;
            geometry.head_pitch = head_pitch(face).unwrap_or(0.0);
            geometry.head_roll = head_roll(face).unwrap_or(0.0);
            geometry.head_yaw = head_yaw(face).unwrap_or(0.0);
            geometry.ipd = inter_pupillary_distance(face).unwrap_or(DEFAULT_IPD);
            geometry.gaze_ratio = gaze_ratio(face).unwrap_or(0.5);
        }

        if let Some(pose) = pose {
            geometry.pose_detected = true;
            geometry.head_tilt = head_tilt(pose).unwrap_or(0.0);
            geometry.shoulder_angle = shoulder_angle(pose).unwrap_or(0.0);
            geometry.neck_score = neck_score(pose).unwrap_or(75.0);
            geometry.posture_score = posture_score(
                geometry.head_tilt,
                geometry.shoulder_angle,
                geometry.neck_score,
                geometry.head_pitch,
                geometry.head_roll,
            );
        }

        geometry
    }

    /// Calibrated channel values for the detector
    pub fn channel_values(&self) -> ChannelValues {
        ChannelValues::zeroed()
            .with(Channel::Ear, self.ear)
            .with(Channel::HeadTilt, self.head_tilt)
            .with(Channel::HeadPitch, self.head_pitch)
            .with(Channel::HeadRoll, self.head_roll)
            .with(Channel::ShoulderAngle, self.shoulder_angle)
            .with(Channel::Ipd, self.ipd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::Landmark;

    /// Upright face with both eyes open to the given aspect ratio
    fn face_with_ear(ear: f64) -> FaceLandmarks {
        let mut face = FaceLandmarks::default();
        let eye_width = 0.06;
        let opening = ear * eye_width;

        face.set(fi::LEFT_EYE_OUTER, Landmark::new(0.40, 0.40, 0.0));
        face.set(fi::LEFT_EYE_INNER, Landmark::new(0.46, 0.40, 0.0));
        face.set(fi::LEFT_EYE_UPPER, Landmark::new(0.43, 0.40 - opening / 2.0, 0.0));
        face.set(fi::LEFT_EYE_LOWER, Landmark::new(0.43, 0.40 + opening / 2.0, 0.0));

        face.set(fi::RIGHT_EYE_INNER, Landmark::new(0.54, 0.40, 0.0));
        face.set(fi::RIGHT_EYE_OUTER, Landmark::new(0.60, 0.40, 0.0));
        face.set(fi::RIGHT_EYE_UPPER, Landmark::new(0.57, 0.40 - opening / 2.0, 0.0));
        face.set(fi::RIGHT_EYE_LOWER, Landmark::new(0.57, 0.40 + opening / 2.0, 0.0));

        face.set(fi::FOREHEAD, Landmark::new(0.50, 0.30, 0.0));
        face.set(fi::NOSE_TIP, Landmark::new(0.50, 0.45, 0.0));
        face.set(fi::CHIN, Landmark::new(0.50, 0.60, 0.0));
        face.set(fi::LEFT_CHEEK, Landmark::new(0.38, 0.45, 0.0));
        face.set(fi::RIGHT_CHEEK, Landmark::new(0.62, 0.45, 0.0));

        face.set(fi::LEFT_IRIS_CENTER, Landmark::new(0.43, 0.40, 0.0));
        face.set(fi::RIGHT_IRIS_CENTER, Landmark::new(0.57, 0.40, 0.0));
        face
    }

    fn upright_pose() -> PoseLandmarks {
        let mut pose = PoseLandmarks::default();
        pose.set(pi::NOSE, Landmark::new(0.50, 0.40, 0.0));
        pose.set(pi::LEFT_SHOULDER, Landmark::new(0.35, 0.65, 0.0));
        pose.set(pi::RIGHT_SHOULDER, Landmark::new(0.65, 0.65, 0.0));
        pose
    }

    #[test]
    fn test_ear_matches_constructed_opening() {
        let face = face_with_ear(0.3);
        let ear = eye_aspect_ratio(&face, LEFT_EYE).unwrap();
        assert!((ear - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_upright_face_angles_are_neutral() {
        let face = face_with_ear(0.3);
        assert!(head_pitch(&face).unwrap().abs() < 1e-9);
        assert!(head_roll(&face).unwrap().abs() < 1e-9);
        assert!(head_yaw(&face).unwrap().abs() < 1e-9);
        assert!((inter_pupillary_distance(&face).unwrap() - 0.20).abs() < 1e-9);
        assert!((gaze_ratio(&face).unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_missing_landmarks_yield_none() {
        let face = FaceLandmarks::default();
        assert!(eye_aspect_ratio(&face, LEFT_EYE).is_none());
        assert!(gaze_ratio(&face).is_none());
    }

    #[test]
    fn test_head_tilt_only_when_nose_below_shoulders() {
        assert_eq!(head_tilt(&upright_pose()), Some(0.0));

        let mut slumped = upright_pose();
        slumped.set(pi::NOSE, Landmark::new(0.50, 0.70, 0.0));
        assert!((head_tilt(&slumped).unwrap() - 5.0).abs() < 1e-9);
        assert_eq!(neck_score(&slumped), Some(5.0));
    }

    #[test]
    fn test_level_shoulders() {
        assert!(shoulder_angle(&upright_pose()).unwrap().abs() < 1e-9);
    }

    #[test]
    fn test_posture_score_bands() {
        assert_eq!(posture_score(0.0, 0.0, 100.0, 0.0, 0.0), 100.0);
        let worst = posture_score(20.0, 20.0, 5.0, 40.0, 20.0);
        assert!((worst - 9.5).abs() < 1e-9);
    }

    #[test]
    fn test_extract_without_inputs_is_neutral() {
        let geometry = FrameGeometry::extract(None, None);
        assert!(!geometry.face_detected);
        assert_eq!(geometry.ipd, DEFAULT_IPD);
        assert_eq!(geometry.ear, DEFAULT_EAR);
        assert_eq!(geometry.posture_score, 100.0);
        assert_eq!(geometry.gaze_ratio, 0.5);
    }

    #[test]
    fn test_extract_full_frame() {
        let face = face_with_ear(0.28);
        let pose = upright_pose();
        let geometry = FrameGeometry::extract(Some(&face), Some(&pose));

        assert!(geometry.face_detected && geometry.pose_detected);
        assert!((geometry.ear - 0.28).abs() < 1e-9);
        assert_eq!(geometry.neck_score, 100.0);
        assert_eq!(geometry.posture_score, 100.0);

        let values = geometry.channel_values();
        assert!((values[Channel::Ear] - 0.28).abs() < 1e-9);
        assert!((values[Channel::Ipd] - 0.20).abs() < 1e-9);
    }
}
