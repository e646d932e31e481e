//! Scripted backend for tests and dry runs

use camera_capture::VideoFrame;
use dms::landmarks::{face_index as fi, pose_index as pi};
use dms::{Blendshapes, EmotionReading, FaceLandmarks, Landmark, PoseLandmarks};
use tracing::info;

use crate::backend::{FaceObservation, InferenceBackend, ObjectDetection, PHONE_LABEL};
use crate::InferenceError;

/// What the synthetic camera "sees" on one frame
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticScene {
    pub face_present: bool,
    pub pose_present: bool,
    pub ear: f64,
    /// Outer eye corner distance
    pub ipd: f64,
    pub gaze_ratio: f64,
    /// Nose drop below the shoulder line, in pose units
    pub slouch: f64,
    pub phone_confidence: Option<f64>,
    pub blendshapes: Blendshapes,
    pub emotion: Option<EmotionReading>,
    /// Make every call for this frame fail
    pub fail: bool,
}

impl Default for SyntheticScene {
    fn default() -> Self {
        Self {
            face_present: true,
            pose_present: true,
            ear: 0.30,
            ipd: 0.15,
            gaze_ratio: 0.5,
            slouch: 0.0,
            phone_confidence: None,
            blendshapes: Blendshapes::new(),
            emotion: None,
            fail: false,
        }
    }
}

impl SyntheticScene {
    pub fn with_ear(ear: f64) -> Self {
        Self {
            ear,
            ..Default::default()
        }
    }

    pub fn no_face() -> Self {
        Self {
            face_present: false,
            pose_present: false,
            ..Default::default()
        }
    }

    /// Face mesh with the requested eye opening, eye spacing and iris position
    pub fn face_landmarks(&self) -> FaceLandmarks {
        let mut face = FaceLandmarks::new(vec![Landmark::default(); fi::MESH_SIZE]);
        let half_ipd = self.ipd / 2.0;
        let eye_width = self.ipd * 0.4;
        let opening = self.ear * eye_width;
        let y = 0.40;

        let left_outer = 0.5 - half_ipd;
        let left_inner = left_outer + eye_width;
        let right_outer = 0.5 + half_ipd;
        let right_inner = right_outer - eye_width;
        let left_mid = (left_outer + left_inner) / 2.0;
        let right_mid = (right_outer + right_inner) / 2.0;

        face.set(fi::LEFT_EYE_OUTER, Landmark::new(left_outer, y, 0.0));
        face.set(fi::LEFT_EYE_INNER, Landmark::new(left_inner, y, 0.0));
        face.set(fi::LEFT_EYE_UPPER, Landmark::new(left_mid, y - opening / 2.0, 0.0));
        face.set(fi::LEFT_EYE_LOWER, Landmark::new(left_mid, y + opening / 2.0, 0.0));

        face.set(fi::RIGHT_EYE_OUTER, Landmark::new(right_outer, y, 0.0));
        face.set(fi::RIGHT_EYE_INNER, Landmark::new(right_inner, y, 0.0));
        face.set(fi::RIGHT_EYE_UPPER, Landmark::new(right_mid, y - opening / 2.0, 0.0));
        face.set(fi::RIGHT_EYE_LOWER, Landmark::new(right_mid, y + opening / 2.0, 0.0));

        face.set(fi::FOREHEAD, Landmark::new(0.50, 0.30, 0.0));
        face.set(fi::NOSE_TIP, Landmark::new(0.50, 0.45, 0.0));
        face.set(fi::CHIN, Landmark::new(0.50, 0.60, 0.0));
        face.set(fi::LEFT_CHEEK, Landmark::new(0.5 - half_ipd * 1.6, 0.45, 0.0));
        face.set(fi::RIGHT_CHEEK, Landmark::new(0.5 + half_ipd * 1.6, 0.45, 0.0));

        let ratio = self.gaze_ratio.clamp(0.0, 1.0);
        face.set(
            fi::LEFT_IRIS_CENTER,
            Landmark::new(left_outer + ratio * eye_width, y, 0.0),
        );
        face.set(
            fi::RIGHT_IRIS_CENTER,
            Landmark::new(right_outer - ratio * eye_width, y, 0.0),
        );
        face
    }

    pub fn pose_landmarks(&self) -> PoseLandmarks {
        let mut pose = PoseLandmarks::new(vec![Landmark::default(); pi::POSE_SIZE]);
        pose.set(pi::NOSE, Landmark::new(0.50, 0.40 + self.slouch, 0.0));
        pose.set(pi::LEFT_SHOULDER, Landmark::new(0.35, 0.65, 0.0));
        pose.set(pi::RIGHT_SHOULDER, Landmark::new(0.65, 0.65, 0.0));
        pose
    }
}

/// Backend that replays scenes indexed by frame sequence number
///
/// Frames past the end of the script keep showing the last scene.
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    script: Vec<SyntheticScene>,
    calls: u64,
}

impl SyntheticBackend {
    pub fn new(script: Vec<SyntheticScene>) -> Self {
        info!("Creating synthetic inference backend ({} scenes)", script.len());
        Self { script, calls: 0 }
    }

    /// Attentive user, open eyes, every frame
    pub fn mock() -> Self {
        Self::new(vec![SyntheticScene::default()])
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }

    fn scene(&mut self, frame: &VideoFrame) -> Result<SyntheticScene, InferenceError> {
        self.calls += 1;
        let scene = self
            .script
            .get(frame.sequence as usize)
            .or_else(|| self.script.last())
            .cloned()
            .unwrap_or_default();
        if scene.fail {
            return Err(InferenceError::InferenceFailed(format!(
                "scripted failure on frame {}",
                frame.sequence
            )));
        }
        Ok(scene)
    }
}

impl InferenceBackend for SyntheticBackend {
    fn detect_face(
        &mut self,
        frame: &VideoFrame,
        _timestamp_ms: u64,
        with_blendshapes: bool,
    ) -> Result<Option<FaceObservation>, InferenceError> {
        let scene = self.scene(frame)?;
        if !scene.face_present {
            return Ok(None);
        }
        Ok(Some(FaceObservation {
            landmarks: scene.face_landmarks(),
            blendshapes: with_blendshapes.then_some(scene.blendshapes),
        }))
    }

    fn detect_pose(
        &mut self,
        frame: &VideoFrame,
        _timestamp_ms: u64,
    ) -> Result<Option<PoseLandmarks>, InferenceError> {
        let scene = self.scene(frame)?;
        Ok(scene.pose_present.then(|| scene.pose_landmarks()))
    }

    fn detect_objects(
        &mut self,
        frame: &VideoFrame,
        _timestamp_ms: u64,
    ) -> Result<Vec<ObjectDetection>, InferenceError> {
        let scene = self.scene(frame)?;
        Ok(scene
            .phone_confidence
            .map(|confidence| ObjectDetection {
                label: PHONE_LABEL.to_string(),
                confidence,
                bbox: [0.40, 0.55, 0.55, 0.80],
            })
            .into_iter()
            .collect())
    }

    fn classify_emotion(
        &mut self,
        frame: &VideoFrame,
        _timestamp_ms: u64,
    ) -> Result<Option<EmotionReading>, InferenceError> {
        Ok(self.scene(frame)?.emotion)
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms::geometry::{self, LEFT_EYE, RIGHT_EYE};
    use dms::FrameGeometry;

    fn frame(seq: u64) -> VideoFrame {
        VideoFrame::solid(4, 4, [0, 0, 0], seq * 1_000_000, seq)
    }

    #[test]
    fn test_scene_geometry_matches_parameters() {
        let scene = SyntheticScene {
            ear: 0.22,
            ipd: 0.18,
            gaze_ratio: 0.3,
            ..Default::default()
        };
        let face = scene.face_landmarks();
        assert!((geometry::eye_aspect_ratio(&face, LEFT_EYE).unwrap() - 0.22).abs() < 1e-9);
        assert!((geometry::eye_aspect_ratio(&face, RIGHT_EYE).unwrap() - 0.22).abs() < 1e-9);
        assert!((geometry::inter_pupillary_distance(&face).unwrap() - 0.18).abs() < 1e-9);
        assert!((geometry::gaze_ratio(&face).unwrap() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_upright_scene_has_good_posture() {
        let scene = SyntheticScene::default();
        let face = scene.face_landmarks();
        let pose = scene.pose_landmarks();
        let geo = FrameGeometry::extract(Some(&face), Some(&pose));
        assert!(geo.face_detected);
        assert!(geo.pose_detected);
        assert!(geo.head_pitch.abs() < 1e-9);
        assert!(geo.head_yaw.abs() < 1e-9);
        assert!(geo.shoulder_angle.abs() < 1e-9);
    }

    #[test]
    fn test_script_indexed_by_sequence() {
        let mut backend = SyntheticBackend::new(vec![
            SyntheticScene::default(),
            SyntheticScene::no_face(),
        ]);
        assert!(backend.detect_face(&frame(0), 0, false).unwrap().is_some());
        assert!(backend.detect_face(&frame(1), 1, false).unwrap().is_none());
        // Past the end the last scene repeats
        assert!(backend.detect_face(&frame(9), 9, false).unwrap().is_none());
        assert_eq!(backend.calls(), 3);
    }

    #[test]
    fn test_scripted_failure() {
        let mut backend = SyntheticBackend::new(vec![SyntheticScene {
            fail: true,
            ..Default::default()
        }]);
        assert!(backend.detect_pose(&frame(0), 0).is_err());
    }

    #[test]
    fn test_phone_scene() {
        let mut backend = SyntheticBackend::new(vec![SyntheticScene {
            phone_confidence: Some(0.8),
            ..Default::default()
        }]);
        let objects = backend.detect_objects(&frame(0), 0).unwrap();
        assert_eq!(objects.len(), 1);
        assert!(objects[0].is_phone());
    }
}
