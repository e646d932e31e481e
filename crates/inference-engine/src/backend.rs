//! Collaborator trait and observation types

use camera_capture::VideoFrame;
use dms::{Blendshapes, EmotionReading, FaceLandmarks, PhoneDetection, PoseLandmarks};
use serde::{Deserialize, Serialize};

use crate::InferenceError;

/// Object label the phone tracker cares about
pub const PHONE_LABEL: &str = "cell phone";

/// One detected face
#[derive(Debug, Clone, PartialEq)]
pub struct FaceObservation {
    pub landmarks: FaceLandmarks,
    /// Present only when blendshapes were requested
    pub blendshapes: Option<Blendshapes>,
}

/// Generic object detector box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDetection {
    pub label: String,
    pub confidence: f64,
    /// Normalized `[x1, y1, x2, y2]`
    pub bbox: [f64; 4],
}

impl ObjectDetection {
    pub fn is_phone(&self) -> bool {
        self.label.eq_ignore_ascii_case(PHONE_LABEL)
    }

    pub fn to_phone(&self) -> Option<PhoneDetection> {
        self.is_phone().then(|| PhoneDetection {
            confidence: self.confidence,
            bbox: self.bbox,
        })
    }
}

/// Inference collaborator
///
/// Every call receives the frame timestamp in milliseconds; callers
/// guarantee it is strictly increasing for a given backend. `Ok(None)`
/// means the model ran but found nothing.
pub trait InferenceBackend: Send {
    fn detect_face(
        &mut self,
        frame: &VideoFrame,
        timestamp_ms: u64,
        with_blendshapes: bool,
    ) -> Result<Option<FaceObservation>, InferenceError>;

    fn detect_pose(
        &mut self,
        frame: &VideoFrame,
        timestamp_ms: u64,
    ) -> Result<Option<PoseLandmarks>, InferenceError>;

    fn detect_objects(
        &mut self,
        _frame: &VideoFrame,
        _timestamp_ms: u64,
    ) -> Result<Vec<ObjectDetection>, InferenceError> {
        Ok(Vec::new())
    }

    fn classify_emotion(
        &mut self,
        _frame: &VideoFrame,
        _timestamp_ms: u64,
    ) -> Result<Option<EmotionReading>, InferenceError> {
        Ok(None)
    }

    fn name(&self) -> &str {
        "backend"
    }
}

impl<B: InferenceBackend + ?Sized> InferenceBackend for Box<B> {
    fn detect_face(
        &mut self,
        frame: &VideoFrame,
        timestamp_ms: u64,
        with_blendshapes: bool,
    ) -> Result<Option<FaceObservation>, InferenceError> {
        (**self).detect_face(frame, timestamp_ms, with_blendshapes)
    }

    fn detect_pose(
        &mut self,
        frame: &VideoFrame,
        timestamp_ms: u64,
    ) -> Result<Option<PoseLandmarks>, InferenceError> {
        (**self).detect_pose(frame, timestamp_ms)
    }

    fn detect_objects(
        &mut self,
        frame: &VideoFrame,
        timestamp_ms: u64,
    ) -> Result<Vec<ObjectDetection>, InferenceError> {
        (**self).detect_objects(frame, timestamp_ms)
    }

    fn classify_emotion(
        &mut self,
        frame: &VideoFrame,
        timestamp_ms: u64,
    ) -> Result<Option<EmotionReading>, InferenceError> {
        (**self).classify_emotion(frame, timestamp_ms)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_label_match() {
        let det = ObjectDetection {
            label: "Cell Phone".to_string(),
            confidence: 0.7,
            bbox: [0.1, 0.1, 0.2, 0.3],
        };
        let phone = det.to_phone().unwrap();
        assert_eq!(phone.confidence, 0.7);

        let cup = ObjectDetection {
            label: "cup".to_string(),
            ..det
        };
        assert!(cup.to_phone().is_none());
    }
}
