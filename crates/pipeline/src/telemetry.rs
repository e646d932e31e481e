//! Frame report to storage record conversion

use storage::TelemetryRecord;
use uuid::Uuid;

use crate::analyzer::FrameReport;

impl FrameReport {
    /// Flatten into a storable record; `id` is assigned by the repository
    pub fn to_telemetry(&self, session_id: Uuid) -> TelemetryRecord {
        let flags = self.detection.as_ref().map(|d| d.flags).unwrap_or_default();
        let notes = if self.is_calibrating() {
            Some("calibrating".to_string())
        } else if !self.face_detected() {
            Some("face not visible".to_string())
        } else {
            None
        };

        TelemetryRecord {
            id: 0,
            timestamp_ms: self.analyzed_at_ms,
            session_id,
            ear_left: self.geometry.ear_left,
            ear_right: self.geometry.ear_right,
            ear: self.geometry.ear,
            head_tilt: self.geometry.head_tilt,
            shoulder_angle: self.geometry.shoulder_angle,
            distance_cm: self.distance_cm,
            posture_score: self.geometry.posture_score,
            emotion: self.emotion.map(|e| e.emotion.as_str().to_string()),
            emotion_confidence: self.emotion.map(|e| e.confidence),
            focus_score: self.focus.score,
            is_drowsy: flags.drowsy,
            is_bad_posture: flags.bad_posture,
            dominant_state: self.fusion.dominant.as_str().to_string(),
            notes,
        }
    }
}
