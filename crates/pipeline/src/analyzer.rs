//! Per-frame signal chain

use std::time::Instant;

use calibration::{CalibrationConfig, CalibrationState, Calibrator, UserBaselineProfile};
use dms::analysis::estimate_distance_cm;
use dms::{
    AdaptiveDetector, BlendshapeEmotionMapper, DetectionResult, DetectorConfig, DistanceStatus,
    DmsError, EmotionReading, FrameGeometry, GazeReading, GazeTracker, PhoneUsageTracker,
};
use event_fusion::{
    FocusBreakdown, FocusCalculator, FocusInputs, FocusWeights, FusionConfig, FusionInputs,
    FusionOutcome, StateFusion,
};
use inference_engine::InferenceOutput;
use serde::{Deserialize, Serialize};
use signal_filter::{Channel, MultiChannelFilter};
use tracing::{debug, info, warn};

use crate::worker::ControlMessage;
use crate::PipelineError;

/// Tuning for everything downstream of inference
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub detector: DetectorConfig,
    pub calibration: CalibrationConfig,
    pub fusion: FusionConfig,
    pub focus_weights: FocusWeights,
    pub gaze_left_threshold: f64,
    pub gaze_right_threshold: f64,
    pub gaze_distraction_frames: u32,
    pub phone_confidence_threshold: f64,
    pub phone_usage_frames: u32,
    /// Begin collecting a baseline as soon as the analyzer is built
    pub calibrate_on_start: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            calibration: CalibrationConfig::default(),
            fusion: FusionConfig::default(),
            focus_weights: FocusWeights::default(),
            gaze_left_threshold: 0.35,
            gaze_right_threshold: 0.65,
            gaze_distraction_frames: 30,
            phone_confidence_threshold: 0.35,
            phone_usage_frames: 5,
            calibrate_on_start: false,
        }
    }
}

/// Calibration status attached to reports while a baseline is collected
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationProgress {
    pub state: CalibrationState,
    pub progress: f64,
    pub samples: usize,
    /// Failure message when the window closed without enough samples
    pub error: Option<String>,
}

/// Everything computed for one processed frame
#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    pub frame_index: u64,
    /// Frame timestamp as seen by the inference backend
    pub timestamp_ms: u64,
    /// Wall-clock time of analysis (Unix ms)
    pub analyzed_at_ms: i64,
    pub geometry: FrameGeometry,
    /// `None` while calibrating
    pub detection: Option<DetectionResult>,
    pub calibration: Option<CalibrationProgress>,
    pub gaze: GazeReading,
    pub phone_in_use: bool,
    /// `None` when no emotion source produced a label
    pub emotion: Option<EmotionReading>,
    pub fusion: FusionOutcome,
    pub focus: FocusBreakdown,
    pub distance: DistanceStatus,
    pub distance_cm: Option<f64>,
    pub inference_errors: u32,
}

impl FrameReport {
    pub fn face_detected(&self) -> bool {
        self.geometry.face_detected
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibration
            .as_ref()
            .is_some_and(|c| c.state == CalibrationState::Collecting)
    }

    /// One-line status for logs
    pub fn summary(&self) -> String {
        let detection = match (&self.detection, &self.calibration) {
            (_, Some(cal)) if cal.state == CalibrationState::Collecting => {
                format!("CALIBRATING {:.0}%", cal.progress * 100.0)
            }
            (Some(d), _) => match d.highest_severity_alert() {
                Some(alert) => alert.as_str().to_uppercase(),
                None => "OK".to_string(),
            },
            (None, _) => "-".to_string(),
        };
        format!(
            "#{} focus={:.1} ({}) state={} {} blink={:.1}/min",
            self.frame_index,
            self.focus.score,
            self.focus.level,
            self.fusion.dominant,
            detection,
            self.fusion.blink_rate
        )
    }
}

/// Runs geometry, smoothing, calibration or detection, fusion and focus scoring
pub struct FrameAnalyzer {
    config: AnalyzerConfig,
    detector: AdaptiveDetector,
    calibrator: Calibrator,
    calibration_filter: MultiChannelFilter,
    gaze: GazeTracker,
    phone: PhoneUsageTracker,
    emotion_mapper: BlendshapeEmotionMapper,
    fusion: StateFusion,
    focus: FocusCalculator,
    completed_profile: Option<UserBaselineProfile>,
    last_calibration_error: Option<String>,
}

impl FrameAnalyzer {
    pub fn new(
        profile: UserBaselineProfile,
        config: AnalyzerConfig,
        now: Instant,
    ) -> Result<Self, PipelineError> {
        let detector = AdaptiveDetector::new(profile, config.detector.clone())?;
        let calibration_filter =
            MultiChannelFilter::all(config.detector.filter_window, config.detector.filter_method)
                .map_err(DmsError::from)?;
        let focus = FocusCalculator::new(config.focus_weights)?;

        let mut analyzer = Self {
            detector,
            calibrator: Calibrator::new(config.calibration.clone()),
            calibration_filter,
            gaze: GazeTracker::new(
                config.gaze_left_threshold,
                config.gaze_right_threshold,
                config.gaze_distraction_frames,
            ),
            phone: PhoneUsageTracker::new(
                config.phone_confidence_threshold,
                config.phone_usage_frames,
            ),
            emotion_mapper: BlendshapeEmotionMapper::default(),
            fusion: StateFusion::new(&config.fusion, now),
            focus,
            completed_profile: None,
            last_calibration_error: None,
            config,
        };
        if analyzer.config.calibrate_on_start {
            analyzer.start_calibration(now);
        }
        Ok(analyzer)
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn detector(&self) -> &AdaptiveDetector {
        &self.detector
    }

    pub fn calibrator(&self) -> &Calibrator {
        &self.calibrator
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibrator.state() == CalibrationState::Collecting
    }

    /// Profile produced by the most recent successful calibration, once
    pub fn take_completed_profile(&mut self) -> Option<UserBaselineProfile> {
        self.completed_profile.take()
    }

    pub fn handle_control(&mut self, message: ControlMessage, now: Instant) {
        match message {
            ControlMessage::StartCalibration => self.start_calibration(now),
            ControlMessage::LoadProfile(profile) => self.load_profile(*profile),
            ControlMessage::ResetDetectors => self.reset(now),
        }
    }

    pub fn start_calibration(&mut self, now: Instant) {
        self.calibration_filter.reset();
        self.last_calibration_error = None;
        self.calibrator.start_at(now);
    }

    pub fn load_profile(&mut self, profile: UserBaselineProfile) {
        info!(
            "Loading profile '{}' (calibrated={})",
            profile.user_id, profile.is_calibrated
        );
        self.detector.set_profile(profile);
    }

    /// Clear every counter and smoothing buffer; the profile is kept
    pub fn reset(&mut self, now: Instant) {
        debug!("Resetting detectors");
        self.detector.reset();
        self.calibration_filter.reset();
        self.gaze.reset();
        self.phone.reset();
        self.fusion.reset(now);
    }

    fn calibrate(&mut self, geometry: &FrameGeometry, now: Instant) -> CalibrationProgress {
        if geometry.face_detected {
            let smoothed = self.calibration_filter.update(&geometry.channel_values());
            self.calibrator.add_sample_at(&smoothed, now);
        }

        if self.calibrator.is_complete_at(now) {
            match self.calibrator.finish() {
                Ok(profile) => {
                    self.detector.set_profile(profile.clone());
                    self.completed_profile = Some(profile);
                }
                Err(e) => {
                    warn!("Calibration failed, keeping previous baseline: {}", e);
                    self.last_calibration_error = Some(e.to_string());
                }
            }
        }

        CalibrationProgress {
            state: self.calibrator.state(),
            progress: self.calibrator.progress(),
            samples: self.calibrator.sample_count(),
            error: self.last_calibration_error.clone(),
        }
    }

    fn resolve_emotion(&self, output: &InferenceOutput) -> Option<EmotionReading> {
        if output.face.is_none() {
            return None;
        }
        output.emotion.or_else(|| {
            output
                .blendshapes
                .as_ref()
                .map(|b| self.emotion_mapper.map(b))
        })
    }

    /// Analyze one frame of (possibly cached) inference output
    pub fn analyze(&mut self, output: &InferenceOutput, now: Instant) -> FrameReport {
        let geometry = FrameGeometry::extract(output.face.as_ref(), output.pose.as_ref());

        let (detection, calibration) = if self.is_calibrating() {
            (None, Some(self.calibrate(&geometry, now)))
        } else {
            let result = if geometry.face_detected {
                self.detector.process(&geometry.channel_values())
            } else {
                self.detector.process_missing()
            };
            (Some(result), None)
        };

        let gaze = self
            .gaze
            .update(geometry.face_detected.then_some(geometry.gaze_ratio));
        let phone_in_use = self.phone.update(&output.phones);
        let emotion = self.resolve_emotion(output);

        let fusion = self.fusion.process(
            &FusionInputs {
                ear: geometry.ear,
                emotion: emotion.unwrap_or_default(),
                head_pitch: geometry.head_pitch,
                head_roll: geometry.head_roll,
                head_yaw: geometry.head_yaw,
                gaze: gaze.direction,
                phone_in_use,
                posture_score: geometry.posture_score,
            },
            now,
        );

        let focus = self.focus.breakdown(&FocusInputs {
            ear: geometry.ear,
            posture_score: geometry.posture_score,
            emotion: emotion.map(|e| e.emotion),
            gaze_ratio: gaze.ratio,
            is_distracted: gaze.is_distracted,
            phone_in_use,
        });

        let distance = detection
            .as_ref()
            .filter(|d| d.face_detected)
            .map(|d| DistanceStatus::from_z(d.z_scores[Channel::Ipd], self.config.detector.z_threshold_distance))
            .unwrap_or(DistanceStatus::Normal);
        let distance_cm = if geometry.face_detected {
            estimate_distance_cm(geometry.ipd)
        } else {
            None
        };

        FrameReport {
            frame_index: output.frame_index,
            timestamp_ms: output.timestamp_ms,
            analyzed_at_ms: chrono::Utc::now().timestamp_millis(),
            geometry,
            detection,
            calibration,
            gaze,
            phone_in_use,
            emotion,
            fusion,
            focus,
            distance,
            distance_cm,
            inference_errors: output.errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calibration::CalibrationStatistic;
    use camera_capture::VideoFrame;
    use dms::{Blendshapes, Emotion};
    use event_fusion::FocusLevel;
    use inference_engine::{InferenceScheduler, SkipIntervals, SyntheticBackend, SyntheticScene};
    use proptest::prelude::*;
    use std::time::Duration;

    fn scheduler(script: Vec<SyntheticScene>) -> InferenceScheduler<SyntheticBackend> {
        let mut intervals = SkipIntervals::every_frame();
        intervals.emotion = 0;
        InferenceScheduler::new(SyntheticBackend::new(script), intervals)
    }

    fn frame(seq: u64) -> VideoFrame {
        VideoFrame::solid(4, 4, [0, 0, 0], seq * 33_000_000, seq)
    }

    fn at(t0: Instant, seq: u64) -> Instant {
        t0 + Duration::from_millis(seq * 33)
    }

    /// Baseline with EAR 0.30 ± 0.02 and flat other channels
    fn ear_profile() -> UserBaselineProfile {
        UserBaselineProfile::from_statistics("tester".to_string(), |channel| match channel {
            Channel::Ear => CalibrationStatistic {
                mean: 0.30,
                std_dev: 0.02,
                min: 0.26,
                max: 0.34,
                sample_count: 300,
            },
            _ => CalibrationStatistic::default(),
        })
    }

    #[test]
    fn test_attentive_frame_scores_high() {
        let t0 = Instant::now();
        let mut scheduler = scheduler(vec![SyntheticScene {
            blendshapes: Blendshapes::new()
                .with("mouthSmileLeft", 0.9)
                .with("mouthSmileRight", 0.9),
            ..Default::default()
        }]);
        let mut analyzer = FrameAnalyzer::new(ear_profile(), AnalyzerConfig::default(), t0).unwrap();

        let output = scheduler.process(&frame(0));
        let report = analyzer.analyze(&output, t0);

        assert!(report.face_detected());
        assert_eq!(report.emotion.map(|e| e.emotion), Some(Emotion::Happy));
        assert_eq!(report.focus.score, 100.0);
        assert_eq!(report.focus.level, FocusLevel::Excellent);
        assert_eq!(report.distance, DistanceStatus::Normal);
        assert!((report.distance_cm.unwrap() - 50.0).abs() < 1e-6);
        assert!(report.detection.as_ref().is_some_and(|d| !d.has_alerts()));
    }

    #[test]
    fn test_drowsiness_through_full_chain() {
        let t0 = Instant::now();
        let mut script = vec![SyntheticScene::with_ear(0.30); 20];
        script.extend(vec![SyntheticScene::with_ear(0.20); 20]);
        let mut scheduler = scheduler(script);

        let mut config = AnalyzerConfig::default();
        config.detector.filter_window = 1;
        let mut analyzer = FrameAnalyzer::new(ear_profile(), config, t0).unwrap();

        let mut first_drowsy = None;
        for seq in 0..40 {
            let output = scheduler.process(&frame(seq));
            let report = analyzer.analyze(&output, at(t0, seq));
            let drowsy = report.detection.as_ref().is_some_and(|d| d.flags.drowsy);
            if drowsy && first_drowsy.is_none() {
                first_drowsy = Some(seq);
            }
        }
        // Low EAR starts at frame 20; the 15th low frame is frame 34
        assert_eq!(first_drowsy, Some(34));
    }

    #[test]
    fn test_calibration_completes_and_applies_profile() {
        let t0 = Instant::now();
        let mut scheduler = scheduler(vec![SyntheticScene::default()]);
        let mut config = AnalyzerConfig::default();
        config.calibration.duration_secs = 1.0;
        config.calibrate_on_start = true;
        let mut analyzer = FrameAnalyzer::new(UserBaselineProfile::default(), config, t0).unwrap();
        assert!(analyzer.is_calibrating());

        let mut completed = None;
        for seq in 0..40 {
            let output = scheduler.process(&frame(seq));
            let report = analyzer.analyze(&output, at(t0, seq));
            if analyzer.is_calibrating() {
                assert!(report.detection.is_none());
                assert!(report.is_calibrating());
            }
            if let Some(profile) = analyzer.take_completed_profile() {
                completed = Some((seq, profile));
            }
        }

        let (seq, profile) = completed.unwrap();
        // 1 s window at 33 ms per frame closes on frame 31
        assert_eq!(seq, 31);
        assert!(profile.is_calibrated);
        assert!((profile.ear.mean - 0.30).abs() < 1e-9);
        assert_eq!(profile.ear.sample_count, 32);
        assert!(analyzer.detector().profile().is_calibrated);
    }

    #[test]
    fn test_calibration_without_face_fails_and_keeps_baseline() {
        let t0 = Instant::now();
        let mut scheduler = scheduler(vec![SyntheticScene::no_face()]);
        let mut config = AnalyzerConfig::default();
        config.calibration.duration_secs = 0.5;
        let mut analyzer = FrameAnalyzer::new(ear_profile(), config, t0).unwrap();
        analyzer.handle_control(ControlMessage::StartCalibration, t0);

        let mut outcome = None;
        for seq in 0..20 {
            let output = scheduler.process(&frame(seq));
            let report = analyzer.analyze(&output, at(t0, seq));
            if outcome.is_none() {
                outcome = report
                    .calibration
                    .filter(|c| c.state != CalibrationState::Collecting);
            }
        }

        let progress = outcome.unwrap();
        assert_eq!(progress.state, CalibrationState::Insufficient);
        assert_eq!(progress.samples, 0);
        assert!(progress.error.is_some());
        assert!(analyzer.take_completed_profile().is_none());
        assert_eq!(analyzer.detector().profile().user_id, "tester");
    }

    #[test]
    fn test_missing_face_reports_neutral() {
        let t0 = Instant::now();
        let mut scheduler = scheduler(vec![SyntheticScene::no_face()]);
        let mut analyzer = FrameAnalyzer::new(ear_profile(), AnalyzerConfig::default(), t0).unwrap();

        let mut report = None;
        for seq in 0..35 {
            let output = scheduler.process(&frame(seq));
            report = Some(analyzer.analyze(&output, at(t0, seq)));
        }
        let report = report.unwrap();
        let detection = report.detection.as_ref().unwrap();
        assert!(!report.face_detected());
        assert!(report.emotion.is_none());
        assert!(report.distance_cm.is_none());
        assert!(!detection.flags.drowsy);
        assert!(detection.alerts.contains(&dms::DmsAlert::FaceNotVisible));
    }

    #[test]
    fn test_phone_usage_lowers_focus() {
        let t0 = Instant::now();
        let mut scheduler = scheduler(vec![SyntheticScene {
            phone_confidence: Some(0.9),
            ..Default::default()
        }]);
        let mut analyzer = FrameAnalyzer::new(ear_profile(), AnalyzerConfig::default(), t0).unwrap();

        let mut report = None;
        for seq in 0..3 {
            let output = scheduler.process(&frame(seq));
            report = Some(analyzer.analyze(&output, at(t0, seq)));
        }
        let report = report.unwrap();
        assert!(report.phone_in_use);
        assert_eq!(report.focus.phone_score, 0.0);
        assert!(report.focus.score < 100.0);
    }

    #[test]
    fn test_reset_clears_counters() {
        let t0 = Instant::now();
        let mut scheduler = scheduler(vec![SyntheticScene::with_ear(0.20)]);
        let mut config = AnalyzerConfig::default();
        config.detector.filter_window = 1;
        let mut analyzer = FrameAnalyzer::new(ear_profile(), config, t0).unwrap();

        for seq in 0..10 {
            let output = scheduler.process(&frame(seq));
            analyzer.analyze(&output, at(t0, seq));
        }
        assert_eq!(analyzer.detector().state().drowsy.count(), 10);

        analyzer.handle_control(ControlMessage::ResetDetectors, at(t0, 10));
        assert_eq!(analyzer.detector().state().drowsy.count(), 0);
    }

    proptest! {
        #[test]
        fn prop_focus_score_stays_in_range(
            ear in 0.0f64..0.5,
            gaze in 0.0f64..1.0,
            slouch in -0.2f64..0.3,
            phone in proptest::option::of(0.0f64..1.0),
            face in any::<bool>(),
        ) {
            let t0 = Instant::now();
            let scene = SyntheticScene {
                face_present: face,
                ear,
                gaze_ratio: gaze,
                slouch,
                phone_confidence: phone,
                ..Default::default()
            };
            let mut scheduler = scheduler(vec![scene]);
            let mut analyzer = FrameAnalyzer::new(ear_profile(), AnalyzerConfig::default(), t0).unwrap();
            for seq in 0..8 {
                let output = scheduler.process(&frame(seq));
                let report = analyzer.analyze(&output, at(t0, seq));
                prop_assert!((0.0..=100.0).contains(&report.focus.score));
                prop_assert!(report.detection.is_some());
                prop_assert_eq!(report.face_detected(), face);
            }
        }
    }
}
