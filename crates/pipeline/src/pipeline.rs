//! Two-worker pipeline assembly

use std::sync::Arc;
use std::time::{Duration, Instant};

use calibration::UserBaselineProfile;
use camera_capture::{CameraConfig, FrameSource, VideoFrame};
use inference_engine::{InferenceBackend, InferenceScheduler, PerformancePreset, SkipIntervals};
use ring_buffer::{DropOldestQueue, LatestSlot, QueueStats, DEFAULT_QUEUE_CAPACITY};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analyzer::{AnalyzerConfig, FrameAnalyzer, FrameReport};
use crate::worker::{CaptureWorker, ControlMessage, FrameQueue, InferenceWorker, WorkerState};
use crate::PipelineError;

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub camera: CameraConfig,
    pub preset: PerformancePreset,
    /// Overrides the preset's skip intervals
    pub intervals: Option<SkipIntervals>,
    pub analyzer: AnalyzerConfig,
    pub queue_capacity: usize,
    pub poll_timeout_ms: u64,
    pub capture_backoff_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            preset: PerformancePreset::default(),
            intervals: None,
            analyzer: AnalyzerConfig::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            poll_timeout_ms: 100,
            capture_backoff_ms: 50,
        }
    }
}

impl PipelineConfig {
    pub fn skip_intervals(&self) -> SkipIntervals {
        self.intervals
            .unwrap_or_else(|| self.preset.settings().intervals)
    }
}

/// Capture and inference workers with the queues and slots between them
pub struct Pipeline<S, B: InferenceBackend> {
    capture: CaptureWorker<S>,
    inference: InferenceWorker<B>,
    frames: Arc<FrameQueue>,
    results: Arc<DropOldestQueue<FrameReport>>,
    latest_frame: Arc<LatestSlot<Arc<VideoFrame>>>,
    latest_result: Arc<LatestSlot<FrameReport>>,
    profiles: Arc<LatestSlot<UserBaselineProfile>>,
}

impl<S, B> Pipeline<S, B>
where
    S: FrameSource + 'static,
    B: InferenceBackend + 'static,
{
    pub fn new(
        source: S,
        backend: B,
        profile: UserBaselineProfile,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        let settings = config.preset.settings();
        let intervals = config.skip_intervals();
        info!(
            "Building pipeline: preset {}, camera {}x{} @ {} fps, backend {}",
            config.preset.as_str(),
            config.camera.width,
            config.camera.height,
            config.camera.fps,
            backend.name()
        );

        let capture = CaptureWorker::new(source, config.queue_capacity)?
            .with_backoff(Duration::from_millis(config.capture_backoff_ms))
            .with_mirror(config.camera.mirror);
        let frames = capture.frames();

        let scheduler = InferenceScheduler::new(backend, intervals)
            .with_processing_size(settings.processing_width.max(settings.processing_height));
        let analyzer = FrameAnalyzer::new(profile, config.analyzer, Instant::now())?;
        let inference =
            InferenceWorker::new(scheduler, analyzer, Arc::clone(&frames), config.queue_capacity)?
                .with_poll_timeout(Duration::from_millis(config.poll_timeout_ms));

        Ok(Self {
            latest_frame: capture.latest(),
            results: inference.results(),
            latest_result: inference.latest(),
            profiles: inference.profiles(),
            frames,
            capture,
            inference,
        })
    }

    /// Start both workers, consumer first
    pub fn start(&mut self) -> Result<(), PipelineError> {
        self.inference.start()?;
        if let Err(e) = self.capture.start() {
            self.inference.stop();
            return Err(e);
        }
        Ok(())
    }
}

impl<S, B: InferenceBackend> Pipeline<S, B> {
    /// Stop and join both workers
    pub fn stop(&mut self) {
        self.capture.stop();
        self.inference.stop();
    }

    pub fn state(&self) -> WorkerState {
        self.inference.state()
    }

    pub fn latest_result(&self) -> Option<FrameReport> {
        self.latest_result.load()
    }

    pub fn latest_frame(&self) -> Option<Arc<VideoFrame>> {
        self.latest_frame.load()
    }

    /// Next report from the output queue, waiting at most `timeout`
    pub fn next_result(&self, timeout: Duration) -> Result<Option<FrameReport>, PipelineError> {
        Ok(self.results.pop_timeout(timeout)?)
    }

    pub fn capture_fps(&self) -> f64 {
        self.capture.fps()
    }

    pub fn inference_fps(&self) -> f64 {
        self.inference.fps()
    }

    pub fn frame_queue_stats(&self) -> QueueStats {
        self.frames.stats()
    }

    pub fn result_queue_stats(&self) -> QueueStats {
        self.results.stats()
    }

    /// Profile from the latest successful calibration, taken once
    pub fn completed_profile(&self) -> Option<UserBaselineProfile> {
        self.profiles.take()
    }

    pub fn start_calibration(&self) -> Result<(), PipelineError> {
        self.inference.send(ControlMessage::StartCalibration)
    }

    pub fn load_profile(&self, profile: UserBaselineProfile) -> Result<(), PipelineError> {
        self.inference
            .send(ControlMessage::LoadProfile(Box::new(profile)))
    }

    pub fn reset_detectors(&self) -> Result<(), PipelineError> {
        self.inference.send(ControlMessage::ResetDetectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_capture::SyntheticSource;
    use inference_engine::{SyntheticBackend, SyntheticScene};

    fn camera(fps: u32) -> CameraConfig {
        CameraConfig {
            width: 32,
            height: 24,
            fps,
            ..Default::default()
        }
    }

    fn config(fps: u32) -> PipelineConfig {
        PipelineConfig {
            camera: camera(fps),
            intervals: Some(SkipIntervals::every_frame()),
            poll_timeout_ms: 10,
            ..Default::default()
        }
    }

    fn wait_for<T>(deadline: Duration, mut probe: impl FnMut() -> Option<T>) -> Option<T> {
        let until = Instant::now() + deadline;
        loop {
            if let Some(value) = probe() {
                return Some(value);
            }
            if Instant::now() >= until {
                return None;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_default_config_uses_balanced_preset() {
        let config = PipelineConfig::default();
        assert_eq!(config.preset, PerformancePreset::Balanced);
        assert_eq!(config.queue_capacity, 2);
        assert_eq!(config.skip_intervals().objects, 10);

        let overridden = PipelineConfig {
            intervals: Some(SkipIntervals::every_frame()),
            ..Default::default()
        };
        assert_eq!(overridden.skip_intervals(), SkipIntervals::every_frame());
    }

    #[test]
    fn test_pipeline_produces_reports() {
        let source = SyntheticSource::new(camera(100));
        let mut pipeline = Pipeline::new(
            source,
            SyntheticBackend::mock(),
            UserBaselineProfile::default(),
            config(100),
        )
        .unwrap();
        assert_eq!(pipeline.state(), WorkerState::Created);
        pipeline.start().unwrap();
        assert_eq!(pipeline.state(), WorkerState::Running);

        let report = pipeline
            .next_result(Duration::from_secs(2))
            .unwrap()
            .unwrap();
        assert!(report.face_detected());
        assert!((0.0..=100.0).contains(&report.focus.score));

        let later = wait_for(Duration::from_secs(5), || {
            pipeline.latest_result().filter(|r| r.frame_index >= 10)
        });
        assert!(later.is_some());
        assert!(pipeline.latest_frame().is_some());
        assert!(pipeline.frame_queue_stats().len <= 2);
        assert!(pipeline.result_queue_stats().len <= 2);

        pipeline.stop();
        assert_eq!(pipeline.state(), WorkerState::Stopped);
        assert!(pipeline.start().is_err());
    }

    #[test]
    fn test_unread_results_are_bounded() {
        let source = SyntheticSource::new(camera(30)).unpaced().with_limit(300);
        let mut pipeline = Pipeline::new(
            source,
            SyntheticBackend::mock(),
            UserBaselineProfile::default(),
            config(30),
        )
        .unwrap();
        pipeline.start().unwrap();

        let done = wait_for(Duration::from_secs(10), || {
            let frames = pipeline.frame_queue_stats();
            (frames.total_pushed == 300 && frames.len == 0).then_some(())
        });
        assert!(done.is_some());
        pipeline.stop();

        let results = pipeline.result_queue_stats();
        assert!(results.len <= 2);
        assert_eq!(results.total_pushed, 300 - pipeline.frame_queue_stats().dropped);
    }

    #[test]
    fn test_calibration_round_trip() {
        let mut config = config(100);
        config.analyzer.calibration.duration_secs = 0.3;
        config.analyzer.calibration.min_samples = 5;
        config.analyzer.calibration.user_id = "dana".to_string();

        let backend = SyntheticBackend::new(vec![SyntheticScene::with_ear(0.28)]);
        let mut pipeline = Pipeline::new(
            SyntheticSource::new(camera(100)),
            backend,
            UserBaselineProfile::default(),
            config,
        )
        .unwrap();
        pipeline.start_calibration().unwrap();
        pipeline.start().unwrap();

        let profile = wait_for(Duration::from_secs(5), || pipeline.completed_profile()).unwrap();
        assert_eq!(profile.user_id, "dana");
        assert!(profile.is_calibrated);
        assert!((profile.ear.mean - 0.28).abs() < 1e-6);
        assert!(pipeline.completed_profile().is_none());

        let detecting = wait_for(Duration::from_secs(2), || {
            pipeline.latest_result().filter(|r| r.detection.is_some())
        });
        assert!(detecting.is_some());
        pipeline.stop();
    }

    #[test]
    fn test_control_after_stop_still_queues() {
        let mut pipeline = Pipeline::new(
            SyntheticSource::new(camera(30)).with_limit(1),
            SyntheticBackend::mock(),
            UserBaselineProfile::default(),
            config(30),
        )
        .unwrap();
        pipeline.stop();
        // The worker still owns its end of the channel
        assert!(pipeline.reset_detectors().is_ok());
        assert!(pipeline.load_profile(UserBaselineProfile::default()).is_ok());
    }
}
