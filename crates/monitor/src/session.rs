//! Report consumer

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use calibration::UserBaselineProfile;
use camera_capture::FrameSource;
use dms::DmsAlert;
use event_fusion::DominantState;
use inference_engine::InferenceBackend;
use pipeline::{FrameReport, Pipeline};
use storage::{ProfileStore, SessionStats, StorageError, TelemetryRepository};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One monitoring run: telemetry, profile persistence and status logging
pub struct MonitorSession {
    session_id: Uuid,
    user_id: String,
    profiles: ProfileStore,
    telemetry: TelemetryRepository,
    status_interval: u64,
    reports: u64,
    last_alert: Option<DmsAlert>,
    last_state: DominantState,
}

impl MonitorSession {
    pub fn new(
        user_id: impl Into<String>,
        profiles: ProfileStore,
        telemetry_retention: usize,
        status_interval: u64,
    ) -> Self {
        let session_id = Uuid::new_v4();
        let user_id = user_id.into();
        info!("Session {} for user '{}'", session_id, user_id);
        Self {
            session_id,
            user_id,
            profiles,
            telemetry: TelemetryRepository::with_retention(telemetry_retention),
            status_interval,
            reports: 0,
            last_alert: None,
            last_state: DominantState::Normal,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn telemetry(&self) -> &TelemetryRepository {
        &self.telemetry
    }

    pub fn reports_seen(&self) -> u64 {
        self.reports
    }

    /// Stored profile for this user, or an uncalibrated one
    pub fn load_profile(&self) -> UserBaselineProfile {
        self.profiles.load_or_uncalibrated(&self.user_id)
    }

    pub fn persist_profile(&self, profile: &UserBaselineProfile) -> Result<PathBuf, StorageError> {
        self.profiles.save(profile)
    }

    /// Store the report and log alert or state transitions
    pub fn record(&mut self, report: &FrameReport) -> Result<u64, StorageError> {
        self.reports += 1;
        let id = self.telemetry.insert(report.to_telemetry(self.session_id))?;

        let alert = report
            .detection
            .as_ref()
            .and_then(|d| d.highest_severity_alert());
        if alert != self.last_alert {
            match alert {
                Some(alert) => warn!("Alert: {}", alert.as_str()),
                None => info!("Alerts cleared"),
            }
            self.last_alert = alert;
        }

        let state = report.fusion.dominant;
        if state != self.last_state {
            if state == DominantState::Normal {
                info!("Back to normal");
            } else {
                warn!("{}", state.warning_message());
            }
            self.last_state = state;
        }

        if self.status_interval > 0 && self.reports % self.status_interval == 0 {
            info!("{}", report.summary());
        } else {
            debug!("{}", report.summary());
        }
        Ok(id)
    }

    pub fn stats(&self) -> Result<SessionStats, StorageError> {
        self.telemetry.session_stats(self.session_id)
    }
}

/// When the consumer loop gives up on its own
#[derive(Debug, Clone, Copy)]
pub struct ConsumerLimits {
    /// Stop after this many reports
    pub max_reports: Option<u64>,
    /// With `max_reports` set, stop once no report arrived for this long
    pub idle_timeout: Duration,
    pub poll: Duration,
}

impl Default for ConsumerLimits {
    fn default() -> Self {
        Self {
            max_reports: None,
            idle_timeout: Duration::from_secs(2),
            poll: Duration::from_millis(100),
        }
    }
}

/// Drain reports until `running` clears or a limit is hit, then stop the pipeline
pub fn run_consumer<S, B>(
    pipeline: &mut Pipeline<S, B>,
    session: &mut MonitorSession,
    running: &AtomicBool,
    limits: ConsumerLimits,
) -> anyhow::Result<()>
where
    S: FrameSource + 'static,
    B: InferenceBackend + 'static,
{
    let mut last_report = Instant::now();

    while running.load(Ordering::SeqCst) {
        save_completed_profile(pipeline, session);

        match pipeline.next_result(limits.poll)? {
            Some(report) => {
                last_report = Instant::now();
                session.record(&report)?;
                if limits
                    .max_reports
                    .is_some_and(|max| session.reports_seen() >= max)
                {
                    info!("Reached {} reports", session.reports_seen());
                    break;
                }
            }
            None if limits.max_reports.is_some()
                && last_report.elapsed() >= limits.idle_timeout =>
            {
                info!("No reports for {:?}, finishing", limits.idle_timeout);
                break;
            }
            None => {}
        }
    }

    pipeline.stop();
    save_completed_profile(pipeline, session);
    Ok(())
}

fn save_completed_profile<S, B: InferenceBackend>(
    pipeline: &Pipeline<S, B>,
    session: &MonitorSession,
) {
    if let Some(profile) = pipeline.completed_profile() {
        match session.persist_profile(&profile) {
            Ok(path) => info!("Baseline saved to {}", path.display()),
            Err(e) => warn!("Could not save baseline: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_capture::{CameraConfig, SyntheticSource};
    use inference_engine::{SkipIntervals, SyntheticBackend, SyntheticScene};
    use pipeline::{PipelineConfig, WorkerState};

    fn store() -> (tempfile::TempDir, ProfileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            camera: CameraConfig {
                width: 32,
                height: 24,
                fps: 100,
                ..Default::default()
            },
            intervals: Some(SkipIntervals::every_frame()),
            poll_timeout_ms: 10,
            ..Default::default()
        }
    }

    #[test]
    fn test_consumer_records_reports_until_limit() {
        let (_dir, profiles) = store();
        let mut session = MonitorSession::new("frank", profiles, 1_000, 0);
        let mut pipeline = Pipeline::new(
            SyntheticSource::new(config().camera),
            SyntheticBackend::mock(),
            session.load_profile(),
            config(),
        )
        .unwrap();
        pipeline.start().unwrap();

        let running = AtomicBool::new(true);
        let limits = ConsumerLimits {
            max_reports: Some(20),
            ..Default::default()
        };
        run_consumer(&mut pipeline, &mut session, &running, limits).unwrap();

        assert_eq!(session.reports_seen(), 20);
        assert_eq!(session.telemetry().len(), 20);
        let stats = session.stats().unwrap();
        assert_eq!(stats.total_records, 20);
        assert!(stats.avg_focus_score > 0.0);
        assert_eq!(pipeline.state(), WorkerState::Stopped);
    }

    #[test]
    fn test_consumer_persists_calibrated_baseline() {
        let (_dir, profiles) = store();
        let mut session = MonitorSession::new("gina", profiles, 1_000, 0);
        assert!(!session.load_profile().is_calibrated);

        let mut config = config();
        config.analyzer.calibrate_on_start = true;
        config.analyzer.calibration.duration_secs = 0.2;
        config.analyzer.calibration.min_samples = 5;
        config.analyzer.calibration.user_id = "gina".to_string();

        let mut pipeline = Pipeline::new(
            SyntheticSource::new(config.camera.clone()).with_limit(60),
            SyntheticBackend::new(vec![SyntheticScene::with_ear(0.27)]),
            session.load_profile(),
            config,
        )
        .unwrap();
        pipeline.start().unwrap();

        let running = AtomicBool::new(true);
        let limits = ConsumerLimits {
            max_reports: Some(1_000),
            idle_timeout: Duration::from_millis(500),
            ..Default::default()
        };
        run_consumer(&mut pipeline, &mut session, &running, limits).unwrap();

        let stored = session.load_profile();
        assert!(stored.is_calibrated);
        assert_eq!(stored.user_id, "gina");
        assert!((stored.ear.mean - 0.27).abs() < 1e-6);
    }

    #[test]
    fn test_cleared_flag_stops_immediately() {
        let (_dir, profiles) = store();
        let mut session = MonitorSession::new("hal", profiles, 10, 0);
        let mut pipeline = Pipeline::new(
            SyntheticSource::new(config().camera),
            SyntheticBackend::mock(),
            UserBaselineProfile::default(),
            config(),
        )
        .unwrap();
        pipeline.start().unwrap();

        let running = AtomicBool::new(false);
        run_consumer(&mut pipeline, &mut session, &running, ConsumerLimits::default()).unwrap();
        assert_eq!(session.reports_seen(), 0);
        assert_eq!(pipeline.state(), WorkerState::Stopped);
    }
}
