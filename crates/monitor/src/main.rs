//! Focus Monitor - Main Entry Point
//!
//! Runs the pipeline against the synthetic camera and backend; device and
//! model integrations plug in through `FrameSource` and `InferenceBackend`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use camera_capture::SyntheticSource;
use inference_engine::{SyntheticBackend, SyntheticScene};
use monitor::{
    init_logging, install_metrics_exporter, run_consumer, AppSettings, ConsumerLimits,
    MonitorSession,
};
use pipeline::Pipeline;
use storage::ProfileStore;
use tracing::{info, warn};

/// Attentive, then drowsy, then on the phone, then attentive again
fn demo_script() -> Vec<SyntheticScene> {
    let mut script = vec![SyntheticScene::default(); 450];
    script.extend(vec![SyntheticScene::with_ear(0.18); 120]);
    script.extend(vec![
        SyntheticScene {
            phone_confidence: Some(0.8),
            gaze_ratio: 0.2,
            ..Default::default()
        };
        150
    ]);
    script.push(SyntheticScene::default());
    script
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut settings = AppSettings::from_env().context("Failed to load settings")?;
    init_logging(&settings.log_level, settings.log_json)?;

    info!("=== Focus Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    if let Some(addr) = settings.metrics_addr.as_deref() {
        install_metrics_exporter(addr)?;
    }

    let store = ProfileStore::open(&settings.profile_dir)?;
    let mut session = MonitorSession::new(
        settings.user_id.clone(),
        store,
        settings.telemetry_retention,
        settings.status_interval,
    );
    let profile = session.load_profile();
    if !profile.is_calibrated && settings.calibrate_if_missing {
        info!("No baseline for '{}', calibrating first", settings.user_id);
        settings.pipeline.analyzer.calibrate_on_start = true;
    }

    let source = SyntheticSource::new(settings.pipeline.camera.clone());
    let backend = SyntheticBackend::new(demo_script());
    let mut pipeline = Pipeline::new(source, backend, profile, settings.pipeline.clone())?;
    pipeline.start()?;

    let running = Arc::new(AtomicBool::new(true));
    let limits = ConsumerLimits {
        max_reports: settings.max_reports,
        ..Default::default()
    };

    let consumer_flag = Arc::clone(&running);
    let mut consumer = tokio::task::spawn_blocking(move || {
        let result = run_consumer(&mut pipeline, &mut session, &consumer_flag, limits);
        result.map(|()| session)
    });

    let session = tokio::select! {
        joined = &mut consumer => joined??,
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => {
                    info!("Shutdown signal received");
                    running.store(false, Ordering::SeqCst);
                }
                Err(e) => warn!("Cannot listen for Ctrl-C, running until the pipeline finishes: {}", e),
            }
            consumer.await??
        }
    };

    let stats = session.stats()?;
    info!(
        "Session {} finished: {} reports, avg focus {:.2}, {} drowsy / {} posture warnings",
        session.session_id(),
        stats.total_records,
        stats.avg_focus_score,
        stats.drowsy_warnings,
        stats.posture_warnings
    );
    Ok(())
}
