//! Focus Monitor service
//!
//! Settings, logging and metrics export, plus the consumer that turns
//! pipeline reports into stored telemetry and saved baselines.

pub mod logging;
pub mod session;
pub mod settings;

pub use logging::{init_logging, install_metrics_exporter};
pub use session::{run_consumer, ConsumerLimits, MonitorSession};
pub use settings::AppSettings;
