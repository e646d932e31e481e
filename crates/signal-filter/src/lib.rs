//! Signal Smoothing
//!
//! Provides the fixed channel set used throughout the monitor, a typed
//! per-channel value map, and moving-average filters (SMA and EMA) that
//! suppress frame-to-frame jitter in landmark-derived measurements.

mod channel;
mod error;
mod filter;

pub use channel::{Channel, ChannelValues};
pub use error::FilterError;
pub use filter::{MovingAverageFilter, MultiChannelFilter, SmoothingMethod};
