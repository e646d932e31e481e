//! Filter Error Types

use thiserror::Error;

/// Errors raised while configuring filters
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    /// Window must hold at least one sample
    #[error("Invalid window size: {0} (must be at least 1)")]
    InvalidWindow(usize),

    /// Channel name outside the known channel set
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    /// Smoothing method name not recognised
    #[error("Unknown smoothing method: {0}")]
    UnknownMethod(String),
}
