//! Bounded Frame Queues
//!
//! Shared primitives between the capture and inference workers:
//! a fixed-capacity queue that discards the oldest item instead of
//! blocking the producer, and a single-value slot holding the newest item.

mod queue;
mod slot;

pub use queue::{DropOldestQueue, QueueStats, DEFAULT_QUEUE_CAPACITY};
pub use slot::LatestSlot;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueueError {
    #[error("Queue capacity must be at least 1")]
    ZeroCapacity,

    #[error("Lock poisoned: {0}")]
    Poisoned(String),
}
