//! Latest-value slot

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::QueueError;

/// Holds the newest published value for readers that only care about "now"
pub struct LatestSlot<T> {
    value: Mutex<Option<T>>,
    version: AtomicU64,
}

impl<T: Clone> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            value: Mutex::new(None),
            version: AtomicU64::new(0),
        }
    }

    /// Replace the current value
    pub fn store(&self, value: T) -> Result<(), QueueError> {
        let mut slot = self
            .value
            .lock()
            .map_err(|e| QueueError::Poisoned(e.to_string()))?;
        *slot = Some(value);
        self.version.fetch_add(1, Ordering::Release);
        Ok(())
    }

    /// Clone of the current value, `None` before the first store
    pub fn load(&self) -> Option<T> {
        self.value.lock().ok().and_then(|slot| slot.clone())
    }

    /// Take the value out, leaving the slot empty
    pub fn take(&self) -> Option<T> {
        self.value.lock().ok().and_then(|mut slot| slot.take())
    }

    /// Number of stores so far
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }
}

impl<T: Clone> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
