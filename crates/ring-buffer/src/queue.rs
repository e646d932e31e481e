//! Drop-oldest bounded queue

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::QueueError;

/// Capacity used between pipeline stages
pub const DEFAULT_QUEUE_CAPACITY: usize = 2;

/// Snapshot of queue counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub len: usize,
    pub capacity: usize,
    pub total_pushed: u64,
    pub dropped: u64,
}

/// Bounded MPMC queue whose `push` never waits for space
///
/// When full, the oldest item is evicted to make room, so consumers that
/// fall behind always see the freshest items.
pub struct DropOldestQueue<T> {
    items: Mutex<VecDeque<T>>,
    not_empty: Condvar,
    capacity: usize,
    total_pushed: AtomicU64,
    dropped: AtomicU64,
}

impl<T> DropOldestQueue<T> {
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::ZeroCapacity);
        }
        Ok(Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            not_empty: Condvar::new(),
            capacity,
            total_pushed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        })
    }

    /// Queue with the pipeline's default capacity of 2
    pub fn with_default_capacity() -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(DEFAULT_QUEUE_CAPACITY)),
            not_empty: Condvar::new(),
            capacity: DEFAULT_QUEUE_CAPACITY,
            total_pushed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue an item, returning the evicted oldest item if the queue was full
    pub fn push(&self, item: T) -> Result<Option<T>, QueueError> {
        let mut items = self
            .items
            .lock()
            .map_err(|e| QueueError::Poisoned(e.to_string()))?;

        let evicted = if items.len() >= self.capacity {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            items.pop_front()
        } else {
            None
        };
        items.push_back(item);
        self.total_pushed.fetch_add(1, Ordering::Relaxed);
        drop(items);

        self.not_empty.notify_one();
        if evicted.is_some() {
            trace!("Queue full, dropped oldest item");
        }
        Ok(evicted)
    }

    /// Dequeue without waiting
    pub fn try_pop(&self) -> Result<Option<T>, QueueError> {
        let mut items = self
            .items
            .lock()
            .map_err(|e| QueueError::Poisoned(e.to_string()))?;
        Ok(items.pop_front())
    }

    /// Dequeue, waiting at most `timeout` for an item
    pub fn pop_timeout(&self, timeout: Duration) -> Result<Option<T>, QueueError> {
        let deadline = Instant::now() + timeout;
        let mut items = self
            .items
            .lock()
            .map_err(|e| QueueError::Poisoned(e.to_string()))?;

        loop {
            if let Some(item) = items.pop_front() {
                return Ok(Some(item));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let (guard, _) = self
                .not_empty
                .wait_timeout(items, deadline - now)
                .map_err(|e| QueueError::Poisoned(e.to_string()))?;
            items = guard;
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items evicted since creation
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn total_pushed(&self) -> u64 {
        self.total_pushed.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            len: self.len(),
            capacity: self.capacity,
            total_pushed: self.total_pushed(),
            dropped: self.dropped_count(),
        }
    }

    /// Remove every queued item
    pub fn clear(&self) -> Result<(), QueueError> {
        let mut items = self
            .items
            .lock()
            .map_err(|e| QueueError::Poisoned(e.to_string()))?;
        items.clear();
        Ok(())
    }
}

impl<T> Default for DropOldestQueue<T> {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_zero_capacity_rejected() {
        assert_eq!(
            DropOldestQueue::<u32>::new(0).err(),
            Some(QueueError::ZeroCapacity)
        );
    }

    #[test]
    fn test_push_evicts_oldest() {
        let queue = DropOldestQueue::with_default_capacity();
        assert_eq!(queue.push(1).unwrap(), None);
        assert_eq!(queue.push(2).unwrap(), None);
        assert_eq!(queue.push(3).unwrap(), Some(1));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped_count(), 1);
        assert_eq!(queue.total_pushed(), 3);

        assert_eq!(queue.try_pop().unwrap(), Some(2));
        assert_eq!(queue.try_pop().unwrap(), Some(3));
        assert_eq!(queue.try_pop().unwrap(), None);
    }

    #[test]
    fn test_pop_timeout_returns_none_when_idle() {
        let queue = DropOldestQueue::<u32>::with_default_capacity();
        let started = Instant::now();
        assert_eq!(queue.pop_timeout(Duration::from_millis(20)).unwrap(), None);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_pop_timeout_wakes_on_push() {
        let queue = Arc::new(DropOldestQueue::with_default_capacity());
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                queue.push(42u32).unwrap();
            })
        };

        let item = queue.pop_timeout(Duration::from_secs(5)).unwrap();
        producer.join().unwrap();
        assert_eq!(item, Some(42));
    }

    #[test]
    fn test_fast_producer_never_blocks() {
        let queue = Arc::new(DropOldestQueue::with_default_capacity());
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let started = Instant::now();
                for i in 0..10_000u32 {
                    queue.push(i).unwrap();
                    assert!(queue.len() <= 2);
                }
                started.elapsed()
            })
        };

        // Slow consumer
        let mut received = Vec::new();
        for _ in 0..5 {
            if let Some(item) = queue.pop_timeout(Duration::from_millis(5)).unwrap() {
                received.push(item);
            }
            thread::sleep(Duration::from_millis(2));
        }

        let elapsed = producer.join().unwrap();
        assert!(elapsed < Duration::from_secs(5));
        assert!(queue.len() <= 2);
        assert_eq!(queue.total_pushed(), 10_000);
        assert!(received.windows(2).all(|w| w[0] < w[1]));
    }

    proptest! {
        #[test]
        fn prop_len_never_exceeds_capacity(capacity in 1usize..8, pushes in 0usize..64) {
            let queue = DropOldestQueue::new(capacity).unwrap();
            for i in 0..pushes {
                queue.push(i).unwrap();
                prop_assert!(queue.len() <= capacity);
            }
            prop_assert_eq!(queue.dropped_count() as usize, pushes.saturating_sub(capacity));
            // Survivors are the newest items
            if pushes > 0 {
                let mut last = None;
                while let Some(item) = queue.try_pop().unwrap() {
                    last = Some(item);
                }
                prop_assert_eq!(last, Some(pushes - 1));
            }
        }
    }
}
