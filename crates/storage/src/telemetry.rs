//! Session telemetry records

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::StorageError;

/// One analyzed frame as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Assigned on insert
    pub id: u64,
    /// Unix milliseconds
    pub timestamp_ms: i64,
    pub session_id: Uuid,
    pub ear_left: f64,
    pub ear_right: f64,
    pub ear: f64,
    pub head_tilt: f64,
    pub shoulder_angle: f64,
    pub distance_cm: Option<f64>,
    pub posture_score: f64,
    pub emotion: Option<String>,
    pub emotion_confidence: Option<f64>,
    pub focus_score: f64,
    pub is_drowsy: bool,
    pub is_bad_posture: bool,
    pub dominant_state: String,
    pub notes: Option<String>,
}

impl TelemetryRecord {
    /// Compact binary encoding
    pub fn to_bytes(&self) -> Result<Vec<u8>, StorageError> {
        postcard::to_allocvec(self).map_err(|e| StorageError::SerializationError(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        postcard::from_bytes(bytes).map_err(|e| StorageError::SerializationError(e.to_string()))
    }
}

/// Aggregates for one monitoring session
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Rounded to two decimals, 0 without records
    pub avg_focus_score: f64,
    pub total_records: usize,
    pub drowsy_warnings: usize,
    pub posture_warnings: usize,
}

/// Bounded in-memory telemetry log, oldest records evicted first
pub struct TelemetryRepository {
    records: Mutex<VecDeque<TelemetryRecord>>,
    max_records: usize,
    next_id: AtomicU64,
}

impl TelemetryRepository {
    pub fn new() -> Self {
        Self::with_retention(100_000)
    }

    pub fn with_retention(max_records: usize) -> Self {
        info!("Creating telemetry repository (retention {} records)", max_records);
        Self {
            records: Mutex::new(VecDeque::with_capacity(max_records.min(10_000))),
            max_records: max_records.max(1),
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, VecDeque<TelemetryRecord>>, StorageError> {
        self.records
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))
    }

    /// Store a record, returning its id
    pub fn insert(&self, mut record: TelemetryRecord) -> Result<u64, StorageError> {
        let mut records = self.lock()?;
        record.id = self.next_id.fetch_add(1, Ordering::Relaxed);

        while records.len() >= self.max_records {
            records.pop_front();
        }
        let id = record.id;
        records.push_back(record);
        debug!("Inserted telemetry record {}", id);
        Ok(id)
    }

    pub fn insert_batch(&self, batch: Vec<TelemetryRecord>) -> Result<usize, StorageError> {
        let count = batch.len();
        for record in batch {
            self.insert(record)?;
        }
        Ok(count)
    }

    /// Newest first
    pub fn recent(&self, limit: usize) -> Result<Vec<TelemetryRecord>, StorageError> {
        let records = self.lock()?;
        Ok(records.iter().rev().take(limit).cloned().collect())
    }

    pub fn since(&self, since_ms: i64) -> Result<Vec<TelemetryRecord>, StorageError> {
        let records = self.lock()?;
        Ok(records
            .iter()
            .filter(|r| r.timestamp_ms >= since_ms)
            .cloned()
            .collect())
    }

    /// Mean focus score of records at or after `since_ms`
    pub fn average_focus_since(&self, since_ms: i64) -> Result<Option<f64>, StorageError> {
        let records = self.lock()?;
        let (sum, count) = records
            .iter()
            .filter(|r| r.timestamp_ms >= since_ms)
            .fold((0.0, 0usize), |(sum, n), r| (sum + r.focus_score, n + 1));
        Ok((count > 0).then(|| sum / count as f64))
    }

    pub fn session_stats(&self, session_id: Uuid) -> Result<SessionStats, StorageError> {
        let records = self.lock()?;
        let mut stats = SessionStats::default();
        let mut focus_sum = 0.0;

        for record in records.iter().filter(|r| r.session_id == session_id) {
            stats.total_records += 1;
            focus_sum += record.focus_score;
            stats.drowsy_warnings += usize::from(record.is_drowsy);
            stats.posture_warnings += usize::from(record.is_bad_posture);
        }
        if stats.total_records > 0 {
            let avg = focus_sum / stats.total_records as f64;
            stats.avg_focus_score = (avg * 100.0).round() / 100.0;
        }
        Ok(stats)
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
    }
}

impl Default for TelemetryRepository {
    fn default() -> Self {
        Self::new()
    }
}
