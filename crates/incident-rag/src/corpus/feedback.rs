//! Append-only feedback sink
//!
//! Feedback is recorded, never applied to retrieval within the same request.
//! Records are immutable once written.

use std::path::PathBuf;

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::response::{FeedbackRecord, FeedbackRequest};

/// Collects user feedback on answers
pub struct FeedbackSink {
    storage_path: Option<PathBuf>,
    records: RwLock<Vec<FeedbackRecord>>,
}

/// Aggregate feedback counters
#[derive(Debug, Clone, serde::Serialize)]
pub struct FeedbackStats {
    pub total: usize,
    pub helpful: usize,
    pub average_rating: f32,
}

impl FeedbackSink {
    /// Create a sink, loading any existing log from disk
    pub fn new(storage_path: Option<PathBuf>) -> Self {
        let sink = Self {
            storage_path,
            records: RwLock::new(Vec::new()),
        };
        if let Err(e) = sink.load() {
            tracing::warn!(error = %e, "could not load feedback log");
        }
        sink
    }

    /// Append a feedback record, returning its id
    pub fn append(&self, request: FeedbackRequest) -> Result<Uuid> {
        if !(1..=5).contains(&request.rating) {
            return Err(Error::InvalidInput(format!(
                "rating must be between 1 and 5, got {}",
                request.rating
            )));
        }
        if request.result_id.trim().is_empty() {
            return Err(Error::InvalidInput("result_id must not be empty".to_string()));
        }

        let record = FeedbackRecord {
            id: Uuid::new_v4(),
            query: request.query,
            result_id: request.result_id.trim().to_uppercase(),
            rating: request.rating,
            helpful: request.helpful,
            feedback_text: request.feedback_text,
            created_at: Utc::now(),
        };
        let id = record.id;

        tracing::info!(
            feedback_id = %id,
            result_id = %record.result_id,
            rating = record.rating,
            helpful = record.helpful,
            "feedback recorded"
        );

        self.records.write().push(record);
        self.persist();
        Ok(id)
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the sink is empty
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Aggregate counters for the stats endpoint
    pub fn stats(&self) -> FeedbackStats {
        let records = self.records.read();
        let total = records.len();
        let helpful = records.iter().filter(|r| r.helpful).count();
        let average_rating = if total == 0 {
            0.0
        } else {
            records.iter().map(|r| r.rating as f32).sum::<f32>() / total as f32
        };
        FeedbackStats {
            total,
            helpful,
            average_rating,
        }
    }

    fn load(&self) -> Result<()> {
        let Some(path) = &self.storage_path else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }
        let data = std::fs::read_to_string(path)?;
        let loaded: Vec<FeedbackRecord> = serde_json::from_str(&data)?;
        *self.records.write() = loaded;
        Ok(())
    }

    fn persist(&self) {
        let Some(path) = &self.storage_path else {
            return;
        };
        let write = || -> Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let records = self.records.read();
            std::fs::write(path, serde_json::to_string_pretty(&*records)?)?;
            Ok(())
        };
        if let Err(e) = write() {
            tracing::error!(error = %e, "failed to persist feedback log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(rating: u8) -> FeedbackRequest {
        FeedbackRequest {
            query: "upi timeout".to_string(),
            result_id: "jsp-1000".to_string(),
            rating,
            helpful: rating >= 4,
            feedback_text: None,
        }
    }

    #[test]
    fn valid_feedback_is_appended() {
        let sink = FeedbackSink::new(None);
        let id = sink.append(request(5)).unwrap();
        assert_eq!(sink.len(), 1);
        assert!(!id.is_nil());
    }

    #[test]
    fn rating_out_of_range_is_rejected() {
        let sink = FeedbackSink::new(None);
        assert!(sink.append(request(0)).is_err());
        assert!(sink.append(request(6)).is_err());
        assert!(sink.is_empty());
    }

    #[test]
    fn stats_aggregate_ratings() {
        let sink = FeedbackSink::new(None);
        sink.append(request(5)).unwrap();
        sink.append(request(1)).unwrap();
        let stats = sink.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.helpful, 1);
        assert!((stats.average_rating - 3.0).abs() < 1e-6);
    }
}
