//! Ingestion pipeline: a per-record state machine from raw source to live
//!
//! `new → validated → normalised → embedded → upserted → indexed → live`;
//! any stage may transition to `quarantined` (terminal). Only live records
//! are visible to queries. Ingestion is idempotent on `id`.

pub mod source;
pub mod worker;

pub use source::{ColumnMapping, parse_chat, parse_csv, parse_json};
pub use worker::{IngestQueue, IngestWorker};

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::corpus::{CorpusManager, UpsertOutcome};
use crate::error::Error;
use crate::types::Incident;

/// Lifecycle stage of a record moving through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStage {
    New,
    Validated,
    Normalised,
    Embedded,
    Upserted,
    Indexed,
    Live,
    Quarantined,
}

/// Final report for one record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordReport {
    pub id: String,
    pub stage: IngestStage,
    /// Quarantine reason or idempotence note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Report for a whole source batch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub total: usize,
    pub live: usize,
    pub unchanged: usize,
    pub quarantined: usize,
    pub records: Vec<RecordReport>,
}

/// Drives records from a source batch into the corpus
pub struct IngestPipeline {
    corpus: Arc<CorpusManager>,
}

impl IngestPipeline {
    /// Create a pipeline feeding the given corpus
    pub fn new(corpus: Arc<CorpusManager>) -> Self {
        Self { corpus }
    }

    /// Ingest a batch, one state machine per record
    pub async fn ingest(&self, records: Vec<Incident>) -> BatchReport {
        let mut report = BatchReport {
            total: records.len(),
            ..Default::default()
        };

        for record in records {
            let outcome = self.ingest_one(record).await;
            match outcome.stage {
                IngestStage::Live if outcome.detail.as_deref() == Some("unchanged") => {
                    report.unchanged += 1;
                }
                IngestStage::Live => report.live += 1,
                IngestStage::Quarantined => report.quarantined += 1,
                _ => {}
            }
            report.records.push(outcome);
        }

        tracing::info!(
            total = report.total,
            live = report.live,
            unchanged = report.unchanged,
            quarantined = report.quarantined,
            "ingest batch completed"
        );
        report
    }

    async fn ingest_one(&self, mut record: Incident) -> RecordReport {
        let raw_id = record.id.clone();

        // validate, then normalise; schema-invalid records never reach an index
        if let Err(e) = record.validate() {
            return quarantined(&raw_id, IngestStage::Validated, e);
        }
        record.normalise();
        let id = record.id.clone();

        // embed → upsert → index, all inside the corpus publish
        match self.corpus.upsert(record).await {
            Ok(UpsertOutcome::Unchanged) => RecordReport {
                id,
                stage: IngestStage::Live,
                detail: Some("unchanged".to_string()),
            },
            Ok(_) => {
                // verify: the id must be observable in the store and the
                // sparse snapshot before the record counts as live
                if self.corpus.contains(&id) {
                    RecordReport {
                        id,
                        stage: IngestStage::Live,
                        detail: None,
                    }
                } else {
                    RecordReport {
                        id,
                        stage: IngestStage::Quarantined,
                        detail: Some("verification failed: id not observable".to_string()),
                    }
                }
            }
            Err(e) => {
                let stage = match &e {
                    Error::Schema { .. } | Error::DuplicateId(_) => IngestStage::Validated,
                    Error::EmbeddingUnavailable(_) | Error::RateLimited(_) => IngestStage::Embedded,
                    Error::VectorIndex(_) => IngestStage::Upserted,
                    _ => IngestStage::Indexed,
                };
                quarantined(&id, stage, e)
            }
        }
    }
}

fn quarantined(id: &str, failed_at: IngestStage, error: Error) -> RecordReport {
    tracing::warn!(id, stage = ?failed_at, error = %error, "record quarantined");
    RecordReport {
        id: id.to_string(),
        stage: IngestStage::Quarantined,
        detail: Some(format!("{:?}: {}", failed_at, error)),
    }
}
