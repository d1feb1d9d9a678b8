//! Background worker for ingestion batches
//!
//! Batches queue through an mpsc channel onto a worker pool disjoint from
//! request handling; progress is tracked per job.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::types::Incident;

use super::{BatchReport, IngestPipeline};

/// Job lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

/// Progress of one ingestion job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestProgress {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub total_records: usize,
    pub live: usize,
    pub unchanged: usize,
    pub quarantined: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<BatchReport>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IngestProgress {
    fn new(job_id: Uuid, total_records: usize) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            status: JobStatus::Pending,
            total_records,
            live: 0,
            unchanged: 0,
            quarantined: 0,
            error: None,
            report: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A queued ingestion batch
#[derive(Debug)]
pub struct IngestJob {
    pub id: Uuid,
    pub records: Vec<Incident>,
}

/// Queue handle shared with the HTTP layer
pub struct IngestQueue {
    jobs: Arc<DashMap<Uuid, IngestProgress>>,
    sender: mpsc::Sender<IngestJob>,
}

impl IngestQueue {
    /// Create the queue and the receiver handed to the worker
    pub fn new() -> (Self, mpsc::Receiver<IngestJob>) {
        let (sender, receiver) = mpsc::channel(256);
        (
            Self {
                jobs: Arc::new(DashMap::new()),
                sender,
            },
            receiver,
        )
    }

    /// Submit a batch for background processing
    pub async fn submit(&self, records: Vec<Incident>) -> Uuid {
        let job = IngestJob {
            id: Uuid::new_v4(),
            records,
        };
        let job_id = job.id;
        self.jobs
            .insert(job_id, IngestProgress::new(job_id, job.records.len()));

        if let Err(e) = self.sender.send(job).await {
            tracing::error!(error = %e, "failed to enqueue ingest job");
            self.fail(job_id, e.to_string());
        }
        job_id
    }

    /// Progress of one job
    pub fn progress(&self, job_id: Uuid) -> Option<IngestProgress> {
        self.jobs.get(&job_id).map(|p| p.clone())
    }

    /// All known jobs, newest first
    pub fn list(&self) -> Vec<IngestProgress> {
        let mut jobs: Vec<IngestProgress> = self.jobs.iter().map(|e| e.value().clone()).collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    fn fail(&self, job_id: Uuid, error: String) {
        if let Some(mut progress) = self.jobs.get_mut(&job_id) {
            progress.status = JobStatus::Failed;
            progress.error = Some(error);
            progress.updated_at = Utc::now();
        }
    }

    /// Shared jobs map for the worker
    pub(crate) fn jobs_ref(&self) -> Arc<DashMap<Uuid, IngestProgress>> {
        self.jobs.clone()
    }
}

/// Drains the queue on a background task
pub struct IngestWorker {
    pipeline: Arc<IngestPipeline>,
    jobs: Arc<DashMap<Uuid, IngestProgress>>,
}

impl IngestWorker {
    /// Create a worker bound to the queue's job map
    pub fn new(pipeline: Arc<IngestPipeline>, queue: &IngestQueue) -> Self {
        Self {
            pipeline,
            jobs: queue.jobs_ref(),
        }
    }

    /// Process jobs until the queue closes
    pub async fn run(self, mut receiver: mpsc::Receiver<IngestJob>) {
        tracing::info!("ingest worker started");

        while let Some(job) = receiver.recv().await {
            let job_id = job.id;
            tracing::info!(job_id = %job_id, records = job.records.len(), "processing ingest job");
            set_status(&self.jobs, job_id, JobStatus::Processing);

            let report = self.pipeline.ingest(job.records).await;
            if let Some(mut progress) = self.jobs.get_mut(&job_id) {
                progress.status = JobStatus::Complete;
                progress.live = report.live;
                progress.unchanged = report.unchanged;
                progress.quarantined = report.quarantined;
                progress.report = Some(report);
                progress.updated_at = Utc::now();
            }
        }

        tracing::info!("ingest worker stopped");
    }
}

fn set_status(jobs: &DashMap<Uuid, IngestProgress>, job_id: Uuid, status: JobStatus) {
    if let Some(mut progress) = jobs.get_mut(&job_id) {
        progress.status = status;
        progress.updated_at = Utc::now();
    }
}
