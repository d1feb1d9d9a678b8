//! Ingestion endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ingest::source::{normalise_chat_thread, ChatThread, ColumnMapping};
use crate::ingest::worker::IngestProgress;
use crate::ingest::BatchReport;
use crate::server::state::AppState;
use crate::types::Incident;

/// POST /api/ingest - ingest a JSON batch synchronously
pub async fn ingest_json(
    State(state): State<AppState>,
    Json(records): Json<Vec<Incident>>,
) -> Result<Json<BatchReport>> {
    if records.is_empty() {
        return Err(Error::InvalidInput("batch is empty".to_string()));
    }
    let report = state.ingest_pipeline().ingest(records).await;
    Ok(Json(report))
}

/// Async ingestion acknowledgement
#[derive(Debug, Serialize)]
pub struct JobAccepted {
    pub job_id: Uuid,
}

/// POST /api/ingest/async - queue a JSON batch for background processing
pub async fn ingest_json_async(
    State(state): State<AppState>,
    Json(records): Json<Vec<Incident>>,
) -> Result<Json<JobAccepted>> {
    if records.is_empty() {
        return Err(Error::InvalidInput("batch is empty".to_string()));
    }
    let job_id = state.ingest_queue().submit(records).await;
    Ok(Json(JobAccepted { job_id }))
}

/// CSV ingestion request: raw CSV plus a column mapping
#[derive(Debug, Deserialize)]
pub struct CsvIngestRequest {
    #[serde(default)]
    pub mapping: Option<ColumnMapping>,
    pub csv: String,
}

/// POST /api/ingest/csv - ingest a CSV export with a caller-supplied mapping
pub async fn ingest_csv(
    State(state): State<AppState>,
    Json(request): Json<CsvIngestRequest>,
) -> Result<Json<BatchReport>> {
    let mapping = request.mapping.unwrap_or_default();
    let records = crate::ingest::parse_csv(request.csv.as_bytes(), &mapping)?;
    if records.is_empty() {
        return Err(Error::InvalidInput("CSV contains no rows".to_string()));
    }
    let report = state.ingest_pipeline().ingest(records).await;
    Ok(Json(report))
}

/// POST /api/ingest/chat - ingest exported chat threads
pub async fn ingest_chat(
    State(state): State<AppState>,
    Json(threads): Json<Vec<ChatThread>>,
) -> Result<Json<BatchReport>> {
    if threads.is_empty() {
        return Err(Error::InvalidInput("no threads supplied".to_string()));
    }

    let mut records = Vec::with_capacity(threads.len());
    for thread in &threads {
        match normalise_chat_thread(thread) {
            Ok(incident) => records.push(incident),
            Err(e) => tracing::warn!(thread_id = %thread.thread_id, error = %e, "skipping thread"),
        }
    }
    if records.is_empty() {
        return Err(Error::InvalidInput(
            "no thread could be normalised into an incident".to_string(),
        ));
    }

    let report = state.ingest_pipeline().ingest(records).await;
    Ok(Json(report))
}

/// GET /api/jobs - list ingestion jobs
pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<IngestProgress>> {
    Json(state.ingest_queue().list())
}

/// GET /api/jobs/:id - progress of one ingestion job
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<IngestProgress>> {
    state
        .ingest_queue()
        .progress(id)
        .map(Json)
        .ok_or_else(|| Error::NotFound(id.to_string()))
}
