//! Incident administration endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::Incident;

/// Summary row for the listing endpoint
#[derive(Debug, Serialize)]
pub struct IncidentSummary {
    pub id: String,
    pub title: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// GET /api/incidents - list admitted incidents
pub async fn list_incidents(State(state): State<AppState>) -> Json<Vec<IncidentSummary>> {
    let mut incidents = state.corpus().all();
    incidents.sort_by(|a, b| a.id.cmp(&b.id));

    Json(
        incidents
            .into_iter()
            .map(|i| IncidentSummary {
                id: i.id,
                title: i.title,
                tags: i.tags,
                created_at: i.created_at,
            })
            .collect(),
    )
}

/// GET /api/incidents/:id - fetch one incident
pub async fn get_incident(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Incident>> {
    state
        .corpus()
        .get(&id)
        .map(Json)
        .ok_or_else(|| crate::error::Error::NotFound(id))
}

/// DELETE /api/incidents/:id - tombstone an incident
pub async fn delete_incident(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Incident>> {
    let removed = state.corpus().remove(&id).await?;
    Ok(Json(removed))
}
