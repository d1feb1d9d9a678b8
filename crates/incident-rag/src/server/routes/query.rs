//! Query endpoint

use axum::{extract::Query as UrlQuery, extract::State, Json};
use serde::Deserialize;
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{QueryRequest, RagResponse};

/// POST /api/query - answer a question from the incident corpus
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<RagResponse>> {
    let deadline = state.config().retrieval.request_deadline();
    let response = timeout(deadline, state.pipeline().query(&request))
        .await
        .map_err(|_| Error::DeadlineExceeded(deadline.as_millis() as u64))??;
    Ok(Json(response))
}

/// Query string for the suggestion endpoint
#[derive(Debug, Deserialize)]
pub struct SuggestParams {
    pub q: String,
    #[serde(default = "default_suggest_limit")]
    pub limit: usize,
}

fn default_suggest_limit() -> usize {
    5
}

/// GET /api/suggest - title and tag completions for a partial query
pub async fn suggest(
    State(state): State<AppState>,
    UrlQuery(params): UrlQuery<SuggestParams>,
) -> Json<Vec<String>> {
    Json(state.suggest(&params.q, params.limit.clamp(1, 25)))
}
