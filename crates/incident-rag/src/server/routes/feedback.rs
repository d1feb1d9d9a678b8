//! Feedback endpoint

use axum::{extract::State, Json};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::response::FeedbackRequest;

/// Response carrying the stored feedback id
#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub feedback_id: Uuid,
}

/// POST /api/feedback - record feedback on an answer
pub async fn submit_feedback(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>> {
    let feedback_id = state.feedback().append(request)?;
    Ok(Json(FeedbackResponse { feedback_id }))
}
