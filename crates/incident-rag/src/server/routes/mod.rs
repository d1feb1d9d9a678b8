//! API routes

pub mod feedback;
pub mod incidents;
pub mod ingest;
pub mod query;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{delete, get, post},
    Json, Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_body_size: usize) -> Router<AppState> {
    Router::new()
        // Query and suggestions
        .route("/query", post(query::query))
        .route("/suggest", get(query::suggest))
        // Feedback
        .route("/feedback", post(feedback::submit_feedback))
        // Incident administration
        .route("/incidents", get(incidents::list_incidents))
        .route("/incidents/:id", get(incidents::get_incident))
        .route("/incidents/:id", delete(incidents::delete_incident))
        // Ingestion
        .route(
            "/ingest",
            post(ingest::ingest_json).layer(DefaultBodyLimit::max(max_body_size)),
        )
        .route(
            "/ingest/async",
            post(ingest::ingest_json_async).layer(DefaultBodyLimit::max(max_body_size)),
        )
        .route(
            "/ingest/csv",
            post(ingest::ingest_csv).layer(DefaultBodyLimit::max(max_body_size)),
        )
        .route(
            "/ingest/chat",
            post(ingest::ingest_chat).layer(DefaultBodyLimit::max(max_body_size)),
        )
        // Jobs
        .route("/jobs", get(ingest::list_jobs))
        .route("/jobs/:id", get(ingest::get_job))
        // Stats
        .route("/stats", get(stats))
}

/// GET /api/stats - corpus, index, query, and feedback statistics
async fn stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = state.sparse().snapshot();
    Json(serde_json::json!({
        "corpus_size": state.corpus().len(),
        "sparse": {
            "documents": snapshot.len(),
            "bm25_vocab_size": snapshot.vocab_size(),
            "tfidf_features": snapshot.feature_count(),
        },
        "queries": state.pipeline().counters(),
        "feedback": state.feedback().stats(),
    }))
}
