//! Incident retrieval engine server binary
//!
//! Run with: cargo run -p incident-rag --bin incident-rag-server

use incident_rag::{config::RagConfig, server::RagServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RagConfig::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("incident_rag={},tower_http=warn", config.server.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("configuration loaded");
    tracing::info!("  - embedding model: {}", config.embeddings.model);
    tracing::info!("  - embedding dimensions: {}", config.embeddings.dimensions);
    tracing::info!("  - generation model: {}", config.generation.model);
    tracing::info!("  - vector index: {}", config.vector_index.index_name);
    if let Some(path) = &config.corpus.storage_path {
        tracing::info!("  - corpus path: {}", path.display());
    }

    let server = RagServer::new(config).await?;

    println!("incident-rag listening on http://{}", server.address());
    println!("  POST /api/query     - ask about a production problem");
    println!("  POST /api/feedback  - rate an answer");
    println!("  POST /api/ingest    - import resolved incidents");
    println!("  GET  /api/stats     - corpus and query statistics");

    server.start().await?;
    Ok(())
}
