//! Application state for the HTTP server

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::config::RagConfig;
use crate::corpus::{CorpusManager, FeedbackSink};
use crate::error::Result;
use crate::generation::GroundedGenerator;
use crate::ingest::{IngestPipeline, IngestQueue, IngestWorker};
use crate::pipeline::RagPipeline;
use crate::providers::{
    CachedEmbedder, Embedder, GeminiClient, Generator, PineconeIndex, TokenBucket, VectorIndex,
};
use crate::retrieval::{EntityExtractor, HybridRetriever, QueryRouter, SemanticValidator};
use crate::sparse::SparseIndex;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RagConfig,
    corpus: Arc<CorpusManager>,
    sparse: Arc<SparseIndex>,
    pipeline: Arc<RagPipeline>,
    ingest_pipeline: Arc<IngestPipeline>,
    ingest_queue: Arc<IngestQueue>,
    feedback: Arc<FeedbackSink>,
    ready: RwLock<bool>,
}

impl AppState {
    /// Build state with production providers and load the corpus
    pub async fn new(config: RagConfig) -> Result<Self> {
        tracing::info!("initialising incident retrieval engine");

        let limiter = Arc::new(TokenBucket::new(&config.rate_limit));
        let gemini = Arc::new(GeminiClient::new(
            &config.embeddings,
            &config.generation,
            limiter.clone(),
        ));
        let pinecone = Arc::new(PineconeIndex::new(&config.vector_index, limiter));

        let state = Self::with_providers(config, gemini.clone(), pinecone, gemini);
        let loaded = state.inner.corpus.load()?;
        tracing::info!(incidents = loaded, "corpus ready");
        state.set_ready(true);
        Ok(state)
    }

    /// Build state over explicit providers; used by tests with fakes
    pub fn with_providers(
        config: RagConfig,
        embedder: Arc<dyn Embedder>,
        vector: Arc<dyn VectorIndex>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        let cached: Arc<dyn Embedder> = Arc::new(CachedEmbedder::new(
            embedder,
            Duration::from_secs(config.embeddings.cache_ttl_secs),
        ));

        let sparse = Arc::new(SparseIndex::new());
        let corpus = Arc::new(CorpusManager::new(
            cached.clone(),
            vector.clone(),
            sparse.clone(),
            config.corpus.storage_path.clone(),
        ));

        let extractor = Arc::new(EntityExtractor::new());
        let pipeline = Arc::new(RagPipeline::new(
            QueryRouter::new(extractor.clone()),
            HybridRetriever::new(
                cached,
                vector,
                extractor.clone(),
                config.retrieval.clone(),
            ),
            SemanticValidator::new(extractor),
            GroundedGenerator::new(generator, config.generation.clone()),
            corpus.clone(),
            sparse.clone(),
            config.retrieval.clone(),
        ));

        let ingest_pipeline = Arc::new(IngestPipeline::new(corpus.clone()));
        let (ingest_queue, receiver) = IngestQueue::new();
        let ingest_queue = Arc::new(ingest_queue);

        let worker = IngestWorker::new(ingest_pipeline.clone(), &ingest_queue);
        tokio::spawn(async move {
            worker.run(receiver).await;
        });

        let feedback = Arc::new(FeedbackSink::new(config.corpus.feedback_path.clone()));

        Self {
            inner: Arc::new(AppStateInner {
                config,
                corpus,
                sparse,
                pipeline,
                ingest_pipeline,
                ingest_queue,
                feedback,
                ready: RwLock::new(true),
            }),
        }
    }

    /// Engine configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    /// The corpus manager
    pub fn corpus(&self) -> &Arc<CorpusManager> {
        &self.inner.corpus
    }

    /// The sparse index
    pub fn sparse(&self) -> &Arc<SparseIndex> {
        &self.inner.sparse
    }

    /// The query pipeline
    pub fn pipeline(&self) -> &Arc<RagPipeline> {
        &self.inner.pipeline
    }

    /// The synchronous ingestion pipeline
    pub fn ingest_pipeline(&self) -> &Arc<IngestPipeline> {
        &self.inner.ingest_pipeline
    }

    /// The background ingestion queue
    pub fn ingest_queue(&self) -> &Arc<IngestQueue> {
        &self.inner.ingest_queue
    }

    /// The feedback sink
    pub fn feedback(&self) -> &Arc<FeedbackSink> {
        &self.inner.feedback
    }

    /// Whether the server is ready to answer
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Flip the readiness flag
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }

    /// Title and tag suggestions for a partial query
    pub fn suggest(&self, partial: &str, limit: usize) -> Vec<String> {
        let needle = partial.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let mut suggestions = Vec::new();
        for incident in self.inner.corpus.all() {
            let title = incident.title.to_lowercase();
            if title.contains(&needle) && !suggestions.contains(&title) {
                suggestions.push(title);
                if suggestions.len() >= limit {
                    return suggestions;
                }
            }
            for tag in &incident.tags {
                if tag.contains(&needle) && !suggestions.contains(tag) {
                    suggestions.push(tag.clone());
                    if suggestions.len() >= limit {
                        return suggestions;
                    }
                }
            }
        }
        suggestions
    }
}
