//! Configuration for the incident retrieval engine

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Embedding provider configuration
    pub embeddings: EmbeddingConfig,
    /// Vector index configuration
    pub vector_index: VectorIndexConfig,
    /// Generative provider configuration
    pub generation: GenerationConfig,
    /// Retrieval tuning
    pub retrieval: RetrievalConfig,
    /// Rate limiting for external providers
    pub rate_limit: RateLimitConfig,
    /// Corpus storage
    pub corpus: CorpusConfig,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            embeddings: EmbeddingConfig::default(),
            vector_index: VectorIndexConfig::default(),
            generation: GenerationConfig::default(),
            retrieval: RetrievalConfig::default(),
            rate_limit: RateLimitConfig::default(),
            corpus: CorpusConfig::default(),
        }
    }
}

impl RagConfig {
    /// Build configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(port) = port.parse() {
                config.server.port = port;
            }
        }
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            config.embeddings.api_key = key.clone();
            config.generation.api_key = key;
        }
        if let Ok(model) = std::env::var("GEMINI_EMBED_MODEL") {
            config.embeddings.model = model;
        }
        if let Ok(model) = std::env::var("GEMINI_CHAT_MODEL") {
            config.generation.model = model;
        }
        if let Ok(key) = std::env::var("PINECONE_API_KEY") {
            config.vector_index.api_key = key;
        }
        if let Ok(index) = std::env::var("PINECONE_INDEX") {
            config.vector_index.index_name = index;
        }
        if let Ok(host) = std::env::var("PINECONE_HOST") {
            config.vector_index.host = host;
        }
        if let Ok(path) = std::env::var("CORPUS_PATH") {
            config.corpus.storage_path = Some(PathBuf::from(path));
        }
        if let Ok(bucket) = std::env::var("RATE_LIMIT_BUCKET") {
            if let Ok(bucket) = bucket.parse() {
                config.rate_limit.bucket_size = bucket;
            }
        }
        if let Ok(deadline) = std::env::var("REQUEST_DEADLINE_SECS") {
            if let Ok(deadline) = deadline.parse() {
                config.retrieval.request_deadline_secs = deadline;
            }
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.server.log_level = level;
        }

        config
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Log level used when RUST_LOG is unset
    pub log_level: String,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            log_level: "info".to_string(),
            max_body_size: 16 * 1024 * 1024,
        }
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// API key for the embedding provider
    pub api_key: String,
    /// Model identifier
    pub model: String,
    /// Embedding dimensions; fixed at corpus build time
    pub dimensions: usize,
    /// Cache TTL for content-addressed embeddings in seconds
    pub cache_ttl_secs: u64,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for transient failures
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "text-embedding-004".to_string(),
            dimensions: 768,
            cache_ttl_secs: 3600,
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndexConfig {
    /// API key for the vector index
    pub api_key: String,
    /// Index name
    pub index_name: String,
    /// Index host URL
    pub host: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for transient failures
    pub max_retries: u32,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            index_name: "incidents".to_string(),
            host: String::new(),
            timeout_secs: 10,
            max_retries: 3,
        }
    }
}

/// Generative provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// API key for the generative provider
    pub api_key: String,
    /// Model identifier
    pub model: String,
    /// Sampling temperature; kept low for deterministic answers
    pub temperature: f32,
    /// Maximum output tokens for simple queries
    pub max_tokens_simple: u32,
    /// Maximum output tokens for complex queries
    pub max_tokens_complex: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for transient failures
    pub max_retries: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-1.5-flash".to_string(),
            temperature: 0.1,
            max_tokens_simple: 200,
            max_tokens_complex: 400,
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

/// Retrieval tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Weight for the dense (semantic) score in fusion
    pub semantic_weight: f32,
    /// Weight for the BM25 score in fusion
    pub bm25_weight: f32,
    /// Weight for the TF-IDF score in fusion
    pub tfidf_weight: f32,
    /// Default minimum fused score
    pub confidence_floor: f32,
    /// Per-request deadline in seconds
    pub request_deadline_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            semantic_weight: 0.6,
            bm25_weight: 0.3,
            tfidf_weight: 0.1,
            confidence_floor: 0.3,
            request_deadline_secs: 10,
        }
    }
}

impl RetrievalConfig {
    /// Request deadline as a `Duration`
    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_deadline_secs)
    }
}

/// Token-bucket rate limiting for outbound provider calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Bucket capacity (burst size)
    pub bucket_size: u32,
    /// Sustained refill rate in requests per second
    pub refill_per_sec: f64,
    /// Maximum queued waiters before failing fast
    pub max_backlog: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            bucket_size: 20,
            refill_per_sec: 10.0,
            max_backlog: 64,
        }
    }
}

/// Corpus storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Path to the canonical incident store (JSON); `None` keeps the corpus
    /// in memory only
    pub storage_path: Option<PathBuf>,
    /// Path to the feedback log (JSON)
    pub feedback_path: Option<PathBuf>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        let base = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("incident-rag");

        Self {
            storage_path: Some(base.join("corpus.json")),
            feedback_path: Some(base.join("feedback.json")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fusion_weights_sum_to_one() {
        let config = RetrievalConfig::default();
        let sum = config.semantic_weight + config.bm25_weight + config.tfidf_weight;
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn default_deadline_is_ten_seconds() {
        let config = RetrievalConfig::default();
        assert_eq!(config.request_deadline(), Duration::from_secs(10));
    }
}
