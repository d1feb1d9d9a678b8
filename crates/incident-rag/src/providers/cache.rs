//! Content-addressed embedding cache with per-key single-flight

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::error::Result;

use super::embedding::Embedder;

struct CacheEntry {
    vector: Vec<f32>,
    inserted: Instant,
}

/// Wraps any embedder with a content-addressed cache.
///
/// The cache is authoritative: a fresh cached vector short-circuits the
/// network call. A miss for key K suspends other misses for K until the first
/// caller completes.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    entries: DashMap<String, CacheEntry>,
    flights: DashMap<String, Arc<Mutex<()>>>,
    ttl: Duration,
}

impl CachedEmbedder {
    /// Wrap an embedder with the given TTL
    pub fn new(inner: Arc<dyn Embedder>, ttl: Duration) -> Self {
        Self {
            inner,
            entries: DashMap::new(),
            flights: DashMap::new(),
            ttl,
        }
    }

    /// Cache key: hash of normalised text plus model id
    fn cache_key(&self, text: &str) -> String {
        let normalised = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut hasher = Sha256::new();
        hasher.update(self.inner.model_id().as_bytes());
        hasher.update(b":");
        hasher.update(normalised.to_lowercase().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn lookup(&self, key: &str) -> Option<Vec<f32>> {
        let entry = self.entries.get(key)?;
        if entry.inserted.elapsed() < self.ttl {
            Some(entry.vector.clone())
        } else {
            drop(entry);
            self.entries.remove(key);
            None
        }
    }

    /// Number of cached vectors
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = self.cache_key(text);

        if let Some(vector) = self.lookup(&key) {
            tracing::debug!(key = %key, "embedding cache hit");
            return Ok(vector);
        }

        let flight = self
            .flights
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = flight.lock().await;

        // The first flight may have populated the cache while we waited
        if let Some(vector) = self.lookup(&key) {
            return Ok(vector);
        }

        let vector = self.inner.embed(text).await?;
        self.entries.insert(
            key.clone(),
            CacheEntry {
                vector: vector.clone(),
                inserted: Instant::now(),
            },
        );
        drop(_guard);
        self.flights.remove(&key);

        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    async fn health_check(&self) -> Result<bool> {
        self.inner.health_check().await
    }

    fn name(&self) -> &str {
        "cached"
    }
}
