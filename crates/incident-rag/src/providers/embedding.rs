//! Embedding provider trait

use async_trait::async_trait;

use crate::error::Result;

/// Maps text to a unit-norm dense vector of fixed dimension.
///
/// Implementations:
/// - `GeminiClient`: Google Generative Language API
/// - `CachedEmbedder`: content-addressed cache wrapping any embedder
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embedding dimensions; fixed at corpus build time
    fn dimensions(&self) -> usize;

    /// Model identifier, part of the cache key
    fn model_id(&self) -> &str;

    /// Check if the provider is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Scale a vector to unit L2 norm in place
pub fn normalise(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalise_produces_unit_vectors() {
        let mut v = vec![3.0, 4.0];
        normalise(&mut v);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalise_leaves_zero_vector_alone() {
        let mut v = vec![0.0, 0.0];
        normalise(&mut v);
        assert_eq!(v, vec![0.0, 0.0]);
    }
}
