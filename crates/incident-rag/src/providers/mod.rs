//! Provider abstractions for embeddings, generation, and vector storage
//!
//! Narrow capability traits with REST-backed production implementations and
//! deterministic fakes in tests.

pub mod cache;
pub mod embedding;
pub mod gemini;
pub mod generator;
pub mod pinecone;
pub mod rate_limit;
pub mod vector_index;

pub use cache::CachedEmbedder;
pub use embedding::Embedder;
pub use gemini::GeminiClient;
pub use generator::Generator;
pub use pinecone::PineconeIndex;
pub use rate_limit::TokenBucket;
pub use vector_index::{IndexMetadata, VectorIndex, VectorMatch};

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::error::{Error, Result};

/// Exponential backoff base delay
const BACKOFF_BASE_SECS: u64 = 1;
/// Backoff ceiling
const BACKOFF_CAP_SECS: u64 = 60;

/// Retry a provider call with exponential backoff.
///
/// Only retryable errors (rate-limited, transient) are retried; invalid input
/// and quota exhaustion surface immediately.
pub(crate) async fn retry_with_backoff<F, Fut, T>(
    operation: &str,
    max_retries: u32,
    call: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;

    for attempt in 0..=max_retries {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                let delay =
                    Duration::from_secs((BACKOFF_BASE_SECS << attempt).min(BACKOFF_CAP_SECS));
                tracing::warn!(
                    operation,
                    attempt = attempt + 1,
                    max_attempts = max_retries + 1,
                    delay_secs = delay.as_secs(),
                    error = %e,
                    "provider call failed, retrying"
                );
                sleep(delay).await;
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| Error::Internal(format!("{operation}: retries exhausted"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn non_retryable_errors_surface_immediately() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = retry_with_backoff("test", 3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::InvalidInput("bad".to_string())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let calls = AtomicUsize::new(0);
        let result = retry_with_backoff("test", 2, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(Error::Transient("flaky".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
