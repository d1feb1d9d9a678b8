//! Token-bucket rate limiting for outbound provider calls

use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::time::{sleep, Instant};

use crate::config::RateLimitConfig;
use crate::error::{Error, Result};

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket with a bounded waiter backlog.
///
/// Excess requests queue until `max_backlog` waiters are pending, then fail
/// fast with `rate_limited`.
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
    backlog: Semaphore,
}

impl TokenBucket {
    /// Create a bucket from configuration
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            capacity: config.bucket_size as f64,
            refill_per_sec: config.refill_per_sec,
            state: Mutex::new(BucketState {
                tokens: config.bucket_size as f64,
                last_refill: Instant::now(),
            }),
            backlog: Semaphore::new(config.max_backlog),
        }
    }

    /// Take one token, waiting for refill if necessary
    pub async fn acquire(&self) -> Result<()> {
        let _slot = self
            .backlog
            .try_acquire()
            .map_err(|_| Error::RateLimited("provider backlog full".to_string()))?;

        loop {
            let wait = {
                let mut state = self.state.lock();
                let elapsed = state.last_refill.elapsed().as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
                state.last_refill = Instant::now();

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return Ok(());
                }
                Duration::from_secs_f64((1.0 - state.tokens) / self.refill_per_sec.max(1e-9))
            };
            sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn burst_within_capacity_is_immediate() {
        let bucket = TokenBucket::new(&RateLimitConfig {
            bucket_size: 3,
            refill_per_sec: 100.0,
            max_backlog: 8,
        });
        for _ in 0..3 {
            bucket.acquire().await.unwrap();
        }
    }

    #[tokio::test]
    async fn exhausted_backlog_fails_fast() {
        let bucket = TokenBucket::new(&RateLimitConfig {
            bucket_size: 1,
            refill_per_sec: 0.001,
            max_backlog: 0,
        });
        let err = bucket.acquire().await.unwrap_err();
        assert_eq!(err.kind(), "rate_limited");
    }

    #[tokio::test]
    async fn waits_for_refill() {
        let bucket = TokenBucket::new(&RateLimitConfig {
            bucket_size: 1,
            refill_per_sec: 50.0,
            max_backlog: 4,
        });
        bucket.acquire().await.unwrap();
        // Second acquire must wait ~20ms for a token
        let start = Instant::now();
        bucket.acquire().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(10));
    }
}
