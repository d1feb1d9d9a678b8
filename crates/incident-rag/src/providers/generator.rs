//! Generative provider trait

use async_trait::async_trait;

use crate::error::Result;

/// Produces text conditioned on a prompt; deterministic at low temperature.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a completion for the prompt
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String>;

    /// Check if the provider is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model identifier
    fn model(&self) -> &str;
}
