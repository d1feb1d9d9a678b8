//! Gemini REST client implementing the embedding and generation contracts

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::{EmbeddingConfig, GenerationConfig};
use crate::error::{Error, Result};

use super::embedding::{normalise, Embedder};
use super::generator::Generator;
use super::rate_limit::TokenBucket;
use super::retry_with_backoff;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini API client used for both embeddings and answer generation
pub struct GeminiClient {
    client: Client,
    embeddings: EmbeddingConfig,
    generation: GenerationConfig,
    limiter: Arc<TokenBucket>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest {
    model: String,
    content: Content,
    task_type: String,
}

#[derive(Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationOptions,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationOptions {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

impl GeminiClient {
    /// Create a client sharing one connection pool for both contracts
    pub fn new(
        embeddings: &EmbeddingConfig,
        generation: &GenerationConfig,
        limiter: Arc<TokenBucket>,
    ) -> Self {
        let timeout = embeddings.timeout_secs.max(generation.timeout_secs);
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .pool_max_idle_per_host(5)
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            embeddings: embeddings.clone(),
            generation: generation.clone(),
            limiter,
        }
    }

    /// Map an HTTP status to the error taxonomy
    fn classify_status(status: StatusCode, body: &str, context: &str) -> Error {
        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                Error::RateLimited(format!("{context}: HTTP 429 - {body}"))
            }
            StatusCode::FORBIDDEN | StatusCode::PAYMENT_REQUIRED => {
                Error::EmbeddingUnavailable(format!("{context}: quota exhausted - {body}"))
            }
            StatusCode::BAD_REQUEST => Error::InvalidInput(format!("{context}: {body}")),
            s if s.is_server_error() => Error::Transient(format!("{context}: HTTP {s} - {body}")),
            s => Error::Internal(format!("{context}: HTTP {s} - {body}")),
        }
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>> {
        self.limiter.acquire().await?;

        let model = format!("models/{}", self.embeddings.model);
        let url = format!(
            "{BASE_URL}/{model}:embedContent?key={}",
            self.embeddings.api_key
        );
        let request = EmbedRequest {
            model,
            content: Content {
                parts: vec![Part {
                    text: text.to_string(),
                }],
            },
            task_type: "RETRIEVAL_DOCUMENT".to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Transient(format!("embed request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body, "embed"));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::Transient(format!("embed response parse failed: {e}")))?;

        let mut vector = parsed.embedding.values;
        if vector.len() != self.embeddings.dimensions {
            return Err(Error::EmbeddingUnavailable(format!(
                "expected {} dimensions, provider returned {}",
                self.embeddings.dimensions,
                vector.len()
            )));
        }
        normalise(&mut vector);
        Ok(vector)
    }

    async fn generate_once(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        self.limiter.acquire().await?;

        let url = format!(
            "{BASE_URL}/models/{}:generateContent?key={}",
            self.generation.model, self.generation.api_key
        );
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationOptions {
                temperature: self.generation.temperature,
                max_output_tokens: max_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Transient(format!("generate request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body, "generate"));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Transient(format!("generate response parse failed: {e}")))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(Error::Generation("provider returned empty answer".to_string()));
        }
        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        retry_with_backoff("embed", self.embeddings.max_retries, || {
            self.embed_once(text)
        })
        .await
        .map_err(|e| match e {
            Error::RateLimited(msg) | Error::Transient(msg) => Error::EmbeddingUnavailable(msg),
            other => other,
        })
    }

    fn dimensions(&self) -> usize {
        self.embeddings.dimensions
    }

    fn model_id(&self) -> &str {
        &self.embeddings.model
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{BASE_URL}/models?key={}", self.embeddings.api_key);
        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        retry_with_backoff("generate", self.generation.max_retries, || {
            self.generate_once(prompt, max_tokens)
        })
        .await
        .map_err(|e| match e {
            Error::RateLimited(msg) | Error::Transient(msg) => Error::Generation(msg),
            other => other,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Embedder::health_check(self).await
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.generation.model
    }
}
