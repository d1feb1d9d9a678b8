//! Pinecone REST client implementing the vector index contract

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::VectorIndexConfig;
use crate::error::{Error, Result};

use super::rate_limit::TokenBucket;
use super::retry_with_backoff;
use super::vector_index::{IndexMetadata, VectorIndex, VectorMatch};

/// Pinecone serverless index client
pub struct PineconeIndex {
    client: Client,
    config: VectorIndexConfig,
    limiter: Arc<TokenBucket>,
}

#[derive(Serialize)]
struct UpsertRequest {
    vectors: Vec<UpsertVector>,
}

#[derive(Serialize)]
struct UpsertVector {
    id: String,
    values: Vec<f32>,
    metadata: IndexMetadata,
}

#[derive(Serialize)]
struct DeleteRequest {
    ids: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    vector: Vec<f32>,
    top_k: usize,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<Match>,
}

#[derive(Deserialize)]
struct Match {
    id: String,
    score: f32,
    metadata: Option<IndexMetadata>,
}

impl PineconeIndex {
    /// Create a client for the configured index host
    pub fn new(config: &VectorIndexConfig, limiter: Arc<TokenBucket>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            config: config.clone(),
            limiter,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("https://{}/{}", self.config.host.trim_end_matches('/'), path)
    }

    fn classify_status(status: StatusCode, body: &str, context: &str) -> Error {
        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                Error::RateLimited(format!("{context}: HTTP 429 - {body}"))
            }
            StatusCode::BAD_REQUEST => Error::InvalidInput(format!("{context}: {body}")),
            s if s.is_server_error() => Error::Transient(format!("{context}: HTTP {s} - {body}")),
            s => Error::VectorIndex(format!("{context}: HTTP {s} - {body}")),
        }
    }

    async fn post_json<B: Serialize>(&self, path: &str, body: &B, context: &str) -> Result<reqwest::Response> {
        self.limiter.acquire().await?;

        let response = self
            .client
            .post(self.url(path))
            .header("Api-Key", &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Transient(format!("{context} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body, context));
        }
        Ok(response)
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert(&self, id: &str, vector: &[f32], metadata: IndexMetadata) -> Result<()> {
        let request = UpsertRequest {
            vectors: vec![UpsertVector {
                id: id.to_string(),
                values: vector.to_vec(),
                metadata,
            }],
        };
        retry_with_backoff("vector_upsert", self.config.max_retries, || async {
            self.post_json("vectors/upsert", &request, "upsert").await?;
            Ok(())
        })
        .await
        .map_err(|e| match e {
            Error::Transient(msg) | Error::RateLimited(msg) => Error::VectorIndex(msg),
            other => other,
        })
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let request = DeleteRequest {
            ids: vec![id.to_string()],
        };
        retry_with_backoff("vector_delete", self.config.max_retries, || async {
            self.post_json("vectors/delete", &request, "delete").await?;
            Ok(())
        })
        .await
        .map_err(|e| match e {
            Error::Transient(msg) | Error::RateLimited(msg) => Error::VectorIndex(msg),
            other => other,
        })
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<serde_json::Value>,
    ) -> Result<Vec<VectorMatch>> {
        let request = QueryRequest {
            vector: vector.to_vec(),
            top_k,
            include_metadata: true,
            filter,
        };
        let matches = retry_with_backoff("vector_query", self.config.max_retries, || async {
            let response = self.post_json("query", &request, "query").await?;
            let parsed: QueryResponse = response
                .json()
                .await
                .map_err(|e| Error::Transient(format!("query response parse failed: {e}")))?;
            Ok(parsed.matches)
        })
        .await
        .map_err(|e| match e {
            Error::Transient(msg) | Error::RateLimited(msg) => Error::VectorIndex(msg),
            other => other,
        })?;

        Ok(matches
            .into_iter()
            .map(|m| VectorMatch {
                id: m.id,
                score: m.score.clamp(0.0, 1.0),
                metadata: m.metadata,
            })
            .collect())
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .post(self.url("describe_index_stats"))
            .header("Api-Key", &self.config.api_key)
            .json(&serde_json::json!({}))
            .send()
            .await;
        match response {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "pinecone"
    }
}
