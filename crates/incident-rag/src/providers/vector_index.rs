//! Vector index provider trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Category, Incident, Priority};

/// Truncation applied to long text fields stored as index metadata
const METADATA_TEXT_CAP: usize = 500;

/// Metadata stored alongside each vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub id: String,
    pub title: String,
    pub description: String,
    pub resolution: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl IndexMetadata {
    /// Project an incident into index metadata, capping long fields
    pub fn from_incident(incident: &Incident) -> Self {
        Self {
            id: incident.id.clone(),
            title: incident.title.clone(),
            description: truncate(&incident.description, METADATA_TEXT_CAP),
            resolution: truncate(&incident.resolution, METADATA_TEXT_CAP),
            tags: incident.tags.clone(),
            created_at: incident.created_at,
            resolved_by: incident.resolved_by.clone(),
            category: incident.category,
            priority: incident.priority,
        }
    }
}

fn truncate(text: &str, cap: usize) -> String {
    if text.len() <= cap {
        return text.to_string();
    }
    let mut end = cap;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// A nearest-neighbour match from the index
#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub id: String,
    /// Cosine similarity
    pub score: f32,
    pub metadata: Option<IndexMetadata>,
}

/// Nearest-neighbour search over fixed-dimension vectors with metadata.
///
/// Implementations:
/// - `PineconeIndex`: managed external index
/// - in-memory fakes in tests
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace a vector
    async fn upsert(&self, id: &str, vector: &[f32], metadata: IndexMetadata) -> Result<()>;

    /// Remove a vector
    async fn delete(&self, id: &str) -> Result<()>;

    /// Nearest neighbours by cosine similarity, optionally filtered by metadata
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<serde_json::Value>,
    ) -> Result<Vec<VectorMatch>>;

    /// Check if the provider is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}
