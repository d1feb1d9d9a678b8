//! Response types for the query and feedback endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::incident::{Category, Incident, Priority};
use super::query::{QueryComplexity, RetrievalCandidate};

/// Strategy the engine used to answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RagStrategy {
    /// Direct corpus lookup, retrieval bypassed
    ExactIdLookup,
    /// Full hybrid retrieval, validation and generation
    HybridRag,
    /// No admissible evidence; generator not consulted
    Refusal,
}

/// Why a query was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefusalReason {
    NoCandidates,
    InsufficientSemanticOverlap,
    OutOfDomain,
}

/// Response status advertised in metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Ok,
    Refused,
    Degraded,
}

/// Bucketed confidence level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    /// Bucket a confidence score: `<0.3` low, `<0.7` medium, else high
    pub fn from_score(score: f32) -> Self {
        if score < 0.3 {
            ConfidenceLevel::Low
        } else if score < 0.7 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::High
        }
    }
}

/// An incident as returned to the caller, with its retrieval scores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedIncident {
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
    pub semantic_score: f32,
    pub bm25_score: f32,
    pub tfidf_score: f32,
    /// Authoritative score for downstream consumers
    pub fused_score: f32,
    pub match_type: String,
    pub priority_details: crate::retrieval::entities::EntityMatchDetails,
}

impl RetrievedIncident {
    /// Combine a corpus record with its retrieval scores
    pub fn from_candidate(incident: &Incident, candidate: &RetrievalCandidate) -> Self {
        Self {
            id: incident.id.clone(),
            title: incident.title.clone(),
            description: incident.description.clone(),
            resolution: incident.resolution.clone(),
            tags: incident.tags.clone(),
            created_at: incident.created_at,
            resolved_by: incident.resolved_by.clone(),
            category: incident.category,
            priority: incident.priority,
            semantic_score: candidate.semantic_score,
            bm25_score: candidate.bm25_score,
            tfidf_score: candidate.tfidf_score,
            fused_score: candidate.fused_score,
            match_type: candidate.match_kind.label(candidate.degraded),
            priority_details: candidate.priority_details.clone(),
        }
    }

    /// Exact-id lookups carry perfect scores and no entity diff
    pub fn from_exact(incident: &Incident) -> Self {
        Self {
            id: incident.id.clone(),
            title: incident.title.clone(),
            description: incident.description.clone(),
            resolution: incident.resolution.clone(),
            tags: incident.tags.clone(),
            created_at: incident.created_at,
            resolved_by: incident.resolved_by.clone(),
            category: incident.category,
            priority: incident.priority,
            semantic_score: 1.0,
            bm25_score: 1.0,
            tfidf_score: 1.0,
            fused_score: 1.0,
            match_type: "EXACT_ID".to_string(),
            priority_details: Default::default(),
        }
    }
}

/// Response metadata sub-object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub confidence_level: ConfidenceLevel,
    pub incidents_retrieved: usize,
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refusal_reason: Option<RefusalReason>,
    /// Query after injection stripping, recorded for audit
    pub sanitized_query: String,
    pub correlation_id: Uuid,
}

/// Structured response from the query endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagResponse {
    pub query: String,
    pub generated_answer: String,
    pub retrieved_incidents: Vec<RetrievedIncident>,
    /// Incident ids cited in the answer, a subset of `retrieved_incidents`
    pub sources: Vec<String>,
    pub confidence_score: f32,
    pub query_complexity: QueryComplexity,
    pub execution_time_ms: u64,
    pub rag_strategy: RagStrategy,
    pub metadata: ResponseMetadata,
}

impl RagResponse {
    /// Build a refusal: a first-class answer stating that no admissible
    /// evidence exists. The generative provider is never consulted.
    pub fn refusal(
        query: String,
        sanitized_query: String,
        complexity: QueryComplexity,
        reason: RefusalReason,
        execution_time_ms: u64,
        correlation_id: Uuid,
    ) -> Self {
        let answer = refusal_answer(&sanitized_query, reason);
        Self {
            query,
            generated_answer: answer,
            retrieved_incidents: Vec::new(),
            sources: Vec::new(),
            confidence_score: 0.0,
            query_complexity: complexity,
            execution_time_ms,
            rag_strategy: RagStrategy::Refusal,
            metadata: ResponseMetadata {
                confidence_level: ConfidenceLevel::Low,
                incidents_retrieved: 0,
                status: ResponseStatus::Refused,
                refusal_reason: Some(reason),
                sanitized_query,
                correlation_id,
            },
        }
    }
}

fn refusal_answer(query: &str, reason: RefusalReason) -> String {
    match reason {
        RefusalReason::OutOfDomain => format!(
            "No relevant incidents found: \"{}\" does not appear to concern the \
             payment systems covered by this knowledge base.",
            query
        ),
        RefusalReason::NoCandidates => format!(
            "No relevant incidents found for \"{}\". The knowledge base has no \
             past incident close enough to ground a suggestion.",
            query
        ),
        RefusalReason::InsufficientSemanticOverlap => format!(
            "No relevant incidents found for \"{}\". The closest past incidents \
             do not overlap enough with this issue to suggest a fix safely.",
            query
        ),
    }
}

/// Feedback endpoint request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub query: String,
    pub result_id: String,
    /// 1..=5
    pub rating: u8,
    pub helpful: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_text: Option<String>,
}

/// Stored feedback record; immutable once written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: Uuid,
    pub query: String,
    pub result_id: String,
    pub rating: u8,
    pub helpful: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_buckets() {
        assert_eq!(ConfidenceLevel::from_score(0.0), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_score(0.29), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_score(0.3), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.69), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.7), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(1.0), ConfidenceLevel::High);
    }

    #[test]
    fn refusal_has_no_sources_and_zero_confidence() {
        let response = RagResponse::refusal(
            "how to bake a cake".to_string(),
            "how to bake a cake".to_string(),
            QueryComplexity::OutOfDomain,
            RefusalReason::OutOfDomain,
            5,
            Uuid::new_v4(),
        );
        assert_eq!(response.rag_strategy, RagStrategy::Refusal);
        assert!(response.sources.is_empty());
        assert_eq!(response.confidence_score, 0.0);
        assert_eq!(response.metadata.status, ResponseStatus::Refused);
        assert_eq!(
            response.metadata.refusal_reason,
            Some(RefusalReason::OutOfDomain)
        );
    }
}
