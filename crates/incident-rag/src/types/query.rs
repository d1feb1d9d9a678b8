//! Query request and retrieval candidate types

use serde::{Deserialize, Serialize};

use crate::retrieval::entities::EntityMatchDetails;

/// Query complexity assigned by the router; drives retrieval parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryComplexity {
    /// The query names an incident id that exists in the corpus
    ExactId,
    /// Single-incident lookup
    Simple,
    /// Multi-incident pattern analysis
    Complex,
    /// No domain anchors or entities; refused without retrieval
    OutOfDomain,
}

impl QueryComplexity {
    /// Number of candidates to retrieve
    pub fn top_k(&self) -> usize {
        match self {
            QueryComplexity::ExactId => 1,
            QueryComplexity::Simple => 3,
            QueryComplexity::Complex => 8,
            QueryComplexity::OutOfDomain => 0,
        }
    }

    /// Minimum fused score for a candidate to survive
    pub fn confidence_floor(&self) -> f32 {
        match self {
            QueryComplexity::ExactId => 0.1,
            _ => 0.3,
        }
    }
}

/// Query endpoint request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Raw user query
    pub query: String,

    /// Include source citations in the response
    #[serde(default = "default_include_sources")]
    pub include_sources: bool,

    /// Upper bound on retrieved incidents; the router may request fewer
    #[serde(default = "default_max_incidents")]
    pub max_incidents: usize,

    /// Minimum fused score for candidates
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
}

fn default_include_sources() -> bool {
    true
}

fn default_max_incidents() -> usize {
    3
}

fn default_confidence_threshold() -> f32 {
    0.3
}

impl QueryRequest {
    /// Create a request with defaults
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            include_sources: true,
            max_incidents: default_max_incidents(),
            confidence_threshold: default_confidence_threshold(),
        }
    }

    /// Set the incident cap
    pub fn with_max_incidents(mut self, max: usize) -> Self {
        self.max_incidents = max;
        self
    }

    /// Set the score threshold
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }
}

/// How a candidate matched the query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Merchant and gateway both match the query entities
    PerfectMerchantGateway,
    /// Only the merchant matches
    MerchantId,
    /// Only the gateway matches
    PaymentGateway,
    /// No entity boost applied
    Semantic,
}

impl MatchKind {
    /// Boost multiplier applied to the fused score
    pub fn multiplier(&self) -> f32 {
        match self {
            MatchKind::PerfectMerchantGateway => 2.5,
            MatchKind::MerchantId => 2.0,
            MatchKind::PaymentGateway => 1.5,
            MatchKind::Semantic => 1.0,
        }
    }

    /// Cap on the boosted score
    pub fn cap(&self) -> f32 {
        match self {
            MatchKind::PerfectMerchantGateway => 1.00,
            MatchKind::MerchantId => 0.95,
            MatchKind::PaymentGateway => 0.85,
            MatchKind::Semantic => 1.00,
        }
    }

    fn base_label(&self) -> &'static str {
        match self {
            MatchKind::PerfectMerchantGateway => "PERFECT_MERCHANT_GATEWAY_MATCH",
            MatchKind::MerchantId => "MERCHANT_ID_MATCH",
            MatchKind::PaymentGateway => "PAYMENT_GATEWAY_MATCH",
            MatchKind::Semantic => "SEMANTIC_MATCH",
        }
    }

    /// Wire label, suffixed under degraded retrieval
    pub fn label(&self, degraded: bool) -> String {
        if degraded {
            format!("{}_DEGRADED", self.base_label())
        } else {
            self.base_label().to_string()
        }
    }
}

/// Ranked candidate emitted by the hybrid retriever
#[derive(Debug, Clone)]
pub struct RetrievalCandidate {
    /// Incident id
    pub incident_id: String,
    /// Dense cosine similarity, `[0,1]`
    pub semantic_score: f32,
    /// BM25 score min-max normalised within the batch, `[0,1]`
    pub bm25_score: f32,
    /// TF-IDF cosine similarity, `[0,1]`
    pub tfidf_score: f32,
    /// Weighted fusion after priority boosts, `[0,1]`
    pub fused_score: f32,
    /// Entity match classification
    pub match_kind: MatchKind,
    /// Whether this candidate came from a degraded retrieval
    pub degraded: bool,
    /// Extracted entity diff between query and candidate
    pub priority_details: EntityMatchDetails,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_k_follows_complexity() {
        assert_eq!(QueryComplexity::ExactId.top_k(), 1);
        assert_eq!(QueryComplexity::Simple.top_k(), 3);
        assert_eq!(QueryComplexity::Complex.top_k(), 8);
    }

    #[test]
    fn confidence_floor_is_lower_for_id_lookups() {
        assert!(QueryComplexity::ExactId.confidence_floor() < QueryComplexity::Simple.confidence_floor());
    }

    #[test]
    fn degraded_label_is_suffixed() {
        assert_eq!(
            MatchKind::MerchantId.label(true),
            "MERCHANT_ID_MATCH_DEGRADED"
        );
        assert_eq!(MatchKind::Semantic.label(false), "SEMANTIC_MATCH");
    }

    #[test]
    fn request_defaults_match_interface() {
        let req: QueryRequest = serde_json::from_str(r#"{"query":"upi timeout"}"#).unwrap();
        assert!(req.include_sources);
        assert_eq!(req.max_incidents, 3);
        assert!((req.confidence_threshold - 0.3).abs() < 1e-6);
    }
}
