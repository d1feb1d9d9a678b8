//! Query router: classifies intent and selects retrieval parameters
//!
//! Classification is rule-based and deterministic; the generative provider is
//! never consulted here.

use std::sync::Arc;

use regex::Regex;

use crate::sparse::SparseSnapshot;
use crate::types::incident::id_extraction_pattern;
use crate::types::QueryComplexity;

use super::entities::EntityExtractor;

/// Indicators of a multi-incident analysis question
const COMPLEX_INDICATORS: &[&str] = &[
    "why",
    "how often",
    "how frequently",
    "pattern",
    "patterns",
    "root cause",
    "what causes",
    "most common",
];

/// Plural subjects that imply aggregation over incidents
const PLURAL_SUBJECTS: &[&str] = &[
    "failures", "errors", "timeouts", "incidents", "issues", "declines", "refunds", "retries",
];

/// Routing decision for one query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterDecision {
    pub complexity: QueryComplexity,
    /// Present only for `exact_id` routes
    pub exact_id: Option<String>,
}

/// Rule-based query router
pub struct QueryRouter {
    id_re: Regex,
    extractor: Arc<EntityExtractor>,
}

impl QueryRouter {
    /// Create a router sharing the retrieval entity extractor
    pub fn new(extractor: Arc<EntityExtractor>) -> Self {
        Self {
            id_re: id_extraction_pattern(),
            extractor,
        }
    }

    /// Extract the first incident id embedded in the text, upper-cased
    pub fn extract_id(&self, text: &str) -> Option<String> {
        self.id_re
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_uppercase())
    }

    /// Classify the query.
    ///
    /// `known_id` reports whether an id exists in the corpus; ids that match
    /// the pattern but are unknown fall through to the other probes.
    pub fn classify<F>(
        &self,
        text: &str,
        snapshot: &SparseSnapshot,
        known_id: F,
    ) -> RouterDecision
    where
        F: Fn(&str) -> bool,
    {
        // Exact-id probe: first match anywhere in the text
        if let Some(id) = self.extract_id(text) {
            if known_id(&id) {
                tracing::debug!(id = %id, "query routed to exact-id lookup");
                return RouterDecision {
                    complexity: QueryComplexity::ExactId,
                    exact_id: Some(id),
                };
            }
        }

        let lower = text.to_lowercase();

        // Out-of-domain probe: neither anchor terms nor known entities
        let has_anchor = snapshot.anchors().iter().any(|a| lower.contains(a.as_str()));
        if !has_anchor && self.extractor.extract(text).is_empty() {
            return RouterDecision {
                complexity: QueryComplexity::OutOfDomain,
                exact_id: None,
            };
        }

        // Complexity split on question indicators and plural subjects
        let indicator_hits = COMPLEX_INDICATORS
            .iter()
            .filter(|term| lower.contains(*term))
            .count()
            + PLURAL_SUBJECTS
                .iter()
                .filter(|term| {
                    lower
                        .split(|c: char| !c.is_alphanumeric())
                        .any(|w| w == **term)
                })
                .count();

        let complexity = if indicator_hits >= 1 {
            QueryComplexity::Complex
        } else {
            QueryComplexity::Simple
        };

        RouterDecision {
            complexity,
            exact_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::{SparseDoc, SparseSnapshot};

    fn snapshot() -> SparseSnapshot {
        SparseSnapshot::build(vec![SparseDoc {
            id: "JSP-1052".to_string(),
            text: "Webhook SSL failure. Renewed the certificate. Resolution: rotated certs"
                .to_string(),
            tags: vec!["webhook".to_string(), "ssl".to_string()],
        }])
    }

    fn router() -> QueryRouter {
        QueryRouter::new(Arc::new(EntityExtractor::new()))
    }

    #[test]
    fn bare_id_routes_to_exact_lookup() {
        let decision = router().classify("JSP-1052", &snapshot(), |id| id == "JSP-1052");
        assert_eq!(decision.complexity, QueryComplexity::ExactId);
        assert_eq!(decision.exact_id.as_deref(), Some("JSP-1052"));
    }

    #[test]
    fn id_inside_prose_routes_to_exact_lookup() {
        let decision = router().classify(
            "any update on jsp-1052 please",
            &snapshot(),
            |id| id == "JSP-1052",
        );
        assert_eq!(decision.complexity, QueryComplexity::ExactId);
        assert_eq!(decision.exact_id.as_deref(), Some("JSP-1052"));
    }

    #[test]
    fn unknown_id_falls_through() {
        let decision = router().classify("status of JSP-9999 webhook", &snapshot(), |_| false);
        assert_ne!(decision.complexity, QueryComplexity::ExactId);
    }

    #[test]
    fn domain_query_without_indicators_is_simple() {
        let decision = router().classify("UPI timeout", &snapshot(), |_| false);
        assert_eq!(decision.complexity, QueryComplexity::Simple);
    }

    #[test]
    fn why_question_is_complex() {
        let decision = router().classify("why do refunds fail", &snapshot(), |_| false);
        assert_eq!(decision.complexity, QueryComplexity::Complex);
    }

    #[test]
    fn plural_subject_is_complex() {
        let decision = router().classify("payment timeouts across merchants", &snapshot(), |_| false);
        assert_eq!(decision.complexity, QueryComplexity::Complex);
    }

    #[test]
    fn unrelated_query_is_out_of_domain() {
        let decision = router().classify("how to bake a cake", &snapshot(), |_| false);
        assert_eq!(decision.complexity, QueryComplexity::OutOfDomain);
    }

    #[test]
    fn corpus_tag_counts_as_anchor() {
        let decision = router().classify("ssl renewal steps", &snapshot(), |_| false);
        assert_ne!(decision.complexity, QueryComplexity::OutOfDomain);
    }
}
