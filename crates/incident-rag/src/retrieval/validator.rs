//! Semantic validator: gates candidates before generation
//!
//! Exists to keep the generator from hallucinating an answer out of weakly
//! related incidents. A very strong hybrid match can carry a weak semantic
//! theme, and a strong semantic theme can carry a moderate hybrid score.

use std::sync::Arc;

use crate::types::{Incident, RefusalReason, RetrievalCandidate};

use super::entities::EntityExtractor;

/// Fused-score threshold above which the hybrid match is trusted outright
const TRUSTED_FUSED_SCORE: f32 = 0.8;
/// Minimum composite relevance for admission
const COMPOSITE_FLOOR: f32 = 0.3;

const DOMAIN_WEIGHT: f32 = 0.5;
const ENTITY_WEIGHT: f32 = 0.3;
const INTENT_WEIGHT: f32 = 0.2;

/// Verbs that signal a troubleshooting intent
const TROUBLESHOOTING_TERMS: &[&str] = &[
    "failed", "failing", "fails", "failure", "stuck", "error", "errors", "timeout", "timing",
    "blocked", "broken", "declined", "reset", "crash", "down",
];

/// Primary payment domain of a text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Wallet,
    Card,
    Upi,
    Webhook,
    Gateway,
    General,
}

impl Domain {
    /// Classify text by its dominant domain vocabulary
    pub fn of(text: &str) -> Self {
        let lower = text.to_lowercase();
        let has = |terms: &[&str]| terms.iter().any(|t| lower.contains(t));

        if has(&["wallet", "mobikwik", "paytm", "amazonpay", "freecharge"]) {
            Domain::Wallet
        } else if has(&["card", "visa", "mastercard", "rupay", "debit", "credit", "tokenization"]) {
            Domain::Card
        } else if has(&["upi", "bhim", "collect", "mandate"]) {
            Domain::Upi
        } else if has(&["webhook", "callback", "notification"]) {
            Domain::Webhook
        } else if has(&["gateway", "api", "integration"]) {
            Domain::Gateway
        } else {
            Domain::General
        }
    }

    /// Domain compatibility: identical 1.0, adjacent 0.5, unrelated 0.0.
    /// Gateway and General sit adjacent to every concrete domain.
    pub fn compatibility(self, other: Domain) -> f32 {
        if self == other {
            1.0
        } else if matches!(self, Domain::Gateway | Domain::General)
            || matches!(other, Domain::Gateway | Domain::General)
        {
            0.5
        } else {
            0.0
        }
    }
}

/// Outcome of validating a candidate set
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub admitted: bool,
    /// Best composite relevance across the candidates
    pub best_composite: f32,
    /// Present when the set was rejected
    pub reason: Option<RefusalReason>,
}

/// Gates retrieved candidates on topical admissibility
pub struct SemanticValidator {
    extractor: Arc<EntityExtractor>,
}

impl SemanticValidator {
    /// Create a validator sharing the retrieval entity extractor
    pub fn new(extractor: Arc<EntityExtractor>) -> Self {
        Self { extractor }
    }

    /// Decide whether the ordered candidate set may reach the generator
    pub fn validate(
        &self,
        query: &str,
        candidates: &[(Incident, RetrievalCandidate)],
    ) -> ValidationReport {
        if candidates.is_empty() {
            return ValidationReport {
                admitted: false,
                best_composite: 0.0,
                reason: Some(RefusalReason::NoCandidates),
            };
        }

        let query_domain = Domain::of(query);
        let query_entities = self.extractor.extract(query);
        let troubleshooting = is_troubleshooting(query);

        let mut best_composite = 0.0f32;
        for (incident, candidate) in candidates {
            let text = incident.entity_text();

            let domain_match = query_domain.compatibility(Domain::of(&text));
            let candidate_entities = self.extractor.extract(&text);
            let entity_overlap = query_entities.overlap(&candidate_entities) as f32
                / query_entities.all().len().max(1) as f32;
            let intent_alignment =
                if troubleshooting && !incident.resolution.trim().is_empty() {
                    1.0
                } else {
                    0.0
                };

            let composite = DOMAIN_WEIGHT * domain_match
                + ENTITY_WEIGHT * entity_overlap
                + INTENT_WEIGHT * intent_alignment;

            tracing::debug!(
                incident_id = %candidate.incident_id,
                domain_match,
                entity_overlap,
                intent_alignment,
                composite,
                "candidate relevance"
            );

            best_composite = best_composite.max(composite);
        }

        let top_fused = candidates[0].1.fused_score;
        let admitted = top_fused >= TRUSTED_FUSED_SCORE || best_composite >= COMPOSITE_FLOOR;

        ValidationReport {
            admitted,
            best_composite,
            reason: (!admitted).then_some(RefusalReason::InsufficientSemanticOverlap),
        }
    }
}

fn is_troubleshooting(query: &str) -> bool {
    let lower = query.to_lowercase();
    TROUBLESHOOTING_TERMS
        .iter()
        .any(|t| lower.contains(t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MatchKind;
    use chrono::Utc;

    fn incident(id: &str, title: &str, tags: &[&str]) -> Incident {
        Incident {
            id: id.to_string(),
            title: title.to_string(),
            description: format!("{title}. Impact lasted roughly forty minutes across two merchants."),
            resolution: "Reconfigured the integration and replayed the queue.".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            created_at: Utc::now(),
            resolved_by: "oncall@example.com".to_string(),
            category: None,
            priority: None,
        }
    }

    fn candidate(id: &str, fused: f32) -> RetrievalCandidate {
        RetrievalCandidate {
            incident_id: id.to_string(),
            semantic_score: fused,
            bm25_score: fused,
            tfidf_score: fused,
            fused_score: fused,
            match_kind: MatchKind::Semantic,
            degraded: false,
            priority_details: Default::default(),
        }
    }

    #[test]
    fn empty_candidate_set_is_rejected() {
        let validator = SemanticValidator::new(Arc::new(EntityExtractor::new()));
        let report = validator.validate("upi timeout", &[]);
        assert!(!report.admitted);
        assert_eq!(report.reason, Some(RefusalReason::NoCandidates));
    }

    #[test]
    fn same_domain_troubleshooting_query_is_admitted() {
        let validator = SemanticValidator::new(Arc::new(EntityExtractor::new()));
        let set = vec![(
            incident("JSP-1", "UPI timeout on Axis Bank", &["upi"]),
            candidate("JSP-1", 0.5),
        )];
        let report = validator.validate("UPI timeout", &set);
        assert!(report.admitted);
        assert!(report.best_composite >= 0.3);
    }

    #[test]
    fn strong_hybrid_score_carries_weak_theme() {
        let validator = SemanticValidator::new(Arc::new(EntityExtractor::new()));
        let set = vec![(
            incident("JSP-1", "Settlement report delayed", &["settlement"]),
            candidate("JSP-1", 0.85),
        )];
        let report = validator.validate("random nonsense words", &set);
        assert!(report.admitted);
    }

    #[test]
    fn unrelated_candidates_are_rejected() {
        let validator = SemanticValidator::new(Arc::new(EntityExtractor::new()));
        let set = vec![(
            incident("JSP-1", "Wallet balance sync drift for Mobikwik", &["wallet"]),
            candidate("JSP-1", 0.2),
        )];
        let report = validator.validate("card chargeback dispute form", &set);
        assert!(!report.admitted);
        assert_eq!(
            report.reason,
            Some(RefusalReason::InsufficientSemanticOverlap)
        );
    }

    #[test]
    fn domain_compatibility_is_graded() {
        assert_eq!(Domain::Upi.compatibility(Domain::Upi), 1.0);
        assert_eq!(Domain::Upi.compatibility(Domain::Gateway), 0.5);
        assert_eq!(Domain::Upi.compatibility(Domain::Card), 0.0);
    }
}
