//! Hybrid retriever: dense + BM25 + TF-IDF fusion with priority boosts

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::config::RetrievalConfig;
use crate::providers::{Embedder, VectorIndex};
use crate::sparse::SparseSnapshot;
use crate::types::{Incident, MatchKind, RetrievalCandidate};

use super::entities::{EntityExtractor, ExtractedEntities};

/// Result of one retrieval pass
#[derive(Debug, Default)]
pub struct RetrievalOutcome {
    /// Ranked candidates, best first
    pub candidates: Vec<RetrievalCandidate>,
    /// True when one of the two retrieval paths failed
    pub degraded: bool,
}

#[derive(Default, Clone, Copy)]
struct SubScores {
    semantic: f32,
    bm25: f32,
    tfidf: f32,
}

/// Fuses three retrieval signals into one ranked candidate list
pub struct HybridRetriever {
    embedder: Arc<dyn Embedder>,
    vector: Arc<dyn VectorIndex>,
    extractor: Arc<EntityExtractor>,
    weights: RetrievalConfig,
}

impl HybridRetriever {
    /// Create a retriever over the given providers
    pub fn new(
        embedder: Arc<dyn Embedder>,
        vector: Arc<dyn VectorIndex>,
        extractor: Arc<EntityExtractor>,
        weights: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            vector,
            extractor,
            weights,
        }
    }

    /// Run the three sub-searches concurrently and fuse the results.
    ///
    /// If the dense path fails or exceeds the deadline, retrieval degrades to
    /// sparse-only; if the sparse snapshot is unavailable, semantic-only is
    /// used. If both fail the outcome is empty and the caller refuses.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        snapshot: &SparseSnapshot,
        lookup: &(dyn Fn(&str) -> Option<Incident> + Sync),
        deadline: Duration,
    ) -> RetrievalOutcome {
        let fetch = top_k * 2;

        let dense_fut = async {
            let vector = self.embedder.embed(query).await?;
            self.vector.query(&vector, fetch, None).await
        };

        let (dense_result, (bm25_results, tfidf_results)) = tokio::join!(
            timeout(deadline, dense_fut),
            async {
                (
                    snapshot.search_bm25(query, fetch),
                    snapshot.search_tfidf(query, fetch),
                )
            }
        );

        let (dense_results, dense_failed) = match dense_result {
            Ok(Ok(matches)) => (matches, false),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "dense retrieval failed, degrading to sparse-only");
                (Vec::new(), true)
            }
            Err(_) => {
                tracing::warn!(
                    deadline_ms = deadline.as_millis() as u64,
                    "dense retrieval exceeded deadline, degrading to sparse-only"
                );
                (Vec::new(), true)
            }
        };

        let sparse_failed = snapshot.is_empty();
        if dense_failed && sparse_failed {
            tracing::warn!("both retrieval paths failed");
            return RetrievalOutcome {
                candidates: Vec::new(),
                degraded: true,
            };
        }
        if sparse_failed && !dense_failed {
            tracing::warn!("sparse index unavailable, using semantic-only retrieval");
        }

        let degraded = dense_failed || sparse_failed;

        // Union-merge by incident id; missing sub-scores default to 0
        let mut merged: HashMap<String, SubScores> = HashMap::new();
        for m in dense_results {
            merged.entry(m.id).or_default().semantic = m.score.clamp(0.0, 1.0);
        }
        for (id, score) in bm25_results {
            merged.entry(id).or_default().bm25 = score;
        }
        for (id, score) in tfidf_results {
            merged.entry(id).or_default().tfidf = score.clamp(0.0, 1.0);
        }

        let query_entities = self.extractor.extract(query);

        let mut candidates: Vec<RetrievalCandidate> = merged
            .into_iter()
            .filter_map(|(id, scores)| {
                let incident = lookup(&id)?;
                Some(self.fuse(&id, scores, &query_entities, &incident, degraded))
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.fused_score
                .partial_cmp(&a.fused_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    b.semantic_score
                        .partial_cmp(&a.semantic_score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.incident_id.cmp(&b.incident_id))
        });
        candidates.truncate(top_k);

        RetrievalOutcome {
            candidates,
            degraded,
        }
    }

    /// Weighted base fusion followed by the entity priority boost
    fn fuse(
        &self,
        id: &str,
        scores: SubScores,
        query_entities: &ExtractedEntities,
        incident: &Incident,
        degraded: bool,
    ) -> RetrievalCandidate {
        let base = self.weights.semantic_weight * scores.semantic
            + self.weights.bm25_weight * scores.bm25
            + self.weights.tfidf_weight * scores.tfidf;

        let candidate_entities = self.extractor.extract(&incident.entity_text());
        let details = self
            .extractor
            .match_details(query_entities, &candidate_entities);

        let match_kind = match (details.merchant_match, details.gateway_match) {
            (true, true) => MatchKind::PerfectMerchantGateway,
            (true, false) => MatchKind::MerchantId,
            (false, true) => MatchKind::PaymentGateway,
            (false, false) => MatchKind::Semantic,
        };

        let fused = (base * match_kind.multiplier()).min(match_kind.cap());

        RetrievalCandidate {
            incident_id: id.to_string(),
            semantic_score: scores.semantic,
            bm25_score: scores.bm25,
            tfidf_score: scores.tfidf,
            fused_score: fused.clamp(0.0, 1.0),
            match_kind,
            degraded,
            priority_details: details,
        }
    }
}
