//! The RAG pipeline: classify → retrieve → validate → generate
//!
//! Refusals are first-class responses; only genuine faults surface as errors.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use uuid::Uuid;

use crate::config::RetrievalConfig;
use crate::corpus::CorpusManager;
use crate::error::{Error, Result};
use crate::generation::{sanitize_query, GroundedGenerator};
use crate::retrieval::{HybridRetriever, QueryRouter, SemanticValidator};
use crate::sparse::SparseIndex;
use crate::types::{
    ConfidenceLevel, Incident, QueryComplexity, QueryRequest, RagResponse, RagStrategy,
    RefusalReason, ResponseMetadata, ResponseStatus, RetrievalCandidate, RetrievedIncident,
};

/// Confidence multiplier applied under degraded retrieval
const DEGRADATION_FACTOR: f32 = 0.6;
/// Hybrid answers stay below the exact-lookup confidence ceiling
const HYBRID_CONFIDENCE_CEILING: f32 = 0.99;
/// Raw queries longer than this are rejected outright
const MAX_RAW_QUERY_LEN: usize = 4000;

/// Per-process query counters for the stats endpoint
#[derive(Debug, Default)]
pub struct QueryCounters {
    simple: AtomicU64,
    complex: AtomicU64,
    exact_id: AtomicU64,
    out_of_domain: AtomicU64,
    refused: AtomicU64,
    degraded: AtomicU64,
}

/// Snapshot of the counters
#[derive(Debug, Clone, Serialize)]
pub struct QueryCounterSnapshot {
    pub simple: u64,
    pub complex: u64,
    pub exact_id: u64,
    pub out_of_domain: u64,
    pub refused: u64,
    pub degraded: u64,
}

impl QueryCounters {
    fn record_complexity(&self, complexity: QueryComplexity) {
        let counter = match complexity {
            QueryComplexity::Simple => &self.simple,
            QueryComplexity::Complex => &self.complex,
            QueryComplexity::ExactId => &self.exact_id,
            QueryComplexity::OutOfDomain => &self.out_of_domain,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counter values
    pub fn snapshot(&self) -> QueryCounterSnapshot {
        QueryCounterSnapshot {
            simple: self.simple.load(Ordering::Relaxed),
            complex: self.complex.load(Ordering::Relaxed),
            exact_id: self.exact_id.load(Ordering::Relaxed),
            out_of_domain: self.out_of_domain.load(Ordering::Relaxed),
            refused: self.refused.load(Ordering::Relaxed),
            degraded: self.degraded.load(Ordering::Relaxed),
        }
    }
}

/// Orchestrates one query through the four subsystems
pub struct RagPipeline {
    router: QueryRouter,
    retriever: HybridRetriever,
    validator: SemanticValidator,
    generator: GroundedGenerator,
    corpus: Arc<CorpusManager>,
    sparse: Arc<SparseIndex>,
    config: RetrievalConfig,
    counters: QueryCounters,
}

impl RagPipeline {
    /// Wire the pipeline together
    pub fn new(
        router: QueryRouter,
        retriever: HybridRetriever,
        validator: SemanticValidator,
        generator: GroundedGenerator,
        corpus: Arc<CorpusManager>,
        sparse: Arc<SparseIndex>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            router,
            retriever,
            validator,
            generator,
            corpus,
            sparse,
            config,
            counters: QueryCounters::default(),
        }
    }

    /// Query counters for the stats endpoint
    pub fn counters(&self) -> QueryCounterSnapshot {
        self.counters.snapshot()
    }

    /// Answer one query
    pub async fn query(&self, request: &QueryRequest) -> Result<RagResponse> {
        let started = Instant::now();
        let correlation_id = Uuid::new_v4();

        let raw = request.query.trim().to_string();
        if raw.is_empty() {
            return Err(Error::InvalidInput("query must not be empty".to_string()));
        }
        if raw.len() > MAX_RAW_QUERY_LEN {
            return Err(Error::InvalidInput(format!(
                "query exceeds {MAX_RAW_QUERY_LEN} characters"
            )));
        }
        let sanitized = sanitize_query(&raw);
        if sanitized.is_empty() {
            return Err(Error::InvalidInput(
                "query is empty after sanitisation".to_string(),
            ));
        }

        tracing::info!(correlation_id = %correlation_id, query = %sanitized, "query received");

        let snapshot = self.sparse.snapshot();
        let decision = self
            .router
            .classify(&sanitized, &snapshot, |id| self.corpus.contains(id));
        self.counters.record_complexity(decision.complexity);

        match decision.complexity {
            QueryComplexity::ExactId => {
                let id = decision
                    .exact_id
                    .ok_or_else(|| Error::Internal("exact-id route without id".to_string()))?;
                self.exact_lookup(raw, sanitized, &id, started, correlation_id)
            }
            QueryComplexity::OutOfDomain => {
                self.counters.refused.fetch_add(1, Ordering::Relaxed);
                Ok(RagResponse::refusal(
                    raw,
                    sanitized,
                    QueryComplexity::OutOfDomain,
                    RefusalReason::OutOfDomain,
                    elapsed_ms(started),
                    correlation_id,
                ))
            }
            complexity => {
                self.hybrid_query(request, raw, sanitized, complexity, started, correlation_id)
                    .await
            }
        }
    }

    /// Exact-id short circuit: no retrieval, no generator call
    fn exact_lookup(
        &self,
        raw: String,
        sanitized: String,
        id: &str,
        started: Instant,
        correlation_id: Uuid,
    ) -> Result<RagResponse> {
        // The router verified existence; a tombstone racing in between is a
        // refusal, not an error
        let Some(incident) = self.corpus.get(id) else {
            self.counters.refused.fetch_add(1, Ordering::Relaxed);
            return Ok(RagResponse::refusal(
                raw,
                sanitized,
                QueryComplexity::ExactId,
                RefusalReason::NoCandidates,
                elapsed_ms(started),
                correlation_id,
            ));
        };

        let answer = self.generator.format_exact(&incident);
        Ok(RagResponse {
            query: raw,
            generated_answer: answer,
            retrieved_incidents: vec![RetrievedIncident::from_exact(&incident)],
            sources: vec![incident.id.clone()],
            confidence_score: 1.0,
            query_complexity: QueryComplexity::ExactId,
            execution_time_ms: elapsed_ms(started),
            rag_strategy: RagStrategy::ExactIdLookup,
            metadata: ResponseMetadata {
                confidence_level: ConfidenceLevel::High,
                incidents_retrieved: 1,
                status: ResponseStatus::Ok,
                refusal_reason: None,
                sanitized_query: sanitized,
                correlation_id,
            },
        })
    }

    async fn hybrid_query(
        &self,
        request: &QueryRequest,
        raw: String,
        sanitized: String,
        complexity: QueryComplexity,
        started: Instant,
        correlation_id: Uuid,
    ) -> Result<RagResponse> {
        let top_k = complexity.top_k().min(request.max_incidents.max(1));
        let floor = request.confidence_threshold;

        let snapshot = self.sparse.snapshot();
        let corpus = self.corpus.clone();
        let lookup = move |id: &str| corpus.get(id);

        let mut outcome = self
            .retriever
            .retrieve(
                &sanitized,
                top_k,
                &snapshot,
                &lookup,
                self.config.request_deadline(),
            )
            .await;

        if outcome.degraded {
            self.counters.degraded.fetch_add(1, Ordering::Relaxed);
        }

        outcome.candidates.retain(|c| c.fused_score >= floor);

        let pairs: Vec<(Incident, RetrievalCandidate)> = outcome
            .candidates
            .into_iter()
            .filter_map(|c| self.corpus.get(&c.incident_id).map(|i| (i, c)))
            .collect();

        if pairs.is_empty() {
            self.counters.refused.fetch_add(1, Ordering::Relaxed);
            return Ok(RagResponse::refusal(
                raw,
                sanitized,
                complexity,
                RefusalReason::NoCandidates,
                elapsed_ms(started),
                correlation_id,
            ));
        }

        let report = self.validator.validate(&sanitized, &pairs);
        if !report.admitted {
            self.counters.refused.fetch_add(1, Ordering::Relaxed);
            return Ok(RagResponse::refusal(
                raw,
                sanitized,
                complexity,
                report
                    .reason
                    .unwrap_or(RefusalReason::InsufficientSemanticOverlap),
                elapsed_ms(started),
                correlation_id,
            ));
        }

        let (answer, mut sources) = self.generator.answer(&sanitized, complexity, &pairs).await;

        let top_fused = pairs[0].1.fused_score;
        let degradation = if outcome.degraded {
            DEGRADATION_FACTOR
        } else {
            1.0
        };
        let confidence = (top_fused.min(report.best_composite) * degradation)
            .clamp(0.0, HYBRID_CONFIDENCE_CEILING);

        let retrieved: Vec<RetrievedIncident> = pairs
            .iter()
            .map(|(incident, candidate)| RetrievedIncident::from_candidate(incident, candidate))
            .collect();

        if !request.include_sources {
            sources.clear();
        }

        let status = if outcome.degraded {
            ResponseStatus::Degraded
        } else {
            ResponseStatus::Ok
        };

        tracing::info!(
            correlation_id = %correlation_id,
            incidents = retrieved.len(),
            confidence,
            degraded = outcome.degraded,
            execution_time_ms = elapsed_ms(started),
            "query answered"
        );

        Ok(RagResponse {
            query: raw,
            generated_answer: answer,
            retrieved_incidents: retrieved,
            sources,
            confidence_score: confidence,
            query_complexity: complexity,
            execution_time_ms: elapsed_ms(started),
            rag_strategy: RagStrategy::HybridRag,
            metadata: ResponseMetadata {
                confidence_level: ConfidenceLevel::from_score(confidence),
                incidents_retrieved: pairs.len(),
                status,
                refusal_reason: None,
                sanitized_query: sanitized,
                correlation_id,
            },
        })
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
