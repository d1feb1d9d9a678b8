//! In-process sparse retrieval: BM25 + TF-IDF over the incident corpus
//!
//! Readers hold an `Arc` to an immutable snapshot; writers build a new
//! snapshot and publish it with a pointer swap. Readers in flight continue on
//! the old snapshot.

pub mod bm25;
pub mod tfidf;
pub mod tokenize;

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::Incident;
use bm25::Bm25Index;
use tfidf::TfidfIndex;
use tokenize::tokenize;

/// Seed anchor terms for the query router's domain probe, unioned with
/// corpus tags at snapshot build time
const DOMAIN_SEED_TERMS: &[&str] = &[
    "payment", "upi", "gateway", "transaction", "card", "wallet", "bank", "refund", "settlement",
    "webhook", "api", "integration", "timeout", "error", "failure", "processing", "authorization",
    "authentication", "merchant", "tokenization", "checkout", "netbanking", "mandate", "payout",
];

/// A document as the sparse indices see it
#[derive(Debug, Clone)]
pub struct SparseDoc {
    pub id: String,
    pub text: String,
    pub tags: Vec<String>,
}

impl SparseDoc {
    /// Project an incident into its sparse-index form
    pub fn from_incident(incident: &Incident) -> Self {
        Self {
            id: incident.id.clone(),
            text: incident.training_text(),
            tags: incident.tags.clone(),
        }
    }
}

/// A change applied to the sparse index
#[derive(Debug, Clone)]
pub enum SparsePatch {
    Upsert(SparseDoc),
    Delete(String),
}

/// Immutable snapshot: both indices plus the router's domain anchor set,
/// published atomically
pub struct SparseSnapshot {
    docs: Vec<SparseDoc>,
    bm25: Bm25Index,
    tfidf: TfidfIndex,
    anchors: HashSet<String>,
}

impl SparseSnapshot {
    /// Build a snapshot from scratch
    pub fn build(mut docs: Vec<SparseDoc>) -> Self {
        docs.sort_by(|a, b| a.id.cmp(&b.id));

        let bm25_docs: Vec<(String, Vec<String>)> = docs
            .iter()
            .map(|d| (d.id.clone(), tokenize(&d.text)))
            .collect();
        let tfidf_docs: Vec<(String, String)> = docs
            .iter()
            .map(|d| (d.id.clone(), d.text.clone()))
            .collect();

        let mut anchors: HashSet<String> =
            DOMAIN_SEED_TERMS.iter().map(|t| t.to_string()).collect();
        for doc in &docs {
            for tag in &doc.tags {
                let tag = tag.trim().to_lowercase();
                if tag.len() > 1 {
                    anchors.insert(tag);
                }
            }
        }

        Self {
            bm25: Bm25Index::build(&bm25_docs),
            tfidf: TfidfIndex::build(&tfidf_docs),
            anchors,
            docs,
        }
    }

    /// Snapshot with no documents
    pub fn empty() -> Self {
        Self::build(Vec::new())
    }

    /// BM25 search with scores min-max normalised to `[0,1]` within the batch
    pub fn search_bm25(&self, query: &str, k: usize) -> Vec<(String, f32)> {
        let raw = self.bm25.search(&tokenize(query), k);
        normalise_batch(raw)
    }

    /// TF-IDF cosine search; already in `[0,1]`
    pub fn search_tfidf(&self, query: &str, k: usize) -> Vec<(String, f32)> {
        self.tfidf.search(query, k)
    }

    /// Whether an id is indexed
    pub fn contains(&self, id: &str) -> bool {
        self.docs.iter().any(|d| d.id == id)
    }

    /// Domain anchor terms for the router
    pub fn anchors(&self) -> &HashSet<String> {
        &self.anchors
    }

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Whether the snapshot holds no documents
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// BM25 vocabulary size
    pub fn vocab_size(&self) -> usize {
        self.bm25.vocab_size()
    }

    /// TF-IDF feature count
    pub fn feature_count(&self) -> usize {
        self.tfidf.feature_count()
    }

    /// All indexed ids
    pub fn ids(&self) -> Vec<String> {
        self.docs.iter().map(|d| d.id.clone()).collect()
    }

    fn with_patch(&self, patch: SparsePatch) -> Self {
        let mut docs = self.docs.clone();
        match patch {
            SparsePatch::Upsert(doc) => {
                docs.retain(|d| d.id != doc.id);
                docs.push(doc);
            }
            SparsePatch::Delete(id) => {
                docs.retain(|d| d.id != id);
            }
        }
        Self::build(docs)
    }
}

/// Reader-many / writer-one wrapper around the current snapshot
pub struct SparseIndex {
    snapshot: RwLock<Arc<SparseSnapshot>>,
}

impl Default for SparseIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SparseIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(SparseSnapshot::empty())),
        }
    }

    /// Current snapshot; cheap to clone, safe to hold across awaits
    pub fn snapshot(&self) -> Arc<SparseSnapshot> {
        self.snapshot.read().clone()
    }

    /// Rebuild from the full corpus and publish
    pub fn rebuild(&self, incidents: &[Incident]) {
        let docs = incidents.iter().map(SparseDoc::from_incident).collect();
        let next = Arc::new(SparseSnapshot::build(docs));
        tracing::debug!(docs = next.len(), "sparse index rebuilt");
        *self.snapshot.write() = next;
    }

    /// Apply a single change and publish the resulting snapshot
    pub fn patch(&self, patch: SparsePatch) {
        let current = self.snapshot();
        let next = Arc::new(current.with_patch(patch));
        *self.snapshot.write() = next;
    }
}

/// Min-max normalise a score batch to `[0,1]`; a uniform batch maps to 1.0
fn normalise_batch(mut results: Vec<(String, f32)>) -> Vec<(String, f32)> {
    if results.is_empty() {
        return results;
    }
    let min = results.iter().map(|(_, s)| *s).fold(f32::INFINITY, f32::min);
    let max = results
        .iter()
        .map(|(_, s)| *s)
        .fold(f32::NEG_INFINITY, f32::max);

    if (max - min).abs() < f32::EPSILON {
        for (_, s) in results.iter_mut() {
            *s = 1.0;
        }
    } else {
        for (_, s) in results.iter_mut() {
            *s = (*s - min) / (max - min);
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn incident(id: &str, title: &str, tags: &[&str]) -> Incident {
        Incident {
            id: id.to_string(),
            title: title.to_string(),
            description: format!("{title}. The issue persisted through several retries before the root cause surfaced."),
            resolution: "Applied the documented configuration fix and verified recovery.".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            created_at: Utc::now(),
            resolved_by: "oncall@example.com".to_string(),
            category: None,
            priority: None,
        }
    }

    #[test]
    fn rebuild_publishes_new_snapshot() {
        let index = SparseIndex::new();
        let old = index.snapshot();
        index.rebuild(&[incident("JSP-1", "UPI timeout on Axis Bank", &["upi"])]);
        let new = index.snapshot();
        assert!(old.is_empty());
        assert_eq!(new.len(), 1);
        assert!(new.contains("JSP-1"));
    }

    #[test]
    fn readers_keep_the_old_snapshot() {
        let index = SparseIndex::new();
        index.rebuild(&[incident("JSP-1", "UPI timeout on Axis Bank", &["upi"])]);
        let held = index.snapshot();
        index.patch(SparsePatch::Delete("JSP-1".to_string()));
        assert!(held.contains("JSP-1"));
        assert!(!index.snapshot().contains("JSP-1"));
    }

    #[test]
    fn patch_upsert_replaces_existing_doc() {
        let index = SparseIndex::new();
        index.rebuild(&[incident("JSP-1", "UPI timeout on Axis Bank", &["upi"])]);
        index.patch(SparsePatch::Upsert(SparseDoc {
            id: "JSP-1".to_string(),
            text: "Webhook SSL failure after certificate rotation".to_string(),
            tags: vec!["webhook".to_string()],
        }));
        let snapshot = index.snapshot();
        assert_eq!(snapshot.len(), 1);
        let results = snapshot.search_bm25("webhook ssl", 5);
        assert_eq!(results[0].0, "JSP-1");
    }

    #[test]
    fn bm25_scores_are_normalised_within_batch() {
        let index = SparseIndex::new();
        index.rebuild(&[
            incident("JSP-1", "UPI timeout on Axis Bank collect flow", &["upi"]),
            incident("JSP-2", "UPI mandate registration failing", &["upi"]),
            incident("JSP-3", "Card tokenization declined by issuer", &["card"]),
        ]);
        let results = index.snapshot().search_bm25("upi timeout", 5);
        assert!(!results.is_empty());
        assert!((results[0].1 - 1.0).abs() < 1e-6);
        assert!(results.iter().all(|(_, s)| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn anchors_contain_corpus_tags_and_seed_terms() {
        let index = SparseIndex::new();
        index.rebuild(&[incident("JSP-1", "UPI timeout on Axis Bank", &["collect-flow"])]);
        let snapshot = index.snapshot();
        assert!(snapshot.anchors().contains("collect-flow"));
        assert!(snapshot.anchors().contains("payment"));
    }
}
