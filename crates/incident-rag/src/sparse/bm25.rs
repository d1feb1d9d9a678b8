//! Okapi BM25 index over incident training text

use std::collections::HashMap;

/// Okapi k1 parameter
const K1: f32 = 1.2;
/// Okapi b parameter
const B: f32 = 0.75;

/// In-memory BM25 index; immutable once built
#[derive(Debug, Clone, Default)]
pub struct Bm25Index {
    doc_ids: Vec<String>,
    term_freqs: Vec<HashMap<String, u32>>,
    doc_lens: Vec<f32>,
    doc_freq: HashMap<String, u32>,
    avg_doc_len: f32,
}

impl Bm25Index {
    /// Build from tokenised documents
    pub fn build(docs: &[(String, Vec<String>)]) -> Self {
        let mut doc_ids = Vec::with_capacity(docs.len());
        let mut term_freqs = Vec::with_capacity(docs.len());
        let mut doc_lens = Vec::with_capacity(docs.len());
        let mut doc_freq: HashMap<String, u32> = HashMap::new();

        for (id, tokens) in docs {
            let mut freqs: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *freqs.entry(token.clone()).or_default() += 1;
            }
            for term in freqs.keys() {
                *doc_freq.entry(term.clone()).or_default() += 1;
            }
            doc_ids.push(id.clone());
            doc_lens.push(tokens.len() as f32);
            term_freqs.push(freqs);
        }

        let avg_doc_len = if doc_lens.is_empty() {
            0.0
        } else {
            doc_lens.iter().sum::<f32>() / doc_lens.len() as f32
        };

        Self {
            doc_ids,
            term_freqs,
            doc_lens,
            doc_freq,
            avg_doc_len,
        }
    }

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    /// Whether the index holds no documents
    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    /// Vocabulary size
    pub fn vocab_size(&self) -> usize {
        self.doc_freq.len()
    }

    /// Raw BM25 scores for a tokenised query; positive scores only,
    /// sorted (score desc, id asc)
    pub fn search(&self, query_tokens: &[String], k: usize) -> Vec<(String, f32)> {
        if self.doc_ids.is_empty() || query_tokens.is_empty() {
            return Vec::new();
        }

        let n = self.doc_ids.len() as f32;
        let mut scored: Vec<(String, f32)> = Vec::new();

        for (i, freqs) in self.term_freqs.iter().enumerate() {
            let mut score = 0.0f32;
            for term in query_tokens {
                let tf = match freqs.get(term) {
                    Some(&tf) => tf as f32,
                    None => continue,
                };
                let df = *self.doc_freq.get(term).unwrap_or(&0) as f32;
                let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                let norm = K1 * (1.0 - B + B * self.doc_lens[i] / self.avg_doc_len.max(1e-6));
                score += idf * tf * (K1 + 1.0) / (tf + norm);
            }
            if score > 0.0 {
                scored.push((self.doc_ids[i].clone(), score));
            }
        }

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);
        scored
    }
}
