//! TF-IDF index with 1–2-gram features and cosine scoring

use std::collections::HashMap;

use super::tokenize::{ngrams, tokenize};

/// Feature cap; the most document-frequent terms win
const MAX_FEATURES: usize = 5000;

/// Immutable TF-IDF matrix over the corpus
#[derive(Debug, Clone, Default)]
pub struct TfidfIndex {
    doc_ids: Vec<String>,
    vocab: HashMap<String, usize>,
    idf: Vec<f32>,
    /// L2-normalised sparse rows, `(feature index, weight)` sorted by index
    rows: Vec<Vec<(usize, f32)>>,
}

impl TfidfIndex {
    /// Build from raw document text
    pub fn build(docs: &[(String, String)]) -> Self {
        let tokenised: Vec<(String, Vec<String>)> = docs
            .iter()
            .map(|(id, text)| (id.clone(), ngrams(&tokenize(text))))
            .collect();

        // Document frequency per term
        let mut doc_freq: HashMap<String, u32> = HashMap::new();
        for (_, terms) in &tokenised {
            let mut seen = std::collections::HashSet::new();
            for term in terms {
                if seen.insert(term) {
                    *doc_freq.entry(term.clone()).or_default() += 1;
                }
            }
        }

        // Select the top MAX_FEATURES terms by document frequency,
        // ties broken by term for determinism
        let mut terms: Vec<(String, u32)> = doc_freq.into_iter().collect();
        terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        terms.truncate(MAX_FEATURES);

        let n = docs.len() as f32;
        let mut vocab = HashMap::with_capacity(terms.len());
        let mut idf = Vec::with_capacity(terms.len());
        for (j, (term, df)) in terms.into_iter().enumerate() {
            vocab.insert(term, j);
            idf.push(((1.0 + n) / (1.0 + df as f32)).ln() + 1.0);
        }

        let mut doc_ids = Vec::with_capacity(docs.len());
        let mut rows = Vec::with_capacity(docs.len());
        for (id, terms) in &tokenised {
            doc_ids.push(id.clone());
            rows.push(Self::vectorise_terms(terms, &vocab, &idf));
        }

        Self {
            doc_ids,
            vocab,
            idf,
            rows,
        }
    }

    /// Number of features in the vocabulary
    pub fn feature_count(&self) -> usize {
        self.vocab.len()
    }

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    /// Whether the index holds no documents
    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    /// Cosine similarity of the query against every document;
    /// positive scores only, sorted (score desc, id asc)
    pub fn search(&self, query: &str, k: usize) -> Vec<(String, f32)> {
        if self.doc_ids.is_empty() {
            return Vec::new();
        }

        let query_terms = ngrams(&tokenize(query));
        let query_vec = Self::vectorise_terms(&query_terms, &self.vocab, &self.idf);
        if query_vec.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(String, f32)> = self
            .rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| {
                let cosine = sparse_dot(&query_vec, row);
                (cosine > 0.01).then(|| (self.doc_ids[i].clone(), cosine))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);
        scored
    }

    /// Term counts → tf·idf → L2-normalised sparse vector
    fn vectorise_terms(
        terms: &[String],
        vocab: &HashMap<String, usize>,
        idf: &[f32],
    ) -> Vec<(usize, f32)> {
        let mut counts: HashMap<usize, f32> = HashMap::new();
        for term in terms {
            if let Some(&j) = vocab.get(term) {
                *counts.entry(j).or_default() += 1.0;
            }
        }

        let mut vec: Vec<(usize, f32)> = counts
            .into_iter()
            .map(|(j, tf)| (j, tf * idf[j]))
            .collect();
        vec.sort_by_key(|(j, _)| *j);

        let norm = vec.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for (_, w) in vec.iter_mut() {
                *w /= norm;
            }
        }
        vec
    }
}

/// Dot product of two sparse vectors sorted by index
fn sparse_dot(a: &[(usize, f32)], b: &[(usize, f32)]) -> f32 {
    let mut sum = 0.0;
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_index(docs: &[(&str, &str)]) -> TfidfIndex {
        let docs: Vec<(String, String)> = docs
            .iter()
            .map(|(id, text)| (id.to_string(), text.to_string()))
            .collect();
        TfidfIndex::build(&docs)
    }

    #[test]
    fn identical_text_scores_near_one() {
        let index = build_index(&[
            ("JSP-1", "upi timeout on axis bank"),
            ("JSP-2", "card tokenization failing for visa"),
        ]);
        let results = index.search("upi timeout on axis bank", 5);
        assert_eq!(results[0].0, "JSP-1");
        assert!(results[0].1 > 0.95);
    }

    #[test]
    fn unrelated_query_matches_nothing() {
        let index = build_index(&[("JSP-1", "upi timeout on axis bank")]);
        let results = index.search("kubernetes pod eviction", 5);
        assert!(results.is_empty());
    }

    #[test]
    fn bigrams_sharpen_specificity() {
        let index = build_index(&[
            ("JSP-1", "payment gateway connection reset"),
            ("JSP-2", "gateway dashboard login issue payment pending"),
        ]);
        let results = index.search("payment gateway reset", 5);
        assert_eq!(results[0].0, "JSP-1");
    }
}
