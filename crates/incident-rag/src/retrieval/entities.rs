//! Entity extraction over a fixed vocabulary maintained with the corpus
//!
//! Substring match with word boundaries, case-insensitive. Three payment
//! entity kinds plus exact technical terms used for domain probing.

use std::collections::BTreeSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Known merchant names
const MERCHANTS: &[&str] = &[
    "snapdeal", "firstcry", "mobikwik", "citymall", "flipkart", "amazon", "myntra", "nykaa",
    "zomato", "swiggy",
];

/// Known payment gateways and processors
const GATEWAYS: &[&str] = &[
    "pinelabs", "payu", "razorpay", "cashfree", "checkout", "stripe", "billdesk", "ccavenue",
    "paytm", "phonepe", "gpay", "amazonpay",
];

/// Known banks
const BANKS: &[&str] = &["hdfc", "axis", "icici", "sbi", "kotak", "idfc", "yesbank", "rbl"];

/// Exact technical terms and error codes
const ERROR_TERMS: &[&str] = &[
    "timeout", "ssl", "tls", "rsa", "pkcs15", "webhook", "tokenization", "encryption",
    "decryption", "signature", "messagenotrecognized", "internal_server_error", "transienterror",
    "authenticationfailed", "insufficientfunds", "cardexpired", "invalidcvv", "limitexceeded",
];

/// Entities extracted from one piece of text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedEntities {
    pub merchants: BTreeSet<String>,
    pub gateways: BTreeSet<String>,
    pub banks: BTreeSet<String>,
    pub error_terms: BTreeSet<String>,
}

impl ExtractedEntities {
    /// True when no entity of any kind was found
    pub fn is_empty(&self) -> bool {
        self.merchants.is_empty()
            && self.gateways.is_empty()
            && self.banks.is_empty()
            && self.error_terms.is_empty()
    }

    /// All entities of every kind
    pub fn all(&self) -> BTreeSet<String> {
        self.merchants
            .iter()
            .chain(self.gateways.iter())
            .chain(self.banks.iter())
            .chain(self.error_terms.iter())
            .cloned()
            .collect()
    }

    /// Size of the intersection across all kinds
    pub fn overlap(&self, other: &ExtractedEntities) -> usize {
        self.all().intersection(&other.all()).count()
    }
}

/// Structured diff of query entities against a candidate's
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMatchDetails {
    pub query_merchants: Vec<String>,
    pub query_gateways: Vec<String>,
    pub result_merchants: Vec<String>,
    pub result_gateways: Vec<String>,
    pub merchant_match: bool,
    pub gateway_match: bool,
}

/// Vocabulary-driven extractor; regexes compiled once at construction
pub struct EntityExtractor {
    merchant_re: Regex,
    gateway_re: Regex,
    bank_re: Regex,
    error_re: Regex,
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityExtractor {
    /// Build the extractor from the fixed vocabulary
    pub fn new() -> Self {
        Self {
            merchant_re: vocab_regex(MERCHANTS),
            gateway_re: vocab_regex(GATEWAYS),
            bank_re: vocab_regex(BANKS),
            error_re: vocab_regex(ERROR_TERMS),
        }
    }

    /// Extract every known entity mentioned in the text
    pub fn extract(&self, text: &str) -> ExtractedEntities {
        ExtractedEntities {
            merchants: collect(&self.merchant_re, text),
            gateways: collect(&self.gateway_re, text),
            banks: collect(&self.bank_re, text),
            error_terms: collect(&self.error_re, text),
        }
    }

    /// Entity diff between a query and a candidate text
    pub fn match_details(
        &self,
        query_entities: &ExtractedEntities,
        candidate_entities: &ExtractedEntities,
    ) -> EntityMatchDetails {
        let merchant_match = query_entities
            .merchants
            .intersection(&candidate_entities.merchants)
            .next()
            .is_some();
        let gateway_match = query_entities
            .gateways
            .intersection(&candidate_entities.gateways)
            .next()
            .is_some();

        EntityMatchDetails {
            query_merchants: query_entities.merchants.iter().cloned().collect(),
            query_gateways: query_entities.gateways.iter().cloned().collect(),
            result_merchants: candidate_entities.merchants.iter().cloned().collect(),
            result_gateways: candidate_entities.gateways.iter().cloned().collect(),
            merchant_match,
            gateway_match,
        }
    }
}

fn vocab_regex(terms: &[&str]) -> Regex {
    let alternation = terms
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b({alternation})\b")).expect("invalid vocabulary pattern")
}

fn collect(re: &Regex, text: &str) -> BTreeSet<String> {
    re.find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_all_kinds() {
        let extractor = EntityExtractor::new();
        let entities =
            extractor.extract("Snapdeal payment via Pinelabs failing at HDFC with timeout");
        assert!(entities.merchants.contains("snapdeal"));
        assert!(entities.gateways.contains("pinelabs"));
        assert!(entities.banks.contains("hdfc"));
        assert!(entities.error_terms.contains("timeout"));
    }

    #[test]
    fn matching_respects_word_boundaries() {
        let extractor = EntityExtractor::new();
        let entities = extractor.extract("the snapdealer misconfigured something");
        assert!(entities.merchants.is_empty());
    }

    #[test]
    fn match_details_detects_shared_merchant_and_gateway() {
        let extractor = EntityExtractor::new();
        let query = extractor.extract("snapdeal refund stuck on pinelabs");
        let candidate = extractor.extract("Snapdeal wallet refund failing in Pinelabs gateway");
        let details = extractor.match_details(&query, &candidate);
        assert!(details.merchant_match);
        assert!(details.gateway_match);
    }

    #[test]
    fn overlap_counts_shared_entities() {
        let extractor = EntityExtractor::new();
        let a = extractor.extract("upi timeout at axis via razorpay");
        let b = extractor.extract("axis bank timeout during settlement");
        assert_eq!(a.overlap(&b), 2);
    }

    #[test]
    fn unrelated_text_has_no_entities() {
        let extractor = EntityExtractor::new();
        assert!(extractor.extract("how to bake a cake").is_empty());
    }
}
