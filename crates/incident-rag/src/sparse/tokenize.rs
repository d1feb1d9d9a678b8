//! Shared tokenisation for the sparse indices
//!
//! Lowercasing, punctuation stripped, whitespace split, English stop-words
//! removed. No stemming.

use std::collections::HashSet;

/// English stop-words excluded from both sparse indices
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "can", "could", "did", "do",
    "does", "for", "from", "had", "has", "have", "if", "in", "into", "is", "it", "its", "may",
    "might", "must", "no", "not", "of", "on", "or", "our", "should", "so", "such", "that", "the",
    "their", "then", "there", "these", "they", "this", "to", "was", "we", "were", "what", "when",
    "where", "which", "while", "will", "with", "would", "you", "your",
];

fn stop_words() -> &'static HashSet<&'static str> {
    use std::sync::OnceLock;
    static WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    WORDS.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

/// Tokenise text into lowercase terms
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| t.len() > 1 && !stop_words().contains(t))
        .map(|t| t.to_string())
        .collect()
}

/// Unigrams plus bigrams over the token stream, used by the TF-IDF index
pub fn ngrams(tokens: &[String]) -> Vec<String> {
    let mut terms = Vec::with_capacity(tokens.len() * 2);
    terms.extend(tokens.iter().cloned());
    for pair in tokens.windows(2) {
        terms.push(format!("{} {}", pair[0], pair[1]));
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_strips_punctuation() {
        let tokens = tokenize("UPI Timeout, on Axis-Bank!");
        assert_eq!(tokens, vec!["upi", "timeout", "axis", "bank"]);
    }

    #[test]
    fn removes_stop_words_and_single_chars() {
        let tokens = tokenize("the payment is a failure");
        assert_eq!(tokens, vec!["payment", "failure"]);
    }

    #[test]
    fn keeps_underscored_error_codes() {
        let tokens = tokenize("got INTERNAL_SERVER_ERROR from gateway");
        assert!(tokens.contains(&"internal_server_error".to_string()));
    }

    #[test]
    fn ngrams_include_bigrams() {
        let tokens = tokenize("webhook ssl failure");
        let terms = ngrams(&tokens);
        assert!(terms.contains(&"webhook ssl".to_string()));
        assert!(terms.contains(&"ssl failure".to_string()));
        assert!(terms.contains(&"webhook".to_string()));
    }
}
