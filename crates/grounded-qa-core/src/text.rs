//! Stateless text utilities shared by the chunker, retriever and answer
//! synthesizer.
//!
//! Every function here is pure. Tokens are maximal runs of ASCII letters,
//! digits and apostrophes, lower-cased, with a small English stop-word list
//! removed. Character n-grams operate on Unicode scalar values, not bytes.

use std::collections::{HashMap, HashSet};

/// Words dropped by [`tokenize`].
pub const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "have", "how", "i", "in",
    "is", "it", "its", "of", "on", "or", "that", "the", "their", "this", "to", "was", "what",
    "when", "where", "which", "who", "why", "with", "you", "your", "give", "one",
];

/// Default n for [`char_ngrams`] in retrieval.
pub const NGRAM_SIZE: usize = 3;

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '\''
}

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// Collapse every whitespace run to a single space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split text into lower-cased content tokens, in order, duplicates kept.
///
/// ```rust
/// use grounded_qa_core::text::tokenize;
///
/// assert_eq!(tokenize("What is the Revenue growth?"), vec!["revenue", "growth"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !is_word_char(c))
        .filter(|w| !w.is_empty())
        .map(|w| w.to_ascii_lowercase())
        .filter(|w| !is_stopword(w))
        .collect()
}

/// Number of content tokens in `text`.
pub fn token_count(text: &str) -> usize {
    tokenize(text).len()
}

/// Distinct content tokens of `text`.
pub fn token_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// Term frequencies over a token list.
pub fn term_counts(tokens: &[String]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for t in tokens {
        *counts.entry(t.clone()).or_insert(0) += 1;
    }
    counts
}

/// Split text into sentences after whitespace normalization.
///
/// A boundary is a space that directly follows `.`, `!` or `?`. The
/// terminating punctuation stays with its sentence.
pub fn sentence_split(text: &str) -> Vec<String> {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut prev: Option<char> = None;
    for c in normalized.chars() {
        if c == ' ' && matches!(prev, Some('.' | '!' | '?')) {
            push_trimmed(&mut sentences, &current);
            current.clear();
        } else {
            current.push(c);
        }
        prev = Some(c);
    }
    push_trimmed(&mut sentences, &current);
    sentences
}

fn push_trimmed(out: &mut Vec<String>, s: &str) {
    let trimmed = s.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// Character n-grams of the lower-cased, whitespace-collapsed text.
///
/// Text shorter than `n` yields itself as the only gram; empty text yields
/// the empty set.
pub fn char_ngrams(text: &str, n: usize) -> HashSet<String> {
    let cleaned: Vec<char> = normalize_whitespace(&text.to_lowercase()).chars().collect();
    if cleaned.is_empty() {
        return HashSet::new();
    }
    if n == 0 || cleaned.len() < n {
        return HashSet::from([cleaned.into_iter().collect()]);
    }
    cleaned.windows(n).map(|w| w.iter().collect()).collect()
}

/// Jaccard similarity `|a ∩ b| / |a ∪ b|`; 0 when either side is empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_drops_stopwords_and_punctuation() {
        let tokens = tokenize("The CEO's plan, for 2024: grow!");
        assert_eq!(tokens, vec!["ceo's", "plan", "2024", "grow"]);
    }

    #[test]
    fn test_tokenize_non_ascii_splits_words() {
        assert_eq!(tokenize("café menu"), vec!["caf", "menu"]);
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("the and of").is_empty());
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a\n\tb   c "), "a b c");
        assert_eq!(normalize_whitespace("\n\n"), "");
    }

    #[test]
    fn test_sentence_split() {
        let s = sentence_split("Revenue grew.  Costs fell!\nWhy? Unknown");
        assert_eq!(s, vec!["Revenue grew.", "Costs fell!", "Why?", "Unknown"]);
    }

    #[test]
    fn test_sentence_split_keeps_decimals() {
        let s = sentence_split("Margin was 3.5 percent. Done.");
        assert_eq!(s, vec!["Margin was 3.5 percent.", "Done."]);
    }

    #[test]
    fn test_sentence_split_empty() {
        assert!(sentence_split("   ").is_empty());
    }

    #[test]
    fn test_char_ngrams() {
        let grams = char_ngrams("Ab  C", 3);
        let expected: HashSet<String> = ["ab ", "b c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(grams, expected);
    }

    #[test]
    fn test_char_ngrams_short_and_empty() {
        assert_eq!(char_ngrams("Hi", 3), HashSet::from(["hi".to_string()]));
        assert!(char_ngrams("  ", 3).is_empty());
    }

    #[test]
    fn test_jaccard() {
        let a = char_ngrams("solar", 3);
        let b = char_ngrams("solar", 3);
        assert!((jaccard(&a, &b) - 1.0).abs() < 1e-9);
        let c = char_ngrams("wind", 3);
        assert_eq!(jaccard(&a, &c), 0.0);
        assert_eq!(jaccard(&a, &HashSet::new()), 0.0);
    }

    #[test]
    fn test_term_counts() {
        let tokens = tokenize("solar solar wind");
        let counts = term_counts(&tokens);
        assert_eq!(counts["solar"], 2);
        assert_eq!(counts["wind"], 1);
    }
}
