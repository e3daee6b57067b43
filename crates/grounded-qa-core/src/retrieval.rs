//! Hybrid lexical + character-similarity retriever.
//!
//! A [`HybridRetriever`] owns one generation of the chunk sequence together
//! with the term statistics derived from it. It is immutable: any change to
//! the chunk sequence means building a new retriever, so statistics can never
//! drift from the chunks they describe.
//!
//! # Scoring
//!
//! For every chunk:
//!
//! - **lexical**: Okapi BM25 (`k1 = 1.5`, `b = 0.75`) over content tokens.
//! - **semantic**: Jaccard similarity of character 3-grams of the raw query
//!   and the raw chunk text.
//! - **coverage**: share of distinct query tokens present in the chunk.
//!
//! `score = 0.60 × lexical + 0.30 × semantic + 0.10 × coverage`
//!
//! Results are sorted by score (descending), ties keep corpus order, then
//! truncated to `top_k`.

use std::collections::{HashMap, HashSet};

use crate::models::{DocumentChunk, RetrievalHit};
use crate::text::{char_ngrams, jaccard, term_counts, tokenize, NGRAM_SIZE};

const BM25_K1: f64 = 1.5;
const BM25_B: f64 = 0.75;

const LEXICAL_WEIGHT: f64 = 0.60;
const SEMANTIC_WEIGHT: f64 = 0.30;
const COVERAGE_WEIGHT: f64 = 0.10;

/// Default number of hits returned by [`HybridRetriever::search`].
pub const DEFAULT_TOP_K: usize = 5;

/// Per-chunk statistics computed once at build time.
#[derive(Debug)]
struct ChunkStats {
    len: usize,
    tf: HashMap<String, usize>,
    ngrams: HashSet<String>,
}

/// Immutable search index over one chunk sequence.
#[derive(Debug, Default)]
pub struct HybridRetriever {
    chunks: Vec<DocumentChunk>,
    stats: Vec<ChunkStats>,
    df: HashMap<String, usize>,
    avg_doc_len: f64,
}

impl HybridRetriever {
    /// Build the index. An empty sequence is valid and searches to nothing.
    pub fn new(chunks: Vec<DocumentChunk>) -> Self {
        let mut df: HashMap<String, usize> = HashMap::new();
        let mut total_len = 0usize;

        let stats: Vec<ChunkStats> = chunks
            .iter()
            .map(|chunk| {
                let tokens = tokenize(&chunk.text);
                let tf = term_counts(&tokens);
                for term in tf.keys() {
                    *df.entry(term.clone()).or_insert(0) += 1;
                }
                total_len += tokens.len();
                ChunkStats {
                    len: tokens.len(),
                    tf,
                    ngrams: char_ngrams(&chunk.text, NGRAM_SIZE),
                }
            })
            .collect();

        let avg_doc_len = if chunks.is_empty() {
            0.0
        } else {
            total_len as f64 / chunks.len() as f64
        };

        tracing::debug!(
            chunks = chunks.len(),
            terms = df.len(),
            avg_doc_len,
            "built retriever"
        );

        Self {
            chunks,
            stats,
            df,
            avg_doc_len,
        }
    }

    /// The chunk sequence this index was built from, in corpus order.
    pub fn chunks(&self) -> &[DocumentChunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Number of chunks containing `term` at least once.
    pub fn document_frequency(&self, term: &str) -> usize {
        self.df.get(term).copied().unwrap_or(0)
    }

    /// Mean token count per chunk; 0 for an empty corpus.
    pub fn avg_doc_len(&self) -> f64 {
        self.avg_doc_len
    }

    fn bm25(&self, query_tokens: &[String], stats: &ChunkStats) -> f64 {
        if query_tokens.is_empty() || stats.len == 0 || self.avg_doc_len == 0.0 {
            return 0.0;
        }
        let n_docs = self.chunks.len() as f64;
        let doc_len = stats.len as f64;
        let norm = BM25_K1 * (1.0 - BM25_B + BM25_B * (doc_len / self.avg_doc_len));

        let mut score = 0.0;
        for token in query_tokens {
            let df = self.document_frequency(token);
            if df == 0 {
                continue;
            }
            let df = df as f64;
            let idf = (1.0 + (n_docs - df + 0.5) / (df + 0.5)).ln();
            let f = stats.tf.get(token).copied().unwrap_or(0) as f64;
            let denom = f + norm;
            if denom == 0.0 {
                continue;
            }
            score += idf * (f * (BM25_K1 + 1.0)) / denom;
        }
        score
    }

    /// Rank all chunks against `query` and return the best `top_k`.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<RetrievalHit<'_>> {
        if self.chunks.is_empty() {
            return Vec::new();
        }

        let query_tokens = tokenize(query);
        let query_terms: HashSet<&str> = query_tokens.iter().map(String::as_str).collect();
        let query_ngrams = char_ngrams(query, NGRAM_SIZE);

        let mut hits: Vec<RetrievalHit<'_>> = self
            .chunks
            .iter()
            .zip(&self.stats)
            .map(|(chunk, stats)| {
                let lexical = self.bm25(&query_tokens, stats);
                let semantic = jaccard(&query_ngrams, &stats.ngrams);
                let coverage = if query_terms.is_empty() {
                    0.0
                } else {
                    let present = query_terms
                        .iter()
                        .filter(|t| stats.tf.contains_key(**t))
                        .count();
                    present as f64 / query_terms.len() as f64
                };
                RetrievalHit {
                    chunk,
                    score: LEXICAL_WEIGHT * lexical
                        + SEMANTIC_WEIGHT * semantic
                        + COVERAGE_WEIGHT * coverage,
                    lexical_score: lexical,
                    semantic_score: semantic,
                }
            })
            .collect();

        // Stable sort: equal scores keep corpus order.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, text: &str) -> DocumentChunk {
        DocumentChunk {
            chunk_id: id.to_string(),
            source: "test.txt".to_string(),
            section: "Document".to_string(),
            start_line: 1,
            end_line: 1,
            text: text.to_string(),
        }
    }

    fn corpus() -> HybridRetriever {
        HybridRetriever::new(vec![
            chunk("c0", "Revenue grew 12 percent year over year."),
            chunk("c1", "Risks include supply delays and permitting."),
            chunk("c2", "Solar panel output depends on irradiance and panel temperature."),
        ])
    }

    #[test]
    fn test_empty_corpus() {
        let r = HybridRetriever::new(Vec::new());
        assert!(r.is_empty());
        assert_eq!(r.avg_doc_len(), 0.0);
        assert!(r.search("anything", 5).is_empty());
    }

    #[test]
    fn test_document_frequency() {
        let r = corpus();
        assert_eq!(r.document_frequency("panel"), 1);
        assert_eq!(r.document_frequency("revenue"), 1);
        assert_eq!(r.document_frequency("missing"), 0);
    }

    #[test]
    fn test_best_match_first() {
        let r = corpus();
        let hits = r.search("What are the supply risks?", 3);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].chunk.chunk_id, "c1");
        assert!(hits[0].lexical_score > 0.0);
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_top_k_truncates() {
        let r = corpus();
        assert_eq!(r.search("panel", 1).len(), 1);
        assert_eq!(r.search("panel", 10).len(), 3);
        assert!(r.search("panel", 0).is_empty());
    }

    #[test]
    fn test_ties_keep_corpus_order() {
        let r = HybridRetriever::new(vec![
            chunk("a", "identical text"),
            chunk("b", "identical text"),
            chunk("c", "identical text"),
        ]);
        let ids: Vec<_> = r
            .search("identical", 3)
            .iter()
            .map(|h| h.chunk.chunk_id.clone())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unknown_terms_score_zero_lexical() {
        let r = corpus();
        let hits = r.search("zzqx", 3);
        assert!(hits.iter().all(|h| h.lexical_score == 0.0));
    }

    #[test]
    fn test_stopword_only_query_has_no_coverage() {
        let r = corpus();
        for hit in r.search("what is the", 3) {
            assert_eq!(hit.lexical_score, 0.0);
            let expected = SEMANTIC_WEIGHT * hit.semantic_score;
            assert!((hit.score - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_bm25_monotonic_in_term_frequency() {
        let base = vec![
            chunk("x", "solar output is stable"),
            chunk("y", "wind turbines spin"),
            chunk("z", "battery storage grows"),
        ];
        let r1 = HybridRetriever::new(base.clone());
        let mut more = base;
        more[0] = chunk("x", "solar solar output is stable");
        let r2 = HybridRetriever::new(more);

        let score = |r: &HybridRetriever| {
            let q = tokenize("solar");
            r.bm25(&q, &r.stats[0])
        };
        let mut prev = score(&r1);
        assert!(prev > 0.0);
        let next = score(&r2);
        assert!(next >= prev);
        prev = next;

        let r3 = HybridRetriever::new(vec![
            chunk("x", "solar solar solar output is stable"),
            chunk("y", "wind turbines spin"),
            chunk("z", "battery storage grows"),
        ]);
        assert!(score(&r3) >= prev);
    }

    #[test]
    fn test_composite_weights() {
        let r = corpus();
        for hit in r.search("solar panel temperature", 3) {
            let tokens: HashSet<String> = tokenize("solar panel temperature").into_iter().collect();
            let chunk_tokens: HashSet<String> = tokenize(&hit.chunk.text).into_iter().collect();
            let coverage = tokens.intersection(&chunk_tokens).count() as f64 / tokens.len() as f64;
            let expected = 0.6 * hit.lexical_score + 0.3 * hit.semantic_score + 0.1 * coverage;
            assert!((hit.score - expected).abs() < 1e-9);
        }
    }
}
