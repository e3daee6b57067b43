//! Core data models that flow through chunking, retrieval and answering.

use serde::{Deserialize, Serialize};

/// A document handed to the chunker by the ingestion layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    /// Display name, usually the file name.
    pub source: String,
    /// Stable identifier used to derive chunk ids.
    pub source_path: String,
    pub text: String,
    /// Lines of `text`, cited 1-indexed.
    pub lines: Vec<String>,
}

impl RawDocument {
    /// Build a document from its full text, splitting lines.
    pub fn from_text(
        source: impl Into<String>,
        source_path: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let text = text.into();
        let lines = text.lines().map(str::to_string).collect();
        Self {
            source: source.into(),
            source_path: source_path.into(),
            text,
            lines,
        }
    }
}

/// An addressable, overlapping passage of a source document.
///
/// This is also the snapshot record: the serialized field set is exactly
/// what the snapshot store persists and restores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub chunk_id: String,
    pub source: String,
    pub section: String,
    /// First line, inclusive, 1-indexed.
    pub start_line: usize,
    /// Last line, inclusive, 1-indexed.
    pub end_line: usize,
    pub text: String,
}

impl DocumentChunk {
    /// Citation anchor: `"{section} | lines {start}-{end} | {chunk_id}"`.
    pub fn locator(&self) -> String {
        format!(
            "{} | lines {}-{} | {}",
            self.section, self.start_line, self.end_line, self.chunk_id
        )
    }
}

/// A scored chunk for one query. Borrowed from the retriever that produced it.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalHit<'a> {
    pub chunk: &'a DocumentChunk,
    /// Composite relevance score.
    pub score: f64,
    /// BM25 component.
    pub lexical_score: f64,
    /// Character n-gram Jaccard component.
    pub semantic_score: f64,
}

/// Display projection of a cited chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    pub locator: String,
    pub snippet: String,
}

/// The terminal artifact of a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QAResult {
    pub question: String,
    pub answer: String,
    pub citations: Vec<Citation>,
}

/// Counters reported by a pipeline ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IngestStats {
    pub documents: usize,
    pub new_chunks: usize,
    pub added_chunks: usize,
    pub replaced_chunks: usize,
    /// Total chunk count after the ingest.
    pub chunks: usize,
    pub append_mode: bool,
}
