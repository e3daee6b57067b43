//! Section-aware, overlapping line-window chunker.
//!
//! Splits a [`RawDocument`] into [`DocumentChunk`]s that carry the nearest
//! preceding heading and the original line range they span.
//!
//! # Algorithm
//!
//! 1. Walk lines in order. A non-blank line is a heading if it starts with
//!    `#`, or ends with `:` and has at most 8 words, or is all upper-case with
//!    at most 8 words. A heading switches the current section, and the heading
//!    line itself belongs to the section it introduces.
//! 2. Append each line to a rolling [`ChunkWindow`]. Once the window holds
//!    `chunk_token_size` content tokens, flush it as a chunk.
//! 3. After a flush, carry trailing lines forward until they hold
//!    `overlap_tokens` tokens (always at least one line when overlap is on).
//! 4. Flush whatever is left once all lines are consumed.
//!
//! Chunk ids are `{source}::{hash8}::chunk_{NNN}` where `hash8` is the first
//! 8 hex digits of the SHA-256 of `source_path`, so re-ingesting the same path
//! reproduces the same ids.
//!
//! # Example
//!
//! ```rust
//! use grounded_qa_core::chunk::{chunk_document, ChunkParams};
//! use grounded_qa_core::models::RawDocument;
//!
//! let doc = RawDocument::from_text("brief.txt", "docs/brief.txt", "# Summary\nRevenue grew 12 percent.");
//! let chunks = chunk_document(&doc, &ChunkParams::default());
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].section, "Summary");
//! assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 2));
//! ```

use sha2::{Digest, Sha256};

use crate::models::{DocumentChunk, RawDocument};
use crate::text::token_count;

/// Section label used before the first heading.
pub const DEFAULT_SECTION: &str = "Document";

/// Maximum word count for colon-terminated and upper-case headings.
const MAX_HEADING_WORDS: usize = 8;

/// Window sizing, in content tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    pub chunk_token_size: usize,
    /// Tokens carried into the next chunk; 0 disables overlap.
    pub overlap_tokens: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_token_size: 130,
            overlap_tokens: 30,
        }
    }
}

/// True if `line` looks like a section heading.
pub fn is_heading(line: &str) -> bool {
    let stripped = line.trim();
    if stripped.is_empty() {
        return false;
    }
    if stripped.starts_with('#') {
        return true;
    }
    let words = stripped.split_whitespace().count();
    if stripped.ends_with(':') && words <= MAX_HEADING_WORDS {
        return true;
    }
    is_upper(stripped) && words <= MAX_HEADING_WORDS
}

/// At least one cased character, and no lower-case ones.
fn is_upper(s: &str) -> bool {
    let mut cased = false;
    for c in s.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            cased = true;
        }
    }
    cased
}

fn heading_name(line: &str) -> String {
    let name = line.trim().trim_start_matches('#').trim();
    if name.is_empty() {
        DEFAULT_SECTION.to_string()
    } else {
        name.to_string()
    }
}

/// First 8 hex digits of the SHA-256 of `source_path`.
pub fn document_key(source_path: &str) -> String {
    let digest = Sha256::digest(source_path.as_bytes());
    digest.iter().take(4).map(|b| format!("{:02x}", b)).collect()
}

/// Deterministic chunk id for the `index`-th chunk of a document.
pub fn chunk_id(source: &str, doc_key: &str, index: usize) -> String {
    format!("{}::{}::chunk_{:03}", source, doc_key, index)
}

/// One line held by the window.
#[derive(Debug, Clone)]
struct WindowLine<'a> {
    line_no: usize,
    text: &'a str,
    section: String,
    tokens: usize,
}

/// Rolling accumulation state for one document.
///
/// Consumed and returned by each step so no state is shared between steps.
#[derive(Debug)]
struct ChunkWindow<'a> {
    lines: Vec<WindowLine<'a>>,
    /// Sum of `tokens` over `lines`.
    tokens: usize,
    next_index: usize,
}

/// Per-document constants the window needs to emit chunks.
struct EmitContext<'a> {
    source: &'a str,
    doc_key: String,
    params: ChunkParams,
}

impl<'a> ChunkWindow<'a> {
    fn new() -> Self {
        Self {
            lines: Vec::new(),
            tokens: 0,
            next_index: 0,
        }
    }

    fn push(
        mut self,
        line: WindowLine<'a>,
        ctx: &EmitContext<'_>,
        out: &mut Vec<DocumentChunk>,
    ) -> Self {
        self.tokens += line.tokens;
        self.lines.push(line);
        if self.tokens >= ctx.params.chunk_token_size {
            self.flush(ctx, out)
        } else {
            self
        }
    }

    fn flush(mut self, ctx: &EmitContext<'_>, out: &mut Vec<DocumentChunk>) -> Self {
        if self.lines.is_empty() {
            return self;
        }

        let joined = self
            .lines
            .iter()
            .map(|l| l.text)
            .collect::<Vec<_>>()
            .join("\n");
        let text = joined.trim();
        if text.is_empty() {
            return Self {
                next_index: self.next_index,
                ..Self::new()
            };
        }

        let first = &self.lines[0];
        let last = &self.lines[self.lines.len() - 1];
        out.push(DocumentChunk {
            chunk_id: chunk_id(ctx.source, &ctx.doc_key, self.next_index),
            source: ctx.source.to_string(),
            section: first.section.clone(),
            start_line: first.line_no,
            end_line: last.line_no,
            text: text.to_string(),
        });
        self.next_index += 1;

        let carried = carry_overlap(std::mem::take(&mut self.lines), ctx.params.overlap_tokens);
        Self {
            tokens: carried.iter().map(|l| l.tokens).sum(),
            lines: carried,
            next_index: self.next_index,
        }
    }

    /// Flush at end of input. Runs even when the window holds only lines
    /// carried over from the previous chunk, which then become a tail chunk.
    fn finish(self, ctx: &EmitContext<'_>, out: &mut Vec<DocumentChunk>) {
        self.flush(ctx, out);
    }
}

/// Trailing lines to seed the next window with.
fn carry_overlap(lines: Vec<WindowLine<'_>>, overlap_tokens: usize) -> Vec<WindowLine<'_>> {
    if overlap_tokens == 0 {
        return Vec::new();
    }
    let mut carried = Vec::new();
    let mut budget = 0;
    for line in lines.into_iter().rev() {
        if budget + line.tokens > overlap_tokens && !carried.is_empty() {
            break;
        }
        budget += line.tokens;
        carried.push(line);
        if budget >= overlap_tokens {
            break;
        }
    }
    carried.reverse();
    carried
}

/// Chunk a single document.
///
/// Returns an empty vector for documents with no non-blank text. Chunk
/// numbering restarts at 0 for every document.
pub fn chunk_document(doc: &RawDocument, params: &ChunkParams) -> Vec<DocumentChunk> {
    let ctx = EmitContext {
        source: &doc.source,
        doc_key: document_key(&doc.source_path),
        params: *params,
    };

    let mut chunks = Vec::new();
    let mut window = ChunkWindow::new();
    let mut section = DEFAULT_SECTION.to_string();

    for (i, line) in doc.lines.iter().enumerate() {
        if is_heading(line) {
            section = heading_name(line);
        }
        let entry = WindowLine {
            line_no: i + 1,
            text: line,
            section: section.clone(),
            tokens: token_count(line),
        };
        window = window.push(entry, &ctx, &mut chunks);
    }
    window.finish(&ctx, &mut chunks);

    tracing::debug!(source = %doc.source, chunks = chunks.len(), "chunked document");
    chunks
}

/// Chunk many documents, concatenating results in input order.
pub fn chunk_documents(docs: &[RawDocument], params: &ChunkParams) -> Vec<DocumentChunk> {
    docs.iter()
        .flat_map(|doc| chunk_document(doc, params))
        .collect()
}
