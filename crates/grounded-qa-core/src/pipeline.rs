//! Composition root: chunker → retriever → synthesizer.
//!
//! The [`Pipeline`] exclusively owns the chunk sequence, stored inside the
//! current [`HybridRetriever`] generation. Every mutation (full ingest,
//! append, restore from a snapshot) builds a fresh retriever from the new
//! sequence, so queries never see statistics from an older one.
//!
//! Ingestion can be split in two: [`Pipeline::prepare_ingest`] builds the
//! next generation without touching the pipeline, and [`Pipeline::commit`]
//! swaps it in. Callers that persist snapshots save the staged chunks between
//! the two steps, so a failed save leaves the live index untouched.
//!
//! # Example
//!
//! ```rust
//! use grounded_qa_core::models::RawDocument;
//! use grounded_qa_core::pipeline::Pipeline;
//!
//! let mut pipeline = Pipeline::default();
//! let docs = vec![RawDocument::from_text("brief.txt", "brief.txt", "Revenue grew 12 percent.")];
//! let stats = pipeline.ingest(&docs, false);
//! assert_eq!(stats.chunks, 1);
//!
//! let result = pipeline.ask("What numeric detail is mentioned?", 5);
//! assert!(result.answer.contains("12 percent"));
//! ```

use std::collections::HashMap;

use anyhow::{bail, Result};

use crate::answer::AnswerSynthesizer;
use crate::chunk::{chunk_documents, ChunkParams};
use crate::models::{DocumentChunk, IngestStats, QAResult, RawDocument, RetrievalHit};
use crate::retrieval::HybridRetriever;
use crate::store::SnapshotStore;

/// Owns the chunk sequence and answers questions over it.
#[derive(Debug, Default)]
pub struct Pipeline {
    index: HybridRetriever,
    params: ChunkParams,
    synthesizer: AnswerSynthesizer,
    generation: u64,
}

/// The next index generation, built but not yet visible to queries.
#[derive(Debug)]
pub struct StagedIngest {
    index: HybridRetriever,
    stats: IngestStats,
    base_generation: u64,
}

impl StagedIngest {
    /// The chunk sequence that [`Pipeline::commit`] will install.
    pub fn chunks(&self) -> &[DocumentChunk] {
        self.index.chunks()
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }
}

impl Pipeline {
    /// An empty pipeline with explicit chunking and answering settings.
    pub fn new(params: ChunkParams, synthesizer: AnswerSynthesizer) -> Self {
        Self {
            index: HybridRetriever::new(Vec::new()),
            params,
            synthesizer,
            generation: 0,
        }
    }

    /// A pipeline over an existing chunk sequence, with default settings.
    pub fn from_chunks(chunks: Vec<DocumentChunk>) -> Self {
        let mut pipeline = Self::default();
        pipeline.replace_chunks(chunks);
        pipeline
    }

    pub fn chunks(&self) -> &[DocumentChunk] {
        self.index.chunks()
    }

    pub fn retriever(&self) -> &HybridRetriever {
        &self.index
    }

    pub fn params(&self) -> ChunkParams {
        self.params
    }

    /// Swap in a new chunk sequence and rebuild the retriever from it.
    pub fn replace_chunks(&mut self, chunks: Vec<DocumentChunk>) {
        self.install(HybridRetriever::new(chunks));
    }

    fn install(&mut self, index: HybridRetriever) {
        self.index = index;
        self.generation += 1;
    }

    /// Chunk `docs` and either replace the sequence or merge into it.
    ///
    /// In append mode a new chunk whose id is already present overwrites
    /// that chunk in place; other chunks are appended in order.
    pub fn ingest(&mut self, docs: &[RawDocument], append: bool) -> IngestStats {
        let staged = self.prepare_ingest(docs, append);
        let stats = staged.stats;
        self.install(staged.index);
        stats
    }

    /// Build the generation [`Pipeline::ingest`] would produce, leaving
    /// `self` unchanged.
    pub fn prepare_ingest(&self, docs: &[RawDocument], append: bool) -> StagedIngest {
        let new_chunks = chunk_documents(docs, &self.params);
        let new_count = new_chunks.len();

        let (chunks, added, replaced) = if append {
            let mut merged = self.index.chunks().to_vec();
            let mut positions: HashMap<String, usize> = merged
                .iter()
                .enumerate()
                .map(|(i, c)| (c.chunk_id.clone(), i))
                .collect();
            let (mut added, mut replaced) = (0, 0);
            for chunk in new_chunks {
                match positions.get(&chunk.chunk_id) {
                    Some(&i) => {
                        merged[i] = chunk;
                        replaced += 1;
                    }
                    None => {
                        positions.insert(chunk.chunk_id.clone(), merged.len());
                        merged.push(chunk);
                        added += 1;
                    }
                }
            }
            (merged, added, replaced)
        } else {
            (new_chunks, new_count, 0)
        };

        let index = HybridRetriever::new(chunks);
        let stats = IngestStats {
            documents: docs.len(),
            new_chunks: new_count,
            added_chunks: added,
            replaced_chunks: replaced,
            chunks: index.len(),
            append_mode: append,
        };
        tracing::debug!(?stats, "staged ingest");
        StagedIngest {
            index,
            stats,
            base_generation: self.generation,
        }
    }

    /// Install a staged generation. Fails if the pipeline changed after
    /// `staged` was prepared, since the merge would drop that change.
    pub fn commit(&mut self, staged: StagedIngest) -> Result<IngestStats> {
        if staged.base_generation != self.generation {
            bail!(
                "Staged ingest is stale (prepared at generation {}, pipeline is at {})",
                staged.base_generation,
                self.generation
            );
        }
        self.install(staged.index);
        Ok(staged.stats)
    }

    /// Ranked hits for `question`.
    pub fn search(&self, question: &str, top_k: usize) -> Vec<RetrievalHit<'_>> {
        self.index.search(question, top_k)
    }

    /// Retrieve and synthesize a grounded answer.
    pub fn ask(&self, question: &str, top_k: usize) -> QAResult {
        let hits = self.index.search(question, top_k);
        self.synthesizer.synthesize(question, &hits)
    }

    /// Replace the chunk sequence with the store's snapshot. Returns the
    /// number of chunks restored.
    pub fn load(&mut self, store: &dyn SnapshotStore) -> Result<usize> {
        let chunks = store.load()?;
        let count = chunks.len();
        self.replace_chunks(chunks);
        Ok(count)
    }

    /// Persist the current chunk sequence.
    pub fn save(&self, store: &dyn SnapshotStore) -> Result<()> {
        store.save(self.index.chunks())
    }
}
