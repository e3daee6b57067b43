//! Index statistics.
//!
//! A quick summary of what the snapshot holds: chunk count, per-source chunk
//! and section counts, and the snapshot's size on disk. Used by `gqa stats`
//! and `GET /api/stats`.

use anyhow::Result;
use grounded_qa_core::models::DocumentChunk;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::Config;
use crate::snapshot::open_pipeline;

/// Per-source breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    pub source: String,
    pub chunks: usize,
    pub sections: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub chunks: usize,
    pub sources: Vec<SourceStats>,
}

impl IndexStats {
    /// Summarize a chunk sequence. Sources are ordered by chunk count
    /// (descending), then name.
    pub fn from_chunks(chunks: &[DocumentChunk]) -> Self {
        let mut by_source: BTreeMap<&str, (usize, BTreeSet<&str>)> = BTreeMap::new();
        for chunk in chunks {
            let entry = by_source.entry(chunk.source.as_str()).or_default();
            entry.0 += 1;
            entry.1.insert(chunk.section.as_str());
        }

        let mut sources: Vec<SourceStats> = by_source
            .into_iter()
            .map(|(source, (count, sections))| SourceStats {
                source: source.to_string(),
                chunks: count,
                sections: sections.len(),
            })
            .collect();
        sources.sort_by(|a, b| b.chunks.cmp(&a.chunks).then_with(|| a.source.cmp(&b.source)));

        Self {
            chunks: chunks.len(),
            sources,
        }
    }
}

/// Print a summary of the configured index.
pub fn run_stats(config: &Config) -> Result<()> {
    let pipeline = open_pipeline(config)?;
    let stats = IndexStats::from_chunks(pipeline.chunks());

    let size = std::fs::metadata(&config.index.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Grounded QA — Index Stats");
    println!("=========================");
    println!();
    println!("  Index:       {}", config.index.path.display());
    println!("  Size:        {}", format_bytes(size));
    println!();
    println!("  Chunks:      {}", stats.chunks);
    println!("  Sources:     {}", stats.sources.len());

    if !stats.sources.is_empty() {
        println!();
        println!("  By source:");
        println!("  {:<40} {:>8} {:>10}", "SOURCE", "CHUNKS", "SECTIONS");
        println!("  {}", "-".repeat(60));
        for s in &stats.sources {
            println!("  {:<40} {:>8} {:>10}", s.source, s.chunks, s.sections);
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
