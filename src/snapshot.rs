//! JSON file snapshot store.
//!
//! The snapshot is a single JSON document:
//!
//! ```json
//! { "chunks": [ { "chunk_id": "...", "source": "...", "section": "...",
//!                 "start_line": 1, "end_line": 4, "text": "..." } ] }
//! ```
//!
//! A missing file loads as an empty sequence. A file that exists but does not
//! parse is an error; it is never silently treated as empty.

use anyhow::{Context, Result};
use grounded_qa_core::models::DocumentChunk;
use grounded_qa_core::pipeline::Pipeline;
use grounded_qa_core::store::SnapshotStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::Config;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    chunks: &'a [DocumentChunk],
}

#[derive(Deserialize)]
struct Snapshot {
    chunks: Vec<DocumentChunk>,
}

/// Stores the chunk sequence at a fixed path.
#[derive(Debug, Clone)]
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonSnapshotStore {
    fn load(&self) -> Result<Vec<DocumentChunk>> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no snapshot yet");
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read snapshot: {}", self.path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&content)
            .with_context(|| format!("Malformed snapshot: {}", self.path.display()))?;
        tracing::debug!(chunks = snapshot.chunks.len(), "loaded snapshot");
        Ok(snapshot.chunks)
    }

    fn save(&self, chunks: &[DocumentChunk]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create snapshot directory: {}", parent.display())
                })?;
            }
        }
        let body = serde_json::to_string_pretty(&SnapshotRef { chunks })?;

        // Write beside the target, then rename over it.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body)
            .with_context(|| format!("Failed to write snapshot: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace snapshot: {}", self.path.display()))?;
        tracing::debug!(chunks = chunks.len(), path = %self.path.display(), "saved snapshot");
        Ok(())
    }
}

/// Build a pipeline from `config` and restore the configured snapshot into it.
pub fn open_pipeline(config: &Config) -> Result<Pipeline> {
    let mut pipeline = config.pipeline();
    let restored = pipeline.load(&JsonSnapshotStore::new(&config.index.path))?;
    tracing::info!(chunks = restored, index = %config.index.path.display(), "index loaded");
    Ok(pipeline)
}
