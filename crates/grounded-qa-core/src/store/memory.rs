//! In-memory [`SnapshotStore`] for tests and embedding in other programs.

use std::sync::RwLock;

use anyhow::{anyhow, Result};

use crate::models::DocumentChunk;

use super::SnapshotStore;

/// Keeps the last saved snapshot behind a `RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    chunks: RwLock<Vec<DocumentChunk>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-seeded with `chunks`.
    pub fn with_chunks(chunks: Vec<DocumentChunk>) -> Self {
        Self {
            chunks: RwLock::new(chunks),
        }
    }
}

impl SnapshotStore for InMemoryStore {
    fn load(&self) -> Result<Vec<DocumentChunk>> {
        let chunks = self
            .chunks
            .read()
            .map_err(|_| anyhow!("snapshot lock poisoned"))?;
        Ok(chunks.clone())
    }

    fn save(&self, chunks: &[DocumentChunk]) -> Result<()> {
        let mut stored = self
            .chunks
            .write()
            .map_err(|_| anyhow!("snapshot lock poisoned"))?;
        *stored = chunks.to_vec();
        Ok(())
    }
}
