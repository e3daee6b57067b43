//! Snapshot persistence abstraction.
//!
//! The chunk sequence is the only persisted state. A [`SnapshotStore`] saves
//! and restores it verbatim, in order. Retrieval statistics are never stored;
//! they are rebuilt from the restored chunks.
//!
//! Validating or repairing malformed snapshots is the store's job. The
//! pipeline trusts whatever chunk records a store hands back.

pub mod memory;

use anyhow::Result;

use crate::models::DocumentChunk;

/// Persists the ordered chunk sequence.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`load`](SnapshotStore::load) | Restore the saved sequence (empty if none) |
/// | [`save`](SnapshotStore::save) | Replace the saved sequence |
pub trait SnapshotStore: Send + Sync {
    /// Restore the saved chunk sequence. A store with nothing saved yet
    /// returns an empty vector.
    fn load(&self) -> Result<Vec<DocumentChunk>>;

    /// Replace the saved chunk sequence.
    fn save(&self, chunks: &[DocumentChunk]) -> Result<()>;
}
