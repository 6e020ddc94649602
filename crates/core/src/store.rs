//! UniverseStore trait: persistence of the single universe document.
//!
//! Implementations: JSON file (atomic replace), in-memory (for testing).

use async_trait::async_trait;
use crate::error::StoreError;
use crate::universe::Universe;

#[async_trait]
pub trait UniverseStore: Send + Sync {
    /// The backend name (e.g., "file", "memory").
    fn name(&self) -> &str;

    /// Load and validate the universe.
    ///
    /// Fails with [`StoreError::Corrupt`] if the document is not valid JSON
    /// or violates referential invariants. A store with no document yet
    /// yields an empty universe.
    async fn load(&self) -> std::result::Result<Universe, StoreError>;

    /// Atomically replace the stored document.
    ///
    /// On failure the previous document is left intact.
    async fn save(&self, universe: &Universe) -> std::result::Result<(), StoreError>;

    /// The raw persisted bytes, or `None` if nothing has been saved yet.
    async fn snapshot(&self) -> std::result::Result<Option<Vec<u8>>, StoreError>;
}
