//! In-memory universe store: useful for testing and ephemeral sessions.
//!
//! Holds the serialized document rather than the `Universe` value, so load
//! and save go through the same codec as the file store.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use storyverse_core::error::StoreError;
use storyverse_core::store::UniverseStore;
use storyverse_core::universe::Universe;
use tokio::sync::RwLock;

use crate::codec::{decode_universe, encode_universe};

const LOCATION: &str = "memory";

pub struct InMemoryUniverseStore {
    document: Arc<RwLock<Option<Vec<u8>>>>,
    fail_saves: AtomicBool,
}

impl InMemoryUniverseStore {
    pub fn new() -> Self {
        Self {
            document: Arc::new(RwLock::new(None)),
            fail_saves: AtomicBool::new(false),
        }
    }

    /// Start from raw document bytes (which may be corrupt).
    pub fn with_document(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            document: Arc::new(RwLock::new(Some(bytes.into()))),
            fail_saves: AtomicBool::new(false),
        }
    }

    /// Make every subsequent save fail with a persistence error.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

impl Default for InMemoryUniverseStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UniverseStore for InMemoryUniverseStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self) -> Result<Universe, StoreError> {
        match self.document.read().await.as_deref() {
            Some(bytes) => decode_universe(bytes, LOCATION),
            None => Ok(Universe::new()),
        }
    }

    async fn save(&self, universe: &Universe) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Persistence {
                location: LOCATION.into(),
                reason: "saves disabled".into(),
            });
        }
        let bytes = encode_universe(universe, LOCATION)?;
        *self.document.write().await = Some(bytes);
        Ok(())
    }

    async fn snapshot(&self) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.document.read().await.clone())
    }
}
