//! File-backed universe store: one JSON document on disk.
//!
//! Saves are atomic: the document is written to a temporary file in the
//! same directory, synced, then renamed over the target. A crash mid-write
//! leaves either the old or the new document, never a torn one.
//!
//! Concurrent writers are not coordinated; an advisory lock around `save`
//! is the extension point for multi-user setups.

use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use storyverse_core::error::StoreError;
use storyverse_core::store::UniverseStore;
use storyverse_core::universe::Universe;
use tracing::{debug, info};

use crate::codec::{decode_universe, encode_universe};

pub struct FileUniverseStore {
    path: PathBuf,
}

impl FileUniverseStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn persistence_error(&self, what: &str, e: impl std::fmt::Display) -> StoreError {
        StoreError::Persistence {
            location: self.location(),
            reason: format!("{what}: {e}"),
        }
    }

    fn write_atomically(&self, bytes: &[u8]) -> Result<(), StoreError> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)
            .map_err(|e| self.persistence_error("Failed to create universe directory", e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&parent)
            .map_err(|e| self.persistence_error("Failed to create temporary file", e))?;
        tmp.write_all(bytes)
            .map_err(|e| self.persistence_error("Failed to write temporary file", e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| self.persistence_error("Failed to sync temporary file", e))?;
        tmp.persist(&self.path)
            .map_err(|e| self.persistence_error("Failed to replace universe document", e.error))?;
        Ok(())
    }
}

#[async_trait]
impl UniverseStore for FileUniverseStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn load(&self) -> Result<Universe, StoreError> {
        let Some(bytes) = self.snapshot().await? else {
            info!(path = %self.path.display(), "No universe document yet, starting empty");
            return Ok(Universe::new());
        };

        let universe = decode_universe(&bytes, &self.location())?;
        debug!(
            path = %self.path.display(),
            characters = universe.characters.len(),
            locations = universe.locations.len(),
            stories = universe.stories.len(),
            "Universe loaded"
        );
        Ok(universe)
    }

    async fn save(&self, universe: &Universe) -> Result<(), StoreError> {
        let bytes = encode_universe(universe, &self.location())?;
        self.write_atomically(&bytes)?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "Universe saved");
        Ok(())
    }

    async fn snapshot(&self) -> Result<Option<Vec<u8>>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Corrupt {
                location: self.location(),
                reason: format!("Failed to read universe document: {e}"),
            }),
        }
    }
}
