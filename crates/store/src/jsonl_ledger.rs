//! JSON-lines history ledger.
//!
//! Each line is one JSON-encoded `LedgerEntry`. Entries are only ever
//! appended; existing lines are never rewritten.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storyverse_core::error::LedgerError;
use storyverse_core::ledger::{HistoryLedger, LedgerEntry};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// A file-backed ledger.
///
/// Entries are loaded into memory on creation and each append is written
/// through to the end of the file.
pub struct JsonlHistoryLedger {
    path: PathBuf,
    entries: Arc<RwLock<Vec<LedgerEntry>>>,
}

impl JsonlHistoryLedger {
    /// Open the ledger at `path`. A missing file starts an empty ledger;
    /// the file is created on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = entries.len(), "History ledger loaded");
        Self {
            path,
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> Vec<LedgerEntry> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<LedgerEntry>(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted ledger entry");
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl HistoryLedger for JsonlHistoryLedger {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn append(&self, entry: LedgerEntry) -> Result<(), LedgerError> {
        let mut line = serde_json::to_string(&entry)
            .map_err(|e| LedgerError::Storage(format!("Failed to serialize ledger entry: {e}")))?;
        line.push('\n');

        // Hold the write lock across the file append so lines never interleave.
        let mut entries = self.entries.write().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                LedgerError::Storage(format!("Failed to create ledger directory: {e}"))
            })?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| LedgerError::Storage(format!("Failed to open ledger file: {e}")))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| LedgerError::Storage(format!("Failed to append ledger entry: {e}")))?;
        file.flush()
            .await
            .map_err(|e| LedgerError::Storage(format!("Failed to flush ledger file: {e}")))?;

        debug!(story_id = %entry.story_id(), "Ledger entry appended");
        entries.push(entry);
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self.entries.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::io::Write;
    use storyverse_core::ledger::{ArtifactKind, StoryDelta};
    use storyverse_core::EntityId;

    fn story() -> EntityId {
        EntityId::from("STORY2025010100001")
    }

    #[tokio::test]
    async fn append_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");

        let ledger = JsonlHistoryLedger::new(&path);
        ledger
            .append(LedgerEntry::StoryIntegrated {
                story_id: story(),
                timestamp: Utc::now(),
                delta: StoryDelta::default(),
            })
            .await
            .unwrap();
        ledger
            .record_artifact(&story(), ArtifactKind::Image, "a.png", Utc::now())
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);

        let reopened = JsonlHistoryLedger::new(&path);
        assert_eq!(reopened.entries_for(&story()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn latest_artifact_prefers_later_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = JsonlHistoryLedger::new(dir.path().join("history.jsonl"));
        let t1 = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2025, 1, 1, 11, 0, 0).unwrap();

        ledger
            .record_artifact(&story(), ArtifactKind::Image, "img/t2.png", t2)
            .await
            .unwrap();
        ledger
            .record_artifact(&story(), ArtifactKind::Image, "img/t1.png", t1)
            .await
            .unwrap();

        let latest = ledger
            .latest_artifact(&story(), ArtifactKind::Image)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.path, "img/t2.png");
    }

    #[tokio::test]
    async fn handles_corrupted_lines() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            tmp,
            r#"{{"type":"artifact","story_id":"STORY2025010100001","kind":"image","path":"a.png","timestamp":"2025-01-01T00:00:00Z"}}"#
        )
        .unwrap();
        writeln!(tmp, "this is not json").unwrap();
        writeln!(
            tmp,
            r#"{{"type":"artifact","story_id":"STORY2025010100001","kind":"document","path":"a.md","timestamp":"2025-01-01T00:00:00Z"}}"#
        )
        .unwrap();

        let ledger = JsonlHistoryLedger::new(tmp.path());
        assert_eq!(ledger.entries().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn handles_missing_file_gracefully() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = JsonlHistoryLedger::new(dir.path().join("missing/history.jsonl"));
        assert!(ledger.entries().await.unwrap().is_empty());
        assert!(ledger
            .latest_artifact(&story(), ArtifactKind::Image)
            .await
            .unwrap()
            .is_none());
    }
}
