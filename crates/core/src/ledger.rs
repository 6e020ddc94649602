//! History ledger: the append-only record of integrated stories and the
//! artifacts (images, documents) produced for them.
//!
//! The ledger answers "which image is the latest for this story" when
//! several render attempts exist.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use crate::error::LedgerError;
use crate::id::EntityId;

/// Kinds of files produced for a story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Image,
    Document,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Image => f.write_str("image"),
            ArtifactKind::Document => f.write_str("document"),
        }
    }
}

/// A file produced for a story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub story_id: EntityId,
    pub kind: ArtifactKind,
    pub path: String,
    pub timestamp: DateTime<Utc>,
}

impl ArtifactRecord {
    /// The final path component, used to break timestamp ties.
    pub fn file_name(&self) -> &str {
        Path::new(&self.path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.path)
    }
}

/// What one integration added to the universe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryDelta {
    #[serde(default)]
    pub created_entities: Vec<EntityId>,
    #[serde(default)]
    pub added_relationships: Vec<EntityId>,
    #[serde(default)]
    pub added_events: Vec<EntityId>,
}

/// A single ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEntry {
    /// A story was merged into the universe
    StoryIntegrated {
        story_id: EntityId,
        timestamp: DateTime<Utc>,
        delta: StoryDelta,
    },
    /// A file was produced for a story
    Artifact(ArtifactRecord),
}

impl LedgerEntry {
    pub fn story_id(&self) -> &EntityId {
        match self {
            LedgerEntry::StoryIntegrated { story_id, .. } => story_id,
            LedgerEntry::Artifact(record) => &record.story_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            LedgerEntry::StoryIntegrated { timestamp, .. } => *timestamp,
            LedgerEntry::Artifact(record) => record.timestamp,
        }
    }
}

/// Pick the latest artifact: greatest timestamp, ties broken by the
/// lexicographically largest file name.
pub fn latest_of<'a>(records: impl IntoIterator<Item = &'a ArtifactRecord>) -> Option<&'a ArtifactRecord> {
    records
        .into_iter()
        .max_by(|a, b| (a.timestamp, a.file_name()).cmp(&(b.timestamp, b.file_name())))
}

/// The core HistoryLedger trait.
///
/// Implementations: JSONL file, in-memory (for testing).
#[async_trait]
pub trait HistoryLedger: Send + Sync {
    /// The backend name (e.g., "jsonl", "memory").
    fn name(&self) -> &str;

    /// Append an entry. Entries are never rewritten or removed.
    async fn append(&self, entry: LedgerEntry) -> std::result::Result<(), LedgerError>;

    /// All entries in append order.
    async fn entries(&self) -> std::result::Result<Vec<LedgerEntry>, LedgerError>;

    /// Record a file produced for a story.
    async fn record_artifact(
        &self,
        story_id: &EntityId,
        kind: ArtifactKind,
        path: &str,
        timestamp: DateTime<Utc>,
    ) -> std::result::Result<(), LedgerError> {
        self.append(LedgerEntry::Artifact(ArtifactRecord {
            story_id: story_id.clone(),
            kind,
            path: path.to_string(),
            timestamp,
        }))
        .await
    }

    /// The latest artifact of `kind` for a story, or `None` if there is none.
    async fn latest_artifact(
        &self,
        story_id: &EntityId,
        kind: ArtifactKind,
    ) -> std::result::Result<Option<ArtifactRecord>, LedgerError> {
        let entries = self.entries().await?;
        let records = entries.iter().filter_map(|e| match e {
            LedgerEntry::Artifact(r) if &r.story_id == story_id && r.kind == kind => Some(r),
            _ => None,
        });
        Ok(latest_of(records).cloned())
    }

    /// A story's history in append order.
    async fn entries_for(
        &self,
        story_id: &EntityId,
    ) -> std::result::Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self
            .entries()
            .await?
            .into_iter()
            .filter(|e| e.story_id() == story_id)
            .collect())
    }
}
