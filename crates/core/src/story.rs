//! Stories and the drafts a generator produces before integration.

use crate::entity::{check_id, required};
use crate::error::ValidationError;
use crate::id::{EntityId, EntityKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Story themes offered when requesting a story.
pub const THEMES: [&str; 8] = [
    "Friendship",
    "Courage",
    "Responsibility",
    "Teamwork",
    "Family",
    "Innovation",
    "Environmental Protection",
    "Helping Others",
];

/// Target reader age groups.
pub const AGE_GROUPS: [&str; 3] = ["6-8", "8-10", "10-12"];

/// An integrated story.
///
/// Immutable once created, except that image references may be appended.
/// The word count is always derived from the body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: EntityId,

    pub title: String,

    #[serde(default)]
    pub theme: String,

    #[serde(default)]
    pub age_group: String,

    pub body: String,

    /// Characters and locations the story references
    #[serde(default)]
    pub referenced_entities: BTreeSet<EntityId>,

    #[serde(default)]
    pub moral: String,

    pub generated_at: DateTime<Utc>,

    /// Image paths, in the order they were rendered
    #[serde(default)]
    pub image_refs: Vec<String>,
}

impl Story {
    pub fn new(
        id: EntityId,
        draft: &StoryDraft,
        referenced_entities: BTreeSet<EntityId>,
        generated_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if !id.is_kind(EntityKind::Story) {
            return Err(ValidationError::WrongIdKind {
                id,
                expected: EntityKind::Story.name(),
            });
        }

        Ok(Self {
            id,
            title: required("title", &draft.title)?,
            theme: draft.theme.trim().to_string(),
            age_group: draft.age_group.trim().to_string(),
            body: required("body", &draft.body)?,
            referenced_entities,
            moral: draft.moral.trim().to_string(),
            generated_at,
            image_refs: Vec::new(),
        })
    }

    pub fn word_count(&self) -> usize {
        word_count(&self.body)
    }

    pub fn add_image(&mut self, path: impl Into<String>) {
        self.image_refs.push(path.into());
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_id(&self.id, EntityKind::Story)?;
        if self.id.is_provisional() {
            return Err(ValidationError::WrongIdKind {
                id: self.id.clone(),
                expected: EntityKind::Story.name(),
            });
        }
        required("title", &self.title)?;
        required("body", &self.body).map(|_| ())
    }
}

/// Whitespace-separated word count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// A generated story that has not yet been integrated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryDraft {
    pub title: String,

    pub body: String,

    #[serde(default)]
    pub theme: String,

    #[serde(default)]
    pub age_group: String,

    #[serde(default)]
    pub moral: String,

    /// Names of characters/locations mentioned by the generated text
    #[serde(default)]
    pub referenced_entity_names: Vec<String>,

    /// Resolved ids the story references (permanent or provisional)
    #[serde(default)]
    pub referenced_entities: Vec<EntityId>,

    #[serde(default)]
    pub relationships: Vec<RelationshipDraft>,

    #[serde(default)]
    pub events: Vec<EventDraft>,
}

impl StoryDraft {
    pub fn word_count(&self) -> usize {
        word_count(&self.body)
    }

    /// Every id the draft points at, across the story, relationships and events.
    pub fn all_references(&self) -> BTreeSet<EntityId> {
        self.referenced_entities
            .iter()
            .chain(self.relationships.iter().flat_map(|r| r.participants.iter()))
            .chain(self.events.iter().flat_map(|e| e.participants.iter()))
            .cloned()
            .collect()
    }
}

/// A relationship implied by a story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipDraft {
    pub kind: String,

    pub participants: Vec<EntityId>,

    #[serde(default)]
    pub description: String,
}

/// An event implied by a story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    pub description: String,

    pub participants: Vec<EntityId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordering_hint: Option<String>,
}
