//! Relationships and events connecting characters and locations.

use crate::entity::{names_match, required};
use crate::error::ValidationError;
use crate::id::{EntityId, EntityKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An edge between two or more characters/locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: EntityId,

    /// Participant ids; order carries no meaning
    pub participants: BTreeSet<EntityId>,

    /// Free-form tag such as "friend" or "mentor", compared case-insensitively
    pub kind: String,

    #[serde(default)]
    pub description: String,

    /// Story that introduced this relationship, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_story: Option<EntityId>,
}

impl Relationship {
    pub fn new(
        id: EntityId,
        participants: impl IntoIterator<Item = EntityId>,
        kind: &str,
        description: &str,
    ) -> Result<Self, ValidationError> {
        crate::entity::check_id(&id, EntityKind::Relationship)?;
        let kind = required("kind", kind)?;
        let participants = participant_set(participants)?;
        if participants.len() < 2 {
            return Err(ValidationError::TooFewParticipants {
                found: participants.len(),
            });
        }

        Ok(Self {
            id,
            participants,
            kind,
            description: description.trim().to_string(),
            origin_story: None,
        })
    }

    pub fn with_origin(mut self, story_id: EntityId) -> Self {
        self.origin_story = Some(story_id);
        self
    }

    /// Same kind (ignoring case) over the same participant set.
    pub fn is_same_edge(&self, kind: &str, participants: &BTreeSet<EntityId>) -> bool {
        names_match(&self.kind, kind) && &self.participants == participants
    }

    pub fn involves(&self, id: &EntityId) -> bool {
        self.participants.contains(id)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        crate::entity::check_id(&self.id, EntityKind::Relationship)?;
        required("kind", &self.kind)?;
        if self.participants.len() < 2 {
            return Err(ValidationError::TooFewParticipants {
                found: self.participants.len(),
            });
        }
        Ok(())
    }
}

/// Something that happened to a set of characters/locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EntityId,

    pub participants: BTreeSet<EntityId>,

    pub description: String,

    /// Free-form ordering hint ("after the monsoon", "day 3")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordering_hint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_story: Option<EntityId>,
}

impl Event {
    pub fn new(
        id: EntityId,
        participants: impl IntoIterator<Item = EntityId>,
        description: &str,
        ordering_hint: Option<String>,
    ) -> Result<Self, ValidationError> {
        crate::entity::check_id(&id, EntityKind::Event)?;
        let description = required("description", description)?;
        let participants = participant_set(participants)?;
        if participants.is_empty() {
            return Err(ValidationError::BlankField {
                field: "participants",
            });
        }

        Ok(Self {
            id,
            participants,
            description,
            ordering_hint: ordering_hint
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty()),
            origin_story: None,
        })
    }

    pub fn with_origin(mut self, story_id: EntityId) -> Self {
        self.origin_story = Some(story_id);
        self
    }

    /// Same participants and same description (ignoring case and padding).
    pub fn is_same_event(&self, participants: &BTreeSet<EntityId>, description: &str) -> bool {
        &self.participants == participants && names_match(&self.description, description)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        crate::entity::check_id(&self.id, EntityKind::Event)?;
        required("description", &self.description)?;
        if self.participants.is_empty() {
            return Err(ValidationError::BlankField {
                field: "participants",
            });
        }
        Ok(())
    }
}

/// Collect participants, rejecting ids that cannot name a character or location.
fn participant_set(
    participants: impl IntoIterator<Item = EntityId>,
) -> Result<BTreeSet<EntityId>, ValidationError> {
    participants
        .into_iter()
        .map(|id| {
            if id.is_provisional()
                || id.is_kind(EntityKind::Character)
                || id.is_kind(EntityKind::Location)
            {
                Ok(id)
            } else {
                Err(ValidationError::WrongIdKind {
                    id,
                    expected: "Character or Location",
                })
            }
        })
        .collect()
}
