//! Story requests and the bounded context handed to a story generator.

use crate::entity::{Character, Location};
use crate::id::{EntityId, EntityKind};
use crate::relation::Relationship;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryRequest {
    /// Characters the story must feature (permanent or staged ids)
    pub character_ids: Vec<EntityId>,

    /// Where the story takes place
    pub location_id: EntityId,

    pub theme: String,

    pub age_group: String,

    /// Target length in words; the generator's default applies when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u32>,
}

impl StoryRequest {
    /// Every id the request names, characters first.
    pub fn requested_ids(&self) -> impl Iterator<Item = &EntityId> {
        self.character_ids
            .iter()
            .chain(std::iter::once(&self.location_id))
    }
}

/// A first-degree neighbour pulled in through a relationship edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedEntity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: String,
    /// Powers (characters) or description (locations), one line
    pub summary: String,
    /// Kind of the relationship that reached this entity
    pub via: String,
}

/// Counts describing what the assembler kept and dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextStats {
    pub requested: usize,
    pub related_included: usize,
    pub related_dropped: usize,
    pub relationships_included: usize,
    pub relationships_dropped: usize,
    pub estimated_tokens: usize,
}

/// The bounded slice of the universe supplied for one story request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub request: StoryRequest,
    pub characters: Vec<Character>,
    pub location: Location,
    pub related: Vec<RelatedEntity>,
    pub relationships: Vec<Relationship>,
    pub stats: ContextStats,
}

impl Context {
    /// Names of every entity in the context, requested ones first.
    pub fn entity_names(&self) -> Vec<(&EntityId, &str)> {
        self.characters
            .iter()
            .map(|c| (&c.id, c.name.as_str()))
            .chain(std::iter::once((&self.location.id, self.location.name.as_str())))
            .chain(self.related.iter().map(|r| (&r.id, r.name.as_str())))
            .collect()
    }

    /// Prompt sections describing the cast, setting and relationships.
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str("Characters:\n");
        for c in &self.characters {
            let _ = write!(out, "- {}", c.name);
            if !c.powers.is_empty() {
                let _ = write!(out, " (powers: {})", c.powers.join(", "));
            }
            if !c.description.is_empty() {
                let _ = write!(out, ": {}", c.description);
            }
            out.push('\n');
        }

        let _ = write!(out, "\nLocation:\n- {}", self.location.name);
        if !self.location.description.is_empty() {
            let _ = write!(out, ": {}", self.location.description);
        }
        out.push('\n');

        if !self.related.is_empty() {
            out.push_str("\nRelated cast:\n");
            for r in &self.related {
                let _ = write!(out, "- {} ({}, via {})", r.name, r.kind, r.via);
                if !r.summary.is_empty() {
                    let _ = write!(out, ": {}", r.summary);
                }
                out.push('\n');
            }
        }

        if !self.relationships.is_empty() {
            out.push_str("\nRelationships:\n");
            for rel in &self.relationships {
                let names: Vec<&str> = rel
                    .participants
                    .iter()
                    .map(|id| self.name_of(id).unwrap_or(id.as_str()))
                    .collect();
                let _ = write!(out, "- {}: {}", rel.kind, names.join(" & "));
                if !rel.description.is_empty() {
                    let _ = write!(out, " ({})", rel.description);
                }
                out.push('\n');
            }
        }

        out
    }

    /// Token estimate of the rendered context (~4 characters per token).
    pub fn estimated_tokens(&self) -> usize {
        estimate_tokens(&self.render())
    }

    fn name_of(&self, id: &EntityId) -> Option<&str> {
        self.entity_names()
            .into_iter()
            .find(|(candidate, _)| *candidate == id)
            .map(|(_, name)| name)
    }
}

/// Estimate the token count for a string. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}
