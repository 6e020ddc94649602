//! Characters and locations, the named entities of a universe.
//!
//! Both are never deleted; an outdated record points at its replacement
//! through `superseded_by`.

use crate::error::ValidationError;
use crate::id::{EntityId, EntityKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A character in the universe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: EntityId,

    pub name: String,

    /// Powers in the order they were introduced, without duplicates
    #[serde(default)]
    pub powers: Vec<String>,

    #[serde(default)]
    pub description: String,

    /// Relationship ids this character takes part in
    #[serde(default)]
    pub relationships: BTreeSet<EntityId>,

    /// Story ids this character appeared in, oldest first
    #[serde(default)]
    pub story_appearances: Vec<EntityId>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<EntityId>,
}

impl Character {
    /// Build a character, rejecting a blank name or a non-character id.
    pub fn new(
        id: EntityId,
        name: &str,
        powers: impl IntoIterator<Item = String>,
        description: &str,
    ) -> Result<Self, ValidationError> {
        check_id(&id, EntityKind::Character)?;
        let name = required("name", name)?;
        let now = Utc::now();

        let mut character = Self {
            id,
            name,
            powers: Vec::new(),
            description: description.trim().to_string(),
            relationships: BTreeSet::new(),
            story_appearances: Vec::new(),
            created_at: now,
            updated_at: now,
            superseded_by: None,
        };
        character.add_powers(powers);
        Ok(character)
    }

    /// Case-insensitive comparison against a display name.
    pub fn matches_name(&self, name: &str) -> bool {
        names_match(&self.name, name)
    }

    /// Merge powers, skipping blanks and case-insensitive duplicates.
    /// Returns true if anything was added.
    pub fn add_powers(&mut self, powers: impl IntoIterator<Item = String>) -> bool {
        let mut changed = false;
        for power in powers {
            let power = power.trim();
            if power.is_empty() || self.powers.iter().any(|p| names_match(p, power)) {
                continue;
            }
            self.powers.push(power.to_string());
            changed = true;
        }
        changed
    }

    pub fn record_appearance(&mut self, story_id: &EntityId) {
        push_unique(&mut self.story_appearances, story_id);
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_id(&self.id, EntityKind::Character)?;
        required("name", &self.name).map(|_| ())
    }
}

/// A place where stories happen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: EntityId,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub story_appearances: Vec<EntityId>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<EntityId>,
}

impl Location {
    pub fn new(id: EntityId, name: &str, description: &str) -> Result<Self, ValidationError> {
        check_id(&id, EntityKind::Location)?;
        let name = required("name", name)?;
        let now = Utc::now();

        Ok(Self {
            id,
            name,
            description: description.trim().to_string(),
            story_appearances: Vec::new(),
            created_at: now,
            updated_at: now,
            superseded_by: None,
        })
    }

    pub fn matches_name(&self, name: &str) -> bool {
        names_match(&self.name, name)
    }

    pub fn record_appearance(&mut self, story_id: &EntityId) {
        push_unique(&mut self.story_appearances, story_id);
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_id(&self.id, EntityKind::Location)?;
        required("name", &self.name).map(|_| ())
    }
}

/// Trimmed, non-blank value of a required text field.
/// Compare two labels ignoring surrounding whitespace and case.
///
/// Uses full Unicode lowercasing, so "Élise" matches "ÉLISE".
pub fn names_match(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    a == b || a.to_lowercase() == b.to_lowercase()
}

pub(crate) fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::BlankField { field });
    }
    Ok(value.to_string())
}

/// Accept a permanent id of `kind` or a provisional id.
pub(crate) fn check_id(id: &EntityId, kind: EntityKind) -> Result<(), ValidationError> {
    if id.is_provisional() || id.is_kind(kind) {
        Ok(())
    } else {
        Err(ValidationError::WrongIdKind {
            id: id.clone(),
            expected: kind.name(),
        })
    }
}

pub(crate) fn push_unique(list: &mut Vec<EntityId>, id: &EntityId) {
    if !list.contains(id) {
        list.push(id.clone());
    }
}
