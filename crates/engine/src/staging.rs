//! Provisional entities created during resolution.
//!
//! Staged records carry `PENDING-` ids and live outside the universe until
//! an integration commits them with permanent ids.

use std::collections::BTreeMap;
use storyverse_core::error::ValidationError;
use storyverse_core::{Character, EntityId, EntityKind, Location};

#[derive(Debug, Clone, Default)]
pub struct StagedEntities {
    characters: BTreeMap<EntityId, Character>,
    locations: BTreeMap<EntityId, Location>,
}

impl StagedEntities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty() && self.locations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.characters.len() + self.locations.len()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.characters.contains_key(id) || self.locations.contains_key(id)
    }

    pub fn contains_kind(&self, kind: EntityKind, id: &EntityId) -> bool {
        match kind {
            EntityKind::Character => self.characters.contains_key(id),
            EntityKind::Location => self.locations.contains_key(id),
            _ => false,
        }
    }

    pub fn character(&self, id: &EntityId) -> Option<&Character> {
        self.characters.get(id)
    }

    pub fn location(&self, id: &EntityId) -> Option<&Location> {
        self.locations.get(id)
    }

    pub fn entity_name(&self, id: &EntityId) -> Option<&str> {
        self.characters
            .get(id)
            .map(|c| c.name.as_str())
            .or_else(|| self.locations.get(id).map(|l| l.name.as_str()))
    }

    /// `(id, name)` of every staged entity of `kind`.
    pub fn names(&self, kind: EntityKind) -> Vec<(&EntityId, &str)> {
        match kind {
            EntityKind::Character => self
                .characters
                .values()
                .map(|c| (&c.id, c.name.as_str()))
                .collect(),
            EntityKind::Location => self
                .locations
                .values()
                .map(|l| (&l.id, l.name.as_str()))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn stage_character(&mut self, name: &str) -> Result<EntityId, ValidationError> {
        let character = Character::new(EntityId::provisional(), name, Vec::new(), "")?;
        let id = character.id.clone();
        self.characters.insert(id.clone(), character);
        Ok(id)
    }

    pub fn stage_location(&mut self, name: &str) -> Result<EntityId, ValidationError> {
        let location = Location::new(EntityId::provisional(), name, "")?;
        let id = location.id.clone();
        self.locations.insert(id.clone(), location);
        Ok(id)
    }

    /// Drain everything staged, characters first.
    pub fn into_parts(self) -> (Vec<Character>, Vec<Location>) {
        (
            self.characters.into_values().collect(),
            self.locations.into_values().collect(),
        )
    }
}
