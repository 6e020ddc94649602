//! Direct universe edits: characters, locations, relationships and events
//! created outside story generation.
//!
//! Every function mutates the universe in memory and returns the affected
//! id; the caller persists through the store.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use storyverse_core::error::ValidationError;
use storyverse_core::{Character, EntityId, EntityKind, Event, Location, Relationship, Universe};
use tracing::debug;

/// Id of an upserted record and whether it was newly created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upserted {
    pub id: EntityId,
    pub created: bool,
}

/// Insert a character, or update the one with the same name (ignoring case).
///
/// An update merges powers and replaces a non-blank description; id,
/// creation time and appearances are kept.
pub fn upsert_character(
    universe: &mut Universe,
    name: &str,
    powers: impl IntoIterator<Item = String>,
    description: &str,
    now: DateTime<Utc>,
) -> Result<Upserted, ValidationError> {
    if let Some(existing) = universe
        .characters
        .values_mut()
        .find(|c| c.superseded_by.is_none() && c.matches_name(name))
    {
        existing.add_powers(powers);
        if !description.trim().is_empty() {
            existing.description = description.trim().to_string();
        }
        existing.updated_at = now;
        debug!(id = %existing.id, "Character updated");
        return Ok(Upserted {
            id: existing.id.clone(),
            created: false,
        });
    }

    let id = universe.allocator(EntityKind::Character, now.date_naive()).allocate();
    let mut character = Character::new(id.clone(), name, powers, description)?;
    character.created_at = now;
    character.updated_at = now;
    universe.characters.insert(id.clone(), character);
    universe.touch(now);
    debug!(id = %id, "Character created");
    Ok(Upserted { id, created: true })
}

/// Insert a location, or update the one with the same name (ignoring case).
pub fn upsert_location(
    universe: &mut Universe,
    name: &str,
    description: &str,
    now: DateTime<Utc>,
) -> Result<Upserted, ValidationError> {
    if let Some(existing) = universe
        .locations
        .values_mut()
        .find(|l| l.superseded_by.is_none() && l.matches_name(name))
    {
        if !description.trim().is_empty() {
            existing.description = description.trim().to_string();
        }
        existing.updated_at = now;
        return Ok(Upserted {
            id: existing.id.clone(),
            created: false,
        });
    }

    let id = universe.allocator(EntityKind::Location, now.date_naive()).allocate();
    let mut location = Location::new(id.clone(), name, description)?;
    location.created_at = now;
    location.updated_at = now;
    universe.locations.insert(id.clone(), location);
    universe.touch(now);
    debug!(id = %id, "Location created");
    Ok(Upserted { id, created: true })
}

/// Add a relationship unless one of the same kind over the same
/// participants exists already.
///
/// Participants must be committed characters or locations. Every character
/// taking part lists the relationship afterwards.
pub fn add_relationship(
    universe: &mut Universe,
    kind: &str,
    participants: impl IntoIterator<Item = EntityId>,
    description: &str,
    origin: Option<&EntityId>,
    now: DateTime<Utc>,
) -> Result<Upserted, ValidationError> {
    let id = universe.allocator(EntityKind::Relationship, now.date_naive()).allocate();
    let mut relationship = Relationship::new(id, participants, kind, description)?;
    check_participants(universe, &relationship.id, &relationship.participants)?;

    if let Some(existing) = universe
        .relationships
        .values()
        .find(|r| r.is_same_edge(&relationship.kind, &relationship.participants))
    {
        debug!(id = %existing.id, kind = %existing.kind, "Relationship already present");
        return Ok(Upserted {
            id: existing.id.clone(),
            created: false,
        });
    }

    if let Some(story) = origin {
        relationship = relationship.with_origin(story.clone());
    }
    let id = relationship.id.clone();
    for participant in &relationship.participants {
        if let Some(c) = universe.characters.get_mut(participant) {
            c.relationships.insert(id.clone());
            c.updated_at = now;
        }
    }
    universe.relationships.insert(id.clone(), relationship);
    universe.touch(now);
    debug!(id = %id, "Relationship added");
    Ok(Upserted { id, created: true })
}

/// Add an event unless one with the same participants and description
/// exists already.
pub fn add_event(
    universe: &mut Universe,
    description: &str,
    participants: impl IntoIterator<Item = EntityId>,
    ordering_hint: Option<String>,
    origin: Option<&EntityId>,
    now: DateTime<Utc>,
) -> Result<Upserted, ValidationError> {
    let id = universe.allocator(EntityKind::Event, now.date_naive()).allocate();
    let mut event = Event::new(id, participants, description, ordering_hint)?;
    check_participants(universe, &event.id, &event.participants)?;

    if let Some(existing) = universe
        .events
        .values()
        .find(|e| e.is_same_event(&event.participants, &event.description))
    {
        return Ok(Upserted {
            id: existing.id.clone(),
            created: false,
        });
    }

    if let Some(story) = origin {
        event = event.with_origin(story.clone());
    }
    let id = event.id.clone();
    universe.events.insert(id.clone(), event);
    universe.touch(now);
    debug!(id = %id, "Event added");
    Ok(Upserted { id, created: true })
}

fn check_participants(
    universe: &Universe,
    owner: &EntityId,
    participants: &BTreeSet<EntityId>,
) -> Result<(), ValidationError> {
    match participants.iter().find(|p| !universe.has_entity(p)) {
        Some(target) => Err(ValidationError::UnresolvedReference {
            owner: owner.clone(),
            target: target.clone(),
        }),
        None => Ok(()),
    }
}
