//! The universe aggregate.

use crate::entity::{Character, Location};
use crate::error::ValidationError;
use crate::id::{EntityId, EntityKind, IdAllocator};
use crate::relation::{Event, Relationship};
use crate::story::Story;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every record of one fictional setting.
///
/// Ordered maps keep the serialized document deterministic, so saving an
/// unchanged universe reproduces the same bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    #[serde(default)]
    pub characters: BTreeMap<EntityId, Character>,

    #[serde(default)]
    pub locations: BTreeMap<EntityId, Location>,

    #[serde(default)]
    pub relationships: BTreeMap<EntityId, Relationship>,

    #[serde(default)]
    pub events: BTreeMap<EntityId, Event>,

    #[serde(default)]
    pub stories: BTreeMap<EntityId, Story>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl Universe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
            && self.locations.is_empty()
            && self.relationships.is_empty()
            && self.events.is_empty()
            && self.stories.is_empty()
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_updated = Some(now);
    }

    /// Whether `id` names a record of `kind`.
    pub fn contains(&self, kind: EntityKind, id: &EntityId) -> bool {
        match kind {
            EntityKind::Character => self.characters.contains_key(id),
            EntityKind::Location => self.locations.contains_key(id),
            EntityKind::Relationship => self.relationships.contains_key(id),
            EntityKind::Event => self.events.contains_key(id),
            EntityKind::Story => self.stories.contains_key(id),
        }
    }

    /// Whether `id` names a character or a location.
    pub fn has_entity(&self, id: &EntityId) -> bool {
        self.characters.contains_key(id) || self.locations.contains_key(id)
    }

    /// Display name of a character or location.
    pub fn entity_name(&self, id: &EntityId) -> Option<&str> {
        self.characters
            .get(id)
            .map(|c| c.name.as_str())
            .or_else(|| self.locations.get(id).map(|l| l.name.as_str()))
    }

    pub fn ids(&self, kind: EntityKind) -> Vec<&EntityId> {
        match kind {
            EntityKind::Character => self.characters.keys().collect(),
            EntityKind::Location => self.locations.keys().collect(),
            EntityKind::Relationship => self.relationships.keys().collect(),
            EntityKind::Event => self.events.keys().collect(),
            EntityKind::Story => self.stories.keys().collect(),
        }
    }

    /// An allocator that continues after the ids of `kind` already present.
    pub fn allocator(&self, kind: EntityKind, date: NaiveDate) -> IdAllocator {
        IdAllocator::new(kind, date, self.ids(kind))
    }

    pub fn find_character_by_name(&self, name: &str) -> Option<&Character> {
        self.characters.values().find(|c| c.matches_name(name))
    }

    pub fn find_location_by_name(&self, name: &str) -> Option<&Location> {
        self.locations.values().find(|l| l.matches_name(name))
    }

    /// Relationships `id` takes part in, in id order.
    pub fn relationships_of<'a>(
        &'a self,
        id: &'a EntityId,
    ) -> impl Iterator<Item = &'a Relationship> + 'a {
        self.relationships.values().filter(move |r| r.involves(id))
    }

    /// Re-check every invariant: records are well-formed, keys match ids,
    /// no provisional ids are committed and every cross reference resolves.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (key, c) in &self.characters {
            check_key(key, &c.id)?;
            c.validate()?;
            for rel in &c.relationships {
                self.expect(EntityKind::Relationship, &c.id, rel)?;
            }
            for story in &c.story_appearances {
                self.expect(EntityKind::Story, &c.id, story)?;
            }
            if let Some(next) = &c.superseded_by {
                self.expect(EntityKind::Character, &c.id, next)?;
            }
        }

        for (key, l) in &self.locations {
            check_key(key, &l.id)?;
            l.validate()?;
            for story in &l.story_appearances {
                self.expect(EntityKind::Story, &l.id, story)?;
            }
            if let Some(next) = &l.superseded_by {
                self.expect(EntityKind::Location, &l.id, next)?;
            }
        }

        for (key, r) in &self.relationships {
            check_key(key, &r.id)?;
            r.validate()?;
            for p in &r.participants {
                self.expect_entity(&r.id, p)?;
            }
            if let Some(origin) = &r.origin_story {
                self.expect(EntityKind::Story, &r.id, origin)?;
            }
        }

        for (key, e) in &self.events {
            check_key(key, &e.id)?;
            e.validate()?;
            for p in &e.participants {
                self.expect_entity(&e.id, p)?;
            }
            if let Some(origin) = &e.origin_story {
                self.expect(EntityKind::Story, &e.id, origin)?;
            }
        }

        for (key, s) in &self.stories {
            check_key(key, &s.id)?;
            s.validate()?;
            for r in &s.referenced_entities {
                self.expect_entity(&s.id, r)?;
            }
        }

        Ok(())
    }

    fn expect(
        &self,
        kind: EntityKind,
        owner: &EntityId,
        target: &EntityId,
    ) -> Result<(), ValidationError> {
        if self.contains(kind, target) {
            Ok(())
        } else {
            Err(ValidationError::UnresolvedReference {
                owner: owner.clone(),
                target: target.clone(),
            })
        }
    }

    fn expect_entity(&self, owner: &EntityId, target: &EntityId) -> Result<(), ValidationError> {
        if self.has_entity(target) {
            Ok(())
        } else {
            Err(ValidationError::UnresolvedReference {
                owner: owner.clone(),
                target: target.clone(),
            })
        }
    }
}

fn check_key(key: &EntityId, id: &EntityId) -> Result<(), ValidationError> {
    if key != id {
        return Err(ValidationError::KeyMismatch {
            key: key.clone(),
            id: id.clone(),
        });
    }
    if id.is_provisional() {
        return Err(ValidationError::WrongIdKind {
            id: id.clone(),
            expected: "permanent",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::StoryDraft;
    use std::collections::BTreeSet;

    fn sample() -> Universe {
        let mut u = Universe::new();
        let ammu = Character::new(
            EntityId::from("CHAR2025010100001"),
            "Ammu",
            vec!["Lightning".into()],
            "",
        )
        .unwrap();
        let chennai = Location::new(EntityId::from("LOC2025010100001"), "Chennai", "").unwrap();
        u.characters.insert(ammu.id.clone(), ammu);
        u.locations.insert(chennai.id.clone(), chennai);
        u
    }

    #[test]
    fn empty_universe_is_valid() {
        assert!(Universe::new().validate().is_ok());
        assert!(Universe::new().is_empty());
    }

    #[test]
    fn finds_entities_by_name_ignoring_case() {
        let u = sample();
        assert_eq!(
            u.find_character_by_name("AMMU").map(|c| c.id.as_str()),
            Some("CHAR2025010100001")
        );
        assert!(u.find_location_by_name("chennai ").is_some());
        assert!(u.find_character_by_name("Chennai").is_none());
    }

    #[test]
    fn dangling_relationship_participant_is_rejected() {
        let mut u = sample();
        let rel = Relationship::new(
            EntityId::from("REL2025010100001"),
            vec![
                EntityId::from("CHAR2025010100001"),
                EntityId::from("CHAR2025010100009"),
            ],
            "friend",
            "",
        )
        .unwrap();
        u.relationships.insert(rel.id.clone(), rel);
        let err = u.validate().unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnresolvedReference {
                owner: EntityId::from("REL2025010100001"),
                target: EntityId::from("CHAR2025010100009"),
            }
        );
    }

    #[test]
    fn key_must_match_record_id() {
        let mut u = sample();
        let chennai = u.locations.values().next().cloned().unwrap();
        u.locations.insert(EntityId::from("LOC2025010100002"), chennai);
        assert!(matches!(
            u.validate(),
            Err(ValidationError::KeyMismatch { .. })
        ));
    }

    #[test]
    fn story_references_must_resolve() {
        let mut u = sample();
        let draft = StoryDraft {
            title: "T".into(),
            body: "B".into(),
            ..Default::default()
        };
        let story = Story::new(
            EntityId::from("STORY2025010100001"),
            &draft,
            BTreeSet::from([EntityId::from("LOC2025010100007")]),
            Utc::now(),
        )
        .unwrap();
        u.stories.insert(story.id.clone(), story);
        assert!(u.validate().is_err());
    }

    #[test]
    fn allocator_continues_after_existing_ids() {
        let u = sample();
        let day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let mut alloc = u.allocator(EntityKind::Character, day);
        assert_eq!(alloc.allocate().as_str(), "CHAR2025010100002");
    }
}
