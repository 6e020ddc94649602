//! Entity identifiers and id allocation.
//!
//! Permanent ids follow the `{PREFIX}{YYYYMMDD}{SEQ:05}` layout, e.g.
//! `CHAR2025010100001`. Entities staged during resolution carry a
//! provisional `PENDING-{uuid}` id until integration commits them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

const PROVISIONAL_PREFIX: &str = "PENDING-";

/// Identifier of any record in the universe.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Wrap an existing id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh provisional id for a staged entity.
    pub fn provisional() -> Self {
        Self(format!("{PROVISIONAL_PREFIX}{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this id belongs to a staged, not yet committed, entity.
    pub fn is_provisional(&self) -> bool {
        self.0.starts_with(PROVISIONAL_PREFIX)
    }

    /// The kind encoded in a permanent id, if the id is well-formed.
    pub fn kind(&self) -> Option<EntityKind> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.sequence_of(self).is_some())
    }

    /// Whether this is a well-formed permanent id of `kind`.
    pub fn is_kind(&self, kind: EntityKind) -> bool {
        kind.sequence_of(self).is_some()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The record types held by a universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Character,
    Location,
    Relationship,
    Event,
    Story,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Character,
        EntityKind::Location,
        EntityKind::Relationship,
        EntityKind::Event,
        EntityKind::Story,
    ];

    /// Id prefix used for permanent ids of this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            EntityKind::Character => "CHAR",
            EntityKind::Location => "LOC",
            EntityKind::Relationship => "REL",
            EntityKind::Event => "EVT",
            EntityKind::Story => "STORY",
        }
    }

    /// Get the display name for this kind.
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Character => "Character",
            EntityKind::Location => "Location",
            EntityKind::Relationship => "Relationship",
            EntityKind::Event => "Event",
            EntityKind::Story => "Story",
        }
    }

    /// Parse `(date, sequence)` out of a permanent id of this kind.
    fn sequence_of(&self, id: &EntityId) -> Option<(String, u32)> {
        let rest = id.as_str().strip_prefix(self.prefix())?;
        if rest.len() < 13 || !rest.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let (date, seq) = rest.split_at(8);
        Some((date.to_string(), seq.parse().ok()?))
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Allocates permanent ids for one kind on one day.
///
/// The sequence continues after the highest sequence already used that day,
/// so ids handed out are monotonic and never collide with `existing`.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    kind: EntityKind,
    day: String,
    next_sequence: u32,
}

impl IdAllocator {
    pub fn new<'a>(
        kind: EntityKind,
        date: NaiveDate,
        existing: impl IntoIterator<Item = &'a EntityId>,
    ) -> Self {
        let day = date.format("%Y%m%d").to_string();
        let highest = existing
            .into_iter()
            .filter_map(|id| kind.sequence_of(id))
            .filter(|(d, _)| *d == day)
            .map(|(_, seq)| seq)
            .max()
            .unwrap_or(0);

        Self {
            kind,
            day,
            next_sequence: highest + 1,
        }
    }

    /// Hand out the next id.
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(format!(
            "{}{}{:05}",
            self.kind.prefix(),
            self.day,
            self.next_sequence
        ));
        self.next_sequence += 1;
        id
    }
}
