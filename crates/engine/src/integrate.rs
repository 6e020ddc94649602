//! Integration: the transactional merge of a generated story, its staged
//! entities and the relationships/events it implies.
//!
//! `merge` is pure: it works on a copy and either returns the merged
//! universe or an error, never a partial result. `integrate` wraps it with
//! load, atomic save and a ledger entry.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use storyverse_core::error::IntegrationError;
use storyverse_core::{
    EntityId, EntityKind, HistoryLedger, LedgerEntry, Result, Story, StoryDelta, StoryDraft,
    Universe, UniverseStore,
};
use tracing::{debug, info, warn};

use crate::builder::{add_event, add_relationship};
use crate::staging::StagedEntities;

/// What one integration changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrationResult {
    pub story_id: EntityId,
    /// Staged entities committed under permanent ids
    pub created_entities: Vec<EntityId>,
    pub added_relationships: Vec<EntityId>,
    pub added_events: Vec<EntityId>,
    /// Provisional id → permanent id
    pub id_map: BTreeMap<EntityId, EntityId>,
    /// Set when the story was saved but its ledger entry could not be written
    pub ledger_error: Option<String>,
}

impl IntegrationResult {
    pub fn delta(&self) -> StoryDelta {
        StoryDelta {
            created_entities: self.created_entities.clone(),
            added_relationships: self.added_relationships.clone(),
            added_events: self.added_events.clone(),
        }
    }
}

pub struct IntegrationValidator {
    store: Arc<dyn UniverseStore>,
    ledger: Arc<dyn HistoryLedger>,
}

impl IntegrationValidator {
    pub fn new(store: Arc<dyn UniverseStore>, ledger: Arc<dyn HistoryLedger>) -> Self {
        Self { store, ledger }
    }

    /// Load, merge, save, then record the integration in the ledger.
    ///
    /// Nothing is saved unless the merge succeeds. A ledger failure after
    /// the save does not undo it; it is reported in `ledger_error`.
    pub async fn integrate(
        &self,
        draft: &StoryDraft,
        staged: &StagedEntities,
    ) -> Result<IntegrationResult> {
        let universe = self.store.load().await?;
        let now = Utc::now();
        let (merged, mut result) = Self::merge(draft, staged, &universe, now)?;

        self.store.save(&merged).await?;
        info!(
            story_id = %result.story_id,
            created = result.created_entities.len(),
            relationships = result.added_relationships.len(),
            events = result.added_events.len(),
            "Story integrated"
        );

        let entry = LedgerEntry::StoryIntegrated {
            story_id: result.story_id.clone(),
            timestamp: now,
            delta: result.delta(),
        };
        if let Err(e) = self.ledger.append(entry).await {
            warn!(story_id = %result.story_id, error = %e, "Failed to record integration in ledger");
            result.ledger_error = Some(e.to_string());
        }

        Ok(result)
    }

    /// Merge `draft` and `staged` into a copy of `universe`.
    pub fn merge(
        draft: &StoryDraft,
        staged: &StagedEntities,
        universe: &Universe,
        now: DateTime<Utc>,
    ) -> std::result::Result<(Universe, IntegrationResult), IntegrationError> {
        // 1. Every reference must resolve somewhere.
        let references = draft.all_references();
        let dangling: Vec<EntityId> = references
            .iter()
            .filter(|id| !universe.has_entity(id) && !staged.contains(id))
            .cloned()
            .collect();
        if !dangling.is_empty() {
            return Err(IntegrationError::DanglingReference { ids: dangling });
        }
        if draft.title.trim().is_empty() {
            return Err(IntegrationError::IncompleteDraft("title is blank".into()));
        }
        if draft.body.trim().is_empty() {
            return Err(IntegrationError::IncompleteDraft("body is blank".into()));
        }

        let mut merged = universe.clone();
        let today = now.date_naive();

        // 2. Commit staged entities under permanent ids.
        let mut id_map = BTreeMap::new();
        let mut created_entities = Vec::new();
        let (characters, locations) = staged.clone().into_parts();

        let mut allocator = merged.allocator(EntityKind::Character, today);
        for mut character in characters {
            let permanent = allocator.allocate();
            id_map.insert(character.id.clone(), permanent.clone());
            character.id = permanent.clone();
            character.created_at = now;
            character.updated_at = now;
            merged.characters.insert(permanent.clone(), character);
            created_entities.push(permanent);
        }

        let mut allocator = merged.allocator(EntityKind::Location, today);
        for mut location in locations {
            let permanent = allocator.allocate();
            id_map.insert(location.id.clone(), permanent.clone());
            location.id = permanent.clone();
            location.created_at = now;
            location.updated_at = now;
            merged.locations.insert(permanent.clone(), location);
            created_entities.push(permanent);
        }

        let remap = |id: &EntityId| id_map.get(id).cloned().unwrap_or_else(|| id.clone());

        // 3. The story itself.
        let story_id = merged.allocator(EntityKind::Story, today).allocate();
        let referenced: BTreeSet<EntityId> = references.iter().map(remap).collect();
        let story = Story::new(story_id.clone(), draft, referenced, now)?;

        for entity in &story.referenced_entities {
            if let Some(c) = merged.characters.get_mut(entity) {
                c.record_appearance(&story_id);
                c.updated_at = now;
            } else if let Some(l) = merged.locations.get_mut(entity) {
                l.record_appearance(&story_id);
                l.updated_at = now;
            }
        }
        merged.stories.insert(story_id.clone(), story);

        // 4. Implied relationships and events, skipping ones already known.
        let mut added_relationships = Vec::new();
        for rel in &draft.relationships {
            let added = add_relationship(
                &mut merged,
                &rel.kind,
                rel.participants.iter().map(remap),
                &rel.description,
                Some(&story_id),
                now,
            )?;
            if added.created {
                added_relationships.push(added.id);
            }
        }

        let mut added_events = Vec::new();
        for event in &draft.events {
            let added = add_event(
                &mut merged,
                &event.description,
                event.participants.iter().map(remap),
                event.ordering_hint.clone(),
                Some(&story_id),
                now,
            )?;
            if added.created {
                added_events.push(added.id);
            }
        }

        merged.touch(now);
        merged.validate()?;

        debug!(
            story_id = %story_id,
            committed = id_map.len(),
            "Draft merged"
        );

        Ok((
            merged,
            IntegrationResult {
                story_id,
                created_entities,
                added_relationships,
                added_events,
                id_map,
                ledger_error: None,
            },
        ))
    }
}
