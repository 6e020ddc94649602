//! Context assembly: the bounded slice of the universe a story request
//! hands to the generator.
//!
//! Layers, in priority order:
//!
//! 1. **Requested** characters and location: never trimmed
//! 2. **Relationships** touching a requested entity: capped, id order
//! 3. **Related cast** reached through those relationships: capped, and
//!    trimmed first when the token budget is exceeded
//!
//! # Determinism
//!
//! Identical requests over identical universes always produce identical
//! contexts. Candidates are taken in id order; nothing depends on time.

use std::collections::BTreeSet;
use storyverse_config::ContextConfig;
use storyverse_core::error::ContextError;
use storyverse_core::{
    Character, Context, ContextStats, EntityId, EntityKind, Location, RelatedEntity, Relationship,
    StoryRequest, Universe,
};
use tracing::debug;

use crate::staging::StagedEntities;

// ── Types ─────────────────────────────────────────────────────────────────

/// Caps applied while assembling a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextLimits {
    pub max_related_entities: usize,
    pub max_relationships: usize,
    /// Token budget for the rendered context; 0 disables it.
    pub token_budget: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self::from(&ContextConfig::default())
    }
}

impl From<&ContextConfig> for ContextLimits {
    fn from(config: &ContextConfig) -> Self {
        Self {
            max_related_entities: config.max_related_entities,
            max_relationships: config.max_relationships,
            token_budget: config.token_budget,
        }
    }
}

pub struct ContextAssembler {
    limits: ContextLimits,
}

// ── Assembly ──────────────────────────────────────────────────────────────

impl ContextAssembler {
    pub fn new(limits: ContextLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> ContextLimits {
        self.limits
    }

    /// Build the context for `request`.
    ///
    /// Requested ids may name committed or staged records. Any id that
    /// resolves in neither fails the whole request with
    /// [`ContextError::InsufficientContext`].
    pub fn build_context(
        &self,
        request: &StoryRequest,
        universe: &Universe,
        staged: &StagedEntities,
    ) -> Result<Context, ContextError> {
        if request.character_ids.is_empty() {
            return Err(ContextError::NoCharacters);
        }

        let (characters, location) = gather_requested(request, universe, staged)?;
        let requested: BTreeSet<&EntityId> = request.requested_ids().collect();

        // Relationships touching any requested entity, in id order.
        let touching: Vec<&Relationship> = universe
            .relationships
            .values()
            .filter(|r| requested.iter().any(|id| r.involves(id)))
            .collect();
        let relationships: Vec<Relationship> = touching
            .iter()
            .take(self.limits.max_relationships)
            .map(|r| (*r).clone())
            .collect();

        // First-degree neighbours, in the order their edges were taken.
        let mut seen: BTreeSet<&EntityId> = BTreeSet::new();
        let mut candidates: Vec<RelatedEntity> = Vec::new();
        for rel in &touching {
            for participant in &rel.participants {
                if requested.contains(participant) || !seen.insert(participant) {
                    continue;
                }
                if let Some(related) = related_entity(universe, participant, &rel.kind) {
                    candidates.push(related);
                }
            }
        }

        let related_total = candidates.len();
        candidates.truncate(self.limits.max_related_entities);

        let mut context = Context {
            request: request.clone(),
            characters,
            location,
            related: candidates,
            relationships,
            stats: ContextStats {
                requested: requested.len(),
                ..Default::default()
            },
        };

        self.enforce_budget(&mut context);

        context.stats.related_included = context.related.len();
        context.stats.related_dropped = related_total - context.related.len();
        context.stats.relationships_included = context.relationships.len();
        context.stats.relationships_dropped = touching.len() - context.relationships.len();
        context.stats.estimated_tokens = context.estimated_tokens();

        debug!(
            requested = context.stats.requested,
            related = context.stats.related_included,
            related_dropped = context.stats.related_dropped,
            relationships = context.stats.relationships_included,
            relationships_dropped = context.stats.relationships_dropped,
            tokens = context.stats.estimated_tokens,
            "Context assembled"
        );

        Ok(context)
    }

    /// Drop related entities from the end, then relationships, until the
    /// rendered context fits. Requested entities always stay.
    fn enforce_budget(&self, context: &mut Context) {
        let budget = self.limits.token_budget;
        if budget == 0 {
            return;
        }
        while context.estimated_tokens() > budget {
            if context.related.pop().is_some() {
                continue;
            }
            if context.relationships.pop().is_none() {
                break;
            }
        }
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(ContextLimits::default())
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────

fn gather_requested(
    request: &StoryRequest,
    universe: &Universe,
    staged: &StagedEntities,
) -> Result<(Vec<Character>, Location), ContextError> {
    let mut missing = Vec::new();
    let mut characters: Vec<Character> = Vec::new();

    for id in &request.character_ids {
        if characters.iter().any(|c| &c.id == id) {
            continue;
        }
        match universe.characters.get(id).or_else(|| staged.character(id)) {
            Some(c) => characters.push(c.clone()),
            None => missing.push(id.clone()),
        }
    }

    let location = universe
        .locations
        .get(&request.location_id)
        .or_else(|| staged.location(&request.location_id))
        .cloned();
    if location.is_none() {
        missing.push(request.location_id.clone());
    }

    match location {
        Some(location) if missing.is_empty() => Ok((characters, location)),
        _ => Err(ContextError::InsufficientContext { missing }),
    }
}

fn related_entity(universe: &Universe, id: &EntityId, via: &str) -> Option<RelatedEntity> {
    if let Some(c) = universe.characters.get(id) {
        return Some(RelatedEntity {
            id: c.id.clone(),
            kind: EntityKind::Character,
            name: c.name.clone(),
            summary: c.powers.join(", "),
            via: via.to_string(),
        });
    }
    universe.locations.get(id).map(|l| RelatedEntity {
        id: l.id.clone(),
        kind: EntityKind::Location,
        name: l.name.clone(),
        summary: l.description.clone(),
        via: via.to_string(),
    })
}
