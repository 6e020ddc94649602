pub mod character;
pub mod compose;
pub mod doctor;
pub mod image;
pub mod import;
pub mod location;
pub mod onboard;
pub mod relation;
pub mod status;
pub mod story;

use std::sync::Arc;
use storyverse_config::AppConfig;
use storyverse_core::error::ResolveError;
use storyverse_core::{EntityId, EntityKind, Universe, UniverseStore};
use storyverse_engine::{EntityResolver, MatchPolicy, StagedEntities, StoryPipeline};
use storyverse_store::{FileUniverseStore, JsonlHistoryLedger};
use tracing::debug;

/// Configuration plus the persistent store and ledger it points at.
pub struct Runtime {
    pub config: AppConfig,
    pub store: Arc<FileUniverseStore>,
    pub ledger: Arc<JsonlHistoryLedger>,
}

impl Runtime {
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
        debug!(
            universe = %config.universe_path().display(),
            ledger = %config.ledger_path().display(),
            "Runtime configured"
        );
        Ok(Self {
            store: Arc::new(FileUniverseStore::new(config.universe_path())),
            ledger: Arc::new(JsonlHistoryLedger::new(config.ledger_path())),
            config,
        })
    }

    pub async fn load_universe(&self) -> storyverse_core::Result<Universe> {
        Ok(self.store.load().await?)
    }

    pub async fn save_universe(&self, universe: &Universe) -> storyverse_core::Result<()> {
        Ok(self.store.save(universe).await?)
    }

    pub fn resolver(&self) -> EntityResolver {
        EntityResolver::new(MatchPolicy::from(&self.config.resolver))
    }

    /// A pipeline wired to the configured collaborators.
    pub fn pipeline(&self) -> StoryPipeline {
        let collaborators = storyverse_providers::build_from_config(&self.config);
        StoryPipeline::from_config(
            &self.config,
            self.store.clone(),
            self.ledger.clone(),
            collaborators.generator,
            collaborators.renderer,
            collaborators.composer,
        )
    }
}

/// Resolve a reference to an entity that must already exist.
///
/// Character ids, location ids and names of either kind are accepted.
pub fn resolve_existing(
    resolver: &EntityResolver,
    reference: &str,
    universe: &Universe,
) -> Result<EntityId, storyverse_core::Error> {
    let staged = StagedEntities::new();
    let kinds = match EntityId::new(reference.trim()).kind() {
        Some(kind) => vec![kind],
        None => vec![EntityKind::Character, EntityKind::Location],
    };
    for kind in kinds.iter().copied() {
        if let Some(resolution) = resolver.lookup(reference, kind, universe, &staged)? {
            return Ok(resolution.id);
        }
    }
    Err(ResolveError::Unknown {
        reference: reference.trim().to_string(),
        kind: kinds[0].name(),
    }
    .into())
}

/// Parse a story id argument.
pub fn story_id(raw: &str) -> Result<EntityId, storyverse_core::Error> {
    let id = EntityId::new(raw.trim());
    if id.is_kind(EntityKind::Story) {
        Ok(id)
    } else {
        Err(ResolveError::KindMismatch {
            reference: raw.trim().to_string(),
            expected: EntityKind::Story.name(),
        }
        .into())
    }
}
