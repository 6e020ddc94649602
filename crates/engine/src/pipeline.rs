//! The story pipeline: request → context → generation → integration, plus
//! illustration and document composition for integrated stories.
//!
//! Every collaborator is injected; the pipeline holds no global state and
//! never mutates the universe when a collaborator fails or times out.

use chrono::Utc;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use storyverse_config::{AppConfig, GenerationConfig, ImageConfig};
use storyverse_core::error::{ComposeError, GenerationError, ImageError};
use storyverse_core::{
    ArtifactKind, ArtifactRecord, DocumentComposer, EntityId, EntityKind, Error, HistoryLedger,
    ImageRenderer, LedgerEntry, Result, Story, StoryGenerator, StoryRequest, UniverseStore,
};
use tracing::{debug, info, warn};

use crate::context::{ContextAssembler, ContextLimits};
use crate::integrate::{IntegrationResult, IntegrationValidator};
use crate::resolver::{EntityResolver, MatchPolicy};
use crate::scene::{clamp_image_size, ScenePrompt};
use crate::staging::StagedEntities;

/// Settings the pipeline reads from configuration.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub generation: GenerationConfig,
    pub image: ImageConfig,
    pub images_dir: PathBuf,
    pub documents_dir: PathBuf,
    pub generation_timeout: Duration,
    pub image_timeout: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            generation: config.generation.clone(),
            image: config.image.clone(),
            images_dir: config.images_dir(),
            documents_dir: config.documents_dir(),
            generation_timeout: Duration::from_secs(config.generation.timeout_secs),
            image_timeout: Duration::from_secs(config.image.timeout_secs),
        }
    }
}

/// A story that went through generation and integration.
#[derive(Debug, Clone)]
pub struct GeneratedStory {
    pub story: Story,
    pub integration: IntegrationResult,
}

pub struct StoryPipeline {
    store: Arc<dyn UniverseStore>,
    ledger: Arc<dyn HistoryLedger>,
    generator: Arc<dyn StoryGenerator>,
    renderer: Arc<dyn ImageRenderer>,
    composer: Arc<dyn DocumentComposer>,
    resolver: EntityResolver,
    assembler: ContextAssembler,
    integrator: IntegrationValidator,
    settings: PipelineSettings,
}

impl StoryPipeline {
    pub fn new(
        store: Arc<dyn UniverseStore>,
        ledger: Arc<dyn HistoryLedger>,
        generator: Arc<dyn StoryGenerator>,
        renderer: Arc<dyn ImageRenderer>,
        composer: Arc<dyn DocumentComposer>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            integrator: IntegrationValidator::new(store.clone(), ledger.clone()),
            store,
            ledger,
            generator,
            renderer,
            composer,
            resolver: EntityResolver::default(),
            assembler: ContextAssembler::default(),
            settings,
        }
    }

    /// Wire a pipeline with resolver and context limits from `config`.
    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn UniverseStore>,
        ledger: Arc<dyn HistoryLedger>,
        generator: Arc<dyn StoryGenerator>,
        renderer: Arc<dyn ImageRenderer>,
        composer: Arc<dyn DocumentComposer>,
    ) -> Self {
        Self::new(
            store,
            ledger,
            generator,
            renderer,
            composer,
            PipelineSettings::from_config(config),
        )
        .with_match_policy(MatchPolicy::from(&config.resolver))
        .with_context_limits(ContextLimits::from(&config.context))
    }

    pub fn with_match_policy(mut self, policy: MatchPolicy) -> Self {
        self.resolver = EntityResolver::new(policy);
        self
    }

    pub fn with_context_limits(mut self, limits: ContextLimits) -> Self {
        self.assembler = ContextAssembler::new(limits);
        self
    }

    pub fn store(&self) -> &Arc<dyn UniverseStore> {
        &self.store
    }

    pub fn ledger(&self) -> &Arc<dyn HistoryLedger> {
        &self.ledger
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    // ── Story generation ─────────────────────────────────────────────────

    /// Resolve character and location references into a request. Names
    /// that match nothing are staged, not committed.
    pub async fn stage_request(
        &self,
        characters: &[String],
        location: &str,
        theme: &str,
        age_group: &str,
        word_count: Option<u32>,
    ) -> Result<(StoryRequest, StagedEntities)> {
        let universe = self.store.load().await?;
        let mut staged = StagedEntities::new();

        let mut character_ids = Vec::new();
        for reference in characters {
            let id = self
                .resolver
                .resolve_id(reference, EntityKind::Character, &universe, &mut staged)?;
            if !character_ids.contains(&id) {
                character_ids.push(id);
            }
        }
        let location_id =
            self.resolver
                .resolve_id(location, EntityKind::Location, &universe, &mut staged)?;

        let request = StoryRequest {
            character_ids,
            location_id,
            theme: theme.trim().to_string(),
            age_group: age_group.trim().to_string(),
            word_count: Some(self.settings.generation.word_count(word_count)),
        };
        debug!(staged = staged.len(), "Story request staged");
        Ok((request, staged))
    }

    /// Generate a story for `request` and integrate it.
    ///
    /// The context is checked before the generator is called. A generator
    /// failure or timeout leaves the universe untouched.
    pub async fn generate_story(
        &self,
        request: &StoryRequest,
        staged: &StagedEntities,
        direction: &str,
    ) -> Result<GeneratedStory> {
        let universe = self.store.load().await?;
        let context = self.assembler.build_context(request, &universe, staged)?;

        let timeout = self.settings.generation_timeout;
        info!(
            generator = self.generator.name(),
            tokens = context.stats.estimated_tokens,
            "Generating story"
        );
        let mut draft = match tokio::time::timeout(timeout, self.generator.generate(direction, &context)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "Story generation timed out");
                return Err(GenerationError::Timeout {
                    timeout_secs: timeout.as_secs(),
                }
                .into());
            }
        };

        if draft.theme.trim().is_empty() {
            draft.theme = request.theme.clone();
        }
        if draft.age_group.trim().is_empty() {
            draft.age_group = request.age_group.clone();
        }

        // Requested entities are always referenced; mentions add to them.
        let mut references: BTreeSet<EntityId> = request.requested_ids().cloned().collect();
        references.extend(draft.referenced_entities.iter().cloned());
        for name in &draft.referenced_entity_names {
            let mention = [EntityKind::Character, EntityKind::Location]
                .into_iter()
                .find_map(|kind| self.resolver.lookup(name, kind, &universe, staged).ok().flatten());
            match mention {
                Some(resolution) => {
                    references.insert(resolution.id);
                }
                None => debug!(name = %name, "Mentioned name matches no entity, ignoring"),
            }
        }
        draft.referenced_entities = references.into_iter().collect();

        let integration = self.integrator.integrate(&draft, staged).await?;
        let story = self
            .store
            .load()
            .await?
            .stories
            .remove(&integration.story_id)
            .ok_or_else(|| Error::not_found(EntityKind::Story, integration.story_id.as_str()))?;

        Ok(GeneratedStory { story, integration })
    }

    // ── Illustration ─────────────────────────────────────────────────────

    /// Render an image for an integrated story and record it.
    ///
    /// Returns the path of the written image.
    pub async fn render_image(&self, story_id: &EntityId, size: Option<u32>) -> Result<PathBuf> {
        let mut universe = self.store.load().await?;
        let story = universe
            .stories
            .get(story_id)
            .ok_or_else(|| Error::not_found(EntityKind::Story, story_id.as_str()))?;

        let image = &self.settings.image;
        let prompt = ScenePrompt::for_story(story, &universe, &image.style);
        let size = clamp_image_size(
            size.unwrap_or(image.default_size),
            image.min_size,
            image.max_size,
            image.size_step,
        );

        let timeout = self.settings.image_timeout;
        info!(story_id = %story_id, size, renderer = self.renderer.name(), "Rendering image");
        debug!(prompt = %prompt.weighted, "Scene prompt");
        let bytes = match tokio::time::timeout(timeout, self.renderer.render_scene(&prompt.weighted, size)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "Image generation timed out");
                return Err(ImageError::Timeout {
                    timeout_secs: timeout.as_secs(),
                }
                .into());
            }
        };

        let now = Utc::now();
        let dir = self.settings.images_dir.join(story_id.as_str());
        let path = dir.join(format!(
            "story_image_{story_id}_{}.png",
            now.format("%Y%m%d%H%M%S")
        ));
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ImageError::Failed(format!("Failed to create {}: {e}", dir.display())))?;
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| ImageError::Failed(format!("Failed to write {}: {e}", path.display())))?;

        let path_text = path.display().to_string();
        if let Some(story) = universe.stories.get_mut(story_id) {
            story.add_image(path_text.clone());
        }
        universe.touch(now);
        self.store.save(&universe).await?;
        self.ledger
            .record_artifact(story_id, ArtifactKind::Image, &path_text, now)
            .await?;

        info!(story_id = %story_id, path = %path.display(), bytes = bytes.len(), "Image saved");
        Ok(path)
    }

    /// The most recent image recorded for a story.
    pub async fn latest_image(&self, story_id: &EntityId) -> Result<ArtifactRecord> {
        self.ledger
            .latest_artifact(story_id, ArtifactKind::Image)
            .await?
            .ok_or_else(|| Error::NotFound {
                kind: "Image",
                id: story_id.to_string(),
            })
    }

    // ── Composition ──────────────────────────────────────────────────────

    /// Compose a document from a story and its latest image.
    pub async fn compose(&self, story_id: &EntityId) -> Result<PathBuf> {
        let universe = self.store.load().await?;
        let story = universe
            .stories
            .get(story_id)
            .ok_or_else(|| Error::not_found(EntityKind::Story, story_id.as_str()))?;

        let image = self
            .ledger
            .latest_artifact(story_id, ArtifactKind::Image)
            .await?
            .ok_or_else(|| ComposeError::MissingImage {
                story_id: story_id.clone(),
            })?;

        let path = self
            .composer
            .compose(story, std::path::Path::new(&image.path), &self.settings.documents_dir)
            .await?;

        let path_text = path.display().to_string();
        self.ledger
            .record_artifact(story_id, ArtifactKind::Document, &path_text, Utc::now())
            .await?;
        info!(story_id = %story_id, composer = self.composer.name(), path = %path_text, "Document composed");
        Ok(path)
    }

    /// A story's ledger history in append order.
    pub async fn history(&self, story_id: &EntityId) -> Result<Vec<LedgerEntry>> {
        Ok(self.ledger.entries_for(story_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use storyverse_core::{Context, StoryDraft};
    use storyverse_store::{InMemoryHistoryLedger, InMemoryUniverseStore};

    /// Echoes the context back as a story mentioning every entity name.
    struct EchoGenerator;

    #[async_trait]
    impl StoryGenerator for EchoGenerator {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(
            &self,
            _prompt: &str,
            context: &Context,
        ) -> std::result::Result<StoryDraft, GenerationError> {
            let names: Vec<String> = context
                .entity_names()
                .into_iter()
                .map(|(_, name)| name.to_string())
                .collect();
            Ok(StoryDraft {
                title: format!("{} and the storm", names[0]),
                body: format!("{} met at night in the rain.", names.join(" and ")),
                moral: "Friends help each other.".into(),
                referenced_entity_names: names,
                ..Default::default()
            })
        }
    }

    struct HangingGenerator;

    #[async_trait]
    impl StoryGenerator for HangingGenerator {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn generate(
            &self,
            _prompt: &str,
            _context: &Context,
        ) -> std::result::Result<StoryDraft, GenerationError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(GenerationError::Failed("unreachable".into()))
        }
    }

    /// Records every prompt it is asked to render.
    struct RecordingRenderer {
        prompts: Mutex<Vec<(String, u32)>>,
    }

    #[async_trait]
    impl ImageRenderer for RecordingRenderer {
        fn name(&self) -> &str {
            "recording"
        }

        async fn render_scene(
            &self,
            prompt: &str,
            size: u32,
        ) -> std::result::Result<Vec<u8>, ImageError> {
            self.prompts.lock().unwrap().push((prompt.to_string(), size));
            Ok(vec![0x89, b'P', b'N', b'G'])
        }
    }

    struct NamingComposer;

    #[async_trait]
    impl DocumentComposer for NamingComposer {
        fn name(&self) -> &str {
            "naming"
        }

        async fn compose(
            &self,
            story: &Story,
            image_path: &Path,
            out_dir: &Path,
        ) -> std::result::Result<PathBuf, ComposeError> {
            assert!(image_path.exists());
            Ok(out_dir.join(format!("story_{}.md", story.id)))
        }
    }

    struct Harness {
        pipeline: StoryPipeline,
        store: Arc<InMemoryUniverseStore>,
        renderer: Arc<RecordingRenderer>,
        _dir: tempfile::TempDir,
    }

    fn harness(generator: Arc<dyn StoryGenerator>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryUniverseStore::new());
        let renderer = Arc::new(RecordingRenderer {
            prompts: Mutex::new(Vec::new()),
        });
        let mut settings = PipelineSettings::from_config(&AppConfig::default());
        settings.images_dir = dir.path().join("images");
        settings.documents_dir = dir.path().join("documents");
        settings.generation_timeout = Duration::from_millis(50);

        let pipeline = StoryPipeline::new(
            store.clone(),
            Arc::new(InMemoryHistoryLedger::new()),
            generator,
            renderer.clone(),
            Arc::new(NamingComposer),
            settings,
        );
        Harness {
            pipeline,
            store,
            renderer,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn new_character_and_location_are_committed_with_the_story() {
        let h = harness(Arc::new(EchoGenerator));
        let (request, staged) = h
            .pipeline
            .stage_request(&["Ammu".into()], "Chennai", "Courage", "6-8", None)
            .await
            .unwrap();
        assert_eq!(staged.len(), 2);
        assert_eq!(request.word_count, Some(200));

        let generated = h.pipeline.generate_story(&request, &staged, "").await.unwrap();
        assert_eq!(generated.integration.created_entities.len(), 2);
        assert_eq!(generated.story.theme, "Courage");

        let universe = h.store.load().await.unwrap();
        assert_eq!(universe.characters.len(), 1);
        assert_eq!(universe.locations.len(), 1);
        assert_eq!(universe.stories.len(), 1);
        assert_eq!(generated.story.referenced_entities.len(), 2);

        // Asking again by name finds the committed records.
        let (again, staged) = h
            .pipeline
            .stage_request(&["ammu".into()], "CHENNAI", "Courage", "6-8", None)
            .await
            .unwrap();
        assert!(staged.is_empty());
        assert!(universe.characters.contains_key(&again.character_ids[0]));
    }

    #[tokio::test]
    async fn generation_timeout_leaves_universe_untouched() {
        let h = harness(Arc::new(HangingGenerator));
        let (request, staged) = h
            .pipeline
            .stage_request(&["Ammu".into()], "Chennai", "Courage", "6-8", None)
            .await
            .unwrap();

        let err = h.pipeline.generate_story(&request, &staged, "").await.unwrap_err();
        assert!(matches!(err, Error::Generation(GenerationError::Timeout { .. })));
        assert!(h.store.snapshot().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_requested_id_fails_before_generation() {
        let h = harness(Arc::new(HangingGenerator));
        let request = StoryRequest {
            character_ids: vec![EntityId::from("CHAR2025010100001")],
            location_id: EntityId::from("LOC2025010100001"),
            theme: "Courage".into(),
            age_group: "6-8".into(),
            word_count: None,
        };
        let err = h
            .pipeline
            .generate_story(&request, &StagedEntities::new(), "")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Context(_)));
    }

    #[tokio::test]
    async fn image_then_compose_uses_latest_image() {
        let h = harness(Arc::new(EchoGenerator));
        let (request, staged) = h
            .pipeline
            .stage_request(&["Ammu".into()], "Chennai", "Courage", "6-8", None)
            .await
            .unwrap();
        let story_id = h
            .pipeline
            .generate_story(&request, &staged, "")
            .await
            .unwrap()
            .story
            .id;

        // Composing before any image exists is refused.
        let err = h.pipeline.compose(&story_id).await.unwrap_err();
        assert!(matches!(err, Error::Compose(ComposeError::MissingImage { .. })));

        let path = h.pipeline.render_image(&story_id, Some(500)).await.unwrap();
        assert!(path.exists());
        let file_name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(file_name.starts_with(&format!("story_image_{story_id}_")));

        let (prompt, size) = h.renderer.prompts.lock().unwrap()[0].clone();
        assert_eq!(size, 448);
        assert!(prompt.contains("nighttime, rainy"));

        let story = &h.store.load().await.unwrap().stories[&story_id];
        assert_eq!(story.image_refs.len(), 1);

        let latest = h.pipeline.latest_image(&story_id).await.unwrap();
        assert_eq!(PathBuf::from(&latest.path), path);

        let document = h.pipeline.compose(&story_id).await.unwrap();
        assert!(document.ends_with(format!("story_{story_id}.md")));
        assert_eq!(h.pipeline.history(&story_id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn rendering_unknown_story_is_not_found() {
        let h = harness(Arc::new(EchoGenerator));
        let err = h
            .pipeline
            .render_image(&EntityId::from("STORY2025010100009"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "Story", .. }));
        assert!(h.renderer.prompts.lock().unwrap().is_empty());
    }
}
