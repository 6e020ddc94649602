//! End-to-end integration tests for Storyverse.
//!
//! These tests drive the full pipeline against file-backed storage in a
//! temporary directory: entity staging, context assembly, reply parsing,
//! integration, illustration and document composition. The model and the
//! image service are replaced by scripted collaborators.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use storyverse_config::AppConfig;
use storyverse_core::error::{ContextError, GenerationError, ImageError};
use storyverse_core::{
    Context, EntityKind, Error, HistoryLedger, ImageRenderer, LedgerEntry, StoryDraft,
    StoryGenerator, UniverseStore,
};
use storyverse_engine::{upsert_character, PipelineSettings, StoryPipeline};
use storyverse_providers::ollama::draft_from_reply;
use storyverse_core::DocumentComposer;
use storyverse_providers::{MarkdownComposer, PdfComposer};
use storyverse_store::{import_legacy, FileUniverseStore, JsonlHistoryLedger};

// ── Scripted collaborators ───────────────────────────────────────────────

/// Returns scripted model replies in sequence, parsed like a real reply.
struct ScriptedGenerator {
    replies: Mutex<Vec<String>>,
    contexts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
            contexts: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.contexts.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl StoryGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "e2e_scripted"
    }

    async fn generate(&self, _prompt: &str, context: &Context) -> Result<StoryDraft, GenerationError> {
        self.contexts.lock().unwrap().push(context.render());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop()
            .expect("ScriptedGenerator exhausted");
        draft_from_reply(&reply, context)
    }
}

struct StalledGenerator;

#[async_trait::async_trait]
impl StoryGenerator for StalledGenerator {
    fn name(&self) -> &str {
        "e2e_stalled"
    }

    async fn generate(&self, _prompt: &str, _context: &Context) -> Result<StoryDraft, GenerationError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(GenerationError::Failed("unreachable".into()))
    }
}

struct PixelRenderer;

#[async_trait::async_trait]
impl ImageRenderer for PixelRenderer {
    fn name(&self) -> &str {
        "e2e_pixels"
    }

    async fn render_scene(&self, _prompt: &str, _size: u32) -> Result<Vec<u8>, ImageError> {
        Ok(vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a])
    }
}

/// A decodable 2x2 RGB PNG.
const TINY_PNG: [u8; 73] = [
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x02, 0x08, 0x02, 0x00, 0x00, 0x00, 0xfd, 0xd4, 0x9a,
    0x73, 0x00, 0x00, 0x00, 0x10, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x38, 0x51, 0xa1, 0x01,
    0x44, 0x0c, 0x10, 0x0a, 0x00, 0x29, 0xee, 0x05, 0xa1, 0x8c, 0x09, 0xce, 0x88, 0x00, 0x00, 0x00,
    0x00, 0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

struct PngRenderer;

#[async_trait::async_trait]
impl ImageRenderer for PngRenderer {
    fn name(&self) -> &str {
        "e2e_png"
    }

    async fn render_scene(&self, _prompt: &str, _size: u32) -> Result<Vec<u8>, ImageError> {
        Ok(TINY_PNG.to_vec())
    }
}

const STORM_REPLY: &str = "Title: Ammu and the Chennai Storm\n\n\
    Story:\n\
    Ammu saw dark clouds over Chennai. She zoomed to the beach and \
    warned the fishermen.\n\n\
    Everyone got home safely.\n\n\
    Moral Lesson:\n\
    Helping others makes us strong.\n\n\
    Word Count: 19\n";

const MARKET_REPLY: &str = "**Title:** Market Day\n\n\
    **Story:**\n\
    Ammu and Kuttan shared mangoes at the market in Chennai.\n\n\
    **Moral Lesson:** Sharing doubles the joy.\n";

// ── Harness ──────────────────────────────────────────────────────────────

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn universe_path(&self) -> PathBuf {
        self.dir.path().join("universe.json")
    }

    fn store(&self) -> Arc<FileUniverseStore> {
        Arc::new(FileUniverseStore::new(self.universe_path()))
    }

    fn ledger(&self) -> Arc<JsonlHistoryLedger> {
        Arc::new(JsonlHistoryLedger::new(self.dir.path().join("ledger.jsonl")))
    }

    fn pipeline(&self, generator: Arc<dyn StoryGenerator>) -> StoryPipeline {
        self.pipeline_with(generator, Arc::new(PixelRenderer), Arc::new(MarkdownComposer::new()))
    }

    fn pipeline_with(
        &self,
        generator: Arc<dyn StoryGenerator>,
        renderer: Arc<dyn ImageRenderer>,
        composer: Arc<dyn DocumentComposer>,
    ) -> StoryPipeline {
        let mut settings = PipelineSettings::from_config(&AppConfig::default());
        settings.images_dir = self.dir.path().join("output/images");
        settings.documents_dir = self.dir.path().join("output/documents");
        settings.generation_timeout = Duration::from_millis(200);

        StoryPipeline::new(
            self.store(),
            self.ledger(),
            generator,
            renderer,
            composer,
            settings,
        )
    }
}

// ── E2E: Story generation ────────────────────────────────────────────────

#[tokio::test]
async fn e2e_first_story_creates_entities_and_persists() {
    let ws = Workspace::new();
    let generator = Arc::new(ScriptedGenerator::new(&[STORM_REPLY]));
    let pipeline = ws.pipeline(generator.clone());

    let (request, staged) = pipeline
        .stage_request(&["Ammu".into()], "Chennai", "Courage", "6-8", Some(150))
        .await
        .unwrap();
    assert_eq!(staged.len(), 2);
    assert!(request.character_ids[0].is_provisional());

    let generated = pipeline.generate_story(&request, &staged, "").await.unwrap();
    assert_eq!(generator.calls(), 1);
    assert_eq!(generated.story.title, "Ammu and the Chennai Storm");
    assert_eq!(generated.story.moral, "Helping others makes us strong.");
    assert_eq!(generated.integration.created_entities.len(), 2);

    // A fresh store over the same file sees the committed universe.
    let reloaded = FileUniverseStore::new(ws.universe_path()).load().await.unwrap();
    assert_eq!(reloaded.characters.len(), 1);
    assert_eq!(reloaded.locations.len(), 1);
    assert_eq!(reloaded.stories.len(), 1);

    let ammu = reloaded.find_character_by_name("ammu").unwrap();
    assert!(ammu.id.is_kind(EntityKind::Character));
    assert_eq!(ammu.story_appearances, vec![generated.story.id.clone()]);

    let story = &reloaded.stories[&generated.story.id];
    assert_eq!(story.word_count(), 19);
    assert!(story.referenced_entities.contains(&ammu.id));

    let entries = ws.ledger().entries().await.unwrap();
    assert!(matches!(
        &entries[..],
        [LedgerEntry::StoryIntegrated { story_id, .. }] if *story_id == generated.story.id
    ));
}

#[tokio::test]
async fn e2e_second_story_reuses_existing_entities() {
    let ws = Workspace::new();
    let generator = Arc::new(ScriptedGenerator::new(&[STORM_REPLY, MARKET_REPLY]));
    let pipeline = ws.pipeline(generator.clone());

    let (request, staged) = pipeline
        .stage_request(&["Ammu".into()], "Chennai", "Courage", "6-8", None)
        .await
        .unwrap();
    let first = pipeline.generate_story(&request, &staged, "").await.unwrap();

    // Different casing, same entities.
    let (request, staged) = pipeline
        .stage_request(&["AMMU".into()], "chennai", "Sharing", "6-8", None)
        .await
        .unwrap();
    assert!(staged.is_empty());
    let second = pipeline.generate_story(&request, &staged, "").await.unwrap();
    assert!(second.integration.created_entities.is_empty());
    assert_ne!(first.story.id, second.story.id);

    // The second context already knows Ammu from the first story.
    assert!(generator.contexts.lock().unwrap()[1].contains("Ammu"));

    let universe = ws.store().load().await.unwrap();
    assert_eq!(universe.characters.len(), 1);
    assert_eq!(universe.stories.len(), 2);
    let ammu = universe.find_character_by_name("Ammu").unwrap();
    assert_eq!(ammu.story_appearances, vec![first.story.id, second.story.id]);
    // "Kuttan" was mentioned but never introduced, so nothing was created.
    assert!(universe.find_character_by_name("Kuttan").is_none());
}

#[tokio::test]
async fn e2e_failed_generation_leaves_document_byte_identical() {
    let ws = Workspace::new();
    let store = ws.store();
    let mut universe = store.load().await.unwrap();
    upsert_character(&mut universe, "Ammu", vec!["Lightning speed".into()], "", Utc::now()).unwrap();
    store.save(&universe).await.unwrap();
    let before = store.snapshot().await.unwrap().unwrap();

    let generator = Arc::new(ScriptedGenerator::new(&["Sorry, I cannot write that."]));
    let pipeline = ws.pipeline(generator);
    let (request, staged) = pipeline
        .stage_request(&["Ammu".into()], "Chennai", "Courage", "6-8", None)
        .await
        .unwrap();
    assert_eq!(staged.len(), 1);

    let err = pipeline.generate_story(&request, &staged, "").await.unwrap_err();
    assert!(matches!(err, Error::Generation(GenerationError::Malformed(_))));

    let after = store.snapshot().await.unwrap().unwrap();
    assert_eq!(before, after);
    assert!(ws.ledger().entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn e2e_generation_timeout_is_service_unavailable() {
    let ws = Workspace::new();
    let pipeline = ws.pipeline(Arc::new(StalledGenerator));
    let (request, staged) = pipeline
        .stage_request(&["Ammu".into()], "Chennai", "Courage", "6-8", None)
        .await
        .unwrap();

    let err = pipeline.generate_story(&request, &staged, "").await.unwrap_err();
    assert!(matches!(err, Error::Generation(GenerationError::Timeout { .. })));
    assert_eq!(err.category().label(), "service unavailable");
    assert!(ws.store().snapshot().await.unwrap().is_none());
}

#[tokio::test]
async fn e2e_request_without_characters_is_rejected() {
    let ws = Workspace::new();
    let generator = Arc::new(ScriptedGenerator::new(&[]));
    let pipeline = ws.pipeline(generator.clone());

    let (request, staged) = pipeline
        .stage_request(&[], "Chennai", "Courage", "6-8", None)
        .await
        .unwrap();
    let err = pipeline.generate_story(&request, &staged, "").await.unwrap_err();
    assert!(matches!(err, Error::Context(ContextError::NoCharacters)));
    assert_eq!(generator.calls(), 0);
}

// ── E2E: Illustration and composition ────────────────────────────────────

#[tokio::test]
async fn e2e_render_then_compose_markdown_document() {
    let ws = Workspace::new();
    let pipeline = ws.pipeline(Arc::new(ScriptedGenerator::new(&[STORM_REPLY])));
    let (request, staged) = pipeline
        .stage_request(&["Ammu".into()], "Chennai", "Courage", "6-8", None)
        .await
        .unwrap();
    let story_id = pipeline
        .generate_story(&request, &staged, "")
        .await
        .unwrap()
        .story
        .id;

    let image = pipeline.render_image(&story_id, Some(600)).await.unwrap();
    assert!(image.starts_with(ws.dir.path().join("output/images").join(story_id.as_str())));
    assert_eq!(std::fs::read(&image).unwrap()[..4], [0x89, b'P', b'N', b'G']);

    let latest = pipeline.latest_image(&story_id).await.unwrap();
    assert_eq!(PathBuf::from(&latest.path), image);

    let document = pipeline.compose(&story_id).await.unwrap();
    let text = std::fs::read_to_string(&document).unwrap();
    assert!(text.starts_with("# Ammu and the Chennai Storm"));
    assert!(text.contains("**Theme:** Courage"));
    assert!(text.contains(&image.display().to_string()));
    assert!(text.contains("## Moral Lesson"));

    let history = pipeline.history(&story_id).await.unwrap();
    assert_eq!(history.len(), 3);
    assert!(matches!(history[0], LedgerEntry::StoryIntegrated { .. }));

    let universe = ws.store().load().await.unwrap();
    assert_eq!(universe.stories[&story_id].image_refs, vec![image.display().to_string()]);
}

#[tokio::test]
async fn e2e_render_then_compose_pdf_document() {
    let ws = Workspace::new();
    let pipeline = ws.pipeline_with(
        Arc::new(ScriptedGenerator::new(&[STORM_REPLY])),
        Arc::new(PngRenderer),
        Arc::new(PdfComposer::new()),
    );
    let (request, staged) = pipeline
        .stage_request(&["Ammu".into()], "Chennai", "Courage", "6-8", None)
        .await
        .unwrap();
    let story_id = pipeline
        .generate_story(&request, &staged, "")
        .await
        .unwrap()
        .story
        .id;
    pipeline.render_image(&story_id, None).await.unwrap();

    let document = pipeline.compose(&story_id).await.unwrap();
    assert!(document.starts_with(ws.dir.path().join("output/documents")));
    let name = document.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with(&format!("story_{story_id}_")));
    assert!(name.ends_with(".pdf"));
    assert!(std::fs::read(&document).unwrap().starts_with(b"%PDF"));

    let latest = ws
        .ledger()
        .latest_artifact(&story_id, storyverse_core::ArtifactKind::Document)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(PathBuf::from(latest.path), document);
}

// ── E2E: Legacy import ───────────────────────────────────────────────────

#[tokio::test]
async fn e2e_imported_universe_feeds_generation() {
    let legacy = r#"{
        "characters": {
            "Minnal Ammu": {
                "id": "CHAR2024120100001",
                "powers": ["Lightning speed"],
                "description": "A quick-thinking girl from Chennai",
                "created_date": "2024-12-01T10:00:00",
                "story_appearances": []
            }
        },
        "locations": {
            "Chennai": { "id": "LOC2024120100001", "description": "A coastal city" }
        },
        "stories": [],
        "relationships": {},
        "events": {}
    }"#;

    let ws = Workspace::new();
    let imported = import_legacy(legacy, Utc::now()).unwrap();
    assert!(imported.skipped.is_empty());
    ws.store().save(&imported.universe).await.unwrap();

    let pipeline = ws.pipeline(Arc::new(ScriptedGenerator::new(&[STORM_REPLY])));
    let (request, staged) = pipeline
        .stage_request(&["CHAR2024120100001".into()], "Chennai", "Courage", "6-8", None)
        .await
        .unwrap();
    assert!(staged.is_empty());

    let generated = pipeline.generate_story(&request, &staged, "").await.unwrap();
    // "Ammu" in the reply is recognised as the short form of "Minnal Ammu".
    assert!(generated
        .story
        .referenced_entities
        .contains(&storyverse_core::EntityId::from("CHAR2024120100001")));
    assert!(generated.integration.created_entities.is_empty());
}
