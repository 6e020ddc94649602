//! `storyverse story`: Generate, list and show stories.

use storyverse_core::{names_match, EntityId, EntityKind, Error, Universe, AGE_GROUPS, THEMES};
use tracing::warn;

use super::{story_id, Runtime};

pub async fn generate(
    characters: &[String],
    location: &str,
    theme: &str,
    age_group: &str,
    words: Option<u32>,
    direction: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if !THEMES.iter().any(|t| names_match(t, theme)) {
        warn!(theme, known = %THEMES.join(", "), "Theme is not one of the standard themes");
    }
    if !AGE_GROUPS.contains(&age_group.trim()) {
        warn!(age_group, known = %AGE_GROUPS.join(", "), "Age group is not one of the standard groups");
    }

    let runtime = Runtime::load()?;
    let pipeline = runtime.pipeline();

    let (request, staged) = pipeline
        .stage_request(characters, location, theme, age_group, words)
        .await?;
    for (_, name) in staged
        .names(EntityKind::Character)
        .into_iter()
        .chain(staged.names(EntityKind::Location))
    {
        println!("  ✨ New entity: {name}");
    }

    println!("✍️  Writing a story about {} ...", characters.join(", "));
    let generated = pipeline.generate_story(&request, &staged, direction).await?;
    let story = &generated.story;
    let integration = &generated.integration;

    println!("\n📖 {} ({})", story.title, story.id);
    println!("   Theme: {}  Age group: {}  Words: {}", story.theme, story.age_group, story.word_count());
    println!("\n{}\n", story.body);
    if !story.moral.is_empty() {
        println!("Moral Lesson: {}\n", story.moral);
    }
    println!(
        "✅ Integrated: {} new entit(ies), {} relationship(s), {} event(s)",
        integration.created_entities.len(),
        integration.added_relationships.len(),
        integration.added_events.len()
    );
    if let Some(e) = &integration.ledger_error {
        println!("⚠️  The story was saved but its history entry is missing: {e}");
    }
    println!("   Next: `storyverse image render {}`", story.id);
    Ok(())
}

pub async fn list() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load()?;
    let universe = runtime.load_universe().await?;

    if universe.stories.is_empty() {
        println!("No stories yet. Generate one with `storyverse story generate`.");
        return Ok(());
    }

    println!("📖 Stories ({})", universe.stories.len());
    for story in universe.stories.values() {
        println!(
            "  {}  {}  [{} · {} · {} words · {} image(s)]",
            story.id,
            story.title,
            story.theme,
            story.age_group,
            story.word_count(),
            story.image_refs.len()
        );
    }
    Ok(())
}

pub async fn show(raw_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let id = story_id(raw_id)?;
    let runtime = Runtime::load()?;
    let universe = runtime.load_universe().await?;
    let story = universe
        .stories
        .get(&id)
        .ok_or_else(|| Error::not_found(EntityKind::Story, id.as_str()))?;

    println!("📖 {} ({})", story.title, story.id);
    println!("   Theme:      {}", story.theme);
    println!("   Age group:  {}", story.age_group);
    println!("   Generated:  {}", story.generated_at.format("%Y-%m-%d %H:%M:%S"));
    println!("   Words:      {}", story.word_count());
    println!("   Cast:       {}", cast(&universe, story.referenced_entities.iter()));
    println!("\n{}\n", story.body);
    if !story.moral.is_empty() {
        println!("Moral Lesson: {}", story.moral);
    }
    for image in &story.image_refs {
        println!("   🖼️  {image}");
    }
    Ok(())
}

fn cast<'a>(universe: &Universe, ids: impl Iterator<Item = &'a EntityId>) -> String {
    ids.map(|id| universe.entity_name(id).unwrap_or(id.as_str()).to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
