//! `storyverse character`: Add and list characters.

use chrono::Utc;
use storyverse_core::Error;
use storyverse_engine::upsert_character;

use super::Runtime;

pub async fn add(
    name: &str,
    powers: Vec<String>,
    description: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load()?;
    let mut universe = runtime.load_universe().await?;

    let upserted =
        upsert_character(&mut universe, name, powers, description, Utc::now()).map_err(Error::from)?;
    runtime.save_universe(&universe).await?;

    if upserted.created {
        println!("✅ Created character {} ({})", name.trim(), upserted.id);
    } else {
        println!("✅ Updated character {} ({})", name.trim(), upserted.id);
    }
    Ok(())
}

pub async fn list() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load()?;
    let universe = runtime.load_universe().await?;

    if universe.characters.is_empty() {
        println!("No characters yet. Add one with `storyverse character add <name>`.");
        return Ok(());
    }

    println!("🦸 Characters ({})", universe.characters.len());
    for character in universe.characters.values() {
        let marker = match &character.superseded_by {
            Some(next) => format!(" (superseded by {next})"),
            None => String::new(),
        };
        println!("  {}  {}{marker}", character.id, character.name);
        if !character.powers.is_empty() {
            println!("      powers: {}", character.powers.join(", "));
        }
        if !character.description.is_empty() {
            println!("      {}", character.description);
        }
        println!(
            "      {} relationship(s), {} story appearance(s)",
            character.relationships.len(),
            character.story_appearances.len()
        );
    }
    Ok(())
}
