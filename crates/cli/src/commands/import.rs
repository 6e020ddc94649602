//! `storyverse import-legacy`: Convert a legacy universe document.

use chrono::Utc;
use std::path::Path;
use storyverse_core::Error;
use storyverse_store::import_legacy;

use super::Runtime;

pub async fn run(path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load()?;
    let current = runtime.load_universe().await?;
    if !current.is_empty() && !force {
        return Err(format!(
            "Universe at {} is not empty; pass --force to replace it",
            runtime.store.path().display()
        )
        .into());
    }

    let json = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let imported = import_legacy(&json, Utc::now()).map_err(Error::from)?;
    runtime.save_universe(&imported.universe).await?;

    let universe = &imported.universe;
    println!("✅ Imported {}", path.display());
    println!("  Characters:    {}", universe.characters.len());
    println!("  Locations:     {}", universe.locations.len());
    println!("  Relationships: {}", universe.relationships.len());
    println!("  Events:        {}", universe.events.len());
    println!("  Stories:       {}", universe.stories.len());
    if !imported.skipped.is_empty() {
        println!("\n  ⚠️  Skipped {} record(s):", imported.skipped.len());
        for note in &imported.skipped {
            println!("    - {note}");
        }
    }
    Ok(())
}
