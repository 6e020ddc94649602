//! `storyverse compose` / `storyverse history`.

use storyverse_core::LedgerEntry;

use super::{story_id, Runtime};

pub async fn compose(raw_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let id = story_id(raw_id)?;
    let runtime = Runtime::load()?;

    let path = runtime.pipeline().compose(&id).await?;
    println!("✅ Document saved: {}", path.display());
    Ok(())
}

pub async fn history(raw_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let id = story_id(raw_id)?;
    let runtime = Runtime::load()?;

    let entries = runtime.pipeline().history(&id).await?;
    if entries.is_empty() {
        println!("No history recorded for {id}.");
        return Ok(());
    }

    println!("🕰️  History of {id}");
    for entry in &entries {
        let at = entry.timestamp().format("%Y-%m-%d %H:%M:%S");
        match entry {
            LedgerEntry::StoryIntegrated { delta, .. } => println!(
                "  {at}  integrated: {} new entit(ies), {} relationship(s), {} event(s)",
                delta.created_entities.len(),
                delta.added_relationships.len(),
                delta.added_events.len()
            ),
            LedgerEntry::Artifact(record) => println!("  {at}  {}: {}", record.kind, record.path),
        }
    }
    Ok(())
}
