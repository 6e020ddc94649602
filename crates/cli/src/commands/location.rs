//! `storyverse location`: Add and list locations.

use chrono::Utc;
use storyverse_core::Error;
use storyverse_engine::upsert_location;

use super::Runtime;

pub async fn add(name: &str, description: &str) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load()?;
    let mut universe = runtime.load_universe().await?;

    let upserted = upsert_location(&mut universe, name, description, Utc::now()).map_err(Error::from)?;
    runtime.save_universe(&universe).await?;

    let verb = if upserted.created { "Created" } else { "Updated" };
    println!("✅ {verb} location {} ({})", name.trim(), upserted.id);
    Ok(())
}

pub async fn list() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load()?;
    let universe = runtime.load_universe().await?;

    if universe.locations.is_empty() {
        println!("No locations yet. Add one with `storyverse location add <name>`.");
        return Ok(());
    }

    println!("🗺️  Locations ({})", universe.locations.len());
    for location in universe.locations.values() {
        println!("  {}  {}", location.id, location.name);
        if !location.description.is_empty() {
            println!("      {}", location.description);
        }
    }
    Ok(())
}
