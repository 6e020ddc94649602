//! `storyverse relate` / `storyverse event`: Connect existing entities.

use chrono::Utc;
use storyverse_core::{EntityId, Error, Universe};
use storyverse_engine::{add_event, add_relationship, EntityResolver};

use super::{resolve_existing, Runtime};

pub async fn relate(
    kind: &str,
    participants: &[String],
    description: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load()?;
    let mut universe = runtime.load_universe().await?;
    let ids = resolve_all(&runtime.resolver(), participants, &universe)?;

    let upserted = add_relationship(&mut universe, kind, ids, description, None, Utc::now())
        .map_err(Error::from)?;
    if !upserted.created {
        println!("  Relationship already recorded ({})", upserted.id);
        return Ok(());
    }

    runtime.save_universe(&universe).await?;
    println!("✅ Added {} relationship {}", kind.trim(), upserted.id);
    Ok(())
}

pub async fn event(
    description: &str,
    participants: &[String],
    when: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load()?;
    let mut universe = runtime.load_universe().await?;
    let ids = resolve_all(&runtime.resolver(), participants, &universe)?;

    let upserted =
        add_event(&mut universe, description, ids, when, None, Utc::now()).map_err(Error::from)?;
    if !upserted.created {
        println!("  Event already recorded ({})", upserted.id);
        return Ok(());
    }

    runtime.save_universe(&universe).await?;
    println!("✅ Added event {}", upserted.id);
    Ok(())
}

fn resolve_all(
    resolver: &EntityResolver,
    references: &[String],
    universe: &Universe,
) -> Result<Vec<EntityId>, Error> {
    references
        .iter()
        .map(|reference| resolve_existing(resolver, reference, universe))
        .collect()
}
