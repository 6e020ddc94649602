//! `storyverse status`: Show universe and output status.

use storyverse_config::AppConfig;
use storyverse_core::HistoryLedger;

use super::Runtime;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::load()?;
    let config = &runtime.config;

    println!("📚 Storyverse Status");
    println!("====================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Universe:     {}", runtime.store.path().display());
    println!("  Ledger:       {}", runtime.ledger.path().display());
    println!("  Images:       {}", config.images_dir().display());
    println!(
        "  Documents:    {} ({:?})",
        config.documents_dir().display(),
        config.outputs.document_format
    );
    println!("  Model:        {} @ {}", config.generation.model, config.generation.base_url);
    println!("  Images API:   {}", config.image.base_url);
    println!(
        "  Resolver:     threshold={:.2}, margin={:.2}",
        config.resolver.similarity_threshold, config.resolver.separation_margin
    );

    let universe = runtime.load_universe().await?;
    println!();
    println!("  Characters:    {}", universe.characters.len());
    println!("  Locations:     {}", universe.locations.len());
    println!("  Relationships: {}", universe.relationships.len());
    println!("  Events:        {}", universe.events.len());
    println!("  Stories:       {}", universe.stories.len());
    match universe.last_updated {
        Some(at) => println!("  Last updated:  {}", at.format("%Y-%m-%d %H:%M:%S")),
        None => println!("  Last updated:  never"),
    }

    let entries = runtime
        .ledger
        .entries()
        .await
        .map_err(storyverse_core::Error::from)?;
    println!("  Ledger:        {} entries", entries.len());

    if !AppConfig::config_path().exists() {
        println!("\n  ⚠️  No config file — run `storyverse onboard` first");
    }

    Ok(())
}
