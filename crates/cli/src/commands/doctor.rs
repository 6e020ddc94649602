//! `storyverse doctor`: Diagnose configuration, storage and collaborators.

use storyverse_config::AppConfig;
use storyverse_core::{HistoryLedger, UniverseStore};
use storyverse_providers::{DiffusionHttpRenderer, OllamaStoryGenerator};
use storyverse_store::{FileUniverseStore, JsonlHistoryLedger};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Storyverse Doctor — System Diagnostics");
    println!("=========================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_path();
    let config = if config_path.exists() {
        match AppConfig::load() {
            Ok(config) => {
                println!("  ✅ Config file valid");
                config
            }
            Err(e) => {
                println!("  ❌ Config file invalid: {e}");
                println!("\n  ⚠️  Fix the config before running further checks.");
                return Ok(());
            }
        }
    } else {
        println!("  ⚠️  No config file — run `storyverse onboard` (using defaults)");
        issues += 1;
        AppConfig::default()
    };

    // Universe document
    let store = FileUniverseStore::new(config.universe_path());
    match store.load().await {
        Ok(universe) if universe.is_empty() => {
            println!("  ✅ Universe readable (empty)");
        }
        Ok(universe) => println!(
            "  ✅ Universe readable ({} characters, {} locations, {} stories)",
            universe.characters.len(),
            universe.locations.len(),
            universe.stories.len()
        ),
        Err(e) => {
            println!("  ❌ Universe unreadable: {e}");
            issues += 1;
        }
    }

    // Ledger
    let ledger = JsonlHistoryLedger::new(config.ledger_path());
    match ledger.entries().await {
        Ok(entries) => println!("  ✅ Ledger readable ({} entries)", entries.len()),
        Err(e) => {
            println!("  ❌ Ledger unreadable: {e}");
            issues += 1;
        }
    }

    // Collaborators
    let generator = OllamaStoryGenerator::from_config(&config.generation);
    if generator.health_check().await {
        println!("  ✅ Story model reachable ({})", generator.model());
    } else {
        println!(
            "  ⚠️  Story model unreachable at {} — start it or set STORYVERSE_OLLAMA_URL",
            config.generation.base_url
        );
        issues += 1;
    }

    let renderer = DiffusionHttpRenderer::from_config(&config.image);
    if renderer.health_check().await {
        println!("  ✅ Image service reachable");
    } else {
        println!(
            "  ⚠️  Image service unreachable at {} — set STORYVERSE_IMAGE_URL",
            config.image.base_url
        );
        issues += 1;
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
