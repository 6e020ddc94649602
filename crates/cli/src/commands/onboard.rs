//! `storyverse onboard`: First-time setup.

use storyverse_config::AppConfig;
use storyverse_core::{Universe, UniverseStore};

use super::Runtime;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = AppConfig::config_path();

    println!("📚 Storyverse — First-Time Setup");
    println!("================================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if !config_path.exists() {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config: {}", config_path.display());
    } else {
        println!("  Config exists: {}", config_path.display());
    }

    let runtime = Runtime::load()?;
    for dir in [runtime.config.images_dir(), runtime.config.documents_dir()] {
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
            println!("✅ Created output directory: {}", dir.display());
        }
    }

    match runtime
        .store
        .snapshot()
        .await
        .map_err(storyverse_core::Error::from)?
    {
        Some(_) => println!("  Universe exists: {}", runtime.store.path().display()),
        None => {
            runtime.save_universe(&Universe::new()).await?;
            println!("✅ Created empty universe: {}", runtime.store.path().display());
        }
    }

    println!("\n🎉 Setup complete! Next steps:");
    println!("  1. Edit {} to point at your model and image services", config_path.display());
    println!("  2. Run `storyverse doctor` to check connectivity");
    println!("  3. Run `storyverse story generate -c <character> -l <location> -t <theme> -a <age>`");

    Ok(())
}
