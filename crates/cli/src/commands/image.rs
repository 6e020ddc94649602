//! `storyverse image`: Render and look up story illustrations.

use super::{story_id, Runtime};

pub async fn render(raw_id: &str, size: Option<u32>) -> Result<(), Box<dyn std::error::Error>> {
    let id = story_id(raw_id)?;
    let runtime = Runtime::load()?;

    println!("🎨 Rendering illustration for {id} ...");
    let path = runtime.pipeline().render_image(&id, size).await?;
    println!("✅ Image saved: {}", path.display());
    Ok(())
}

pub async fn latest(raw_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let id = story_id(raw_id)?;
    let runtime = Runtime::load()?;

    let record = runtime.pipeline().latest_image(&id).await?;
    println!("🖼️  {}", record.path);
    println!("   Rendered: {}", record.timestamp.format("%Y-%m-%d %H:%M:%S"));
    Ok(())
}
