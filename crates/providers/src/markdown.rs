//! Markdown story documents: title, metadata, illustration, body, moral
//! and a generation footer.

use async_trait::async_trait;
use chrono::Utc;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use storyverse_core::error::ComposeError;
use storyverse_core::{DocumentComposer, Story};
use tracing::debug;

#[derive(Debug, Default)]
pub struct MarkdownComposer;

impl MarkdownComposer {
    pub fn new() -> Self {
        Self
    }

    /// The document text for `story` illustrated by `image_path`.
    pub fn render(story: &Story, image_path: &Path) -> String {
        let mut doc = String::new();
        let _ = writeln!(doc, "# {}\n", story.title);
        let _ = writeln!(doc, "**Theme:** {}  ", story.theme);
        let _ = writeln!(doc, "**Age Group:** {}\n", story.age_group);
        let _ = writeln!(doc, "![{}]({})\n", story.title, image_path.display());

        let _ = writeln!(doc, "{}\n", body_text(story));

        if !story.moral.is_empty() {
            let _ = writeln!(doc, "## Moral Lesson\n\n{}\n", story.moral);
        }

        doc.push_str("---\n\n");
        let _ = writeln!(
            doc,
            "Generated: {}  ",
            story.generated_at.format("%Y-%m-%d %H:%M:%S")
        );
        let _ = writeln!(doc, "Word Count: {}", story.word_count());
        doc
    }
}

/// The story body without the "Story:" label some replies keep.
pub(crate) fn body_text(story: &Story) -> &str {
    let body = story.body.trim();
    body.strip_prefix("Story:").unwrap_or(body).trim()
}

#[async_trait]
impl DocumentComposer for MarkdownComposer {
    fn name(&self) -> &str {
        "markdown"
    }

    async fn compose(
        &self,
        story: &Story,
        image_path: &Path,
        out_dir: &Path,
    ) -> std::result::Result<PathBuf, ComposeError> {
        match tokio::fs::try_exists(image_path).await {
            Ok(true) => {}
            _ => {
                return Err(ComposeError::Failed(format!(
                    "Image {} does not exist",
                    image_path.display()
                )));
            }
        }

        tokio::fs::create_dir_all(out_dir).await.map_err(|e| {
            ComposeError::Failed(format!("Failed to create {}: {e}", out_dir.display()))
        })?;

        let file_name = format!(
            "story_{}_{}.md",
            story.id,
            Utc::now().format("%Y%m%d_%H%M%S")
        );
        let path = out_dir.join(file_name);
        tokio::fs::write(&path, Self::render(story, image_path))
            .await
            .map_err(|e| ComposeError::Failed(format!("Failed to write {}: {e}", path.display())))?;

        debug!(path = %path.display(), "Markdown document written");
        Ok(path)
    }
}
