//! External collaborators: the story generator, image renderer and
//! document composer.
//!
//! All three are treated as slow and unreliable. Callers wrap every call in
//! a bounded timeout and never mutate the universe when one fails.
//!
//! Implementations: Ollama (OpenAI-compatible chat), txt2img HTTP,
//! Markdown documents.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use crate::context::Context;
use crate::error::{ComposeError, GenerationError, ImageError};
use crate::story::{Story, StoryDraft};

/// Produces story text grounded in a context.
#[async_trait]
pub trait StoryGenerator: Send + Sync {
    /// The generator name (e.g., "ollama", "scripted").
    fn name(&self) -> &str;

    /// Generate a draft. `prompt` carries extra direction from the user and
    /// may be empty.
    async fn generate(
        &self,
        prompt: &str,
        context: &Context,
    ) -> std::result::Result<StoryDraft, GenerationError>;
}

/// Illustrates a scene.
#[async_trait]
pub trait ImageRenderer: Send + Sync {
    fn name(&self) -> &str;

    /// Render a square image of `size` pixels and return the encoded bytes.
    async fn render_scene(&self, prompt: &str, size: u32) -> std::result::Result<Vec<u8>, ImageError>;
}

/// Turns a story and its latest image into a document.
#[async_trait]
pub trait DocumentComposer: Send + Sync {
    fn name(&self) -> &str;

    /// Write a document into `out_dir` and return its path.
    async fn compose(
        &self,
        story: &Story,
        image_path: &Path,
        out_dir: &Path,
    ) -> std::result::Result<PathBuf, ComposeError>;
}
