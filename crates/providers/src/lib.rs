//! Collaborator implementations for Storyverse.
//!
//! Each adapter implements one of the `storyverse_core` collaborator traits:
//! - [`OllamaStoryGenerator`]: story text over an OpenAI-compatible chat API
//! - [`DiffusionHttpRenderer`]: illustrations over a txt2img HTTP API
//! - [`PdfComposer`]: story documents as A4 PDF files
//! - [`MarkdownComposer`]: story documents as Markdown files

pub mod diffusion;
pub mod markdown;
pub mod ollama;
pub mod pdf;
pub mod story_format;

use std::sync::Arc;
use storyverse_config::DocumentFormat;
use storyverse_core::DocumentComposer;

pub use diffusion::DiffusionHttpRenderer;
pub use markdown::MarkdownComposer;
pub use ollama::OllamaStoryGenerator;
pub use pdf::PdfComposer;

/// The collaborators named by a configuration.
pub struct Collaborators {
    pub generator: Arc<OllamaStoryGenerator>,
    pub renderer: Arc<DiffusionHttpRenderer>,
    pub composer: Arc<dyn DocumentComposer>,
}

/// Build every collaborator from configuration.
pub fn build_from_config(config: &storyverse_config::AppConfig) -> Collaborators {
    Collaborators {
        generator: Arc::new(OllamaStoryGenerator::from_config(&config.generation)),
        renderer: Arc::new(DiffusionHttpRenderer::from_config(&config.image)),
        composer: composer_for(config.outputs.document_format),
    }
}

pub fn composer_for(format: DocumentFormat) -> Arc<dyn DocumentComposer> {
    match format {
        DocumentFormat::Pdf => Arc::new(PdfComposer::new()),
        DocumentFormat::Markdown => Arc::new(MarkdownComposer::new()),
    }
}
