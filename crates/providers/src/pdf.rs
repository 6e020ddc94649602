//! PDF story documents on A4 pages.
//!
//! Layout, top to bottom: the title centered in bold, theme and age group
//! lines, the illustration scaled to the content width, the body, the moral
//! lesson and a footer with the generation time and word count. Text uses
//! the built-in Helvetica faces, so nothing is embedded but the image.

use async_trait::async_trait;
use chrono::Utc;
use printpdf::image_crate::{self, DynamicImage, GenericImageView};
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference,
};
use std::path::{Path, PathBuf};
use storyverse_core::error::ComposeError;
use storyverse_core::{DocumentComposer, Story};
use tracing::debug;

use crate::markdown::body_text;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 10.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
const IMAGE_DPI: f32 = 300.0;
const MM_PER_POINT: f32 = 0.3528;
/// Average Helvetica advance as a fraction of the font size
const AVERAGE_GLYPH: f32 = 0.52;

#[derive(Debug, Default)]
pub struct PdfComposer;

impl PdfComposer {
    pub fn new() -> Self {
        Self
    }

    /// The PDF bytes for `story` illustrated by the encoded image `image`.
    ///
    /// Fails if the image cannot be decoded.
    pub fn render(story: &Story, image: &[u8]) -> Result<Vec<u8>, ComposeError> {
        let picture = image_crate::load_from_memory(image)
            .map_err(|e| ComposeError::Failed(format!("Image could not be decoded: {e}")))?;

        let mut page = PageWriter::new(&story.title)?;
        page.paragraph(&story.title, Face::Bold, 24.0, 12.0, true);
        page.gap(4.0);
        page.line(&format!("Theme: {}", story.theme), Face::Regular, 12.0, 8.0, false);
        page.line(&format!("Age Group: {}", story.age_group), Face::Regular, 12.0, 8.0, false);
        page.image(&picture);

        for paragraph in body_text(story).split("\n\n") {
            let paragraph = paragraph.split_whitespace().collect::<Vec<_>>().join(" ");
            if paragraph.is_empty() {
                continue;
            }
            page.paragraph(&paragraph, Face::Regular, 12.0, 6.5, false);
            page.gap(3.0);
        }

        if !story.moral.trim().is_empty() {
            page.gap(7.0);
            page.line("Moral Lesson:", Face::Bold, 14.0, 9.0, false);
            page.paragraph(story.moral.trim(), Face::Regular, 12.0, 6.5, false);
        }

        page.gap(10.0);
        let generated = story.generated_at.format("%Y-%m-%d %H:%M:%S");
        page.line(&format!("Generated: {generated}"), Face::Regular, 10.0, 6.0, false);
        page.line(&format!("Word Count: {}", story.word_count()), Face::Regular, 10.0, 6.0, false);

        page.finish()
    }
}

#[async_trait]
impl DocumentComposer for PdfComposer {
    fn name(&self) -> &str {
        "pdf"
    }

    async fn compose(
        &self,
        story: &Story,
        image_path: &Path,
        out_dir: &Path,
    ) -> std::result::Result<PathBuf, ComposeError> {
        let image = tokio::fs::read(image_path).await.map_err(|e| {
            ComposeError::Failed(format!("Failed to read image {}: {e}", image_path.display()))
        })?;
        let bytes = Self::render(story, &image)?;

        tokio::fs::create_dir_all(out_dir).await.map_err(|e| {
            ComposeError::Failed(format!("Failed to create {}: {e}", out_dir.display()))
        })?;

        let file_name = format!(
            "story_{}_{}.pdf",
            story.id,
            Utc::now().format("%Y%m%d_%H%M%S")
        );
        let path = out_dir.join(file_name);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| ComposeError::Failed(format!("Failed to write {}: {e}", path.display())))?;

        debug!(path = %path.display(), bytes = bytes.len(), "PDF document written");
        Ok(path)
    }
}

// ── Layout ───────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Face {
    Regular,
    Bold,
}

/// A top-down cursor over the pages of one document.
struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    /// Distance of the cursor from the bottom edge, in mm
    y: f32,
}

impl PageWriter {
    fn new(title: &str) -> Result<Self, ComposeError> {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Story");
        let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?;
        let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_error)?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            y: PAGE_HEIGHT - MARGIN,
        })
    }

    /// Start a new page unless `height` mm still fit above the bottom margin.
    fn reserve(&mut self, height: f32) {
        if self.y - height >= MARGIN {
            return;
        }
        let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Story");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn gap(&mut self, height: f32) {
        self.y = (self.y - height).max(MARGIN);
    }

    fn line(&mut self, text: &str, face: Face, size: f32, height: f32, centered: bool) {
        self.reserve(height);
        self.y -= height;
        let x = if centered {
            ((PAGE_WIDTH - text_width(text, size)) / 2.0).max(MARGIN)
        } else {
            MARGIN
        };
        let font = match face {
            Face::Regular => &self.regular,
            Face::Bold => &self.bold,
        };
        self.layer
            .use_text(text, size, Mm(x), Mm(self.y + height * 0.25), font);
    }

    fn paragraph(&mut self, text: &str, face: Face, size: f32, height: f32, centered: bool) {
        for line in wrap(text, chars_per_line(size)) {
            self.line(&line, face, size, height, centered);
        }
    }

    /// Place the image at content width, shrunk further if taller than a page.
    fn image(&mut self, picture: &DynamicImage) {
        let (width_px, height_px) = picture.dimensions();
        if width_px == 0 || height_px == 0 {
            return;
        }
        let natural_width = width_px as f32 / IMAGE_DPI * 25.4;
        let max_height = PAGE_HEIGHT - 2.0 * MARGIN - 20.0;
        let mut width = CONTENT_WIDTH;
        let mut height = width * height_px as f32 / width_px as f32;
        if height > max_height {
            width *= max_height / height;
            height = max_height;
        }
        let scale = width / natural_width;

        self.reserve(height + 20.0);
        self.y -= 10.0;
        let bottom = self.y - height;
        Image::from_dynamic_image(&DynamicImage::ImageRgb8(picture.to_rgb8())).add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm((PAGE_WIDTH - width) / 2.0)),
                translate_y: Some(Mm(bottom)),
                scale_x: Some(scale),
                scale_y: Some(scale),
                dpi: Some(IMAGE_DPI),
                ..Default::default()
            },
        );
        self.y = bottom - 10.0;
    }

    fn finish(self) -> Result<Vec<u8>, ComposeError> {
        self.doc.save_to_bytes().map_err(pdf_error)
    }
}

fn pdf_error(e: printpdf::Error) -> ComposeError {
    ComposeError::Failed(format!("PDF encoding failed: {e}"))
}

fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * MM_PER_POINT * AVERAGE_GLYPH
}

fn chars_per_line(size: f32) -> usize {
    ((CONTENT_WIDTH / (size * MM_PER_POINT * AVERAGE_GLYPH)) as usize).max(1)
}

/// Greedy word wrap to at most `width` chars per line. A longer word gets a
/// line of its own.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use printpdf::image_crate::{ImageFormat, Rgb, RgbImage};
    use std::collections::BTreeSet;
    use storyverse_core::{EntityId, StoryDraft};

    fn story(body: &str) -> Story {
        let draft = StoryDraft {
            title: "Storm over Marina".into(),
            body: body.into(),
            theme: "Courage".into(),
            age_group: "6-8".into(),
            moral: "Courage helps others.".into(),
            ..Default::default()
        };
        Story::new(
            EntityId::from("STORY2025010300001"),
            &draft,
            BTreeSet::new(),
            Utc.with_ymd_and_hms(2025, 1, 3, 18, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let picture = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 120, 40])));
        let mut bytes = std::io::Cursor::new(Vec::new());
        picture.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn wrap_respects_width() {
        let lines = wrap("Ammu raced the storm along the beach", 12);
        assert_eq!(lines, vec!["Ammu raced", "the storm", "along the", "beach"]);
        assert!(wrap("   ", 10).is_empty());
        assert_eq!(wrap("Thunderstorming", 5), vec!["Thunderstorming"]);
    }

    #[test]
    fn render_produces_a_pdf() {
        let bytes = PdfComposer::render(&story("Story:\nAmmu raced the storm.\n\nShe won."), &png(8, 4))
            .unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn long_story_and_tall_image_render() {
        let body = "Ammu ran along the shore while the thunder rolled. ".repeat(400);
        let bytes = PdfComposer::render(&story(&body), &png(4, 40)).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn undecodable_image_is_refused() {
        let err = PdfComposer::render(&story("Ammu raced the storm."), b"not an image").unwrap_err();
        assert!(matches!(err, ComposeError::Failed(msg) if msg.contains("decoded")));
    }

    #[tokio::test]
    async fn compose_writes_pdf_into_out_dir() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("img.png");
        std::fs::write(&image, png(16, 16)).unwrap();

        let out = dir.path().join("documents");
        let path = PdfComposer::new()
            .compose(&story("Ammu raced the storm."), &image, &out)
            .await
            .unwrap();
        assert!(path.starts_with(&out));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("story_STORY2025010300001_"));
        assert!(name.ends_with(".pdf"));

        let written = std::fs::read(&path).unwrap();
        assert!(written.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn missing_image_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let err = PdfComposer::new()
            .compose(&story("Ammu raced the storm."), &dir.path().join("nope.png"), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, ComposeError::Failed(_)));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
